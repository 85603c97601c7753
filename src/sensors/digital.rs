//! Single-input threshold probe (float switch, capacitive XKC-Y25 style).
//!
//! The input is pulled up; HIGH means water at or above the probe, which
//! reads as 100 %, LOW reads as 0 %.  Smoothing in the
//! [`LevelSensor`](super::level::LevelSensor) turns the two-valued signal
//! into a usable level trend.

use crate::app::ports::{GpioPort, PinDirection, Pull};
use crate::error::{HardwareFault, SensorError};

pub struct DigitalThresholdProbe {
    pin: u8,
}

impl DigitalThresholdProbe {
    pub fn new(pin: u8) -> Self {
        Self { pin }
    }

    pub fn init(&self, gpio: &mut impl GpioPort) -> Result<(), HardwareFault> {
        gpio.configure(self.pin, PinDirection::Input, Some(Pull::Up), None)
    }

    pub fn read_percent(&self, gpio: &mut impl GpioPort) -> Result<f32, SensorError> {
        match gpio.read(self.pin) {
            Ok(level) if level.is_high() => Ok(100.0),
            Ok(_) => Ok(0.0),
            Err(e) => {
                log::warn!("level input: {}", e);
                Err(SensorError::ReadError)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::gpio::SimGpio;
    use crate::app::ports::Level;

    #[test]
    fn maps_levels_to_full_and_empty() {
        let mut gpio = SimGpio::new();
        let probe = DigitalThresholdProbe::new(27);
        probe.init(&mut gpio).unwrap();

        // Pull-up: an unconnected switch reads HIGH.
        assert_eq!(probe.read_percent(&mut gpio), Ok(100.0));
        gpio.set_input(27, Level::Low);
        assert_eq!(probe.read_percent(&mut gpio), Ok(0.0));
    }

    #[test]
    fn unconfigured_pin_is_a_read_error() {
        let mut gpio = SimGpio::new();
        let probe = DigitalThresholdProbe::new(27);
        assert_eq!(probe.read_percent(&mut gpio), Err(SensorError::ReadError));
    }
}
