//! HC-SR04 style ultrasonic distance probe.
//!
//! A 10 µs HIGH pulse on TRIG starts a ping; ECHO then stays HIGH for the
//! round-trip time.  Both edge waits are bounded by `echo_timeout_ms` so a
//! disconnected or stuck echo line turns into [`SensorError::Timeout`]
//! instead of stalling the control loop.
//!
//! Distance maps linearly to fill level between the configured "full"
//! (short echo) and "empty" (long echo) distances.

use embedded_hal::delay::DelayNs;
use log::warn;

use crate::app::ports::{GpioPort, Level, PinDirection};
use crate::config::UltrasonicConfig;
use crate::error::{HardwareFault, SensorError};
use crate::pins;

/// Half the speed of sound in cm/s (out and back).
const HALF_SPEED_OF_SOUND_CM_S: f32 = 17_150.0;

pub struct UltrasonicProbe<D> {
    trig: u8,
    echo: u8,
    cfg: UltrasonicConfig,
    delay: D,
    /// Free-running microsecond counter.
    micros: fn() -> u64,
}

impl<D: DelayNs> UltrasonicProbe<D> {
    pub fn new(trig: u8, echo: u8, cfg: UltrasonicConfig, delay: D, micros: fn() -> u64) -> Self {
        Self {
            trig,
            echo,
            cfg,
            delay,
            micros,
        }
    }

    /// Configure TRIG as a LOW output and ECHO as a floating input.
    pub fn init(&self, gpio: &mut impl GpioPort) -> Result<(), HardwareFault> {
        gpio.configure(self.trig, PinDirection::Output, None, Some(Level::Low))?;
        gpio.configure(self.echo, PinDirection::Input, None, None)
    }

    /// One ping, returned as centimetres to the water surface.
    pub fn measure_cm(&mut self, gpio: &mut impl GpioPort) -> Result<f32, SensorError> {
        gpio.write(self.trig, Level::Low).map_err(pin_fault)?;
        self.delay.delay_us(pins::TRIGGER_SETTLE_US);
        gpio.write(self.trig, Level::High).map_err(pin_fault)?;
        self.delay.delay_us(pins::TRIGGER_PULSE_US);
        gpio.write(self.trig, Level::Low).map_err(pin_fault)?;

        let rise_us = self.wait_for(gpio, Level::High)?;
        let fall_us = self.wait_for(gpio, Level::Low)?;

        let pulse_s = fall_us.saturating_sub(rise_us) as f32 / 1_000_000.0;
        let cm = pulse_s * HALF_SPEED_OF_SOUND_CM_S;
        if !cm.is_finite() || cm < 0.0 {
            return Err(SensorError::ReadError);
        }
        Ok(cm)
    }

    pub fn read_percent(&mut self, gpio: &mut impl GpioPort) -> Result<f32, SensorError> {
        let cm = self.measure_cm(gpio)?;
        Ok(distance_to_percent(
            cm,
            self.cfg.full_distance_cm,
            self.cfg.empty_distance_cm,
        ))
    }

    /// Spin until ECHO reads `level`; returns the timestamp of the edge.
    fn wait_for(&self, gpio: &mut impl GpioPort, level: Level) -> Result<u64, SensorError> {
        let timeout_us = u64::from(self.cfg.echo_timeout_ms) * 1_000;
        let start = (self.micros)();
        loop {
            if gpio.read(self.echo).map_err(pin_fault)? == level {
                return Ok((self.micros)());
            }
            if (self.micros)().saturating_sub(start) > timeout_us {
                return Err(SensorError::Timeout);
            }
        }
    }
}

/// `full_cm` is the echo distance of a full tank, `empty_cm` of an empty one.
pub fn distance_to_percent(distance_cm: f32, full_cm: f32, empty_cm: f32) -> f32 {
    let d = distance_cm.clamp(full_cm, empty_cm);
    100.0 * (1.0 - (d - full_cm) / (empty_cm - full_cm))
}

fn pin_fault(e: HardwareFault) -> SensorError {
    warn!("ultrasonic: {}", e);
    SensorError::ReadError
}
