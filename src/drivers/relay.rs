//! Pump contactor relay driver.
//!
//! A single digital output.  Most opto-isolated relay boards energize the
//! coil on a LOW input, so polarity is configurable.
//!
//! ## Safety contract
//!
//! The pin is configured with the de-energized level as its initial
//! level, so the pump cannot twitch while the board boots.  The driver
//! only records the new state after the write succeeded; a failed write
//! leaves `is_on()` describing the last level known to be on the pin.

use log::info;

use crate::app::ports::{GpioPort, Level, PinDirection};
use crate::error::HardwareFault;

pub struct Relay {
    pin: u8,
    active_high: bool,
    on: bool,
}

impl Relay {
    pub fn new(pin: u8, active_high: bool) -> Self {
        Self {
            pin,
            active_high,
            on: false,
        }
    }

    /// Configure the pin as an output, de-energized.
    pub fn init(&mut self, gpio: &mut impl GpioPort) -> Result<(), HardwareFault> {
        gpio.configure(self.pin, PinDirection::Output, None, Some(self.level(false)))?;
        self.on = false;
        info!(
            "Relay on GPIO {} ready (active {})",
            self.pin,
            if self.active_high { "HIGH" } else { "LOW" }
        );
        Ok(())
    }

    pub fn set(&mut self, gpio: &mut impl GpioPort, on: bool) -> Result<(), HardwareFault> {
        gpio.write(self.pin, self.level(on))?;
        self.on = on;
        Ok(())
    }

    pub fn on(&mut self, gpio: &mut impl GpioPort) -> Result<(), HardwareFault> {
        self.set(gpio, true)
    }

    pub fn off(&mut self, gpio: &mut impl GpioPort) -> Result<(), HardwareFault> {
        self.set(gpio, false)
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Pin level that puts the coil in the requested state.
    fn level(&self, on: bool) -> Level {
        Level::from(on == self.active_high)
    }
}
