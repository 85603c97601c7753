//! GPIO capability adapters.
//!
//! - [`SimGpio`]: in-memory pin table for simulated runs (`hardware.simulate`) and tests.
//!   Output pins read back their last written level, which is how the
//!   simulated tank observes the relay.
//! - [`EspGpio`] (`target_os = "espidf"`): raw ESP-IDF GPIO driver calls.

use std::collections::{HashMap, HashSet};

use log::{debug, info};

use crate::app::ports::{GpioPort, Level, PinDirection, Pull};
use crate::error::HardwareFault;

// ───────────────────────────────────────────────────────────────
// SimGpio
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct SimPin {
    direction: PinDirection,
    pull: Option<Pull>,
    /// Driven level (outputs) or externally forced level (inputs).
    level: Option<Level>,
    fail_writes: bool,
}

/// In-memory GPIO.  Unconfigured pins fail every access.
#[derive(Debug, Default)]
pub struct SimGpio {
    pins: HashMap<u8, SimPin>,
    refuse_configure: HashSet<u8>,
    released: bool,
}

impl SimGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the level seen on an input pin (test / bench stimulus).
    pub fn set_input(&mut self, pin: u8, level: Level) {
        if let Some(p) = self.pins.get_mut(&pin) {
            p.level = Some(level);
        }
    }

    /// Level currently on `pin`, `None` if never configured or floating.
    pub fn level(&self, pin: u8) -> Option<Level> {
        self.pins.get(&pin).and_then(|p| p.level)
    }

    /// Make every later write to `pin` fail (fault injection).
    pub fn fail_writes(&mut self, pin: u8) {
        if let Some(p) = self.pins.get_mut(&pin) {
            p.fail_writes = true;
        }
    }

    /// Make configuring `pin` fail, as a pin claimed by another driver would.
    pub fn fail_configure(&mut self, pin: u8) {
        self.refuse_configure.insert(pin);
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl GpioPort for SimGpio {
    fn configure(
        &mut self,
        pin: u8,
        direction: PinDirection,
        pull: Option<Pull>,
        initial: Option<Level>,
    ) -> Result<(), HardwareFault> {
        if self.released || self.refuse_configure.contains(&pin) {
            return Err(HardwareFault::ConfigureFailed(pin));
        }
        debug!("SimGpio: GPIO {} {:?} pull={:?} initial={:?}", pin, direction, pull, initial);
        self.pins.insert(
            pin,
            SimPin {
                direction,
                pull,
                level: initial,
                fail_writes: false,
            },
        );
        Ok(())
    }

    fn read(&mut self, pin: u8) -> Result<Level, HardwareFault> {
        if self.released {
            return Err(HardwareFault::ReadFailed(pin));
        }
        let p = self.pins.get(&pin).ok_or(HardwareFault::ReadFailed(pin))?;
        Ok(match (p.level, p.pull) {
            (Some(level), _) => level,
            (None, Some(Pull::Up)) => Level::High,
            (None, _) => Level::Low,
        })
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<(), HardwareFault> {
        if self.released {
            return Err(HardwareFault::WriteFailed(pin));
        }
        match self.pins.get_mut(&pin) {
            Some(p) if p.direction == PinDirection::Output && !p.fail_writes => {
                p.level = Some(level);
                Ok(())
            }
            _ => Err(HardwareFault::WriteFailed(pin)),
        }
    }

    fn release(&mut self) -> Result<(), HardwareFault> {
        if !self.released {
            info!("SimGpio: released {} pins", self.pins.len());
            self.pins.clear();
            self.released = true;
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// EspGpio
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::EspGpio;

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_svc::sys::*;
    use heapless::Vec;

    use super::*;

    /// Raw ESP-IDF GPIO.  Remembers configured pins so `release` can
    /// return each one to its reset state.
    pub struct EspGpio {
        configured: Vec<u8, 8>,
        released: bool,
    }

    impl Default for EspGpio {
        fn default() -> Self {
            Self::new()
        }
    }

    impl EspGpio {
        pub fn new() -> Self {
            Self {
                configured: Vec::new(),
                released: false,
            }
        }
    }

    impl GpioPort for EspGpio {
        fn configure(
            &mut self,
            pin: u8,
            direction: PinDirection,
            pull: Option<Pull>,
            initial: Option<Level>,
        ) -> Result<(), HardwareFault> {
            // Level first so an output never glitches to the wrong state.
            if let Some(level) = initial {
                // SAFETY: plain register write on a valid pin number.
                unsafe { gpio_set_level(i32::from(pin), u32::from(level.is_high())) };
            }
            let cfg = gpio_config_t {
                pin_bit_mask: 1u64 << pin,
                mode: match direction {
                    PinDirection::Input => gpio_mode_t_GPIO_MODE_INPUT,
                    PinDirection::Output => gpio_mode_t_GPIO_MODE_INPUT_OUTPUT,
                },
                pull_up_en: if pull == Some(Pull::Up) {
                    gpio_pullup_t_GPIO_PULLUP_ENABLE
                } else {
                    gpio_pullup_t_GPIO_PULLUP_DISABLE
                },
                pull_down_en: if pull == Some(Pull::Down) {
                    gpio_pulldown_t_GPIO_PULLDOWN_ENABLE
                } else {
                    gpio_pulldown_t_GPIO_PULLDOWN_DISABLE
                },
                intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
            };
            // SAFETY: `cfg` outlives the call.
            if unsafe { gpio_config(&cfg) } != ESP_OK {
                return Err(HardwareFault::ConfigureFailed(pin));
            }
            if !self.configured.contains(&pin) {
                let _ = self.configured.push(pin);
            }
            Ok(())
        }

        fn read(&mut self, pin: u8) -> Result<Level, HardwareFault> {
            // SAFETY: read-only register access.
            let raw = unsafe { gpio_get_level(i32::from(pin)) };
            Ok(Level::from(raw != 0))
        }

        fn write(&mut self, pin: u8, level: Level) -> Result<(), HardwareFault> {
            // SAFETY: plain register write on a configured pin.
            if unsafe { gpio_set_level(i32::from(pin), u32::from(level.is_high())) } != ESP_OK {
                return Err(HardwareFault::WriteFailed(pin));
            }
            Ok(())
        }

        fn release(&mut self) -> Result<(), HardwareFault> {
            if self.released {
                return Ok(());
            }
            self.released = true;
            let mut ok = true;
            for &pin in &self.configured {
                // SAFETY: resets a pin this adapter configured.
                ok &= unsafe { gpio_reset_pin(i32::from(pin)) } == ESP_OK;
            }
            if ok { Ok(()) } else { Err(HardwareFault::ReleaseFailed) }
        }
    }
}
