//! Simulated tank for bench runs without level hardware.
//!
//! The level drifts down at the household draw rate, rises at the fill
//! rate while the pump relay pin is energized, and carries a little
//! uniform noise.  When the draw empties the tank it reverses direction,
//! so an unattended simulation keeps moving instead of parking at 0 %.
//!
//! The model observes the relay through the same GPIO capability the
//! relay driver writes, so the closed loop needs no extra wiring.

use log::warn;

use crate::app::ports::{GpioPort, Level};
use crate::config::SimulationConfig;
use crate::error::SensorError;

/// Peak-to-peak noise added to each reading (percentage points).
const NOISE_PP: f32 = 0.1;

pub struct SimulatedTank {
    level: f32,
    draw_per_sec: f32,
    fill_per_sec: f32,
    /// +1.0 draining, -1.0 after a bounce off the bottom.
    trend: f32,
    relay_pin: u8,
    relay_on_level: Level,
    last_ms: Option<u64>,
    millis: fn() -> u64,
}

impl SimulatedTank {
    pub fn new(
        cfg: &SimulationConfig,
        relay_pin: u8,
        relay_active_high: bool,
        millis: fn() -> u64,
    ) -> Self {
        Self {
            level: cfg.initial_percent.clamp(0.0, 100.0),
            draw_per_sec: cfg.draw_percent_per_sec,
            fill_per_sec: cfg.fill_percent_per_sec,
            trend: 1.0,
            relay_pin,
            relay_on_level: Level::from(relay_active_high),
            last_ms: None,
            millis,
        }
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// Advance the model by `dt_secs` and return the noisy reading.
    pub fn step(&mut self, dt_secs: f32, pump_on: bool) -> f32 {
        let mut delta = -self.draw_per_sec * self.trend * dt_secs;
        if pump_on {
            delta += self.fill_per_sec * dt_secs;
        }
        self.level += delta;

        if self.level <= 0.0 {
            self.level = 0.0;
            self.trend = -1.0;
        } else if self.level >= 100.0 {
            self.level = 100.0;
            self.trend = 1.0;
        }

        let noise = (fastrand::f32() - 0.5) * NOISE_PP;
        (self.level + noise).clamp(0.0, 100.0)
    }

    pub fn read_percent(&mut self, gpio: &mut impl GpioPort) -> Result<f32, SensorError> {
        let pump_on = match gpio.read(self.relay_pin) {
            Ok(level) => level == self.relay_on_level,
            Err(e) => {
                warn!("sim tank: {}", e);
                return Err(SensorError::ReadError);
            }
        };
        let now = (self.millis)();
        let dt_secs = self
            .last_ms
            .map_or(0.0, |last| now.saturating_sub(last) as f32 / 1000.0);
        self.last_ms = Some(now);
        Ok(self.step(dt_secs, pump_on))
    }
}
