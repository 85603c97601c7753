//! Level sensing: raw probes and the smoothing pipeline.
//!
//! Exactly one raw probe feeds the [`LevelSensor`](level::LevelSensor),
//! selected by [`SensorKind`](crate::config::SensorKind) at startup.
//! [`LevelProbe`] dispatches to it without dynamic allocation.

pub mod digital;
pub mod level;
pub mod sim;
pub mod ultrasonic;

use embedded_hal::delay::DelayNs;

use crate::app::ports::GpioPort;
use crate::error::{HardwareFault, SensorError};
use digital::DigitalThresholdProbe;
use sim::SimulatedTank;
use ultrasonic::UltrasonicProbe;

/// The configured raw level probe.
pub enum LevelProbe<D> {
    Ultrasonic(UltrasonicProbe<D>),
    DigitalThreshold(DigitalThresholdProbe),
    Simulated(SimulatedTank),
}

impl<D: DelayNs> LevelProbe<D> {
    /// Configure the probe's pins.
    pub fn init(&self, gpio: &mut impl GpioPort) -> Result<(), HardwareFault> {
        match self {
            Self::Ultrasonic(p) => p.init(gpio),
            Self::DigitalThreshold(p) => p.init(gpio),
            Self::Simulated(_) => Ok(()),
        }
    }

    /// One uncalibrated reading in percent.
    pub fn read_percent(&mut self, gpio: &mut impl GpioPort) -> Result<f32, SensorError> {
        match self {
            Self::Ultrasonic(p) => p.read_percent(gpio),
            Self::DigitalThreshold(p) => p.read_percent(gpio),
            Self::Simulated(p) => p.read_percent(gpio),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ultrasonic(_) => "ultrasonic",
            Self::DigitalThreshold(_) => "digital_threshold",
            Self::Simulated(_) => "simulated",
        }
    }
}
