//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the GPIO capability, the pump [`Relay`] and the configured
//! [`LevelProbe`], exposing them through [`LevelSource`] and
//! [`ActuatorPort`].  This is the only module in the system that touches
//! pins on behalf of the control loop.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::app::ports::{ActuatorPort, GpioPort, LevelSource};
use crate::config::{SensorKind, SystemConfig};
use crate::drivers::relay::Relay;
use crate::error::{HardwareFault, SensorError};
use crate::sensors::LevelProbe;
use crate::sensors::digital::DigitalThresholdProbe;
use crate::sensors::sim::SimulatedTank;
use crate::sensors::ultrasonic::UltrasonicProbe;

/// Platform time sources handed to the probes.
#[derive(Clone, Copy)]
pub struct Timebase {
    pub micros: fn() -> u64,
    pub millis: fn() -> u64,
}

/// Concrete adapter that combines the relay and level probe behind port traits.
pub struct HardwareAdapter<G, D> {
    gpio: G,
    relay: Relay,
    probe: LevelProbe<D>,
    released: bool,
}

impl<G: GpioPort, D: DelayNs> HardwareAdapter<G, D> {
    /// Configure the relay (de-energized) and then the probe pins.
    ///
    /// If either step fails the capability is released before the error is
    /// returned, so no half-configured pin outlives the adapter.
    pub fn new(mut gpio: G, mut relay: Relay, probe: LevelProbe<D>) -> Result<Self, HardwareFault> {
        let init = relay.init(&mut gpio).and_then(|()| probe.init(&mut gpio));
        if let Err(fault) = init {
            if let Err(e) = gpio.release() {
                warn!("GPIO release after failed init also failed: {}", e);
            }
            return Err(fault);
        }
        info!("Hardware ready: relay GPIO {}, {} probe", relay.pin(), probe.name());
        Ok(Self {
            gpio,
            relay,
            probe,
            released: false,
        })
    }

    /// Build the relay and the probe selected by `cfg.sensor.kind`.
    pub fn from_config(
        gpio: G,
        cfg: &SystemConfig,
        delay: D,
        time: Timebase,
    ) -> Result<Self, HardwareFault> {
        let hw = &cfg.hardware;
        let relay = Relay::new(hw.pins.pump_relay, hw.relay_active_high);
        let probe = match cfg.sensor.kind {
            SensorKind::Ultrasonic => LevelProbe::Ultrasonic(UltrasonicProbe::new(
                hw.pins.trigger,
                hw.pins.echo,
                cfg.sensor.ultrasonic.clone(),
                delay,
                time.micros,
            )),
            SensorKind::DigitalThreshold => {
                LevelProbe::DigitalThreshold(DigitalThresholdProbe::new(hw.pins.level_input))
            }
            SensorKind::Simulated => LevelProbe::Simulated(SimulatedTank::new(
                &cfg.sensor.simulation,
                hw.pins.pump_relay,
                hw.relay_active_high,
                time.millis,
            )),
        };
        Self::new(gpio, relay, probe)
    }

    pub fn gpio(&self) -> &G {
        &self.gpio
    }

    pub fn gpio_mut(&mut self) -> &mut G {
        &mut self.gpio
    }
}

// ── LevelSource implementation ────────────────────────────────

impl<G: GpioPort, D: DelayNs> LevelSource for HardwareAdapter<G, D> {
    fn read_raw_percent(&mut self) -> Result<f32, SensorError> {
        self.probe.read_percent(&mut self.gpio)
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<G: GpioPort, D: DelayNs> ActuatorPort for HardwareAdapter<G, D> {
    fn set_pump(&mut self, on: bool) -> Result<(), HardwareFault> {
        self.relay.set(&mut self.gpio, on)
    }

    fn pump_energized(&self) -> bool {
        self.relay.is_on()
    }

    fn release(&mut self) -> Result<(), HardwareFault> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        if self.relay.is_on() {
            // Releasing resets the pin; make sure the coil drops first.
            if let Err(e) = self.relay.off(&mut self.gpio) {
                warn!("Relay off before release failed: {}", e);
            }
        }
        self.gpio.release()
    }
}
