//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlLoop (domain)
//! ```
//!
//! Driven adapters (GPIO, level probes, relay, log sinks, config storage)
//! implement these traits.  The [`ControlLoop`](super::service::ControlLoop)
//! consumes them via generics, so the domain core never touches pins
//! directly and every state machine runs against mocks in tests.

use chrono::NaiveDateTime;

use crate::config::SystemConfig;
use crate::error::{ConfigError, HardwareFault, SensorError};

// ───────────────────────────────────────────────────────────────
// GPIO capability (driven adapter: pins ↔ drivers)
// ───────────────────────────────────────────────────────────────

/// Pin direction passed to [`GpioPort::configure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinDirection {
    Input,
    Output,
}

/// Internal pull resistor for input pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    Up,
    Down,
}

/// Logic level of a digital pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Self::High
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }
}

/// Digital I/O capability handed to the relay and probe drivers.
///
/// One implementation per platform: the in-memory
/// [`SimGpio`](crate::adapters::gpio::SimGpio) and the ESP-IDF
/// [`EspGpio`](crate::adapters::gpio::EspGpio).  The capability must be
/// released exactly once on shutdown.
pub trait GpioPort {
    /// Apply direction, optional pull and optional initial output level.
    fn configure(
        &mut self,
        pin: u8,
        direction: PinDirection,
        pull: Option<Pull>,
        initial: Option<Level>,
    ) -> Result<(), HardwareFault>;

    fn read(&mut self, pin: u8) -> Result<Level, HardwareFault>;

    fn write(&mut self, pin: u8, level: Level) -> Result<(), HardwareFault>;

    /// Return every configured pin to its reset state.
    fn release(&mut self) -> Result<(), HardwareFault>;
}

impl<T: GpioPort + ?Sized> GpioPort for &mut T {
    fn configure(
        &mut self,
        pin: u8,
        direction: PinDirection,
        pull: Option<Pull>,
        initial: Option<Level>,
    ) -> Result<(), HardwareFault> {
        T::configure(self, pin, direction, pull, initial)
    }

    fn read(&mut self, pin: u8) -> Result<Level, HardwareFault> {
        T::read(self, pin)
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<(), HardwareFault> {
        T::write(self, pin, level)
    }

    fn release(&mut self) -> Result<(), HardwareFault> {
        T::release(self)
    }
}

// ───────────────────────────────────────────────────────────────
// Level source port (driven adapter: probe → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: one uncalibrated level reading in percent.
///
/// Failures are transient by contract; the
/// [`LevelSensor`](crate::sensors::level::LevelSensor) keeps its last
/// smoothed value and tries again on the next due sample.
pub trait LevelSource {
    fn read_raw_percent(&mut self) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → relay)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to drive the pump relay.
pub trait ActuatorPort {
    /// Energize (`true`) or de-energize (`false`) the pump relay.
    fn set_pump(&mut self, on: bool) -> Result<(), HardwareFault>;

    /// Whether the relay is currently energized.
    fn pump_energized(&self) -> bool;

    /// Release the GPIO capability.  Idempotent.
    fn release(&mut self) -> Result<(), HardwareFault>;
}

// ───────────────────────────────────────────────────────────────
// Telemetry sink port (driven adapter: domain → log files / console)
// ───────────────────────────────────────────────────────────────

/// Append-only record of level samples and discrete events.
///
/// Fire-and-forget: a sink that cannot write logs the failure itself and
/// never stalls the control loop.
pub trait TelemetrySink {
    fn record_level(&mut self, timestamp: NaiveDateTime, percent: f32, pump_on: bool);

    fn record_event(&mut self, timestamp: NaiveDateTime, text: &str);

    /// Push buffered records to their destination.
    fn flush(&mut self) {}
}

/// Fan a record out to two sinks (console + CSV on the host runner).
impl<A: TelemetrySink, B: TelemetrySink> TelemetrySink for (A, B) {
    fn record_level(&mut self, timestamp: NaiveDateTime, percent: f32, pump_on: bool) {
        self.0.record_level(timestamp, percent, pump_on);
        self.1.record_level(timestamp, percent, pump_on);
    }

    fn record_event(&mut self, timestamp: NaiveDateTime, text: &str) {
        self.0.record_event(timestamp, text);
        self.1.record_event(timestamp, text);
    }

    fn flush(&mut self) {
        self.0.flush();
        self.1.flush();
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: storage → domain)
// ───────────────────────────────────────────────────────────────

/// Loads the system configuration.
///
/// Implementations MUST return a validated config: invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], never clamped.
pub trait ConfigPort {
    fn load(&self) -> Result<SystemConfig, ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from the leak scanner)
// ───────────────────────────────────────────────────────────────

/// Callback trait that the scheduler invokes when a schedule fires.
///
/// The [`Scheduler`](crate::scheduler::Scheduler) knows nothing about the
/// leak scanner or the pump; the control loop implements this by queueing
/// a scan request that it resolves after the scheduler returns.
pub trait ScanTrigger {
    /// * `label`: the human-readable label of the schedule that fired.
    /// * `kind` : daily or one-shot.
    /// * `duration_minutes`: requested scan length.
    fn on_schedule_fired(&mut self, label: &str, kind: ScheduleFiredKind, duration_minutes: u32);
}

/// Discriminant passed to [`ScanTrigger::on_schedule_fired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleFiredKind {
    /// The recurring nightly scan fired.
    Daily,
    /// A one-shot schedule fired (auto-disables after).
    OneShot,
}

// ───────────────────────────────────────────────────────────────
// Clock sample
// ───────────────────────────────────────────────────────────────

/// Time as seen by one control tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTime {
    /// Monotonic milliseconds since boot; drives every safety timer.
    pub monotonic_ms: u64,
    /// Local wall clock, `None` until the clock is known to be set.
    pub local: Option<NaiveDateTime>,
}

/// Source of [`TickTime`] samples and loop pacing.
pub trait Clock {
    fn now(&self) -> TickTime;

    /// Block until the monotonic clock reaches `deadline_ms`.
    fn sleep_until(&self, deadline_ms: u64);
}

impl TickTime {
    /// Timestamp for sink records; the Unix epoch when the wall clock is unknown.
    pub fn record_timestamp(&self) -> NaiveDateTime {
        self.local.unwrap_or_default()
    }
}
