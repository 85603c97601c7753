//! Control loop service: the hexagonal core.
//!
//! [`ControlLoop`] owns the level sensor, pump controller, leak scanner
//! and scheduler.  It exposes a clean, hardware-agnostic API.  All I/O
//! flows through port traits injected at call sites, making the entire
//! service testable with mock adapters and simulated time.
//!
//! ```text
//!  LevelSource ──▶ ┌──────────────────────────────┐ ──▶ TelemetrySink
//!                  │         ControlLoop          │
//! ActuatorPort ◀── │ sensor · pump · sched · leak │
//!                  └──────────────────────────────┘
//! ```
//!
//! Tick order is fixed: sample → level → pump → scheduler → leak scan →
//! records.  The pump runs before the scanner so a pump started this tick
//! cancels a scan in the same tick.

use heapless::Vec;
use log::{error, info, warn};

use crate::config::SystemConfig;
use crate::control::pump::{PumpController, PumpState, Thresholds};
use crate::error::{Error, SensorError};
use crate::leak::LeakScanner;
use crate::scheduler::{NIGHTLY_LABEL, Scheduler};
use crate::sensors::level::{LevelSensor, SampleOutcome};

use super::commands::AppCommand;
use super::events::{AppEvent, RejectReason};
use super::ports::{ActuatorPort, LevelSource, ScanTrigger, ScheduleFiredKind, TelemetrySink, TickTime};

/// Upper bound on events produced by one tick.
pub const MAX_TICK_EVENTS: usize = 8;

/// Scan requests collected from one scheduler tick.
const MAX_SCAN_REQUESTS: usize = 4;

/// What one tick observed and did.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub level: f32,
    pub pump_running: bool,
    pub events: Vec<AppEvent, MAX_TICK_EVENTS>,
}

/// Operating mode shown in the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    SoftStart,
    Scanning,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::SoftStart => "SoftStart",
            Self::Scanning => "Scanning",
        }
    }
}

// ───────────────────────────────────────────────────────────────
// ControlLoop
// ───────────────────────────────────────────────────────────────

pub struct ControlLoop {
    config: SystemConfig,
    sensor: LevelSensor,
    pump: PumpController,
    leak: LeakScanner,
    scheduler: Scheduler,
    tick_count: u64,
    last_level: f32,
    last_status_ms: Option<u64>,
    /// Failure streak length already reported, for the recovery event.
    failure_streak: u32,
}

impl ControlLoop {
    /// Build every state machine from a validated configuration.
    pub fn new(config: SystemConfig) -> Self {
        let sensor = LevelSensor::new(&config.sensor.smoothing, config.sensor.calibration);
        let pump = PumpController::new(Thresholds::from(&config.pump_control));
        let leak = LeakScanner::new(config.leak_detection.min_detectable_drop_percent);
        let scheduler = Scheduler::from_config(&config.leak_detection.nightly_scan);
        Self {
            config,
            sensor,
            pump,
            leak,
            scheduler,
            tick_count: 0,
            last_level: 0.0,
            last_status_ms: None,
            failure_streak: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, now: TickTime, sink: &mut impl TelemetrySink) {
        let p = &self.config.pump_control;
        info!(
            "ControlLoop started: on={:.1}% off={:.1}% hard_off={:?} min_run={}s min_off={}s soft_start={}s",
            p.on_threshold_percent,
            p.off_threshold_percent,
            p.hard_off_percent,
            p.min_run_seconds,
            p.min_off_seconds,
            p.soft_start_delay_seconds,
        );
        sink.record_event(now.record_timestamp(), &AppEvent::Started.to_string());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle.
    ///
    /// The `hw` parameter satisfies **both** [`LevelSource`] and
    /// [`ActuatorPort`], which avoids a double mutable borrow while
    /// keeping the port boundary explicit.
    ///
    /// Sensor failures are absorbed here.  The only error returned is a
    /// relay write failure, which the caller must treat as fatal
    /// (see [`ControlLoop::fail_safe`]).
    pub fn tick(
        &mut self,
        now: TickTime,
        hw: &mut (impl LevelSource + ActuatorPort),
        sink: &mut impl TelemetrySink,
    ) -> Result<TickReport, Error> {
        self.tick_count += 1;
        let mono = now.monotonic_ms;
        let mut events: Vec<AppEvent, MAX_TICK_EVENTS> = Vec::new();

        // 1. Sample the probe (rate-limited by the smoothing period)
        match self.sensor.sample(mono, hw) {
            Ok(SampleOutcome::Updated(_)) => {
                if self.failure_streak > 0 {
                    info!("Level probe recovered after {} failures", self.failure_streak);
                    push(&mut events, AppEvent::SensorRecovered { failures: self.failure_streak });
                    self.failure_streak = 0;
                }
            }
            Ok(SampleOutcome::NotDue) => {}
            Err(e) => self.on_sensor_error(e, &mut events),
        }

        // 2. Smoothed level (primes on the very first tick)
        let level = self.sensor.level_percent(hw);
        self.last_level = level;

        // 3. Pump controller
        match self.pump.tick(level, mono, hw) {
            Ok(Some(e)) => push(&mut events, e.into()),
            Ok(None) => {}
            Err(fault) => {
                self.record(now, level, &events, sink);
                return Err(fault.into());
            }
        }

        // 4. Scheduler → scan requests
        let mut requests = ScanRequests::default();
        self.scheduler.tick(now.local, &mut requests);
        for minutes in requests.0 {
            match self.leak.start(mono, minutes, level, self.pump.is_running()) {
                Ok(e) => push(&mut events, e.into()),
                Err(reason) => info!("Scheduled leak scan skipped ({})", reason),
            }
        }

        // 5. Leak scanner
        if let Some(e) = self.leak.tick(mono, level, self.pump.is_running()) {
            push(&mut events, e.into());
        }

        // 6. Records
        self.record(now, level, &events, sink);
        self.publish_status(mono, level);

        Ok(TickReport {
            level,
            pump_running: self.pump.is_running(),
            events,
        })
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.  Returns the event it produced, if any
    /// (already recorded to `sink`).
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        now: TickTime,
        hw: &mut impl LevelSource,
        sink: &mut impl TelemetrySink,
    ) -> Option<AppEvent> {
        let event = match cmd {
            AppCommand::RunLeakScan { minutes } => {
                if self.config.leak_detection.manual_override_allowed {
                    let level = self.sensor.level_percent(hw);
                    match self.leak.start(now.monotonic_ms, minutes, level, self.pump.is_running()) {
                        Ok(e) => AppEvent::Leak(e),
                        Err(r) => AppEvent::LeakScanRejected(RejectReason::Scanner(r)),
                    }
                } else {
                    AppEvent::LeakScanRejected(RejectReason::ManualDisabled)
                }
            }
            AppCommand::ScheduleLeakScan { at, minutes } => {
                match self.scheduler.add_one_shot(at, minutes) {
                    Some(_) => info!("One-off leak scan queued for {} ({} min)", at, minutes),
                    None => warn!("One-off leak scan for {} dropped: no free schedule slot", at),
                }
                return None;
            }
            AppCommand::SetNightlyScan(enabled) => {
                self.scheduler.set_schedule_enabled(NIGHTLY_LABEL, enabled);
                self.config.leak_detection.nightly_scan.enabled = enabled;
                return None;
            }
        };
        if let AppEvent::LeakScanRejected(reason) = event {
            warn!("Manual leak scan rejected ({})", reason);
        }
        sink.record_event(now.record_timestamp(), &event.to_string());
        Some(event)
    }

    // ── Shutdown paths ────────────────────────────────────────

    /// Cooperative shutdown: relay off, stop record, flush, release.
    ///
    /// Every step is attempted even if an earlier one fails; the first
    /// failure is returned.
    pub fn shutdown(
        &mut self,
        now: TickTime,
        hw: &mut impl ActuatorPort,
        sink: &mut impl TelemetrySink,
    ) -> Result<(), Error> {
        let ts = now.record_timestamp();
        let mut result = Ok(());

        match self.pump.shutdown(now.monotonic_ms, hw) {
            Ok(Some(e)) => sink.record_event(ts, &AppEvent::from(e).to_string()),
            Ok(None) => {}
            Err(fault) => {
                error!("Shutdown: relay off failed: {}", fault);
                result = Err(fault.into());
            }
        }
        sink.record_event(ts, &AppEvent::Stopped.to_string());
        sink.flush();

        if let Err(fault) = hw.release() {
            error!("Shutdown: GPIO release failed: {}", fault);
            if result.is_ok() {
                result = Err(fault.into());
            }
        }
        info!("ControlLoop stopped after {} ticks", self.tick_count);
        result
    }

    /// Fatal path: one diagnostic, best-effort relay off, flush, release.
    pub fn fail_safe(
        &mut self,
        now: TickTime,
        err: Error,
        hw: &mut impl ActuatorPort,
        sink: &mut impl TelemetrySink,
    ) {
        err.log_fatal();
        // Best effort only: the relay path may be what failed.
        let _ = hw.set_pump(false);
        sink.record_event(now.record_timestamp(), &AppEvent::Fault(err).to_string());
        sink.flush();
        let _ = hw.release();
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn level(&self) -> f32 {
        self.last_level
    }

    pub fn pump_running(&self) -> bool {
        self.pump.is_running()
    }

    pub fn pump_state(&self) -> PumpState {
        self.pump.state()
    }

    pub fn is_scanning(&self) -> bool {
        self.leak.is_scanning()
    }

    pub fn mode(&self) -> Mode {
        if self.leak.is_scanning() {
            Mode::Scanning
        } else if matches!(self.pump.state(), PumpState::SoftStartPending { .. }) {
            Mode::SoftStart
        } else {
            Mode::Normal
        }
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Consecutive probe failures in the current streak.
    pub fn sensor_failures(&self) -> u32 {
        self.sensor.consecutive_failures()
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    // ── Internal ──────────────────────────────────────────────

    /// Report the first failure of a streak, then every Nth.
    fn on_sensor_error(&mut self, e: SensorError, events: &mut Vec<AppEvent, MAX_TICK_EVENTS>) {
        let consecutive = self.sensor.consecutive_failures();
        let first = self.failure_streak == 0;
        self.failure_streak = consecutive;
        warn!("Level probe failed ({}), holding {:.1}% [{} in a row]", e, self.last_level, consecutive);
        let every = self.config.runtime.sensor_error_report_every.max(1);
        if first || consecutive % every == 0 {
            push(events, AppEvent::SensorReadError { error: e, consecutive });
        }
    }

    fn record(
        &self,
        now: TickTime,
        level: f32,
        events: &[AppEvent],
        sink: &mut impl TelemetrySink,
    ) {
        let ts = now.record_timestamp();
        sink.record_level(ts, level, self.pump.is_running());
        for e in events {
            sink.record_event(ts, &e.to_string());
        }
    }

    fn publish_status(&mut self, now_ms: u64, level: f32) {
        let period_ms = u64::from(self.config.pump_control.status_publish_period_s) * 1000;
        let due = self
            .last_status_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= period_ms);
        if due {
            self.last_status_ms = Some(now_ms);
            info!(
                "Level={:5.1}%  Pump={}  Mode={}",
                level,
                if self.pump.is_running() { "ON" } else { "OFF" },
                self.mode().as_str()
            );
        }
    }
}

fn push(events: &mut Vec<AppEvent, MAX_TICK_EVENTS>, event: AppEvent) {
    if events.push(event).is_err() {
        warn!("Tick event buffer full, dropped {}", event);
    }
}

/// [`ScanTrigger`] that queues requested durations for this tick.
#[derive(Default)]
struct ScanRequests(Vec<u32, MAX_SCAN_REQUESTS>);

impl ScanTrigger for ScanRequests {
    fn on_schedule_fired(&mut self, label: &str, _kind: ScheduleFiredKind, duration_minutes: u32) {
        if self.0.push(duration_minutes).is_err() {
            warn!("Scan request from '{}' dropped", label);
        }
    }
}
