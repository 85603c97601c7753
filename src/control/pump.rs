//! Hysteresis pump controller with wear-protection timers.
//!
//! ```text
//!              level <= on && off-time >= min_off
//!   ┌──────┐ ───────────────────────────────────▶ ┌──────────────────┐
//!   │ Idle │          (soft_start_delay > 0)      │ SoftStartPending │
//!   └──────┘ ◀───────────────┐                    └────────┬─────────┘
//!      │  ▲                  │                             │ now >= deadline
//!      │  │ level >= off &&  │ level >= hard_off           ▼
//!      │  │ run >= min_run   │ (ignores min_run)      ┌─────────┐
//!      │  └──────────────────┴────────────────────────│ Running │
//!      └─────────────────────────────────────────────▶└─────────┘
//!                    (soft_start_delay == 0)
//! ```
//!
//! All timers run on the monotonic millisecond clock.  The relay is only
//! touched on a transition; a failed write is returned as a
//! [`HardwareFault`] and the state is left as it was before the attempt.

use core::fmt;

use log::info;

use crate::app::ports::ActuatorPort;
use crate::config::PumpControlConfig;
use crate::error::{ConfigError, HardwareFault};

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub on_percent: f32,
    pub off_percent: f32,
    pub hard_off_percent: Option<f32>,
    pub min_run_seconds: u32,
    pub min_off_seconds: u32,
    pub soft_start_delay_seconds: u32,
}

impl From<&PumpControlConfig> for Thresholds {
    fn from(c: &PumpControlConfig) -> Self {
        Self {
            on_percent: c.on_threshold_percent,
            off_percent: c.off_threshold_percent,
            hard_off_percent: c.hard_off_percent,
            min_run_seconds: c.min_run_seconds,
            min_off_seconds: c.min_off_seconds,
            soft_start_delay_seconds: c.soft_start_delay_seconds,
        }
    }
}

impl Thresholds {
    /// Hysteresis ordering: `off > on`, and `hard_off >= off` when set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.off_percent > self.on_percent) {
            return Err(ConfigError::ValidationFailed(
                "off_threshold_percent must be greater than on_threshold_percent",
            ));
        }
        if let Some(hard) = self.hard_off_percent {
            if !(hard >= self.off_percent) {
                return Err(ConfigError::ValidationFailed(
                    "hard_off_percent must be >= off_threshold_percent",
                ));
            }
        }
        Ok(())
    }

    fn min_run_ms(&self) -> u64 {
        u64::from(self.min_run_seconds) * 1000
    }

    fn min_off_ms(&self) -> u64 {
        u64::from(self.min_off_seconds) * 1000
    }

    fn soft_start_ms(&self) -> u64 {
        u64::from(self.soft_start_delay_seconds) * 1000
    }
}

// ---------------------------------------------------------------------------
// State and events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Idle,
    /// Start decided, relay not yet energized.
    SoftStartPending { deadline_ms: u64 },
    Running,
}

/// Transition reported by [`PumpController::tick`] / [`PumpController::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PumpEvent {
    /// Soft-start armed; the relay follows after `delay_secs`.
    SoftStartArmed { delay_secs: u32 },
    /// Relay energized.
    Started,
    /// Normal hysteresis stop.
    Stopped { level: f32 },
    /// Safety ceiling reached; minimum run time bypassed.
    HardOff { level: f32 },
    /// Forced off on process shutdown.
    ForcedOff,
}

impl fmt::Display for PumpEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SoftStartArmed { delay_secs } => write!(f, "PUMP_SOFT_START delay={}s", delay_secs),
            Self::Started => write!(f, "PUMP_ON"),
            Self::Stopped { level } => write!(f, "PUMP_OFF level={:.1}%", level),
            Self::HardOff { level } => write!(f, "PUMP_HARD_OFF level={:.1}%", level),
            Self::ForcedOff => write!(f, "PUMP_OFF reason=shutdown"),
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct PumpController {
    thresholds: Thresholds,
    state: PumpState,
    last_change_ms: u64,
    /// `None` until the first stop: a fresh boot may start immediately.
    last_off_ms: Option<u64>,
}

impl PumpController {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            state: PumpState::Idle,
            last_change_ms: 0,
            last_off_ms: None,
        }
    }

    /// Evaluate one control tick against the smoothed `level`.
    pub fn tick(
        &mut self,
        level: f32,
        now_ms: u64,
        act: &mut impl ActuatorPort,
    ) -> Result<Option<PumpEvent>, HardwareFault> {
        match self.state {
            PumpState::SoftStartPending { deadline_ms } => {
                // Pending soft start is atomic: nothing else is evaluated.
                if now_ms >= deadline_ms {
                    return self.energize(now_ms, act).map(Some);
                }
                Ok(None)
            }
            PumpState::Idle => {
                if level <= self.thresholds.on_percent && self.off_time_elapsed(now_ms) {
                    return self.start(now_ms, act).map(Some);
                }
                Ok(None)
            }
            PumpState::Running => {
                if let Some(hard) = self.thresholds.hard_off_percent {
                    if level >= hard {
                        self.deenergize(now_ms, act)?;
                        info!("Pump hard-off at {:.1}% (ceiling {:.1}%)", level, hard);
                        return Ok(Some(PumpEvent::HardOff { level }));
                    }
                }
                if now_ms.saturating_sub(self.last_change_ms) < self.thresholds.min_run_ms() {
                    return Ok(None);
                }
                if level >= self.thresholds.off_percent {
                    self.deenergize(now_ms, act)?;
                    info!("Pump off at {:.1}%", level);
                    return Ok(Some(PumpEvent::Stopped { level }));
                }
                Ok(None)
            }
        }
    }

    /// Force the relay off regardless of timers.
    ///
    /// Always writes the relay, even when idle, so a relay left energized
    /// by an earlier failed write is still released.  Returns
    /// [`PumpEvent::ForcedOff`] if a run or pending start was cut short.
    pub fn shutdown(
        &mut self,
        now_ms: u64,
        act: &mut impl ActuatorPort,
    ) -> Result<Option<PumpEvent>, HardwareFault> {
        let was_active = self.state != PumpState::Idle;
        act.set_pump(false)?;
        if was_active {
            self.state = PumpState::Idle;
            self.last_change_ms = now_ms;
            self.last_off_ms = Some(now_ms);
            info!("Pump forced off (shutdown)");
            return Ok(Some(PumpEvent::ForcedOff));
        }
        Ok(None)
    }

    /// `true` only while the relay is energized, not during soft start.
    pub fn is_running(&self) -> bool {
        self.state == PumpState::Running
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    fn off_time_elapsed(&self, now_ms: u64) -> bool {
        self.last_off_ms
            .is_none_or(|off| now_ms.saturating_sub(off) >= self.thresholds.min_off_ms())
    }

    fn start(&mut self, now_ms: u64, act: &mut impl ActuatorPort) -> Result<PumpEvent, HardwareFault> {
        let delay_ms = self.thresholds.soft_start_ms();
        if delay_ms == 0 {
            return self.energize(now_ms, act);
        }
        self.state = PumpState::SoftStartPending {
            deadline_ms: now_ms + delay_ms,
        };
        info!(
            "Pump soft start armed ({} s)",
            self.thresholds.soft_start_delay_seconds
        );
        Ok(PumpEvent::SoftStartArmed {
            delay_secs: self.thresholds.soft_start_delay_seconds,
        })
    }

    fn energize(&mut self, now_ms: u64, act: &mut impl ActuatorPort) -> Result<PumpEvent, HardwareFault> {
        act.set_pump(true)?;
        self.state = PumpState::Running;
        self.last_change_ms = now_ms;
        info!("Pump on");
        Ok(PumpEvent::Started)
    }

    fn deenergize(&mut self, now_ms: u64, act: &mut impl ActuatorPort) -> Result<(), HardwareFault> {
        act.set_pump(false)?;
        self.state = PumpState::Idle;
        self.last_change_ms = now_ms;
        self.last_off_ms = Some(now_ms);
        Ok(())
    }
}
