//! Leak detection without a flow meter.
//!
//! A scan isolates the tank: with the pump off for the whole window, any
//! level drop is water leaving through outlets or a leak.  A drop of at
//! least `min_detectable_drop_percent` is reported as suspect.  This is a
//! heuristic; unmodelled household draw during the window looks exactly
//! like a leak.
//!
//! ```text
//!          start() [idle && pump off]
//!   ┌──────┐ ──────────────────────▶ ┌──────────┐
//!   │ Idle │                         │ Scanning │
//!   └──────┘ ◀────────────────────── └──────────┘
//!        pump running  → LEAK_SCAN_CANCEL_PUMP_ON
//!        now >= end    → LEAK_TANK_SUSPECT | LEAK_SCAN_CLEAR
//! ```
//!
//! The scanner never drives the relay.  If the controller starts the pump
//! mid-scan the scan is abandoned; pump response wins over scan completion.

use core::fmt;

use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LeakScanState {
    Idle,
    Scanning { start_level: f32, scan_end_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LeakEvent {
    Started { duration_minutes: u32, level: f32 },
    CancelledPumpOn,
    Suspect { drop: f32 },
    Clear { drop: f32 },
}

impl fmt::Display for LeakEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started {
                duration_minutes,
                level,
            } => write!(
                f,
                "LEAK_SCAN_START duration={}m level={:.1}%",
                duration_minutes, level
            ),
            Self::CancelledPumpOn => write!(f, "LEAK_SCAN_CANCEL_PUMP_ON"),
            Self::Suspect { drop } => write!(f, "LEAK_TANK_SUSPECT drop={:.2}%", drop),
            Self::Clear { drop } => write!(f, "LEAK_SCAN_CLEAR drop={:.2}%", drop),
        }
    }
}

/// Why [`LeakScanner::start`] did not start a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanRejection {
    /// A scan is already in progress.
    Busy,
    /// The pump is running; the tank is not isolated.
    PumpRunning,
}

impl fmt::Display for ScanRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "busy"),
            Self::PumpRunning => write!(f, "pump_on"),
        }
    }
}

pub struct LeakScanner {
    state: LeakScanState,
    min_drop_percent: f32,
}

impl LeakScanner {
    pub fn new(min_drop_percent: f32) -> Self {
        Self {
            state: LeakScanState::Idle,
            min_drop_percent,
        }
    }

    /// Begin a scan at the current smoothed `level`.
    ///
    /// Rejected unless idle with the pump off; a rejection leaves the
    /// scanner untouched.
    pub fn start(
        &mut self,
        now_ms: u64,
        duration_minutes: u32,
        level: f32,
        pump_running: bool,
    ) -> Result<LeakEvent, ScanRejection> {
        if self.is_scanning() {
            return Err(ScanRejection::Busy);
        }
        if pump_running {
            return Err(ScanRejection::PumpRunning);
        }
        self.state = LeakScanState::Scanning {
            start_level: level,
            scan_end_ms: now_ms + u64::from(duration_minutes) * 60_000,
        };
        info!("Leak scan started: {} min at {:.1}%", duration_minutes, level);
        Ok(LeakEvent::Started {
            duration_minutes,
            level,
        })
    }

    /// Advance a running scan.  Cancellation is checked before the end time.
    pub fn tick(&mut self, now_ms: u64, level: f32, pump_running: bool) -> Option<LeakEvent> {
        let LeakScanState::Scanning {
            start_level,
            scan_end_ms,
        } = self.state
        else {
            return None;
        };

        if pump_running {
            self.state = LeakScanState::Idle;
            warn!("Leak scan cancelled: pump started");
            return Some(LeakEvent::CancelledPumpOn);
        }
        if now_ms < scan_end_ms {
            return None;
        }

        self.state = LeakScanState::Idle;
        // Not clamped: a rising level yields a negative drop.
        let drop = start_level - level;
        if drop >= self.min_drop_percent {
            warn!("Leak suspected: level fell {:.2}% during scan", drop);
            Some(LeakEvent::Suspect { drop })
        } else {
            info!("Leak scan clear: drop {:.2}%", drop);
            Some(LeakEvent::Clear { drop })
        }
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self.state, LeakScanState::Scanning { .. })
    }

    pub fn state(&self) -> LeakScanState {
        self.state
    }
}
