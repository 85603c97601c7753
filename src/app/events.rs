//! Outbound application events.
//!
//! The [`ControlLoop`](super::service::ControlLoop) records these through
//! the [`TelemetrySink`](super::ports::TelemetrySink) port as one line of
//! text each.  The `Display` output is the canonical event text; log
//! tooling greps for the leading token (`PUMP_ON`, `LEAK_TANK_SUSPECT`, ...).

use core::fmt;

use crate::control::pump::PumpEvent;
use crate::error::{Error, SensorError};
use crate::leak::{LeakEvent, ScanRejection};

/// Structured events emitted by the application core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppEvent {
    /// The control loop has started.
    Started,
    /// Pump controller transition.
    Pump(PumpEvent),
    /// Leak scanner transition.
    Leak(LeakEvent),
    /// A manual scan request was refused.
    LeakScanRejected(RejectReason),
    /// The level probe failed; `consecutive` counts the current streak.
    SensorReadError { error: SensorError, consecutive: u32 },
    /// The probe produced a reading again after `failures` misses.
    SensorRecovered { failures: u32 },
    /// A fatal fault stopped the control loop.
    Fault(Error),
    /// The control loop stopped cleanly.
    Stopped,
}

/// Why a manual leak scan request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// `manual_override_allowed` is off.
    ManualDisabled,
    /// The scanner's own precondition failed.
    Scanner(ScanRejection),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ManualDisabled => write!(f, "manual_disabled"),
            Self::Scanner(r) => write!(f, "{}", r),
        }
    }
}

impl fmt::Display for AppEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "CONTROLLER_START"),
            Self::Pump(e) => write!(f, "{}", e),
            Self::Leak(e) => write!(f, "{}", e),
            Self::LeakScanRejected(reason) => write!(f, "LEAK_SCAN_REJECTED reason={}", reason),
            Self::SensorReadError { error, consecutive } => {
                let kind = match error {
                    SensorError::Timeout => "timeout",
                    SensorError::ReadError => "read_error",
                };
                write!(f, "SENSOR_READ_ERROR kind={} consecutive={}", kind, consecutive)
            }
            Self::SensorRecovered { failures } => write!(f, "SENSOR_RECOVERED after={}", failures),
            Self::Fault(e) => write!(f, "CONTROLLER_FAULT kind={} detail=\"{}\"", e.kind(), e),
            Self::Stopped => write!(f, "CONTROLLER_STOP"),
        }
    }
}

impl From<PumpEvent> for AppEvent {
    fn from(e: PumpEvent) -> Self {
        Self::Pump(e)
    }
}

impl From<LeakEvent> for AppEvent {
    fn from(e: LeakEvent) -> Self {
        Self::Leak(e)
    }
}
