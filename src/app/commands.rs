//! Inbound commands to the control loop.
//!
//! These represent actions requested by the outside world (CLI flag,
//! console, a future remote trigger) that the
//! [`ControlLoop`](super::service::ControlLoop) interprets and acts upon.

use chrono::NaiveDateTime;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Run a leak scan for `minutes` now.  Governed only by the scanner's
    /// own precondition and `manual_override_allowed`.
    RunLeakScan { minutes: u32 },

    /// Queue a one-off leak scan at a wall-clock instant.
    ScheduleLeakScan { at: NaiveDateTime, minutes: u32 },

    /// Enable or disable the nightly scan at runtime.
    SetNightlyScan(bool),
}
