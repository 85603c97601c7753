//! Log-based telemetry sink adapter.
//!
//! Implements [`TelemetrySink`] by writing event records to the `log`
//! facade (UART / USB-CDC on the board, the tracing subscriber on the
//! host).  Level samples are high-rate and go out at `trace` only; the
//! control loop prints its own periodic status line.

use chrono::NaiveDateTime;
use log::{info, trace};

use crate::app::ports::TelemetrySink;

/// Adapter that logs every event record to the console.
#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

impl TelemetrySink for LogSink {
    fn record_level(&mut self, timestamp: NaiveDateTime, percent: f32, pump_on: bool) {
        trace!("LEVEL | {} | {:.2}% | pump={}", timestamp, percent, u8::from(pump_on));
    }

    fn record_event(&mut self, _timestamp: NaiveDateTime, text: &str) {
        info!("EVENT | {}", text);
    }
}
