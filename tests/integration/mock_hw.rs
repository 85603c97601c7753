//! Mock hardware and sink adapters for integration tests.
//!
//! Records every relay write and every sink record so tests can assert on
//! the full history without touching GPIO.

use chrono::{NaiveDate, NaiveDateTime};
use tankguard::app::ports::{ActuatorPort, LevelSource, TelemetrySink, TickTime};
use tankguard::config::SystemConfig;
use tankguard::error::{HardwareFault, SensorError};

// ── MockHw ────────────────────────────────────────────────────

pub struct MockHw {
    /// Next raw reading returned by the probe.
    pub level: Result<f32, SensorError>,
    pub relay_on: bool,
    /// Every successful relay write, in order.
    pub writes: Vec<bool>,
    pub fail_writes: bool,
    pub releases: u32,
}

#[allow(dead_code)]
impl MockHw {
    pub fn at(level: f32) -> Self {
        Self {
            level: Ok(level),
            relay_on: false,
            writes: Vec::new(),
            fail_writes: false,
            releases: 0,
        }
    }

    pub fn set_level(&mut self, level: f32) {
        self.level = Ok(level);
    }
}

impl LevelSource for MockHw {
    fn read_raw_percent(&mut self) -> Result<f32, SensorError> {
        self.level
    }
}

impl ActuatorPort for MockHw {
    fn set_pump(&mut self, on: bool) -> Result<(), HardwareFault> {
        if self.fail_writes {
            return Err(HardwareFault::WriteFailed(17));
        }
        self.relay_on = on;
        self.writes.push(on);
        Ok(())
    }

    fn pump_energized(&self) -> bool {
        self.relay_on
    }

    fn release(&mut self) -> Result<(), HardwareFault> {
        self.releases += 1;
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub levels: Vec<(NaiveDateTime, f32, bool)>,
    pub events: Vec<(NaiveDateTime, String)>,
    pub flushes: u32,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn texts(&self) -> Vec<&str> {
        self.events.iter().map(|(_, t)| t.as_str()).collect()
    }

    pub fn has_event(&self, prefix: &str) -> bool {
        self.events.iter().any(|(_, t)| t.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events.iter().filter(|(_, t)| t.starts_with(prefix)).count()
    }
}

impl TelemetrySink for RecordingSink {
    fn record_level(&mut self, timestamp: NaiveDateTime, percent: f32, pump_on: bool) {
        self.levels.push((timestamp, percent, pump_on));
    }

    fn record_event(&mut self, timestamp: NaiveDateTime, text: &str) {
        self.events.push((timestamp, text.to_string()));
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}

// ── Time helpers ──────────────────────────────────────────────

/// Monotonic-only tick time (wall clock unknown).
#[allow(dead_code)]
pub fn mono(secs: u64) -> TickTime {
    TickTime {
        monotonic_ms: secs * 1000,
        local: None,
    }
}

/// Tick time `secs` after boot, with boot at 2024-06-01 `boot_hour`:00 local.
#[allow(dead_code)]
pub fn wall(boot_hour: u32, secs: u64) -> TickTime {
    let boot = NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(boot_hour, 0, 0)
        .unwrap();
    TickTime {
        monotonic_ms: secs * 1000,
        local: Some(boot + chrono::Duration::seconds(secs as i64)),
    }
}

/// Config with a single-sample window so readings show up unsmoothed.
#[allow(dead_code)]
pub fn test_config() -> SystemConfig {
    let mut c = SystemConfig::default();
    c.sensor.smoothing.window = 1;
    c.sensor.smoothing.period_ms = 1000;
    c
}
