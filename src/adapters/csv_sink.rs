//! Buffered CSV telemetry files.
//!
//! Three files under `analytics.data_dir`:
//!
//! | File            | Header                                                  |
//! |-----------------|---------------------------------------------------------|
//! | `levels.csv`    | `timestamp,level_percent,pump_on`                       |
//! | `events.csv`    | `timestamp,event`                                       |
//! | `summaries.csv` | `date,daily_consumption_liters,weekly_consumption_liters` |
//!
//! Level and event rows are buffered and appended in batches (every 30
//! level rows or every 5 event rows, and on [`TelemetrySink::flush`]).
//! Headers are written only when a file is created or empty, so restarts
//! append to the existing history.  Write failures are logged and the
//! batch is dropped; the control loop never waits on the filesystem.
//!
//! Each level append also rewrites the summary row for the latest date
//! from a [`ConsumptionTally`], seeded from the existing level log when
//! the sink is opened.  Rows for other dates are kept as they are.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDateTime;
use log::{debug, warn};

use crate::app::ports::TelemetrySink;
use crate::config::AnalyticsConfig;
use crate::consumption::{ConsumptionSummary, ConsumptionTally};

const LEVEL_HEADER: &str = "timestamp,level_percent,pump_on";
const EVENT_HEADER: &str = "timestamp,event";
const SUMMARY_HEADER: &str = "date,daily_consumption_liters,weekly_consumption_liters";

/// Level rows buffered before an append.
const LEVEL_BATCH: usize = 30;
/// Event rows buffered before an append.
const EVENT_BATCH: usize = 5;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub struct CsvSink {
    level_path: PathBuf,
    event_path: PathBuf,
    summary_path: PathBuf,
    capacity_liters: f32,
    tally: ConsumptionTally,
    levels: Vec<String>,
    events: Vec<String>,
}

impl CsvSink {
    /// Create the data directory and all three files (with headers) if
    /// missing, then replay the level log into the consumption tally.
    pub fn open(cfg: &AnalyticsConfig) -> anyhow::Result<Self> {
        let dir = Path::new(&cfg.data_dir);
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

        let level_path = dir.join(&cfg.level_log_csv);
        let event_path = dir.join(&cfg.events_log_csv);
        let summary_path = dir.join(&cfg.summary_csv);
        ensure_header(&level_path, LEVEL_HEADER)
            .with_context(|| format!("preparing {}", level_path.display()))?;
        ensure_header(&event_path, EVENT_HEADER)
            .with_context(|| format!("preparing {}", event_path.display()))?;
        ensure_header(&summary_path, SUMMARY_HEADER)
            .with_context(|| format!("preparing {}", summary_path.display()))?;

        let tally = replay_levels(&level_path)
            .with_context(|| format!("reading {}", level_path.display()))?;

        debug!("CSV sink: {} / {}", level_path.display(), event_path.display());
        Ok(Self {
            level_path,
            event_path,
            summary_path,
            capacity_liters: cfg.tank_capacity_liters,
            tally,
            levels: Vec::with_capacity(LEVEL_BATCH),
            events: Vec::with_capacity(EVENT_BATCH),
        })
    }

    pub fn level_path(&self) -> &Path {
        &self.level_path
    }

    pub fn event_path(&self) -> &Path {
        &self.event_path
    }

    pub fn summary_path(&self) -> &Path {
        &self.summary_path
    }

    fn flush_levels(&mut self) {
        if let Err(e) = append_rows(&self.level_path, &self.levels) {
            warn!("CSV sink: dropped {} level rows: {}", self.levels.len(), e);
        }
        self.levels.clear();
        if let Some(summary) = self.tally.summary(self.capacity_liters) {
            if let Err(e) = write_summary(&self.summary_path, &summary) {
                warn!("CSV sink: summary for {} not written: {}", summary.date, e);
            }
        }
    }

    fn flush_events(&mut self) {
        if let Err(e) = append_rows(&self.event_path, &self.events) {
            warn!("CSV sink: dropped {} event rows: {}", self.events.len(), e);
        }
        self.events.clear();
    }
}

impl TelemetrySink for CsvSink {
    fn record_level(&mut self, timestamp: NaiveDateTime, percent: f32, pump_on: bool) {
        self.tally.add(timestamp, percent);
        self.levels.push(format!(
            "{},{:.2},{}",
            timestamp.format(TIMESTAMP_FORMAT),
            percent,
            u8::from(pump_on)
        ));
        if self.levels.len() >= LEVEL_BATCH {
            self.flush_levels();
        }
    }

    fn record_event(&mut self, timestamp: NaiveDateTime, text: &str) {
        self.events.push(format!(
            "{},{}",
            timestamp.format(TIMESTAMP_FORMAT),
            quote(text)
        ));
        if self.events.len() >= EVENT_BATCH {
            self.flush_events();
        }
    }

    fn flush(&mut self) {
        if !self.levels.is_empty() {
            self.flush_levels();
        }
        if !self.events.is_empty() {
            self.flush_events();
        }
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        TelemetrySink::flush(self);
    }
}

fn ensure_header(path: &Path, header: &str) -> io::Result<()> {
    let empty = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    if empty {
        let mut f = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(f, "{}", header)?;
    }
    Ok(())
}

fn append_rows(path: &Path, rows: &[String]) -> io::Result<()> {
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    let mut buf = String::new();
    for row in rows {
        buf.push_str(row);
        buf.push('\n');
    }
    f.write_all(buf.as_bytes())
}

/// Rebuild the consumption tally from an existing level log.  Rows that do
/// not parse (header, truncated last line) are skipped.
fn replay_levels(path: &Path) -> io::Result<ConsumptionTally> {
    let mut tally = ConsumptionTally::new();
    for line in fs::read_to_string(path)?.lines() {
        let mut fields = line.split(',');
        let (Some(ts), Some(pct)) = (fields.next(), fields.next()) else {
            continue;
        };
        if let (Ok(ts), Ok(pct)) = (
            NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT),
            pct.parse::<f32>(),
        ) {
            tally.add(ts, pct);
        }
    }
    Ok(tally)
}

/// Replace (or add) the row for `summary.date`, keeping rows sorted by date.
fn write_summary(path: &Path, summary: &ConsumptionSummary) -> io::Result<()> {
    let mut rows: BTreeMap<String, String> = BTreeMap::new();
    if let Ok(text) = fs::read_to_string(path) {
        for line in text.lines().skip(1) {
            if let Some((date, rest)) = line.split_once(',') {
                rows.insert(date.to_string(), rest.to_string());
            }
        }
    }
    rows.insert(
        summary.date.to_string(),
        format!("{:.1},{:.1}", summary.daily_liters, summary.weekly_liters),
    );

    let mut buf = String::from(SUMMARY_HEADER);
    buf.push('\n');
    for (date, rest) in &rows {
        buf.push_str(date);
        buf.push(',');
        buf.push_str(rest);
        buf.push('\n');
    }
    fs::write(path, buf)
}

/// RFC 4180 field quoting.
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
