//! Level sensing pipeline: raw probe reading → calibration → smoothing.
//!
//! ```text
//!  LevelSource ──raw %──▶ Calibration ──▶ SmoothingWindow ──▶ smoothed %
//! ```
//!
//! The window is stack-allocated (`heapless::Deque`) with a runtime size
//! of 1..=[`MAX_SMOOTHING_WINDOW`].  Calibration is applied to each raw
//! reading *before* it enters the window, so the window only ever holds
//! values in 0–100 %.
//!
//! ## Failure policy
//!
//! A probe failure in [`LevelSensor::sample`] is returned to the caller
//! and leaves the window untouched; the last smoothed level stays valid.
//! [`LevelSensor::level_percent`] never fails.

use heapless::Deque;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::LevelSource;
use crate::config::{MAX_SMOOTHING_WINDOW, SmoothingConfig};
use crate::error::SensorError;

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------

/// Raw-to-percent affine remap.
///
/// Raw readings are clamped to `[min_percent, max_percent]` and stretched
/// to 0–100.  When `max_percent <= min_percent` the remap is a no-op and
/// the raw value is only clamped to 0–100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub min_percent: f32,
    pub max_percent: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            min_percent: 0.0,
            max_percent: 100.0,
        }
    }
}

impl Calibration {
    pub fn apply(&self, raw: f32) -> f32 {
        if self.max_percent > self.min_percent {
            let clamped = raw.clamp(self.min_percent, self.max_percent);
            100.0 * (clamped - self.min_percent) / (self.max_percent - self.min_percent)
        } else {
            raw.clamp(0.0, 100.0)
        }
    }
}

// ---------------------------------------------------------------------------
// Smoothing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingMethod {
    /// Pass-through: the newest reading.
    None,
    /// Arithmetic mean of the window.
    #[serde(alias = "ma")]
    MovingAverage,
    /// Median of the window.
    Median,
    /// Average of the window's median and its mean.
    #[default]
    MedianMa,
}

/// Bounded ring of the last `capacity` calibrated readings.
#[derive(Debug, Clone)]
pub struct SmoothingWindow {
    buf: Deque<f32, MAX_SMOOTHING_WINDOW>,
    capacity: usize,
}

impl SmoothingWindow {
    /// `capacity` is clamped to 1..=[`MAX_SMOOTHING_WINDOW`].
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Deque::new(),
            capacity: capacity.clamp(1, MAX_SMOOTHING_WINDOW),
        }
    }

    /// Append a reading, evicting the oldest once the window is full.
    pub fn push(&mut self, value: f32) {
        if self.buf.len() >= self.capacity {
            self.buf.pop_front();
        }
        // Cannot fail: len < capacity <= MAX_SMOOTHING_WINDOW.
        let _ = self.buf.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn latest(&self) -> Option<f32> {
        self.buf.back().copied()
    }

    pub fn mean(&self) -> Option<f32> {
        if self.buf.is_empty() {
            return None;
        }
        let sum: f32 = self.buf.iter().sum();
        Some(sum / self.buf.len() as f32)
    }

    /// Median; the mean of the two middle values for an even count.
    pub fn median(&self) -> Option<f32> {
        if self.buf.is_empty() {
            return None;
        }
        let mut sorted: heapless::Vec<f32, MAX_SMOOTHING_WINDOW> =
            self.buf.iter().copied().collect();
        sorted.sort_unstable_by(f32::total_cmp);
        let n = sorted.len();
        if n % 2 == 1 {
            Some(sorted[n / 2])
        } else {
            Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
        }
    }

    pub fn smoothed(&self, method: SmoothingMethod) -> Option<f32> {
        match method {
            SmoothingMethod::None => self.latest(),
            SmoothingMethod::MovingAverage => self.mean(),
            SmoothingMethod::Median => self.median(),
            SmoothingMethod::MedianMa => Some((self.median()? + self.mean()?) / 2.0),
        }
    }
}

// ---------------------------------------------------------------------------
// LevelSensor
// ---------------------------------------------------------------------------

/// Result of a [`LevelSensor::sample`] call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// A new reading entered the window; carries the new smoothed level.
    Updated(f32),
    /// The sampling period has not elapsed; hardware was not touched.
    NotDue,
}

pub struct LevelSensor {
    window: SmoothingWindow,
    method: SmoothingMethod,
    calibration: Calibration,
    period_ms: u64,
    last_attempt_ms: Option<u64>,
    smoothed: Option<f32>,
    consecutive_failures: u32,
    total_failures: u32,
}

impl LevelSensor {
    pub fn new(smoothing: &SmoothingConfig, calibration: Calibration) -> Self {
        Self {
            window: SmoothingWindow::new(smoothing.window),
            method: smoothing.method,
            calibration,
            period_ms: u64::from(smoothing.period_ms),
            last_attempt_ms: None,
            smoothed: None,
            consecutive_failures: 0,
            total_failures: 0,
        }
    }

    /// Take one hardware reading if the sampling period has elapsed.
    ///
    /// The period counts from the last *attempt*, so a failing probe is
    /// not polled faster than a healthy one.
    pub fn sample(
        &mut self,
        now_ms: u64,
        source: &mut impl LevelSource,
    ) -> Result<SampleOutcome, SensorError> {
        if let Some(last) = self.last_attempt_ms {
            if now_ms.saturating_sub(last) < self.period_ms {
                return Ok(SampleOutcome::NotDue);
            }
        }
        self.last_attempt_ms = Some(now_ms);

        match read_finite(source) {
            Ok(raw) => {
                self.consecutive_failures = 0;
                let level = self.push_raw(raw);
                debug!("level sample raw={:.1} smoothed={:.1}", raw, level);
                Ok(SampleOutcome::Updated(level))
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.total_failures = self.total_failures.saturating_add(1);
                Err(e)
            }
        }
    }

    /// Current smoothed level in 0–100 %.
    ///
    /// Before the first successful sample this primes the window with one
    /// raw reading; if that read fails the result is 0 %.  Once
    /// [`sample`](Self::sample) has made an attempt, priming no longer
    /// touches hardware: the period-gated sample path is the only reader.
    pub fn level_percent(&mut self, source: &mut impl LevelSource) -> f32 {
        if let Some(level) = self.smoothed {
            return level.clamp(0.0, 100.0);
        }
        if self.last_attempt_ms.is_some() {
            return 0.0;
        }
        match read_finite(source) {
            Ok(raw) => {
                self.consecutive_failures = 0;
                self.push_raw(raw)
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.total_failures = self.total_failures.saturating_add(1);
                warn!("level priming failed ({}), assuming 0%", e);
                0.0
            }
        }
    }

    /// Last smoothed level without touching hardware.
    pub fn last_level(&self) -> Option<f32> {
        self.smoothed
    }

    /// Failures since the last successful sample.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn total_failures(&self) -> u32 {
        self.total_failures
    }

    pub fn window(&self) -> &SmoothingWindow {
        &self.window
    }

    fn push_raw(&mut self, raw: f32) -> f32 {
        self.window.push(self.calibration.apply(raw));
        let level = self
            .window
            .smoothed(self.method)
            .unwrap_or(0.0)
            .clamp(0.0, 100.0);
        self.smoothed = Some(level);
        level
    }
}

/// A NaN or infinite reading is treated as garbage.
fn read_finite(source: &mut impl LevelSource) -> Result<f32, SensorError> {
    match source.read_raw_percent()? {
        raw if raw.is_finite() => Ok(raw),
        _ => Err(SensorError::ReadError),
    }
}
