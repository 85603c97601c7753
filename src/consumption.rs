//! Water consumption estimate from the level history.
//!
//! There is no flow meter, so consumption is the sum of level *drops*
//! between consecutive samples, bucketed by calendar date.  Rises (pump
//! running, refills) contribute nothing.  A drop spanning midnight counts
//! towards the later date.
//!
//! The weekly figure covers the reference date and the seven dates before
//! it; older buckets are pruned as new samples arrive.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, NaiveDateTime};

/// Dates before the reference date that still count towards the week.
pub const WEEK_LOOKBACK_DAYS: u64 = 7;

/// Consumption for one reference date, in litres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsumptionSummary {
    pub date: NaiveDate,
    pub daily_liters: f32,
    pub weekly_liters: f32,
}

/// Running per-date tally of level drops (percentage points).
#[derive(Debug, Default)]
pub struct ConsumptionTally {
    drops: BTreeMap<NaiveDate, f32>,
    last_level: Option<f32>,
    latest: Option<NaiveDate>,
}

impl ConsumptionTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one level sample.  Samples are expected in time order.
    pub fn add(&mut self, timestamp: NaiveDateTime, percent: f32) {
        if !percent.is_finite() {
            return;
        }
        let date = timestamp.date();
        let drop = self.last_level.map_or(0.0, |prev| (prev - percent).max(0.0));
        *self.drops.entry(date).or_insert(0.0) += drop;
        self.last_level = Some(percent);

        if self.latest.is_none_or(|d| date > d) {
            self.latest = Some(date);
            if let Some(oldest) = date.checked_sub_days(Days::new(WEEK_LOOKBACK_DAYS)) {
                self.drops.retain(|d, _| *d >= oldest);
            }
        }
    }

    /// Daily and weekly consumption for the most recent sample's date.
    /// `None` until a sample has been seen.
    pub fn summary(&self, capacity_liters: f32) -> Option<ConsumptionSummary> {
        let date = self.latest?;
        let oldest = date
            .checked_sub_days(Days::new(WEEK_LOOKBACK_DAYS))
            .unwrap_or(NaiveDate::MIN);
        let daily = self.drops.get(&date).copied().unwrap_or(0.0);
        let weekly: f32 = self
            .drops
            .range(oldest..=date)
            .map(|(_, pct)| pct)
            .sum();
        let to_liters = |pct: f32| pct / 100.0 * capacity_liters;
        Some(ConsumptionSummary {
            date,
            daily_liters: to_liters(daily),
            weekly_liters: to_liters(weekly),
        })
    }
}
