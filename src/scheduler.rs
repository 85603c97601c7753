//! Leak-scan scheduler.
//!
//! Fires the nightly scan once per calendar day at or after the
//! configured hour, plus any one-off scans queued for a wall-clock
//! instant.  The scheduler notifies a [`ScanTrigger`] when a schedule
//! fires; it never sees sensor data and never talks to the scanner.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    Trigger Sources                       │
//! │                                                          │
//! │   ┌──────────────┐     ┌──────────────┐     ┌─────────┐  │
//! │   │ Daily window │     │  One-shot    │     │ Manual  │  │
//! │   │ (start_hour) │     │  (instant)   │     │ command │  │
//! │   └──────┬───────┘     └──────┬───────┘     └────┬────┘  │
//! │          ▼                    ▼                  │       │
//! │   ┌─────────────────────────────────┐            │       │
//! │   │          ScanTrigger            │            │       │
//! │   └───────────────┬─────────────────┘            │       │
//! │                   ▼                              ▼       │
//! │             LeakScanner::start()  (own precondition)     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Manual requests bypass the scheduler entirely.  Ticks without a
//! wall clock (`None`) are skipped.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::info;

use crate::app::ports::{ScanTrigger, ScheduleFiredKind};
use crate::config::NightlyScanConfig;

// ═══════════════════════════════════════════════════════════════
//  Schedule types
// ═══════════════════════════════════════════════════════════════

/// A single schedule entry.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Human-readable label (e.g., "nightly-leak-scan").
    pub label: &'static str,
    pub kind: ScheduleKind,
    /// Whether this schedule is currently enabled.
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub enum ScheduleKind {
    /// Once per calendar day, at or after `start_hour:00`.
    Daily {
        start_hour: u8,
        duration_minutes: u32,
        /// Date of the last trigger; gates one fire per day.
        last_run_date: Option<NaiveDate>,
    },
    /// Once at or after `at`, then auto-disable.
    OneShot {
        at: NaiveDateTime,
        duration_minutes: u32,
    },
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// Maximum number of concurrent schedules (stack-allocated).
const MAX_SCHEDULES: usize = 4;

pub const NIGHTLY_LABEL: &str = "nightly-leak-scan";
pub const ONE_SHOT_LABEL: &str = "one-shot-leak-scan";

pub struct Scheduler {
    schedules: [Option<Schedule>; MAX_SCHEDULES],
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            schedules: [None, None, None, None],
        }
    }

    /// Scheduler with the nightly scan from configuration.  A disabled
    /// nightly scan still occupies its slot so it can be re-enabled.
    pub fn from_config(cfg: &NightlyScanConfig) -> Self {
        let mut sched = Self::new();
        sched.add(Schedule {
            label: NIGHTLY_LABEL,
            kind: ScheduleKind::Daily {
                start_hour: cfg.start_hour,
                duration_minutes: cfg.duration_minutes,
                last_run_date: None,
            },
            enabled: cfg.enabled,
        });
        sched
    }

    /// Add a schedule.  Returns the slot index, or `None` if full.
    pub fn add(&mut self, schedule: Schedule) -> Option<usize> {
        for (i, slot) in self.schedules.iter_mut().enumerate() {
            let free = match slot {
                None => true,
                Some(e) => !e.enabled && is_spent(e),
            };
            if free {
                info!("Scheduler: added '{}' at slot {}", schedule.label, i);
                *slot = Some(schedule);
                return Some(i);
            }
        }
        None // All slots full.
    }

    /// Queue a one-off scan at a wall-clock instant.
    pub fn add_one_shot(&mut self, at: NaiveDateTime, duration_minutes: u32) -> Option<usize> {
        self.add(Schedule {
            label: ONE_SHOT_LABEL,
            kind: ScheduleKind::OneShot {
                at,
                duration_minutes,
            },
            enabled: true,
        })
    }

    /// Enable or disable every schedule carrying `label`.  Returns whether
    /// any schedule matched.
    pub fn set_schedule_enabled(&mut self, label: &str, enabled: bool) -> bool {
        let mut found = false;
        for entry in self.schedules.iter_mut().flatten() {
            if entry.label == label {
                entry.enabled = enabled;
                found = true;
            }
        }
        if found {
            info!("Scheduler: '{}' {}", label, if enabled { "enabled" } else { "disabled" });
        }
        found
    }

    /// Tick the scheduler.  Call once per control loop tick.
    ///
    /// * `now`: local wall clock, or `None` if it is not set yet.
    /// * `trigger`: receives fire notifications.
    pub fn tick(&mut self, now: Option<NaiveDateTime>, trigger: &mut dyn ScanTrigger) {
        let Some(now) = now else {
            return;
        };

        for slot in self.schedules.iter_mut() {
            let entry = match slot {
                Some(e) if e.enabled => e,
                _ => continue,
            };

            match &mut entry.kind {
                ScheduleKind::Daily {
                    start_hour,
                    duration_minutes,
                    last_run_date,
                } => {
                    let today = now.date();
                    let Some(start) = NaiveTime::from_hms_opt(u32::from(*start_hour), 0, 0) else {
                        continue;
                    };
                    if now >= today.and_time(start) && *last_run_date != Some(today) {
                        info!(
                            "Scheduler: '{}' daily fire ({} min)",
                            entry.label, duration_minutes
                        );
                        *last_run_date = Some(today);
                        trigger.on_schedule_fired(
                            entry.label,
                            ScheduleFiredKind::Daily,
                            *duration_minutes,
                        );
                    }
                }

                ScheduleKind::OneShot {
                    at,
                    duration_minutes,
                } => {
                    if now >= *at {
                        info!(
                            "Scheduler: '{}' one-shot fired ({} min)",
                            entry.label, duration_minutes
                        );
                        entry.enabled = false; // Auto-disable.
                        trigger.on_schedule_fired(
                            entry.label,
                            ScheduleFiredKind::OneShot,
                            *duration_minutes,
                        );
                    }
                }
            }
        }
    }
}

/// A disabled one-shot has fired and its slot can be reused.
fn is_spent(s: &Schedule) -> bool {
    matches!(s.kind, ScheduleKind::OneShot { .. })
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    /// Test trigger that records fire events.
    struct RecordingTrigger {
        fires: Vec<(String, ScheduleFiredKind, u32)>,
    }

    impl RecordingTrigger {
        fn new() -> Self {
            Self { fires: Vec::new() }
        }
    }

    impl ScanTrigger for RecordingTrigger {
        fn on_schedule_fired(&mut self, label: &str, kind: ScheduleFiredKind, duration_minutes: u32) {
            self.fires.push((label.to_string(), kind, duration_minutes));
        }
    }

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn nightly(enabled: bool) -> Scheduler {
        Scheduler::from_config(&NightlyScanConfig {
            enabled,
            start_hour: 2,
            duration_minutes: 45,
        })
    }

    #[test]
    fn daily_fires_once_per_date() {
        let mut sched = nightly(true);
        let mut trig = RecordingTrigger::new();

        sched.tick(Some(at(1, 1, 59)), &mut trig);
        assert!(trig.fires.is_empty());

        sched.tick(Some(at(1, 2, 0)), &mut trig);
        sched.tick(Some(at(1, 3, 30)), &mut trig);
        assert_eq!(trig.fires.len(), 1);
        assert_eq!(trig.fires[0], (NIGHTLY_LABEL.to_string(), ScheduleFiredKind::Daily, 45));

        // Next day, fires again.
        sched.tick(Some(at(2, 2, 5)), &mut trig);
        assert_eq!(trig.fires.len(), 2);
    }

    #[test]
    fn late_start_fires_same_day() {
        let mut sched = nightly(true);
        let mut trig = RecordingTrigger::new();
        sched.tick(Some(at(1, 14, 0)), &mut trig);
        assert_eq!(trig.fires.len(), 1);
    }

    #[test]
    fn disabled_nightly_does_nothing() {
        let mut sched = nightly(false);
        let mut trig = RecordingTrigger::new();
        for h in 0..24 {
            sched.tick(Some(at(1, h, 0)), &mut trig);
        }
        assert!(trig.fires.is_empty());
    }

    #[test]
    fn unknown_wall_clock_skips() {
        let mut sched = nightly(true);
        let mut trig = RecordingTrigger::new();
        sched.tick(None, &mut trig);
        assert!(trig.fires.is_empty());
    }

    #[test]
    fn one_shot_fires_once_and_frees_slot() {
        let mut sched = nightly(false);
        let mut trig = RecordingTrigger::new();
        assert_eq!(sched.add_one_shot(at(1, 12, 30), 10), Some(1));

        sched.tick(Some(at(1, 12, 29)), &mut trig);
        assert!(trig.fires.is_empty());
        sched.tick(Some(at(1, 12, 30)), &mut trig);
        sched.tick(Some(at(1, 12, 31)), &mut trig);
        assert_eq!(trig.fires.len(), 1);
        assert_eq!(trig.fires[0].1, ScheduleFiredKind::OneShot);
        assert_eq!(trig.fires[0].2, 10);

        // Spent slot is reused; the nightly slot is kept.
        assert_eq!(sched.add_one_shot(at(2, 0, 0), 5), Some(1));
    }

    #[test]
    fn nightly_can_be_enabled_at_runtime() {
        let mut sched = nightly(false);
        let mut trig = RecordingTrigger::new();
        assert!(sched.set_schedule_enabled(NIGHTLY_LABEL, true));
        sched.tick(Some(at(1, 2, 0)), &mut trig);
        assert_eq!(trig.fires.len(), 1);
        assert!(!sched.set_schedule_enabled("nope", true));
    }

    #[test]
    fn slots_are_bounded() {
        let mut sched = Scheduler::new();
        for i in 0..MAX_SCHEDULES {
            assert_eq!(sched.add_one_shot(at(1, 10, i as u32), 1), Some(i));
        }
        assert_eq!(sched.add_one_shot(at(1, 11, 0), 1), None);

        // Only the first one-shot has fired, so only its slot frees up.
        let mut trig = RecordingTrigger::new();
        sched.tick(Some(at(1, 10, 0)), &mut trig);
        assert_eq!(trig.fires.len(), 1);
        assert_eq!(sched.add_one_shot(at(1, 11, 0), 1), Some(0));
        assert_eq!(sched.add_one_shot(at(1, 11, 5), 1), None);
    }
}
