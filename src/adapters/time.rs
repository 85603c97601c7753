//! Time adapter.
//!
//! Provides the two clocks the control loop runs on:
//!
//! - monotonic milliseconds/microseconds since boot for every safety timer;
//! - the local wall clock for the scan schedule and record timestamps.
//!
//! - **`target_os = "espidf"`**: wraps `esp_timer_get_time()` (monotonic,
//!   microsecond precision) and `gettimeofday` + `localtime_r`.  The wall
//!   clock is reported as unknown until it has been set (SNTP or RTC).
//! - **`not(target_os = "espidf")`**: uses `std::time::Instant` and
//!   `chrono::Local` for host runs.

use std::time::Duration;

#[cfg(not(target_os = "espidf"))]
use std::sync::OnceLock;
#[cfg(not(target_os = "espidf"))]
use std::time::Instant;

use chrono::NaiveDateTime;

use crate::app::ports::{Clock, TickTime};

#[cfg(not(target_os = "espidf"))]
static START: OnceLock<Instant> = OnceLock::new();

/// Microseconds since boot (monotonic).
#[cfg(target_os = "espidf")]
pub fn platform_micros() -> u64 {
    // SAFETY: reads the high-resolution timer; no side effects.
    (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
}

/// Microseconds since the first clock query (monotonic).
#[cfg(not(target_os = "espidf"))]
pub fn platform_micros() -> u64 {
    START.get_or_init(Instant::now).elapsed().as_micros() as u64
}

/// Milliseconds since boot (monotonic).
pub fn platform_millis() -> u64 {
    platform_micros() / 1000
}

/// Local wall-clock time.  `None` if the clock has not been set yet.
#[cfg(target_os = "espidf")]
pub fn local_now() -> Option<NaiveDateTime> {
    use esp_idf_svc::sys::{gettimeofday, localtime_r, time_t, timeval, tm};

    let mut tv = timeval {
        tv_sec: 0,
        tv_usec: 0,
    };
    // SAFETY: `tv` is a valid out-pointer; the timezone argument may be null.
    if unsafe { gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
        return None;
    }
    // Reject obviously unsynced time (e.g. before 2020-01-01)
    const EPOCH_2020: i64 = 1_577_836_800;
    if (tv.tv_sec as i64) < EPOCH_2020 {
        return None;
    }
    let secs = tv.tv_sec as time_t;
    // SAFETY: `tm` is plain old data.
    let mut t: tm = unsafe { core::mem::zeroed() };
    // SAFETY: both pointers are valid for the duration of the call.
    if unsafe { localtime_r(&secs, &mut t) }.is_null() {
        return None;
    }
    chrono::NaiveDate::from_ymd_opt(t.tm_year + 1900, (t.tm_mon + 1) as u32, t.tm_mday as u32)?
        .and_hms_opt(t.tm_hour as u32, t.tm_min as u32, t.tm_sec as u32)
}

/// Local wall-clock time from the host OS.
#[cfg(not(target_os = "espidf"))]
pub fn local_now() -> Option<NaiveDateTime> {
    Some(chrono::Local::now().naive_local())
}

/// Platform [`Clock`] for the control loop.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> TickTime {
        TickTime {
            monotonic_ms: platform_millis(),
            local: local_now(),
        }
    }

    fn sleep_until(&self, deadline_ms: u64) {
        let now = platform_millis();
        if deadline_ms > now {
            std::thread::sleep(Duration::from_millis(deadline_ms - now));
        }
    }
}

/// Host [`DelayNs`](embedded_hal::delay::DelayNs) for probe timing.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

#[cfg(not(target_os = "espidf"))]
impl embedded_hal::delay::DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}
