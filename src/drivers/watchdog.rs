//! Task Watchdog Timer (TWDT) driver.
//!
//! Resets the board if the control loop stops feeding it, e.g. a level
//! probe wedged in a driver call outside the echo timeout.  The timeout
//! is derived from the loop period so slow loops are not reset spuriously.
//!
//! On the host the watchdog is a no-op that only counts feeds.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Never reset faster than this, whatever the loop period.
const MIN_TIMEOUT_MS: u32 = 10_000;
/// Missed loop periods tolerated before a reset.
const MISSED_PERIODS: u32 = 5;

pub struct Watchdog {
    timeout_ms: u32,
    feeds: u64,
    #[cfg(target_os = "espidf")]
    subscribed: bool,
}

impl Watchdog {
    pub fn timeout_for(loop_period_ms: u32) -> u32 {
        loop_period_ms.saturating_mul(MISSED_PERIODS).max(MIN_TIMEOUT_MS)
    }

    /// Initialise and subscribe the current task to the TWDT.
    pub fn new(loop_period_ms: u32) -> Self {
        let timeout_ms = Self::timeout_for(loop_period_ms);

        #[cfg(target_os = "espidf")]
        {
            // SAFETY: plain FFI calls on the current task; the config struct
            // outlives the call.
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!("TWDT reconfigure returned {} (may already be configured)", ret);
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    log::info!("Watchdog: subscribed ({} ms timeout, panic on trigger)", timeout_ms);
                } else {
                    log::warn!("Watchdog: failed to subscribe ({})", ret);
                }

                Self {
                    timeout_ms,
                    feeds: 0,
                    subscribed,
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            log::debug!("Watchdog(sim): no-op, {} ms", timeout_ms);
            Self { timeout_ms, feeds: 0 }
        }
    }

    /// Feed the watchdog once per control tick.
    pub fn feed(&mut self) {
        self.feeds = self.feeds.wrapping_add(1);
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                // SAFETY: resets the TWDT entry of the subscribed current task.
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    pub fn feeds(&self) -> u64 {
        self.feeds
    }
}
