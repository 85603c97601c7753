//! Fixed-period driver for the [`ControlLoop`].
//!
//! Shared by the ESP-IDF firmware and the host runner.  Each iteration
//! samples the [`Clock`], runs one tick, feeds the watchdog and sleeps
//! until the next period boundary.  The loop exits when `stop` is set
//! (cooperative shutdown) or a tick returns an error (fatal path).

use core::sync::atomic::{AtomicBool, Ordering};

use log::info;

use crate::drivers::watchdog::Watchdog;
use crate::error::Error;

use super::commands::AppCommand;
use super::ports::{ActuatorPort, Clock, LevelSource, TelemetrySink};
use super::service::ControlLoop;

/// Run until `stop` is raised.  Returns the number of ticks executed.
///
/// `startup` commands (e.g. a manual leak scan from the command line) are
/// applied once, after the start record and before the first tick.
///
/// On a fatal tick error the relay is forced off through
/// [`ControlLoop::fail_safe`] before the error is returned; the caller
/// only has to report it and exit non-zero.
pub fn run(
    app: &mut ControlLoop,
    hw: &mut (impl LevelSource + ActuatorPort),
    sink: &mut impl TelemetrySink,
    clock: &impl Clock,
    watchdog: &mut Watchdog,
    startup: &[AppCommand],
    stop: &AtomicBool,
) -> Result<u64, Error> {
    let period_ms = u64::from(app.config().runtime.loop_period_ms);
    app.start(clock.now(), sink);
    info!("Control loop running every {} ms", period_ms);
    for cmd in startup {
        app.handle_command(cmd.clone(), clock.now(), hw, sink);
    }

    let mut ticks = 0u64;
    // Deadlines advance by whole periods so a slow tick does not drift.
    let mut next_ms = clock.now().monotonic_ms;

    while !stop.load(Ordering::Relaxed) {
        let now = clock.now();
        if let Err(e) = app.tick(now, hw, sink) {
            app.fail_safe(clock.now(), e, hw, sink);
            return Err(e);
        }
        ticks += 1;
        watchdog.feed();

        next_ms += period_ms;
        let now_ms = clock.now().monotonic_ms;
        if next_ms <= now_ms {
            // Overran one or more periods: resync instead of bursting.
            next_ms = now_ms + period_ms;
        }
        clock.sleep_until(next_ms);
    }

    info!("Stop requested");
    app.shutdown(clock.now(), hw, sink)?;
    Ok(ticks)
}
