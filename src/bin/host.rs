//! TankGuard host runner.
//!
//! Runs the same control loop as the firmware on a Linux board or a
//! desktop.  Without a GPIO backend for the host the only supported
//! hardware is the in-memory capability, selected with `--simulate`
//! (or `hardware.simulate` in the config file).
//!
//! ```text
//!   tankguard-host --config config.json --simulate --leak-scan 5
//!   tankguard-host --simulate --nightly off --scan-at 2024-06-01T14:30 --scan-minutes 20
//! ```
//!
//! SIGINT / SIGTERM request a cooperative shutdown after the current
//! tick: relay off, `CONTROLLER_STOP` recorded, CSV files flushed.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use chrono::NaiveDateTime;
use clap::Parser;
use log::{info, warn};
use tracing_subscriber::EnvFilter;

use tankguard::adapters::config_file::FileConfig;
use tankguard::adapters::csv_sink::CsvSink;
use tankguard::adapters::gpio::SimGpio;
use tankguard::adapters::hardware::{HardwareAdapter, Timebase};
use tankguard::adapters::log_sink::LogSink;
use tankguard::adapters::time::{StdDelay, SystemClock, platform_micros, platform_millis};
use tankguard::app::commands::AppCommand;
use tankguard::app::ports::ConfigPort;
use tankguard::app::runner;
use tankguard::app::service::ControlLoop;
use tankguard::config::SensorKind;
use tankguard::drivers::watchdog::Watchdog;
use tankguard::error::{ConfigError, Error};

static STOP: AtomicBool = AtomicBool::new(false);

/// Water-tank pump controller with nightly leak scanning.
#[derive(Parser, Debug)]
#[command(name = "tankguard-host", version, about)]
struct Cli {
    /// Path to the configuration file (`.yaml`/`.yml` or JSON).
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Use simulated GPIO and a simulated tank instead of real hardware.
    #[arg(long)]
    simulate: bool,

    /// Run a manual leak scan for this many minutes at startup.
    #[arg(long, value_name = "MINUTES", value_parser = clap::value_parser!(u32).range(1..))]
    leak_scan: Option<u32>,

    /// Queue a one-off leak scan at this local time (`YYYY-MM-DDTHH:MM`).
    #[arg(long, value_name = "DATETIME", value_parser = parse_local_minute)]
    scan_at: Option<NaiveDateTime>,

    /// Duration of the scan queued with `--scan-at`.
    #[arg(long, value_name = "MINUTES", default_value_t = 30, requires = "scan_at",
          value_parser = clap::value_parser!(u32).range(1..))]
    scan_minutes: u32,

    /// Turn the nightly scan on or off for this run, overriding the config.
    #[arg(long, value_name = "on|off", value_parser = parse_on_off)]
    nightly: Option<bool>,
}

impl Cli {
    /// Commands applied once before the first tick, nightly toggle first.
    fn startup_commands(&self) -> Vec<AppCommand> {
        let mut cmds = Vec::new();
        if let Some(enabled) = self.nightly {
            cmds.push(AppCommand::SetNightlyScan(enabled));
        }
        if let Some(at) = self.scan_at {
            cmds.push(AppCommand::ScheduleLeakScan {
                at,
                minutes: self.scan_minutes,
            });
        }
        if let Some(minutes) = self.leak_scan {
            cmds.push(AppCommand::RunLeakScan { minutes });
        }
        cmds
    }
}

fn parse_local_minute(s: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .map_err(|e| format!("expected YYYY-MM-DDTHH:MM: {}", e))
}

fn parse_on_off(s: &str) -> Result<bool, String> {
    match s {
        "on" => Ok(true),
        "off" => Ok(false),
        other => Err(format!("expected on or off, got '{}'", other)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let mut config = FileConfig::new(&cli.config)
        .load()
        .unwrap_or_else(|e| fatal(e.into()));

    if cli.simulate {
        config.hardware.simulate = true;
    }
    if !config.hardware.simulate {
        fatal(Error::Config(ConfigError::ValidationFailed(
            "no GPIO backend is available on this host; run with --simulate",
        )));
    }
    if config.sensor.kind != SensorKind::Simulated {
        warn!("simulated GPIO: using the simulated tank instead of {:?}", config.sensor.kind);
        config.sensor.kind = SensorKind::Simulated;
    }

    spawn_signal_listener();

    let time = Timebase {
        micros: platform_micros,
        millis: platform_millis,
    };
    // Sinks first: nothing to release if the data directory is unusable.
    let csv = CsvSink::open(&config.analytics)?;
    let mut sink = (LogSink::new(), csv);
    let mut hw = HardwareAdapter::from_config(SimGpio::new(), &config, StdDelay, time)
        .unwrap_or_else(|e| fatal(e.into()));

    let startup = cli.startup_commands();

    let mut watchdog = Watchdog::new(config.runtime.loop_period_ms);
    let clock = SystemClock::new();
    let mut app = ControlLoop::new(config);

    match runner::run(&mut app, &mut hw, &mut sink, &clock, &mut watchdog, &startup, &STOP) {
        Ok(ticks) => {
            info!("stopped cleanly after {} ticks", ticks);
            Ok(())
        }
        // The fatal diagnostic has been logged and the relay forced off.
        Err(_) => std::process::exit(1),
    }
}

/// Startup failure: one diagnostic naming the kind, then exit non-zero.
/// The hardware adapter has already released anything it configured.
fn fatal(err: Error) -> ! {
    err.log_fatal();
    std::process::exit(1)
}

/// Raise [`STOP`] on SIGINT or SIGTERM, from a dedicated runtime thread.
fn spawn_signal_listener() {
    let spawned = std::thread::Builder::new()
        .name("signals".into())
        .spawn(|| {
            let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(e) => {
                    warn!("signal handling unavailable: {}", e);
                    return;
                }
            };
            rt.block_on(shutdown_signal());
            STOP.store(true, Ordering::Relaxed);
        });
    if let Err(e) = spawned {
        warn!("signal thread not started: {}", e);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl+C handler failed: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler failed: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, stopping after the current tick"),
        _ = terminate => info!("Received terminate signal, stopping after the current tick"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("tankguard-host").chain(args.iter().copied()))
    }

    #[test]
    fn no_flags_no_startup_commands() {
        assert!(parse(&[]).unwrap().startup_commands().is_empty());
    }

    #[test]
    fn scan_at_queues_one_off_scan() {
        let cli = parse(&["--scan-at", "2024-06-01T14:30", "--scan-minutes", "20"]).unwrap();
        let at = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(
            cli.startup_commands(),
            vec![AppCommand::ScheduleLeakScan { at, minutes: 20 }]
        );
    }

    #[test]
    fn nightly_toggle_precedes_other_commands() {
        let cli = parse(&["--leak-scan", "5", "--nightly", "off", "--scan-at", "2024-06-01T01:00"]).unwrap();
        let cmds = cli.startup_commands();
        assert_eq!(cmds.len(), 3);
        assert_eq!(cmds[0], AppCommand::SetNightlyScan(false));
        assert!(matches!(cmds[1], AppCommand::ScheduleLeakScan { minutes: 30, .. }));
        assert_eq!(cmds[2], AppCommand::RunLeakScan { minutes: 5 });
    }

    #[test]
    fn malformed_flags_are_rejected() {
        assert!(parse(&["--scan-at", "tomorrow"]).is_err());
        assert!(parse(&["--nightly", "maybe"]).is_err());
        assert!(parse(&["--scan-minutes", "10"]).is_err());
    }
}
