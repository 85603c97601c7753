//! TankGuard firmware: ESP-IDF entry point
//!
//! Hexagonal architecture with a fixed-period control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter<EspGpio>   LogSink          EmbeddedConfig    │
//! │  (LevelSource+Actuator)     (TelemetrySink)  (ConfigPort)      │
//! │  SystemClock                                                   │
//! │  (Clock)                                                       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              ControlLoop (pure logic)                  │    │
//! │  │  LevelSensor · PumpController · Scheduler · LeakScanner│    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Watchdog (TWDT, fed once per tick)                            │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use core::sync::atomic::AtomicBool;

use anyhow::Result;
use esp_idf_hal::delay::Ets;
use log::{info, warn};

use tankguard::adapters::config_file::EmbeddedConfig;
use tankguard::adapters::gpio::{EspGpio, SimGpio};
use tankguard::adapters::hardware::{HardwareAdapter, Timebase};
use tankguard::adapters::log_sink::LogSink;
use tankguard::adapters::time::{SystemClock, platform_micros, platform_millis};
use tankguard::app::ports::{ConfigPort, GpioPort};
use tankguard::app::runner;
use tankguard::app::service::ControlLoop;
use tankguard::config::{SensorKind, SystemConfig};
use tankguard::drivers::watchdog::Watchdog;
use tankguard::error::Error;

/// Never raised on the board: the loop runs until reset or a fatal fault.
static STOP: AtomicBool = AtomicBool::new(false);

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  TankGuard v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let mut config = EmbeddedConfig
        .load()
        .map_err(Error::from)
        .inspect_err(Error::log_fatal)?;

    if config.hardware.simulate {
        warn!("hardware.simulate set: pins untouched, running the simulated tank");
        config.sensor.kind = SensorKind::Simulated;
        run(SimGpio::new(), config)
    } else {
        run(EspGpio::new(), config)
    }
}

fn run(gpio: impl GpioPort, config: SystemConfig) -> Result<()> {
    // ── 3. Hardware: relay first (de-energized), then the probe ─
    let time = Timebase {
        micros: platform_micros,
        millis: platform_millis,
    };
    let mut hw = HardwareAdapter::from_config(gpio, &config, Ets, time)
        .map_err(Error::from)
        .inspect_err(Error::log_fatal)?;

    // ── 4. Control loop ───────────────────────────────────────
    let mut watchdog = Watchdog::new(config.runtime.loop_period_ms);
    let mut sink = LogSink::new();
    let clock = SystemClock::new();
    let mut app = ControlLoop::new(config);

    info!("System ready. Entering control loop.");
    // On a fatal fault the relay is already off when this returns.
    let ticks = runner::run(&mut app, &mut hw, &mut sink, &clock, &mut watchdog, &[], &STOP)?;
    info!("Control loop exited after {} ticks", ticks);
    Ok(())
}
