//! Closed loop on simulated hardware: SimGpio relay → simulated tank →
//! ControlLoop → CSV files, paced by a fake clock.

use std::cell::Cell;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;
use tankguard::adapters::csv_sink::CsvSink;
use tankguard::adapters::gpio::SimGpio;
use tankguard::adapters::hardware::{HardwareAdapter, Timebase};
use tankguard::app::commands::AppCommand;
use tankguard::app::ports::{ActuatorPort, Clock, TickTime};
use tankguard::app::runner;
use tankguard::app::service::ControlLoop;
use tankguard::config::{SensorKind, SystemConfig};
use tankguard::drivers::watchdog::Watchdog;

thread_local! {
    static NOW_MS: Cell<u64> = const { Cell::new(0) };
}

fn fake_millis() -> u64 {
    NOW_MS.with(Cell::get)
}

fn fake_micros() -> u64 {
    fake_millis() * 1000
}

struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Jumps to each deadline; raises `stop` after `limit` sleeps.
struct FakeClock<'a> {
    sleeps: Cell<u32>,
    limit: u32,
    stop: &'a AtomicBool,
}

impl Clock for FakeClock<'_> {
    fn now(&self) -> TickTime {
        TickTime {
            monotonic_ms: fake_millis(),
            local: None,
        }
    }

    fn sleep_until(&self, deadline_ms: u64) {
        NOW_MS.with(|n| n.set(deadline_ms.max(n.get())));
        self.sleeps.set(self.sleeps.get() + 1);
        if self.sleeps.get() >= self.limit {
            self.stop.store(true, Ordering::Relaxed);
        }
    }
}

fn sim_config(data_dir: &std::path::Path, initial: f32) -> SystemConfig {
    let mut c = SystemConfig::default();
    c.hardware.simulate = true;
    c.sensor.kind = SensorKind::Simulated;
    c.sensor.simulation.initial_percent = initial;
    c.sensor.simulation.draw_percent_per_sec = 0.1;
    c.sensor.simulation.fill_percent_per_sec = 0.4;
    c.analytics.data_dir = data_dir.to_string_lossy().into_owned();
    c
}

#[test]
fn simulated_tank_fills_and_stops() {
    NOW_MS.with(|n| n.set(0));
    let tmp = tempfile::tempdir().unwrap();
    let cfg = sim_config(tmp.path(), 20.0);

    let time = Timebase {
        micros: fake_micros,
        millis: fake_millis,
    };
    let mut hw = HardwareAdapter::from_config(SimGpio::new(), &cfg, NoDelay, time).unwrap();
    let mut sink = CsvSink::open(&cfg.analytics).unwrap();
    let stop = AtomicBool::new(false);
    let clock = FakeClock {
        sleeps: Cell::new(0),
        limit: 300,
        stop: &stop,
    };
    let mut wdt = Watchdog::new(cfg.runtime.loop_period_ms);
    let mut app = ControlLoop::new(cfg);

    let ticks = runner::run(&mut app, &mut hw, &mut sink, &clock, &mut wdt, &[], &stop).unwrap();
    assert_eq!(ticks, 300);
    assert!(!hw.pump_energized());
    assert!(hw.gpio().is_released());

    let events = fs::read_to_string(sink.event_path()).unwrap();
    let lines: Vec<&str> = events.lines().collect();
    assert_eq!(lines[0], "timestamp,event");
    assert!(lines[1].ends_with(",CONTROLLER_START"));
    assert!(lines[2].ends_with(",PUMP_ON"));
    assert!(lines.iter().any(|l| l.contains(",PUMP_OFF level=8")));
    assert!(lines.last().unwrap().ends_with(",CONTROLLER_STOP"));

    let levels = fs::read_to_string(sink.level_path()).unwrap();
    assert_eq!(levels.lines().count(), 1 + 300);
    assert!(levels.lines().nth(1).unwrap().ends_with(",1"));
}

#[test]
fn startup_leak_scan_runs_on_a_full_tank() {
    NOW_MS.with(|n| n.set(0));
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = sim_config(tmp.path(), 60.0);
    cfg.sensor.simulation.draw_percent_per_sec = 0.01;

    let time = Timebase {
        micros: fake_micros,
        millis: fake_millis,
    };
    let mut hw = HardwareAdapter::from_config(SimGpio::new(), &cfg, NoDelay, time).unwrap();
    let mut sink = CsvSink::open(&cfg.analytics).unwrap();
    let stop = AtomicBool::new(false);
    let clock = FakeClock {
        sleeps: Cell::new(0),
        limit: 2 * 60 + 5,
        stop: &stop,
    };
    let mut wdt = Watchdog::new(cfg.runtime.loop_period_ms);
    let mut app = ControlLoop::new(cfg);

    let startup = [AppCommand::RunLeakScan { minutes: 2 }];
    runner::run(&mut app, &mut hw, &mut sink, &clock, &mut wdt, &startup, &stop).unwrap();

    let events = fs::read_to_string(sink.event_path()).unwrap();
    assert!(events.contains("LEAK_SCAN_START duration=2m"));
    // 120 s at 0.01 %/s is about 1.2 points, above the 1.0 default.
    assert!(events.contains("LEAK_TANK_SUSPECT drop=1."));
}
