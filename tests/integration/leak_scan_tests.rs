//! Leak scans through the full ControlLoop: nightly schedule, manual
//! requests, one-off schedules and cancellation by the pump.

use chrono::NaiveDate;

use crate::mock_hw::{MockHw, RecordingSink, mono, test_config, wall};
use tankguard::app::commands::AppCommand;
use tankguard::app::events::{AppEvent, RejectReason};
use tankguard::app::service::{ControlLoop, Mode};
use tankguard::config::SystemConfig;
use tankguard::leak::{LeakEvent, ScanRejection};

fn nightly_config() -> SystemConfig {
    let mut c = test_config();
    c.leak_detection.nightly_scan.enabled = true;
    c.leak_detection.nightly_scan.start_hour = 2;
    c.leak_detection.nightly_scan.duration_minutes = 45;
    c
}

#[test]
fn nightly_scan_flags_a_leak() {
    let mut app = ControlLoop::new(nightly_config());
    let mut hw = MockHw::at(60.0);
    let mut sink = RecordingSink::default();

    // Boot at 01:00; nothing fires before 02:00.
    app.tick(wall(1, 0), &mut hw, &mut sink).unwrap();
    app.tick(wall(1, 3599), &mut hw, &mut sink).unwrap();
    assert!(!app.is_scanning());

    app.tick(wall(1, 3600), &mut hw, &mut sink).unwrap();
    assert!(app.is_scanning());
    assert_eq!(app.mode(), Mode::Scanning);
    assert!(sink.has_event("LEAK_SCAN_START duration=45m level=60.0%"));

    hw.set_level(58.5);
    app.tick(wall(1, 3600 + 45 * 60 - 1), &mut hw, &mut sink).unwrap();
    assert!(app.is_scanning());
    let r = app.tick(wall(1, 3600 + 45 * 60), &mut hw, &mut sink).unwrap();
    assert_eq!(r.events.as_slice(), &[AppEvent::Leak(LeakEvent::Suspect { drop: 1.5 })]);
    assert!(!app.is_scanning());

    let (ts, text) = sink.events.last().unwrap();
    assert_eq!(text, "LEAK_TANK_SUSPECT drop=1.50%");
    assert_eq!(ts.to_string(), "2024-06-01 02:45:00");
}

#[test]
fn nightly_scan_clear_when_level_holds() {
    let mut app = ControlLoop::new(nightly_config());
    let mut hw = MockHw::at(60.0);
    let mut sink = RecordingSink::default();

    app.tick(wall(2, 0), &mut hw, &mut sink).unwrap();
    hw.set_level(59.5);
    app.tick(wall(2, 45 * 60), &mut hw, &mut sink).unwrap();
    assert!(sink.has_event("LEAK_SCAN_CLEAR drop=0.50%"));
    assert_eq!(sink.count("LEAK_SCAN_START"), 1);

    // Once per calendar day.
    app.tick(wall(2, 46 * 60), &mut hw, &mut sink).unwrap();
    assert_eq!(sink.count("LEAK_SCAN_START"), 1);
}

#[test]
fn nightly_scan_skipped_while_pump_runs() {
    let mut app = ControlLoop::new(nightly_config());
    let mut hw = MockHw::at(20.0);
    let mut sink = RecordingSink::default();

    // Pump starts in the same tick the schedule fires; the pump runs first.
    app.tick(wall(2, 0), &mut hw, &mut sink).unwrap();
    assert!(app.pump_running());
    assert!(!app.is_scanning());
    assert!(!sink.has_event("LEAK_SCAN_START"));

    // The day's slot is spent.
    hw.set_level(85.0);
    app.tick(wall(2, 200), &mut hw, &mut sink).unwrap();
    assert!(!app.pump_running());
    app.tick(wall(2, 201), &mut hw, &mut sink).unwrap();
    assert!(!app.is_scanning());
}

#[test]
fn no_wall_clock_means_no_nightly_scan() {
    let mut app = ControlLoop::new(nightly_config());
    let mut hw = MockHw::at(60.0);
    let mut sink = RecordingSink::default();
    for h in 0..48 {
        app.tick(mono(h * 3600), &mut hw, &mut sink).unwrap();
    }
    assert!(!sink.has_event("LEAK_SCAN"));
}

#[test]
fn pump_start_cancels_scan_in_same_tick() {
    let mut app = ControlLoop::new(test_config());
    let mut hw = MockHw::at(50.0);
    let mut sink = RecordingSink::default();

    let ev = app.handle_command(AppCommand::RunLeakScan { minutes: 30 }, mono(0), &mut hw, &mut sink);
    assert!(matches!(ev, Some(AppEvent::Leak(LeakEvent::Started { duration_minutes: 30, .. }))));
    app.tick(mono(0), &mut hw, &mut sink).unwrap();
    assert!(app.is_scanning());

    hw.set_level(20.0);
    let r = app.tick(mono(10), &mut hw, &mut sink).unwrap();
    assert!(r.pump_running);
    assert!(!app.is_scanning());
    assert_eq!(
        sink.texts(),
        vec!["LEAK_SCAN_START duration=30m level=50.0%", "PUMP_ON", "LEAK_SCAN_CANCEL_PUMP_ON"]
    );
}

#[test]
fn manual_scan_rejected_while_pump_runs() {
    let mut app = ControlLoop::new(test_config());
    let mut hw = MockHw::at(20.0);
    let mut sink = RecordingSink::default();
    app.tick(mono(0), &mut hw, &mut sink).unwrap();

    let ev = app.handle_command(AppCommand::RunLeakScan { minutes: 5 }, mono(1), &mut hw, &mut sink);
    assert_eq!(
        ev,
        Some(AppEvent::LeakScanRejected(RejectReason::Scanner(ScanRejection::PumpRunning)))
    );
    assert_eq!(sink.texts().last(), Some(&"LEAK_SCAN_REJECTED reason=pump_on"));
}

#[test]
fn second_manual_scan_is_busy() {
    let mut app = ControlLoop::new(test_config());
    let mut hw = MockHw::at(60.0);
    let mut sink = RecordingSink::default();
    app.handle_command(AppCommand::RunLeakScan { minutes: 5 }, mono(0), &mut hw, &mut sink);
    let ev = app.handle_command(AppCommand::RunLeakScan { minutes: 5 }, mono(1), &mut hw, &mut sink);
    assert_eq!(ev, Some(AppEvent::LeakScanRejected(RejectReason::Scanner(ScanRejection::Busy))));
}

#[test]
fn manual_override_disabled() {
    let mut cfg = test_config();
    cfg.leak_detection.manual_override_allowed = false;
    let mut app = ControlLoop::new(cfg);
    let mut hw = MockHw::at(60.0);
    let mut sink = RecordingSink::default();
    app.handle_command(AppCommand::RunLeakScan { minutes: 5 }, mono(0), &mut hw, &mut sink);
    assert!(!app.is_scanning());
    assert_eq!(sink.texts(), vec!["LEAK_SCAN_REJECTED reason=manual_disabled"]);
}

#[test]
fn one_off_scan_fires_at_its_instant() {
    let mut app = ControlLoop::new(test_config());
    let mut hw = MockHw::at(70.0);
    let mut sink = RecordingSink::default();

    let at = NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(12, 30, 0)
        .unwrap();
    let ev = app.handle_command(AppCommand::ScheduleLeakScan { at, minutes: 10 }, wall(12, 0), &mut hw, &mut sink);
    assert_eq!(ev, None);

    app.tick(wall(12, 29 * 60), &mut hw, &mut sink).unwrap();
    assert!(!app.is_scanning());
    app.tick(wall(12, 30 * 60), &mut hw, &mut sink).unwrap();
    assert!(sink.has_event("LEAK_SCAN_START duration=10m level=70.0%"));

    app.tick(wall(12, 40 * 60), &mut hw, &mut sink).unwrap();
    assert!(sink.has_event("LEAK_SCAN_CLEAR drop=0.00%"));
    // Fires once.
    app.tick(wall(12, 50 * 60), &mut hw, &mut sink).unwrap();
    assert_eq!(sink.count("LEAK_SCAN_START"), 1);
}

#[test]
fn nightly_scan_enabled_at_runtime() {
    let mut app = ControlLoop::new(test_config());
    let mut hw = MockHw::at(60.0);
    let mut sink = RecordingSink::default();

    app.tick(wall(3, 0), &mut hw, &mut sink).unwrap();
    assert!(!app.is_scanning());

    app.handle_command(AppCommand::SetNightlyScan(true), wall(3, 1), &mut hw, &mut sink);
    app.tick(wall(3, 2), &mut hw, &mut sink).unwrap();
    assert!(app.is_scanning());
    assert!(app.config().leak_detection.nightly_scan.enabled);
}
