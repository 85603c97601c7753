//! ControlLoop → pump controller → relay, driven with simulated time.

use crate::mock_hw::{MockHw, RecordingSink, mono, test_config};
use tankguard::app::events::AppEvent;
use tankguard::app::service::{ControlLoop, Mode};
use tankguard::control::pump::{PumpEvent, PumpState};
use tankguard::error::{Error, HardwareFault, SensorError};

#[test]
fn fill_cycle_honours_wear_timers() {
    let mut app = ControlLoop::new(test_config());
    let mut hw = MockHw::at(20.0);
    let mut sink = RecordingSink::default();

    let r = app.tick(mono(0), &mut hw, &mut sink).unwrap();
    assert!(r.pump_running);
    assert_eq!(sink.texts(), vec!["PUMP_ON"]);

    // Full, but inside min_run (180 s).
    hw.set_level(85.0);
    app.tick(mono(60), &mut hw, &mut sink).unwrap();
    assert!(hw.relay_on);

    app.tick(mono(180), &mut hw, &mut sink).unwrap();
    assert!(!hw.relay_on);
    assert_eq!(sink.texts().last(), Some(&"PUMP_OFF level=85.0%"));

    // Empty again, but inside min_off (120 s).
    hw.set_level(20.0);
    app.tick(mono(200), &mut hw, &mut sink).unwrap();
    assert!(!hw.relay_on);
    app.tick(mono(300), &mut hw, &mut sink).unwrap();
    assert!(hw.relay_on);

    assert_eq!(hw.writes, vec![true, false, true]);
    // Every level record carries the relay state after that tick.
    let flags: Vec<bool> = sink.levels.iter().map(|(_, _, on)| *on).collect();
    assert_eq!(flags, vec![true, true, false, false, true]);
}

#[test]
fn hysteresis_band_holds_both_states() {
    let mut app = ControlLoop::new(test_config());
    let mut hw = MockHw::at(50.0);
    let mut sink = RecordingSink::default();
    for s in 0..10 {
        app.tick(mono(s), &mut hw, &mut sink).unwrap();
    }
    assert!(!app.pump_running());
    assert!(hw.writes.is_empty());
    assert!(sink.events.is_empty());
}

#[test]
fn hard_off_cuts_run_short() {
    let mut cfg = test_config();
    cfg.pump_control.hard_off_percent = Some(95.0);
    let mut app = ControlLoop::new(cfg);
    let mut hw = MockHw::at(20.0);
    let mut sink = RecordingSink::default();

    app.tick(mono(0), &mut hw, &mut sink).unwrap();
    hw.set_level(96.0);
    let r = app.tick(mono(10), &mut hw, &mut sink).unwrap();
    assert!(!r.pump_running);
    assert_eq!(r.events.as_slice(), &[AppEvent::Pump(PumpEvent::HardOff { level: 96.0 })]);
    assert!(sink.has_event("PUMP_HARD_OFF level=96.0%"));
}

#[test]
fn soft_start_delays_the_relay() {
    let mut cfg = test_config();
    cfg.pump_control.soft_start_delay_seconds = 5;
    let mut app = ControlLoop::new(cfg);
    let mut hw = MockHw::at(20.0);
    let mut sink = RecordingSink::default();

    app.tick(mono(0), &mut hw, &mut sink).unwrap();
    assert_eq!(app.pump_state(), PumpState::SoftStartPending { deadline_ms: 5000 });
    assert_eq!(app.mode(), Mode::SoftStart);
    assert!(!hw.relay_on);

    for s in 1..5 {
        app.tick(mono(s), &mut hw, &mut sink).unwrap();
        assert!(!hw.relay_on);
    }
    app.tick(mono(5), &mut hw, &mut sink).unwrap();
    assert!(hw.relay_on);
    assert_eq!(sink.texts(), vec!["PUMP_SOFT_START delay=5s", "PUMP_ON"]);
}

#[test]
fn sensor_outage_holds_last_level_and_pump_state() {
    let mut cfg = test_config();
    cfg.runtime.sensor_error_report_every = 10;
    let mut app = ControlLoop::new(cfg);
    let mut hw = MockHw::at(20.0);
    let mut sink = RecordingSink::default();
    app.tick(mono(0), &mut hw, &mut sink).unwrap();

    hw.level = Err(SensorError::Timeout);
    for s in 1..=25 {
        let r = app.tick(mono(s * 10), &mut hw, &mut sink).unwrap();
        assert_eq!(r.level, 20.0);
        assert!(r.pump_running);
    }
    assert_eq!(app.sensor_failures(), 25);
    // First failure, then the 10th and 20th.
    assert_eq!(sink.count("SENSOR_READ_ERROR"), 3);
    assert!(sink.has_event("SENSOR_READ_ERROR kind=timeout consecutive=20"));

    hw.set_level(30.0);
    app.tick(mono(300), &mut hw, &mut sink).unwrap();
    assert_eq!(app.sensor_failures(), 0);
    assert!(sink.has_event("SENSOR_RECOVERED after=25"));
}

#[test]
fn failed_first_read_assumes_empty_tank() {
    let mut app = ControlLoop::new(test_config());
    let mut hw = MockHw::at(0.0);
    hw.level = Err(SensorError::ReadError);
    let mut sink = RecordingSink::default();

    let r = app.tick(mono(0), &mut hw, &mut sink).unwrap();
    assert_eq!(r.level, 0.0);
    // 0 % is at or below the on threshold.
    assert!(r.pump_running);
    assert!(sink.has_event("SENSOR_READ_ERROR kind=read_error consecutive=1"));
}

#[test]
fn relay_write_failure_is_fatal_and_fails_safe() {
    let mut app = ControlLoop::new(test_config());
    let mut hw = MockHw::at(10.0);
    hw.fail_writes = true;
    let mut sink = RecordingSink::default();

    let err = app.tick(mono(0), &mut hw, &mut sink).unwrap_err();
    assert_eq!(err, Error::Hardware(HardwareFault::WriteFailed(17)));
    assert!(err.is_fatal());
    // The level sample of the failed tick is still recorded.
    assert_eq!(sink.levels.len(), 1);
    assert_eq!(app.pump_state(), PumpState::Idle);

    app.fail_safe(mono(0), err, &mut hw, &mut sink);
    assert_eq!(hw.releases, 1);
    assert_eq!(sink.flushes, 1);
    assert_eq!(
        sink.texts().last(),
        Some(&"CONTROLLER_FAULT kind=HardwareFault detail=\"hardware: write of GPIO 17 failed\"")
    );
}

#[test]
fn shutdown_forces_relay_off_and_flushes() {
    let mut app = ControlLoop::new(test_config());
    let mut hw = MockHw::at(10.0);
    let mut sink = RecordingSink::default();

    app.start(mono(0), &mut sink);
    app.tick(mono(0), &mut hw, &mut sink).unwrap();
    assert!(hw.relay_on);

    // Well inside min_run: shutdown still turns the pump off.
    app.shutdown(mono(1), &mut hw, &mut sink).unwrap();
    assert!(!hw.relay_on);
    assert_eq!(hw.releases, 1);
    assert_eq!(sink.flushes, 1);
    assert_eq!(
        sink.texts(),
        vec!["CONTROLLER_START", "PUMP_ON", "PUMP_OFF reason=shutdown", "CONTROLLER_STOP"]
    );
}

#[test]
fn shutdown_when_idle_still_writes_relay_off() {
    let mut app = ControlLoop::new(test_config());
    let mut hw = MockHw::at(50.0);
    let mut sink = RecordingSink::default();
    app.tick(mono(0), &mut hw, &mut sink).unwrap();

    app.shutdown(mono(1), &mut hw, &mut sink).unwrap();
    assert_eq!(hw.writes, vec![false]);
    assert_eq!(sink.texts(), vec!["CONTROLLER_STOP"]);
}

#[test]
fn records_use_epoch_without_wall_clock() {
    let mut app = ControlLoop::new(test_config());
    let mut hw = MockHw::at(50.0);
    let mut sink = RecordingSink::default();
    app.tick(mono(7), &mut hw, &mut sink).unwrap();
    assert_eq!(sink.levels[0].0.and_utc().timestamp(), 0);
    assert_eq!(app.tick_count(), 1);
}
