use rotator_core::mocks::{SpyMotor, StaticLines};
use rotator_core::{
    CalibrationEvent, CalibrationState, ControllerCfg, Rotator, RotatorError, Setting, StatusFlags,
    UNKNOWN_POSITION_DEG, WriteMode,
};
use rotator_traits::LineLevels;
use rotator_traits::clock::test_clock::TestClock;
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;

fn booted(index_high: bool) -> (Rotator, SpyMotor, TestClock) {
    let clock = TestClock::new();
    let motor = SpyMotor::new();
    let mut r = Rotator::builder()
        .with_motor(motor.clone())
        .with_clock(Arc::new(clock.clone()))
        .build()
        .unwrap();
    let mut lines = StaticLines(LineLevels::new(false, false, index_high));
    r.boot(&mut lines).unwrap();
    (r, motor, clock)
}

/// Feed the same levels for two debounce samples, 200 us apart.
fn settle_lines(r: &Rotator, clock: &TestClock, a: bool, b: bool, index: bool) {
    for _ in 0..2 {
        clock.advance(Duration::from_micros(200));
        r.encoder().sample(LineLevels::new(a, b, index));
    }
}

fn rotator_err(e: &eyre::Report) -> &RotatorError {
    e.downcast_ref::<RotatorError>()
        .unwrap_or_else(|| panic!("not a RotatorError: {e:?}"))
}

#[test]
fn boot_waits_primes_and_parks() {
    let (r, motor, clock) = booted(false);
    assert!(clock.elapsed() >= Duration::from_millis(100));
    let snap = r.snapshot();
    assert_eq!(snap.position, 0);
    assert!(!snap.zero_known);
    assert_eq!(snap.real_position_deg, None);
    let out = motor.outputs();
    assert!(!out.enabled);
    assert_eq!(out.level, 0);
    assert_eq!(r.status().bits(), StatusFlags::OK);
}

#[test]
fn boot_on_the_index_knows_the_zero() {
    let (r, _motor, _clock) = booted(true);
    let snap = r.snapshot();
    assert!(snap.zero_known);
    assert_eq!(snap.zero_offset_deg, Some(0.0));
    assert_eq!(r.read_setting(Setting::RealPosition), 0.0);
}

#[test]
fn unknown_zero_reads_as_sentinel() {
    let (r, _motor, _clock) = booted(false);
    assert_eq!(r.read_setting(Setting::Offset), UNKNOWN_POSITION_DEG);
    assert_eq!(r.read_setting(Setting::RealPosition), UNKNOWN_POSITION_DEG);
}

#[test]
fn goto_drives_motor_and_sets_busy_flags() {
    let (mut r, motor, clock) = booted(false);
    r.goto(-45.0).unwrap();
    assert!(r.status().contains(StatusFlags::PID_BUSY));
    clock.advance(Duration::from_millis(10));
    r.step().unwrap();
    let out = motor.outputs();
    assert!(out.enabled);
    assert!(out.reverse);
    assert!(out.level > 0);
    let s = r.status();
    assert!(s.contains(StatusFlags::MOVING));
    assert!(s.contains(StatusFlags::DIRECTION));
    assert!(!s.contains(StatusFlags::PID_DONE));
}

#[test]
fn goto_current_position_arrives_immediately() {
    let (mut r, motor, _clock) = booted(false);
    r.goto(0.0).unwrap();
    let report = r.step().unwrap();
    let arrival = report.arrival.expect("arrival");
    assert_eq!(arrival.travel_deg, 0.0);
    assert!(r.status().contains(StatusFlags::PID_DONE));
    assert!(!r.status().contains(StatusFlags::PID_BUSY));
    assert!(!motor.outputs().enabled);
    // No second report.
    assert!(r.step().unwrap().arrival.is_none());
}

#[test]
fn relative_move_builds_on_running_target() {
    let (mut r, _motor, _clock) = booted(false);
    r.goto_relative(30.0).unwrap();
    assert_eq!(r.controller().target(), 30.0);
    r.goto_relative(15.0).unwrap();
    assert_eq!(r.controller().target(), 45.0);
    let err = r.goto_relative(600.0).unwrap_err();
    assert!(matches!(rotator_err(&err), RotatorError::Range { .. }));
    assert_eq!(r.controller().target(), 45.0);
}

#[test]
fn stop_clears_busy_without_done() {
    let (mut r, motor, clock) = booted(false);
    r.goto(90.0).unwrap();
    clock.advance(Duration::from_millis(10));
    r.step().unwrap();
    r.stop().unwrap();
    let s = r.status();
    assert!(!s.contains(StatusFlags::PID_BUSY));
    assert!(!s.contains(StatusFlags::PID_DONE));
    assert!(!s.contains(StatusFlags::MOVING));
    assert_eq!(motor.outputs().level, 0);
}

#[test]
fn kill_drops_enable_and_aborts_calibration() {
    let (mut r, motor, clock) = booted(false);
    r.start_calibration().unwrap();
    clock.advance(Duration::from_millis(10));
    r.step().unwrap();
    assert_eq!(r.calibration_state(), CalibrationState::SearchingZero);
    assert!(motor.outputs().enabled);

    r.kill_motor().unwrap();
    assert!(!motor.outputs().enabled);
    assert_eq!(r.calibration_state(), CalibrationState::Idle);
    let s = r.status();
    assert!(!s.contains(StatusFlags::MOVING));
    assert!(!s.contains(StatusFlags::CALIB_BUSY));
    assert!(!s.contains(StatusFlags::PID_DONE));
    assert!(r.is_idle());
}

#[test]
fn goto_is_refused_while_calibrating() {
    let (mut r, _motor, _clock) = booted(false);
    r.start_calibration().unwrap();
    assert!(r.status().contains(StatusFlags::CALIB_BUSY));
    let err = r.goto(10.0).unwrap_err();
    assert_eq!(rotator_err(&err), &RotatorError::Busy);
    let err = r.write_setting(Setting::Target, 10.0, WriteMode::Absolute).unwrap_err();
    assert_eq!(rotator_err(&err), &RotatorError::Busy);
}

#[test]
fn calibration_sweeps_away_from_the_near_limit() {
    let (mut r, _motor, _clock) = booted(false);
    r.set_position(270.0).unwrap();
    r.start_calibration().unwrap();
    assert_eq!(r.controller().target(), -90.0);
}

#[test]
fn set_position_checks_range() {
    let (mut r, _motor, _clock) = booted(false);
    let err = r.set_position(600.0).unwrap_err();
    assert!(matches!(
        rotator_err(&err),
        RotatorError::Range { name: "position", .. }
    ));
    r.set_position(123.75).unwrap();
    assert!((r.snapshot().position_deg - 123.75).abs() < 0.05);
}

#[rstest]
#[case(Setting::Kp, 120.0)]
#[case(Setting::Ki, 0.0)]
#[case(Setting::Kd, 5.0)]
#[case(Setting::Period, 0.02)]
#[case(Setting::Bias, 1.5)]
#[case(Setting::MaxAccel, 20.0)]
#[case(Setting::MaxSpeed, 30.0)]
#[case(Setting::MinSpeed, 2.0)]
#[case(Setting::XferPosSlope, 1.2)]
#[case(Setting::XferNegIntercept, -0.5)]
fn writable_settings_round_trip(#[case] setting: Setting, #[case] value: f32) {
    let (mut r, _motor, _clock) = booted(false);
    let applied = r.write_setting(setting, value, WriteMode::Absolute).unwrap();
    assert_eq!(applied, value);
    assert_eq!(r.read_setting(setting), value);
}

#[rstest]
#[case(Setting::Kp, 1000.5)]
#[case(Setting::Ki, -0.1)]
#[case(Setting::Period, 0.001)]
#[case(Setting::MaxSpeed, 40.0)]
#[case(Setting::MinSpeed, 0.1)]
#[case(Setting::XferPosSlope, 0.2)]
#[case(Setting::XferNegIntercept, 11.0)]
fn out_of_range_writes_leave_state_unchanged(#[case] setting: Setting, #[case] value: f32) {
    let (mut r, _motor, _clock) = booted(false);
    let before = r.read_setting(setting);
    let err = r.write_setting(setting, value, WriteMode::Absolute).unwrap_err();
    assert!(matches!(rotator_err(&err), RotatorError::Range { .. }));
    assert_eq!(r.read_setting(setting), before);
}

#[test]
fn min_speed_never_exceeds_max_speed() {
    let (mut r, _motor, _clock) = booted(false);
    r.write_setting(Setting::MaxSpeed, 4.0, WriteMode::Absolute)
        .unwrap();
    let err = r
        .write_setting(Setting::MinSpeed, 4.5, WriteMode::Absolute)
        .unwrap_err();
    assert!(matches!(rotator_err(&err), RotatorError::Range { name: "minspd", .. }));

    r.write_setting(Setting::MinSpeed, 3.0, WriteMode::Absolute)
        .unwrap();
    let err = r
        .write_setting(Setting::MaxSpeed, 2.5, WriteMode::Absolute)
        .unwrap_err();
    assert!(matches!(rotator_err(&err), RotatorError::Range { name: "maxspd", .. }));
    let c: &ControllerCfg = r.controller().cfg();
    assert!(c.min_speed <= c.max_speed);
}

#[test]
fn relative_writes_add_to_current_value() {
    let (mut r, _motor, _clock) = booted(false);
    let kp = r.read_setting(Setting::Kp);
    let v = r.write_setting(Setting::Kp, 10.0, WriteMode::Relative).unwrap();
    assert_eq!(v, kp + 10.0);
}

#[rstest]
#[case(Setting::Status)]
#[case(Setting::Speed)]
#[case(Setting::DistanceToTarget)]
#[case(Setting::Offset)]
fn read_only_settings_refuse_writes(#[case] setting: Setting) {
    let (mut r, _motor, _clock) = booted(false);
    let err = r.write_setting(setting, 1.0, WriteMode::Absolute).unwrap_err();
    assert_eq!(rotator_err(&err), &RotatorError::ReadOnly(setting.name()));
}

#[test]
fn output_pulse_writes_lowest_level_then_parks() {
    let (mut r, motor, _clock) = booted(false);
    let before = motor.outputs().writes;
    let level = r.pulse_outputs().unwrap();
    // (0.5 + 1.3754) / 1.1417 deg/s at 36/1023 deg/s per level
    assert_eq!(level, 46);
    let out = motor.outputs();
    assert!(out.writes > before);
    assert!(!out.enabled);
    assert_eq!(out.level, 0);
    assert_eq!(r.snapshot().instant_speed, 0.0);

    r.goto(10.0).unwrap();
    let err = r.pulse_outputs().unwrap_err();
    assert_eq!(rotator_err(&err), &RotatorError::Moving("pulse outputs"));
}

#[test]
fn calibration_commits_zero_despite_a_coasting_edge() {
    let (mut r, _motor, clock) = booted(true);
    r.start_calibration().unwrap();
    let report = r.step().unwrap();
    assert_eq!(
        report.calibration,
        Some(CalibrationEvent::ZeroFound { offset_deg: 0.0 })
    );
    assert!(report.arrival.is_some());
    assert_eq!(r.calibration_state(), CalibrationState::GoingToZero);

    // One more pulse after the output was released, index still high.
    settle_lines(&r, &clock, true, false, true);
    let snap = r.snapshot();
    assert_eq!(snap.position, 1);
    assert!(snap.instant_speed != 0.0);
    assert!(snap.at_index);

    let report = r.step().unwrap();
    assert_eq!(report.calibration, Some(CalibrationEvent::Completed));
    assert_eq!(r.calibration_state(), CalibrationState::Idle);
    let snap = r.snapshot();
    assert_eq!(snap.position, 0);
    assert!(snap.zero_known);
    assert_eq!(snap.instant_speed, 0.0);
    assert!(!r.status().contains(StatusFlags::CALIB_BUSY));
}

#[test]
fn calibration_resweeps_when_index_is_low_on_arrival() {
    let (mut r, _motor, clock) = booted(true);
    // The zero is known from boot, but the index has since dropped.
    settle_lines(&r, &clock, false, false, false);
    assert!(r.snapshot().zero_known);
    assert!(!r.snapshot().at_index);

    r.start_calibration().unwrap();
    let first = r.step().unwrap();
    assert_eq!(
        first.calibration,
        Some(CalibrationEvent::ZeroFound { offset_deg: 0.0 })
    );
    assert_eq!(r.calibration_state(), CalibrationState::GoingToZero);

    let second = r.step().unwrap();
    assert_eq!(
        second.calibration,
        Some(CalibrationEvent::Retrying { attempt: 1 })
    );
    assert_eq!(r.calibration_state(), CalibrationState::SearchingZero);
    assert_eq!(r.controller().target(), 360.0);
    assert!(r.controller().is_enabled());
    assert!(!r.snapshot().zero_known);
    assert!(r.status().contains(StatusFlags::CALIB_BUSY));
}

#[test]
fn kill_clears_speed_so_position_can_be_redefined() {
    let (mut r, motor, clock) = booted(false);
    r.goto(10.0).unwrap();
    clock.advance(Duration::from_millis(10));
    r.step().unwrap();
    assert!(motor.outputs().enabled);
    settle_lines(&r, &clock, true, false, false);
    assert!(r.snapshot().instant_speed != 0.0);

    r.kill_motor().unwrap();
    assert_eq!(r.snapshot().instant_speed, 0.0);
    r.set_position(5.625).unwrap();
    assert_eq!(r.snapshot().position, 64);
}
