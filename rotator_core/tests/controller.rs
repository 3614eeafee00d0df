use rotator_core::config::{ControllerCfg, MotionRange};
use rotator_core::controller::{ControlOutput, PositionController};
use rotator_core::encoder::{Direction, EncoderSnapshot};
use rotator_core::error::RotatorError;
use rotator_traits::clock::test_clock::TestClock;
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;

const PULSE: f32 = 360.0 / 4096.0;

fn controller(cfg: ControllerCfg) -> (PositionController, TestClock) {
    let clock = TestClock::new();
    let c = PositionController::new(cfg, MotionRange::default(), PULSE, Arc::new(clock.clone()));
    (c, clock)
}

fn at(position_deg: f32, speed: f32) -> EncoderSnapshot {
    EncoderSnapshot {
        position: (position_deg / PULSE).round() as i32,
        position_deg,
        real_position_deg: None,
        zero_offset_deg: None,
        zero_known: false,
        direction: if speed < 0.0 {
            Direction::Backward
        } else {
            Direction::Forward
        },
        instant_speed: speed,
        average_speed: speed,
        at_index: false,
        glitches: 0,
    }
}

#[test]
fn first_update_is_bounded_by_deceleration_profile_and_accel_limit() {
    let (mut c, clock) = controller(ControllerCfg::default());
    c.start(90.0, 0.0, 0.0).unwrap();

    // Period not yet elapsed: hold.
    assert_eq!(c.tick(&at(0.0, 0.0)), ControlOutput::Hold);

    clock.advance(Duration::from_millis(10));
    let out = c.tick(&at(0.0, 0.0));
    assert!((c.last_speed_bound() - 1620.0_f32.sqrt()).abs() < 1e-3);
    assert!((c.last_speed_bound() - 40.25).abs() < 0.01);
    match out {
        ControlOutput::Drive(s) => assert!((s - 0.09).abs() < 1e-5, "s={s}"),
        other => panic!("expected Drive, got {other:?}"),
    }
}

#[test]
fn commanded_speed_never_exceeds_max_speed() {
    let (mut c, clock) = controller(ControllerCfg::default());
    c.start(90.0, 0.0, 0.0).unwrap();
    let mut peak = 0.0_f32;
    for _ in 0..1000 {
        clock.advance(Duration::from_millis(10));
        if let ControlOutput::Drive(s) = c.tick(&at(0.0, 0.0)) {
            peak = peak.max(s);
            assert!(s <= 36.0 + 1e-4, "s={s}");
        }
    }
    assert!((peak - 36.0).abs() < 1e-3);
}

#[test]
fn acceleration_is_limited_per_period() {
    let (mut c, clock) = controller(ControllerCfg::default());
    c.start(-400.0, 0.0, 0.0).unwrap();
    let mut prev = 0.0_f32;
    for _ in 0..50 {
        clock.advance(Duration::from_millis(10));
        if let ControlOutput::Drive(s) = c.tick(&at(0.0, 0.0)) {
            assert!(((s - prev) / 0.01).abs() <= 9.0 + 1e-2);
            assert!(s < 0.0);
            prev = s;
        }
    }
}

#[test]
fn arrival_is_reported_once() {
    let (mut c, clock) = controller(ControllerCfg::default());
    clock.advance(Duration::from_millis(500));
    c.start(90.0, 10.0, 0.0).unwrap();
    clock.advance(Duration::from_millis(2500));

    let ControlOutput::Stop { arrival: Some(a) } = c.tick(&at(90.0, 0.5)) else {
        panic!("expected an arrival");
    };
    assert!((a.travel_deg - 80.0).abs() < 1e-4);
    assert!((a.elapsed_s - 2.5).abs() < 1e-3);
    assert!((a.avg_speed - 32.0).abs() < 1e-2);
    assert!(c.is_done());
    assert!(!c.is_enabled());

    for _ in 0..5 {
        clock.advance(Duration::from_millis(10));
        assert_eq!(c.tick(&at(90.0, 0.0)), ControlOutput::Idle);
        assert_eq!(c.commanded_speed(), 0.0);
        assert!(!c.is_enabled());
    }
    assert!((c.distance_to_target() - 80.0).abs() < 1e-4);
}

#[test]
fn fast_pass_over_target_is_not_an_arrival() {
    let (mut c, clock) = controller(ControllerCfg::default());
    c.start(90.0, 0.0, 20.0).unwrap();
    clock.advance(Duration::from_millis(10));
    assert!(matches!(c.tick(&at(90.0, 20.0)), ControlOutput::Drive(_)));
    assert!(c.is_enabled());
}

#[test]
fn start_seeds_commanded_speed_for_continuity() {
    let (mut c, clock) = controller(ControllerCfg::default());
    c.start(300.0, 0.0, 12.5).unwrap();
    assert_eq!(c.commanded_speed(), 12.5);
    clock.advance(Duration::from_millis(10));
    let ControlOutput::Drive(s) = c.tick(&at(0.0, 12.5)) else {
        panic!("expected Drive");
    };
    assert!((s - 12.59).abs() < 1e-4);
}

#[rstest]
#[case(540.5)]
#[case(-541.0)]
#[case(f32::NAN)]
fn out_of_range_target_is_rejected_without_state_change(#[case] target: f32) {
    let (mut c, _clock) = controller(ControllerCfg::default());
    let err = c.start(target, 0.0, 0.0).unwrap_err();
    assert!(matches!(err, RotatorError::Range { name: "target", .. }));
    assert!(!c.is_enabled());
    assert_eq!(c.target(), 0.0);
}

#[test]
fn stop_disables_and_zeroes_command() {
    let (mut c, clock) = controller(ControllerCfg::default());
    c.start(90.0, 0.0, 5.0).unwrap();
    clock.advance(Duration::from_millis(10));
    c.tick(&at(0.0, 5.0));
    c.stop();
    assert!(!c.is_enabled());
    assert!(!c.is_aiming());
    assert!(!c.is_done());
    assert_eq!(c.commanded_speed(), 0.0);
    assert_eq!(c.tick(&at(0.0, 0.0)), ControlOutput::Idle);
}
