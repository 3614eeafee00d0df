use rotator_core::config::TrackerCfg;
use rotator_core::encoder::{Direction, EncoderHandle, QuadratureTracker};
use rotator_core::error::RotatorError;
use rotator_traits::LineLevels;
use rotator_traits::clock::test_clock::TestClock;
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;

const PULSE: f32 = 360.0 / 4096.0;

fn gray(n: i32, index: bool) -> LineLevels {
    let (a, b) = match n.rem_euclid(4) {
        0 => (false, false),
        1 => (true, false),
        2 => (true, true),
        _ => (false, true),
    };
    LineLevels::new(a, b, index)
}

/// Step the handle through `pulses` gray transitions, `period_us` apart.
fn spin(enc: &EncoderHandle, clock: &TestClock, from: i32, pulses: i32, period_us: u64) -> i32 {
    let dir = pulses.signum();
    let mut phase = from;
    for _ in 0..pulses.abs() {
        phase += dir;
        for _ in 0..2 {
            clock.advance(Duration::from_micros(period_us / 2));
            enc.sample(gray(phase, false));
        }
    }
    phase
}

fn handle() -> (EncoderHandle, TestClock) {
    let clock = TestClock::new();
    let enc = EncoderHandle::new(
        QuadratureTracker::new(TrackerCfg::default()),
        Arc::new(clock.clone()),
    );
    enc.prime(gray(0, false));
    (enc, clock)
}

#[test]
fn set_position_is_rejected_while_turning() {
    let (enc, clock) = handle();
    spin(&enc, &clock, 0, 10, 1000);
    let before = enc.snapshot();
    assert!(before.instant_speed > 0.0);

    let err = enc.set_position_deg(45.0).unwrap_err();
    assert_eq!(err, RotatorError::Moving("set position"));
    assert_eq!(enc.snapshot(), before);

    enc.reset_speed();
    enc.set_position_deg(45.0).unwrap();
    assert_eq!(enc.snapshot().position_deg, 45.0);
}

#[rstest]
#[case::forward(40, 1000, 87.890_625)]
#[case::backward(-40, 2000, -43.945_312)]
fn speeds_follow_pulse_timing(#[case] pulses: i32, #[case] period_us: u64, #[case] expected: f32) {
    let (enc, clock) = handle();
    spin(&enc, &clock, 0, pulses, period_us);
    let snap = enc.snapshot();
    assert!((snap.instant_speed - expected).abs() < 1e-3, "{}", snap.instant_speed);
    assert!((snap.average_speed - expected).abs() < 1e-3, "{}", snap.average_speed);
    assert_eq!(
        snap.direction,
        if pulses > 0 {
            Direction::Forward
        } else {
            Direction::Backward
        }
    );
    assert_eq!(snap.position, pulses);
}

#[test]
fn index_rising_edge_records_normalized_offset() {
    let (enc, clock) = handle();
    enc.set_position_deg(-3000.0 * PULSE).unwrap();
    let phase = spin(&enc, &clock, 0, 5, 1000);
    // Index pulse on the current phase.
    for _ in 0..2 {
        enc.sample(gray(phase, true));
    }
    let snap = enc.snapshot();
    assert!(snap.zero_known);
    // -2995 wraps to 1101.
    assert_eq!(snap.zero_offset_deg, Some(1101.0 * PULSE));
    assert_eq!(snap.real_position_deg, Some(0.0));

    // Falling edge carries no information.
    for _ in 0..2 {
        enc.sample(gray(phase, false));
    }
    assert_eq!(enc.snapshot().zero_offset_deg, Some(1101.0 * PULSE));
}

#[test]
fn redefining_position_keeps_the_real_position() {
    let (enc, clock) = handle();
    for _ in 0..2 {
        enc.sample(gray(0, true));
    }
    spin(&enc, &clock, 0, 100, 1000);
    assert_eq!(enc.snapshot().position, 100);
    enc.reset_speed();
    let real_before = enc.snapshot().real_position_deg;

    enc.set_position_deg(10.0).unwrap();
    let snap = enc.snapshot();
    assert_eq!(snap.position, (10.0 / PULSE).round() as i32);
    assert_eq!(snap.real_position_deg, real_before);
    let off = snap.zero_offset_deg.unwrap();
    assert!((-180.0..180.0).contains(&off));
}

#[test]
fn forgetting_the_zero_hides_index_relative_values() {
    let (enc, _clock) = handle();
    for _ in 0..2 {
        enc.sample(gray(0, true));
    }
    assert!(enc.snapshot().zero_known);
    enc.forget_zero();
    let snap = enc.snapshot();
    assert!(!snap.zero_known);
    assert_eq!(snap.zero_offset_deg, None);
    assert_eq!(snap.real_position_deg, None);
}
