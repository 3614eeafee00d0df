use rotator_hardware::error::HwError;
use rotator_hardware::{SimFault, SimParams, SimRig};
use rotator_traits::clock::test_clock::TestClock;
use rotator_traits::{InputLines, MotorDriver};
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;

fn make_rig(params: SimParams) -> (SimRig, TestClock) {
    let clock = TestClock::new();
    (SimRig::new(params, Arc::new(clock.clone())), clock)
}

#[test]
fn index_is_high_only_on_the_zero_pulse() {
    let (rig, _clock) = make_rig(SimParams::default());
    let mut lines = rig.lines();
    let l = lines.read().unwrap();
    assert!(l.index);
    assert!(!l.a && !l.b);

    let (rig, _clock) = rig_at(90.0);
    let l = rig.lines().read().unwrap();
    assert!(!l.index);
}

fn rig_at(start_deg: f64) -> (SimRig, TestClock) {
    make_rig(SimParams {
        start_deg,
        ..SimParams::default()
    })
}

#[rstest]
#[case(false, 1.0)]
#[case(true, -1.0)]
fn shaft_turns_with_the_drive(#[case] reverse: bool, #[case] sense: f64) {
    let (rig, clock) = rig_at(10.0);
    let mut motor = rig.motor();
    motor.set_reverse(reverse).unwrap();
    motor.set_level(500).unwrap();
    motor.set_enable(true).unwrap();
    let speed = rig.shaft_speed();
    assert!(speed * sense > 0.0, "speed={speed}");

    clock.advance(Duration::from_secs(1));
    let moved = rig.angle_deg() - 10.0;
    assert!((moved - speed).abs() < 1e-6, "moved={moved} speed={speed}");

    motor.set_enable(false).unwrap();
    let parked = rig.angle_deg();
    clock.advance(Duration::from_secs(1));
    assert_eq!(rig.angle_deg(), parked);
}

#[test]
fn tiny_commands_stall() {
    let (rig, _clock) = rig_at(0.0);
    let mut motor = rig.motor();
    motor.set_enable(true).unwrap();
    motor.set_level(10).unwrap();
    assert_eq!(rig.shaft_speed(), 0.0);
}

#[test]
fn lines_walk_the_gray_sequence_forward() {
    let (rig, clock) = rig_at(0.0);
    let mut lines = rig.lines();
    let mut motor = rig.motor();
    motor.set_level(1023).unwrap();
    motor.set_enable(true).unwrap();

    let mut seen = vec![lines.read().unwrap()];
    while seen.len() < 5 {
        clock.advance(Duration::from_micros(200));
        let l = lines.read().unwrap();
        if Some(&l) != seen.last() {
            seen.push(l);
        }
    }
    let ab: Vec<(bool, bool)> = seen.iter().map(|l| (l.a, l.b)).collect();
    assert_eq!(
        ab,
        vec![
            (false, false),
            (true, false),
            (true, true),
            (false, true),
            (false, false)
        ]
    );
}

#[test]
fn injected_faults_surface_as_sim_errors() {
    let (rig, _clock) = make_rig(SimParams {
        fault: SimFault::Lines,
        ..SimParams::default()
    });
    let err = rig.lines().read().unwrap_err();
    assert!(matches!(err.downcast_ref::<HwError>(), Some(HwError::Sim(_))));

    let (rig, _clock) = make_rig(SimParams {
        fault: SimFault::Motor,
        ..SimParams::default()
    });
    assert!(rig.motor().set_level(1).is_err());
}
