use proptest::prelude::*;
use rotator_core::config::TrackerCfg;
use rotator_core::encoder::QuadratureTracker;
use rotator_traits::LineLevels;

const PPR: i32 = 4096;

fn gray(n: i64, index: bool) -> LineLevels {
    let (a, b) = match n.rem_euclid(4) {
        0 => (false, false),
        1 => (true, false),
        2 => (true, true),
        _ => (false, true),
    };
    LineLevels::new(a, b, index)
}

/// Hold `levels` long enough for the debouncers to commit; returns the
/// summed pulse step.
fn hold(t: &mut QuadratureTracker, levels: LineLevels, now: &mut u64) -> i32 {
    let mut step = 0;
    for _ in 0..3 {
        *now += 200;
        step += t.sample(levels, *now).step;
    }
    step
}

proptest! {
    #[test]
    fn each_valid_transition_moves_exactly_one_pulse(moves in prop::collection::vec(any::<bool>(), 1..300)) {
        let mut t = QuadratureTracker::new(TrackerCfg::default());
        let mut now = 0u64;
        let mut phase: i64 = 0;
        t.prime(gray(phase, false), now);
        let mut expected = 0i32;
        for fwd in moves {
            let before = t.position();
            phase += if fwd { 1 } else { -1 };
            expected += if fwd { 1 } else { -1 };
            let step = hold(&mut t, gray(phase, false), &mut now);
            prop_assert_eq!(step, if fwd { 1 } else { -1 });
            prop_assert_eq!((t.position() - before).abs(), 1);
        }
        prop_assert_eq!(t.position(), expected);
    }

    #[test]
    fn offset_and_real_position_stay_in_half_open_window(start in -200_000i32..200_000, walk in -50i64..50) {
        let mut t = QuadratureTracker::new(TrackerCfg::default());
        let mut now = 0u64;
        t.prime(gray(0, false), now);
        let start_deg = start as f32 * t.pulse_deg();
        // Redefining position on an idle tracker is always allowed.
        prop_assert!(t.set_position_deg(start_deg).is_ok());
        prop_assert_eq!(t.position(), start);

        hold(&mut t, gray(0, true), &mut now);
        let snap = t.snapshot();
        prop_assert!(snap.zero_known);
        let off = snap.zero_offset_deg.unwrap();
        prop_assert!((-180.0..180.0).contains(&off), "offset {}", off);

        // Walk away from the index and check the real position window.
        let mut phase = 0i64;
        let dir = walk.signum();
        for _ in 0..walk.abs() {
            phase += dir;
            hold(&mut t, gray(phase, false), &mut now);
        }
        let real = t.real_position_deg().unwrap();
        prop_assert!((-180.0..180.0).contains(&real), "real {}", real);
        let expected = ((walk as i32 + PPR / 2).rem_euclid(PPR) - PPR / 2) as f32 * t.pulse_deg();
        prop_assert!((real - expected).abs() < 1e-3);
    }
}
