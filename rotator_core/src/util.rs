//! Small numeric helpers shared by the tracker and the controller.

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;
/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Convert a control period in seconds to whole milliseconds (at least 1).
#[inline]
pub fn period_ms(period_s: f32) -> u64 {
    if !(period_s.is_finite() && period_s > 0.0) {
        return 1;
    }
    ((period_s * MILLIS_PER_SEC as f32).round() as u64).max(1)
}

/// Reduce `value` modulo `modulus` into the half-open window
/// `[-modulus/2, modulus/2)`. Works for negative inputs and values spanning
/// several revolutions.
#[inline]
pub fn wrap_half_open(value: i32, modulus: i32) -> i32 {
    debug_assert!(modulus > 0 && modulus % 2 == 0, "modulus must be even and > 0");
    let r = value.rem_euclid(modulus);
    if r >= modulus / 2 { r - modulus } else { r }
}

/// Sign of `x` as -1.0, 0.0 or 1.0 (unlike `f32::signum`, zero maps to zero).
#[inline]
pub fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_covers_both_ends() {
        assert_eq!(wrap_half_open(0, 4096), 0);
        assert_eq!(wrap_half_open(2047, 4096), 2047);
        assert_eq!(wrap_half_open(2048, 4096), -2048);
        assert_eq!(wrap_half_open(-2048, 4096), -2048);
        assert_eq!(wrap_half_open(-2049, 4096), 2047);
        assert_eq!(wrap_half_open(4096 * 3 + 5, 4096), 5);
        assert_eq!(wrap_half_open(-4096 * 3 - 5, 4096), -5);
    }

    #[test]
    fn sign_of_zero_is_zero() {
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(-0.0), 0.0);
        assert_eq!(sign(3.0), 1.0);
        assert_eq!(sign(-0.1), -1.0);
    }
}
