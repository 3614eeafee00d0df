//! Runtime configuration types for the motion core.
//!
//! These are the structs the core actually consumes. They are separate from
//! the TOML-deserialized schema in `rotator_config`; see `conversions`.

/// Encoder geometry, debounce and sampling parameters.
#[derive(Debug, Clone)]
pub struct TrackerCfg {
    /// Physical lines per revolution (pulses per revolution is 4x this).
    pub lines_per_rev: u32,
    /// Consecutive samples needed before a level change is accepted.
    pub debounce_count: u8,
    /// Sampling tick period in microseconds.
    pub sample_period_us: u64,
    /// Pulse periods kept for the averaged speed.
    pub history_len: usize,
    /// Settling delay tolerated once at boot.
    pub startup_delay_ms: u64,
}

impl TrackerCfg {
    /// Pulses per revolution after 4x quadrature multiplication.
    #[inline]
    pub fn ppr(&self) -> i32 {
        i32::try_from(self.lines_per_rev.saturating_mul(4)).unwrap_or(i32::MAX & !1)
    }

    /// Angle of a single pulse in degrees.
    #[inline]
    pub fn pulse_deg(&self) -> f32 {
        360.0 / self.ppr().max(1) as f32
    }
}

impl Default for TrackerCfg {
    fn default() -> Self {
        Self {
            lines_per_rev: 1024,
            debounce_count: 2,
            sample_period_us: 200,
            history_len: 20,
            startup_delay_ms: 100,
        }
    }
}

/// Output stage limits.
#[derive(Debug, Clone)]
pub struct ActuatorCfg {
    /// Largest level accepted by the DAC.
    pub max_level: u16,
    /// Full-scale speed in deg/s (maps to `max_level`).
    pub abs_max_speed: f32,
    /// Smallest non-zero speed the stage will emit, deg/s.
    pub abs_min_speed: f32,
    /// Swap the polarity of the reverse output.
    pub invert_direction: bool,
}

impl ActuatorCfg {
    /// deg/s represented by one DAC level.
    #[inline]
    pub fn resolution(&self) -> f32 {
        self.abs_max_speed / f32::from(self.max_level.max(1))
    }
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self {
            max_level: 1023,
            abs_max_speed: 36.0,
            abs_min_speed: 0.5,
            invert_direction: false,
        }
    }
}

/// Gains and motion limits of the position controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerCfg {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Control period in seconds.
    pub period_s: f32,
    pub bias: f32,
    /// deg/s^2
    pub max_accel: f32,
    /// deg/s
    pub max_speed: f32,
    /// deg/s; below this (and within one pulse) the target counts as reached.
    pub min_speed: f32,
    /// Position report interval while moving.
    pub report_ms: u64,
}

impl Default for ControllerCfg {
    fn default() -> Self {
        Self {
            kp: 80.0,
            ki: 0.4,
            kd: 2.0,
            period_s: 0.01,
            bias: 0.0,
            max_accel: 9.0,
            max_speed: 36.0,
            min_speed: 1.5,
            report_ms: 500,
        }
    }
}

/// Commandable position window in degrees (inclusive).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionRange {
    pub min_deg: f32,
    pub max_deg: f32,
}

impl MotionRange {
    #[inline]
    pub fn contains(&self, deg: f32) -> bool {
        deg.is_finite() && (self.min_deg..=self.max_deg).contains(&deg)
    }
}

impl Default for MotionRange {
    fn default() -> Self {
        Self {
            min_deg: -540.0,
            max_deg: 540.0,
        }
    }
}

/// Zero-seeking parameters.
#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    /// Length of each sweep, deg.
    pub sweep_deg: f32,
    /// Failed index verifications tolerated; `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            sweep_deg: 360.0,
            max_retries: None,
        }
    }
}

/// Main-loop pacing for `runner::run`.
#[derive(Debug, Clone)]
pub struct RunnerCfg {
    pub loop_period_ms: u64,
    /// 0 disables the timeout.
    pub timeout_ms: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            loop_period_ms: 1,
            timeout_ms: 0,
        }
    }
}
