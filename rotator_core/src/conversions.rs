//! `From` implementations bridging `rotator_config` types to `rotator_core` types.

use crate::actuator::{Linear, TransferFunction};
use crate::config::{
    ActuatorCfg, CalibrationCfg, ControllerCfg, MotionRange, RunnerCfg, TrackerCfg,
};

// ── Encoder ──────────────────────────────────────────────────────────────────

impl From<&rotator_config::EncoderCfg> for TrackerCfg {
    fn from(c: &rotator_config::EncoderCfg) -> Self {
        Self {
            lines_per_rev: c.lines_per_rev,
            debounce_count: c.debounce_count,
            sample_period_us: c.sample_period_us,
            history_len: c.history_len,
            startup_delay_ms: c.startup_delay_ms,
        }
    }
}

// ── Actuator ─────────────────────────────────────────────────────────────────

impl From<&rotator_config::ActuatorCfg> for ActuatorCfg {
    fn from(c: &rotator_config::ActuatorCfg) -> Self {
        Self {
            max_level: c.max_level,
            abs_max_speed: c.abs_max_speed,
            abs_min_speed: c.abs_min_speed,
            invert_direction: c.invert_direction,
        }
    }
}

impl From<&rotator_config::TransferCfg> for TransferFunction {
    fn from(c: &rotator_config::TransferCfg) -> Self {
        Self {
            positive: Linear {
                slope: c.pos_slope,
                intercept: c.pos_intercept,
            },
            negative: Linear {
                slope: c.neg_slope,
                intercept: c.neg_intercept,
            },
        }
    }
}

impl From<&rotator_config::TransferFit> for TransferFunction {
    fn from(f: &rotator_config::TransferFit) -> Self {
        Self::from(&rotator_config::TransferCfg::from(*f))
    }
}

// ── Controller ───────────────────────────────────────────────────────────────

impl From<&rotator_config::ControllerCfg> for ControllerCfg {
    fn from(c: &rotator_config::ControllerCfg) -> Self {
        Self {
            kp: c.kp,
            ki: c.ki,
            kd: c.kd,
            period_s: c.period_s,
            bias: c.bias,
            max_accel: c.max_accel,
            max_speed: c.max_speed,
            min_speed: c.min_speed,
            report_ms: c.report_ms,
        }
    }
}

impl From<&rotator_config::LimitsCfg> for MotionRange {
    fn from(c: &rotator_config::LimitsCfg) -> Self {
        Self {
            min_deg: c.min_deg,
            max_deg: c.max_deg,
        }
    }
}

// ── Calibration / runner ─────────────────────────────────────────────────────

impl From<&rotator_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &rotator_config::CalibrationCfg) -> Self {
        Self {
            sweep_deg: c.sweep_deg,
            max_retries: c.max_retries,
        }
    }
}

impl From<&rotator_config::RunnerCfg> for RunnerCfg {
    fn from(c: &rotator_config::RunnerCfg) -> Self {
        Self {
            loop_period_ms: c.loop_period_ms,
            timeout_ms: c.timeout_ms,
        }
    }
}
