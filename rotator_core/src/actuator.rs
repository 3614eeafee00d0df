//! Actuator linearization and output stage.
//!
//! A speed command in deg/s is corrected through a per-direction linear
//! transfer function, quantized to a DAC level and written to the motor
//! driver together with the enable and reverse outputs.

use crate::config::ActuatorCfg;
use crate::error::Result;
use crate::hw_error::report;
use crate::util::sign;
use rotator_traits::MotorDriver;

/// `y = slope * x + intercept`, where `x` is the drive command and `y` the
/// resulting shaft speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Linear {
    pub slope: f32,
    pub intercept: f32,
}

/// Transfer function with separate coefficients per rotation sense.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferFunction {
    pub positive: Linear,
    pub negative: Linear,
}

impl Default for TransferFunction {
    fn default() -> Self {
        Self {
            positive: Linear {
                slope: 1.1417,
                intercept: -1.3754,
            },
            negative: Linear {
                slope: 1.1598,
                intercept: 1.1071,
            },
        }
    }
}

impl TransferFunction {
    #[inline]
    fn quadrant(&self, x: f32) -> Option<&Linear> {
        if x > 0.0 {
            Some(&self.positive)
        } else if x < 0.0 {
            Some(&self.negative)
        } else {
            None
        }
    }

    /// Desired shaft speed to drive command.
    pub fn forward(&self, speed: f32) -> f32 {
        self.quadrant(speed)
            .map_or(0.0, |l| (speed - l.intercept) / l.slope)
    }

    /// Drive command to expected shaft speed.
    pub fn inverse(&self, command: f32) -> f32 {
        self.quadrant(command)
            .map_or(0.0, |l| command * l.slope + l.intercept)
    }
}

pub struct Actuator<M: MotorDriver> {
    motor: M,
    cfg: ActuatorCfg,
    transfer: TransferFunction,
    resolution: f32,
    level: u16,
    reverse: bool,
    enabled: bool,
    /// Sign of the last non-zero command.
    direction: f32,
}

impl<M: MotorDriver> std::fmt::Debug for Actuator<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actuator")
            .field("level", &self.level)
            .field("enabled", &self.enabled)
            .field("reverse", &self.reverse)
            .field("transfer", &self.transfer)
            .finish_non_exhaustive()
    }
}

impl<M: MotorDriver> Actuator<M> {
    pub fn new(motor: M, cfg: ActuatorCfg, transfer: TransferFunction) -> Self {
        let resolution = cfg.resolution();
        Self {
            motor,
            cfg,
            transfer,
            resolution,
            level: 0,
            reverse: false,
            enabled: false,
            direction: 0.0,
        }
    }

    /// Command a shaft speed in deg/s. Returns the level written.
    ///
    /// Zero (or a non-finite value) releases the enable output. Non-zero
    /// magnitudes are clamped into `[abs_min_speed, abs_max_speed]`.
    pub fn drive(&mut self, speed: f32) -> Result<u16> {
        if speed == 0.0 || !speed.is_finite() {
            self.motor.set_enable(false).map_err(report)?;
            self.motor.set_level(0).map_err(report)?;
            self.enabled = false;
            self.level = 0;
            return Ok(0);
        }

        let s = sign(speed);
        let magnitude = speed
            .abs()
            .clamp(self.cfg.abs_min_speed, self.cfg.abs_max_speed);
        let adjusted = self.transfer.forward(s * magnitude) * s;
        // Truncate: never command more than asked for.
        let level = (adjusted.max(0.0) / self.resolution) as u32;
        let level = u16::try_from(level)
            .unwrap_or(u16::MAX)
            .min(self.cfg.max_level);
        let reverse = (s < 0.0) ^ self.cfg.invert_direction;

        self.motor.set_enable(level != 0).map_err(report)?;
        self.motor.set_reverse(reverse).map_err(report)?;
        self.motor.set_level(level).map_err(report)?;

        self.enabled = level != 0;
        self.reverse = reverse;
        self.level = level;
        self.direction = s;
        tracing::trace!(speed, level, reverse, "actuator drive");
        Ok(level)
    }

    /// Zero level with the enable output released.
    pub fn stop(&mut self) -> Result<()> {
        self.drive(0.0).map(|_| ())
    }

    /// Drop the enable output only; the level register is left as is.
    pub fn kill(&mut self) -> Result<()> {
        self.enabled = false;
        self.motor.set_enable(false).map_err(report)
    }

    /// Expected shaft speed for the level currently applied.
    pub fn estimated_speed(&self) -> f32 {
        if !self.enabled || self.level == 0 {
            return 0.0;
        }
        let command = f32::from(self.level) * self.resolution * self.direction;
        self.transfer.inverse(command)
    }

    #[inline]
    pub fn level(&self) -> u16 {
        self.level
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sign of the last non-zero command: -1.0, 1.0, or 0.0 before any.
    #[inline]
    pub fn direction(&self) -> f32 {
        self.direction
    }

    #[inline]
    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    pub fn transfer(&self) -> TransferFunction {
        self.transfer
    }

    pub fn set_transfer(&mut self, transfer: TransferFunction) {
        self.transfer = transfer;
    }

    pub fn cfg(&self) -> &ActuatorCfg {
        &self.cfg
    }

    pub fn motor(&self) -> &M {
        &self.motor
    }

    pub fn motor_mut(&mut self) -> &mut M {
        &mut self.motor
    }
}
