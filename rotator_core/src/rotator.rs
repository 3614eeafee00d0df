//! The rotator aggregate: one encoder, one output stage, one controller and
//! the calibration state machine, advanced together by `step()`.

use crate::actuator::{Actuator, TransferFunction};
use crate::calibration::{CalibrationCtx, CalibrationEvent, CalibrationState, Calibrator};
use crate::config::{MotionRange, TrackerCfg};
use crate::controller::{Arrival, ControlOutput, PositionController};
use crate::encoder::{EncoderHandle, EncoderSnapshot};
use crate::error::{Result, RotatorError};
use crate::hw_error::report;
use crate::settings::{Setting, UNKNOWN_POSITION_DEG, WriteMode};
use crate::status::StatusFlags;
use crate::timer::MsTimer;
use rotator_traits::clock::Clock;
use rotator_traits::{InputLines, MotorDriver};
use std::sync::Arc;
use std::time::Duration;

/// What happened during one `Rotator::step`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepReport {
    pub arrival: Option<Arrival>,
    pub calibration: Option<CalibrationEvent>,
}

pub struct Rotator<M: MotorDriver = Box<dyn MotorDriver + Send>> {
    pub(crate) encoder: EncoderHandle,
    pub(crate) actuator: Actuator<M>,
    pub(crate) controller: PositionController,
    pub(crate) calibrator: Calibrator,
    pub(crate) report_timer: MsTimer,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) tracker_cfg: TrackerCfg,
    pub(crate) range: MotionRange,
    pub(crate) last_arrival: Option<Arrival>,
}

impl<M: MotorDriver> std::fmt::Debug for Rotator<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rotator")
            .field("encoder", &self.encoder)
            .field("actuator", &self.actuator)
            .field("controller", &self.controller)
            .field("calibration", &self.calibrator.state())
            .finish_non_exhaustive()
    }
}

impl<M: MotorDriver> Rotator<M> {
    /// Power-up sequence: settle, adopt the current line levels, define the
    /// current position as 0 and make sure the motor is off.
    pub fn boot<L: InputLines + ?Sized>(&mut self, lines: &mut L) -> Result<()> {
        self.clock
            .sleep(Duration::from_millis(self.tracker_cfg.startup_delay_ms));
        let levels = lines.read().map_err(report)?;
        self.encoder.prime(levels);
        self.encoder.set_position_deg(0.0)?;
        self.halt()?;
        tracing::info!(zero_known = levels.index, "rotator booted");
        Ok(())
    }

    /// One main-loop iteration. Never blocks.
    pub fn step(&mut self) -> Result<StepReport> {
        let snap = self.encoder.snapshot();
        let mut out = StepReport::default();

        if self.calibrator.is_busy() {
            let event = self.calibrator.tick(CalibrationCtx {
                snapshot: &snap,
                controller: &mut self.controller,
                encoder: &self.encoder,
                drive_speed: self.actuator.estimated_speed(),
            })?;
            if let Some(CalibrationEvent::GaveUp { .. }) = event {
                self.controller.stop();
                self.halt()?;
            }
            out.calibration = event;
        }

        match self.controller.tick(&snap) {
            ControlOutput::Idle | ControlOutput::Hold => {}
            ControlOutput::Drive(speed) => {
                self.actuator.drive(speed)?;
            }
            ControlOutput::Stop { arrival } => {
                self.halt()?;
                if arrival.is_some() {
                    self.last_arrival = arrival;
                    out.arrival = arrival;
                }
            }
        }

        self.report_position(&snap);
        Ok(out)
    }

    fn report_position(&mut self, snap: &EncoderSnapshot) {
        if !self.controller.is_enabled() {
            self.report_timer.stop();
            return;
        }
        if !self.report_timer.enabled() {
            self.report_timer.start(self.controller.cfg().report_ms);
            return;
        }
        if self.report_timer.poll() {
            tracing::info!(
                position = snap.position_deg,
                speed = snap.instant_speed,
                target = self.controller.target(),
                "position"
            );
            self.report_timer.reset();
        }
    }

    /// Motor off and speed estimate cleared.
    fn halt(&mut self) -> Result<()> {
        self.actuator.stop()?;
        self.encoder.reset_speed();
        Ok(())
    }

    /// Drive once at the slowest non-zero speed, then halt. Refused unless idle.
    ///
    /// Returns the DAC level that was written.
    pub fn pulse_outputs(&mut self) -> Result<u16> {
        if !self.is_idle() {
            return Err(eyre::Report::new(RotatorError::Moving("pulse outputs")));
        }
        let speed = self.actuator.cfg().abs_min_speed;
        let level = self.actuator.drive(speed)?;
        self.halt()?;
        Ok(level)
    }

    fn start_move(&mut self, target: f32) -> Result<()> {
        let snap = self.encoder.snapshot();
        self.controller
            .start(target, snap.position_deg, self.actuator.estimated_speed())?;
        Ok(())
    }

    /// Move to an absolute position in degrees. Refused while calibrating.
    pub fn goto(&mut self, target: f32) -> Result<()> {
        if self.calibrator.is_busy() {
            tracing::warn!(target, "goto refused during calibration");
            return Err(eyre::Report::new(RotatorError::Busy));
        }
        self.start_move(target)
    }

    /// Move by `delta` degrees from the current target (when moving) or the
    /// current position.
    pub fn goto_relative(&mut self, delta: f32) -> Result<()> {
        let base = if self.controller.is_enabled() {
            self.controller.target()
        } else {
            self.encoder.snapshot().position_deg
        };
        self.goto(base + delta)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.controller.stop();
        self.halt()
    }

    /// Emergency stop: drop the enable output, disable the controller and
    /// abandon any calibration, with no arrival bookkeeping.
    pub fn kill_motor(&mut self) -> Result<()> {
        self.controller.kill();
        self.calibrator.abort();
        self.report_timer.stop();
        self.actuator.kill()?;
        self.encoder.reset_speed();
        tracing::warn!("motor killed");
        Ok(())
    }

    pub fn start_calibration(&mut self) -> Result<()> {
        let snap = self.encoder.snapshot();
        self.calibrator.start(
            &mut self.controller,
            snap.position_deg,
            self.actuator.estimated_speed(),
        )?;
        Ok(())
    }

    /// Redefine the current position. Refused while the shaft turns.
    pub fn set_position(&mut self, deg: f32) -> Result<()> {
        if !self.range.contains(deg) {
            return Err(eyre::Report::new(RotatorError::Range {
                name: "position",
                value: deg,
                min: self.range.min_deg,
                max: self.range.max_deg,
            }));
        }
        self.encoder.set_position_deg(deg).map_err(|e| {
            tracing::warn!(error = %e, deg, "set position rejected");
            eyre::Report::new(e)
        })
    }

    pub fn set_transfer(&mut self, transfer: TransferFunction) {
        self.actuator.set_transfer(transfer);
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> EncoderSnapshot {
        self.encoder.snapshot()
    }

    pub fn status(&self) -> StatusFlags {
        let mut s = StatusFlags::from_bits(StatusFlags::OK);
        s.set(StatusFlags::MOVING, self.actuator.is_enabled());
        s.set(
            StatusFlags::DIRECTION,
            self.actuator.is_enabled() && self.actuator.direction() < 0.0,
        );
        s.set(StatusFlags::PID_BUSY, self.controller.is_enabled());
        s.set(StatusFlags::PID_DONE, self.controller.is_done());
        s.set(StatusFlags::CALIB_BUSY, self.calibrator.is_busy());
        s
    }

    /// Nothing moving and nothing pending.
    pub fn is_idle(&self) -> bool {
        !self.controller.is_enabled() && !self.calibrator.is_busy()
    }

    pub fn calibration_state(&self) -> CalibrationState {
        self.calibrator.state()
    }

    pub fn last_arrival(&self) -> Option<Arrival> {
        self.last_arrival
    }

    pub fn encoder(&self) -> &EncoderHandle {
        &self.encoder
    }

    pub fn actuator(&self) -> &Actuator<M> {
        &self.actuator
    }

    pub fn controller(&self) -> &PositionController {
        &self.controller
    }

    pub fn clock(&self) -> Arc<dyn Clock + Send + Sync> {
        self.clock.clone()
    }

    pub fn tracker_cfg(&self) -> &TrackerCfg {
        &self.tracker_cfg
    }

    pub fn range(&self) -> MotionRange {
        self.range
    }

    // ── Settings ────────────────────────────────────────────────────────────

    pub fn read_setting(&self, setting: Setting) -> f32 {
        let snap = self.encoder.snapshot();
        let c = self.controller.cfg();
        let tf = self.actuator.transfer();
        match setting {
            Setting::Position => snap.position_deg,
            Setting::Target => self.controller.target(),
            Setting::MaxSpeed => c.max_speed,
            Setting::MinSpeed => c.min_speed,
            Setting::MaxAccel => c.max_accel,
            Setting::Kp => c.kp,
            Setting::Ki => c.ki,
            Setting::Kd => c.kd,
            Setting::Period => c.period_s,
            Setting::Bias => c.bias,
            Setting::XferPosSlope => tf.positive.slope,
            Setting::XferPosIntercept => tf.positive.intercept,
            Setting::XferNegSlope => tf.negative.slope,
            Setting::XferNegIntercept => tf.negative.intercept,
            Setting::DistanceToTarget => self.controller.distance_to_target(),
            Setting::TimeToTarget => self.controller.time_to_target(),
            Setting::Offset => snap.zero_offset_deg.unwrap_or(UNKNOWN_POSITION_DEG),
            Setting::RealPosition => snap.real_position_deg.unwrap_or(UNKNOWN_POSITION_DEG),
            Setting::Speed => snap.instant_speed,
            Setting::SpeedAvg => snap.average_speed,
            Setting::SpeedDac => self.actuator.estimated_speed(),
            Setting::Status => f32::from(self.status().bits()),
        }
    }

    /// Apply a setting and return the value now in effect.
    ///
    /// Out-of-range values are rejected with the state unchanged.
    /// `target` starts a move; `position` redefines the current position.
    pub fn write_setting(&mut self, setting: Setting, value: f32, mode: WriteMode) -> Result<f32> {
        if !setting.is_writable() {
            return Err(eyre::Report::new(RotatorError::ReadOnly(setting.name())));
        }
        let value = match mode {
            WriteMode::Absolute => value,
            WriteMode::Relative => self.read_setting(setting) + value,
        };

        match setting {
            Setting::Position => self.set_position(value)?,
            Setting::Target => self.goto(value)?,
            Setting::MaxSpeed => {
                let v = setting.check(value)?;
                let min = self.controller.cfg().min_speed;
                if v < min {
                    return Err(eyre::Report::new(RotatorError::Range {
                        name: "maxspd",
                        value: v,
                        min,
                        max: 36.0,
                    }));
                }
                self.controller.set_max_speed(v);
            }
            Setting::MinSpeed => {
                let v = setting.check(value)?;
                let max = self.controller.cfg().max_speed;
                if v > max {
                    return Err(eyre::Report::new(RotatorError::Range {
                        name: "minspd",
                        value: v,
                        min: 0.5,
                        max,
                    }));
                }
                self.controller.set_min_speed(v);
            }
            Setting::MaxAccel => self.controller.set_max_accel(setting.check(value)?),
            Setting::Kp => self.controller.set_kp(setting.check(value)?),
            Setting::Ki => self.controller.set_ki(setting.check(value)?),
            Setting::Kd => self.controller.set_kd(setting.check(value)?),
            Setting::Period => self.controller.set_period(setting.check(value)?),
            Setting::Bias => self.controller.set_bias(setting.check(value)?),
            Setting::XferPosSlope
            | Setting::XferPosIntercept
            | Setting::XferNegSlope
            | Setting::XferNegIntercept => {
                let v = setting.check(value)?;
                let mut tf = self.actuator.transfer();
                match setting {
                    Setting::XferPosSlope => tf.positive.slope = v,
                    Setting::XferPosIntercept => tf.positive.intercept = v,
                    Setting::XferNegSlope => tf.negative.slope = v,
                    _ => tf.negative.intercept = v,
                }
                self.actuator.set_transfer(tf);
            }
            _ => return Err(eyre::Report::new(RotatorError::ReadOnly(setting.name()))),
        }
        tracing::debug!(setting = setting.name(), value, "setting written");
        Ok(self.read_setting(setting))
    }
}
