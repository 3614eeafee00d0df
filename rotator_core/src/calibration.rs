//! Zero-seeking calibration.
//!
//! `SearchingZero` sweeps one revolution until the tracker has seen the
//! index pulse, then `GoingToZero` drives onto the recorded offset and checks
//! the live index line. A miss invalidates the zero and starts a new sweep.

use crate::config::CalibrationCfg;
use crate::controller::PositionController;
use crate::encoder::{EncoderHandle, EncoderSnapshot};
use crate::error::RotatorError;

/// Offsets further out than this are treated as bogus.
const SANE_OFFSET_DEG: f32 = 361.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationState {
    #[default]
    Idle,
    SearchingZero,
    GoingToZero,
}

impl CalibrationState {
    pub fn as_str(self) -> &'static str {
        match self {
            CalibrationState::Idle => "idle",
            CalibrationState::SearchingZero => "searching_zero",
            CalibrationState::GoingToZero => "going_to_zero",
        }
    }
}

impl std::fmt::Display for CalibrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationEvent {
    ZeroFound { offset_deg: f32 },
    Completed,
    Retrying { attempt: u32 },
    GaveUp { attempts: u32 },
}

/// Everything a calibration tick may look at or touch.
pub struct CalibrationCtx<'a> {
    pub snapshot: &'a EncoderSnapshot,
    pub controller: &'a mut PositionController,
    pub encoder: &'a EncoderHandle,
    /// Speed the output stage currently produces, for restarts.
    pub drive_speed: f32,
}

#[derive(Debug, Clone)]
pub struct Calibrator {
    cfg: CalibrationCfg,
    state: CalibrationState,
    attempts: u32,
}

impl Calibrator {
    pub fn new(cfg: CalibrationCfg) -> Self {
        Self {
            cfg,
            state: CalibrationState::Idle,
            attempts: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> CalibrationState {
        self.state
    }

    #[inline]
    pub fn is_busy(&self) -> bool {
        self.state != CalibrationState::Idle
    }

    /// Failed verifications in the current run.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn sweep_target(&self, controller: &PositionController, from_deg: f32) -> f32 {
        let range = controller.range();
        let up = from_deg + self.cfg.sweep_deg;
        if up <= range.max_deg {
            up
        } else {
            from_deg - self.cfg.sweep_deg
        }
    }

    fn sweep(
        &mut self,
        controller: &mut PositionController,
        from_deg: f32,
        speed: f32,
    ) -> Result<(), RotatorError> {
        let target = self.sweep_target(controller, from_deg);
        controller.start(target, from_deg, speed)?;
        self.state = CalibrationState::SearchingZero;
        tracing::debug!(from = from_deg, target, attempt = self.attempts, "calibration sweep");
        Ok(())
    }

    pub fn start(
        &mut self,
        controller: &mut PositionController,
        position_deg: f32,
        speed: f32,
    ) -> Result<(), RotatorError> {
        self.attempts = 0;
        self.sweep(controller, position_deg, speed)?;
        tracing::info!(position = position_deg, "calibration started");
        Ok(())
    }

    pub fn abort(&mut self) {
        if self.is_busy() {
            tracing::warn!(state = %self.state, "calibration aborted");
        }
        self.state = CalibrationState::Idle;
    }

    pub fn tick(&mut self, ctx: CalibrationCtx<'_>) -> Result<Option<CalibrationEvent>, RotatorError> {
        let CalibrationCtx {
            snapshot,
            controller,
            encoder,
            drive_speed,
        } = ctx;

        match self.state {
            CalibrationState::Idle => Ok(None),
            CalibrationState::SearchingZero => {
                if let Some(offset) = snapshot.zero_offset_deg
                    && offset.abs() < SANE_OFFSET_DEG
                {
                    if controller.is_enabled() {
                        controller.retarget(offset)?;
                    } else {
                        controller.start(offset, snapshot.position_deg, drive_speed)?;
                    }
                    self.state = CalibrationState::GoingToZero;
                    tracing::debug!(offset, "zero index found");
                    return Ok(Some(CalibrationEvent::ZeroFound { offset_deg: offset }));
                }
                if controller.is_done() {
                    // Swept a full turn without seeing the index.
                    return self.retry(controller, encoder, snapshot.position_deg, drive_speed);
                }
                Ok(None)
            }
            CalibrationState::GoingToZero => {
                if !(controller.is_done() && !controller.is_enabled()) {
                    return Ok(None);
                }
                if snapshot.at_index {
                    encoder.settle_at_zero();
                    self.state = CalibrationState::Idle;
                    tracing::info!(retries = self.attempts, "calibration complete");
                    Ok(Some(CalibrationEvent::Completed))
                } else {
                    self.retry(controller, encoder, snapshot.position_deg, drive_speed)
                }
            }
        }
    }

    fn retry(
        &mut self,
        controller: &mut PositionController,
        encoder: &EncoderHandle,
        position_deg: f32,
        speed: f32,
    ) -> Result<Option<CalibrationEvent>, RotatorError> {
        self.attempts = self.attempts.saturating_add(1);
        if let Some(max) = self.cfg.max_retries
            && self.attempts >= max
        {
            self.state = CalibrationState::Idle;
            tracing::warn!(attempts = self.attempts, "calibration gave up");
            return Ok(Some(CalibrationEvent::GaveUp {
                attempts: self.attempts,
            }));
        }
        encoder.forget_zero();
        self.sweep(controller, position_deg, speed)?;
        tracing::warn!(attempt = self.attempts, "index not confirmed, sweeping again");
        Ok(Some(CalibrationEvent::Retrying {
            attempt: self.attempts,
        }))
    }
}
