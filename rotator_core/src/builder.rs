//! Type-state builder for `Rotator` and the generic `build_rotator` constructor.
//!
//! The builder enforces at compile time that a motor driver is provided
//! before `build()` is available. `try_build()` is always available for
//! dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use rotator_traits::MotorDriver;
use rotator_traits::clock::{Clock, MonotonicClock};

use crate::actuator::{Actuator, TransferFunction};
use crate::calibration::Calibrator;
use crate::config::{ActuatorCfg, CalibrationCfg, ControllerCfg, MotionRange, TrackerCfg};
use crate::controller::PositionController;
use crate::encoder::{EncoderHandle, QuadratureTracker};
use crate::error::{BuildError, Result};
use crate::rotator::Rotator;
use crate::timer::MsTimer;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Rotator`. All parts are validated on `build()`.
pub struct RotatorBuilder<M> {
    motor: Option<Box<dyn MotorDriver + Send>>,
    tracker: Option<TrackerCfg>,
    actuator: Option<ActuatorCfg>,
    transfer: Option<TransferFunction>,
    controller: Option<ControllerCfg>,
    range: Option<MotionRange>,
    calibration: Option<CalibrationCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _m: PhantomData<M>,
}

impl Default for RotatorBuilder<Missing> {
    fn default() -> Self {
        Self {
            motor: None,
            tracker: None,
            actuator: None,
            transfer: None,
            controller: None,
            range: None,
            calibration: None,
            clock: None,
            _m: PhantomData,
        }
    }
}

impl Rotator {
    /// Start building a boxed `Rotator`.
    pub fn builder() -> RotatorBuilder<Missing> {
        RotatorBuilder::default()
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

/// Validate configuration and assemble a `Rotator`.
///
/// Shared by `RotatorBuilder::try_build()` and `build_rotator()`.
#[allow(clippy::too_many_arguments)]
fn validate_and_build<M: MotorDriver>(
    motor: M,
    tracker: TrackerCfg,
    actuator: ActuatorCfg,
    transfer: TransferFunction,
    controller: ControllerCfg,
    range: MotionRange,
    calibration: CalibrationCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<Rotator<M>> {
    // ── Validation ───────────────────────────────────────────────────────────
    if tracker.lines_per_rev == 0 {
        return Err(invalid("lines_per_rev must be >= 1"));
    }
    if tracker.history_len == 0 {
        return Err(invalid("history_len must be >= 1"));
    }
    if tracker.sample_period_us == 0 {
        return Err(invalid("sample_period_us must be >= 1"));
    }
    if actuator.max_level == 0 {
        return Err(invalid("max_level must be >= 1"));
    }
    if !(actuator.abs_min_speed > 0.0 && actuator.abs_max_speed > actuator.abs_min_speed) {
        return Err(invalid("actuator speed limits must satisfy 0 < min < max"));
    }
    for l in [transfer.positive, transfer.negative] {
        if !(l.slope.is_finite() && l.slope > 0.0 && l.intercept.is_finite()) {
            return Err(invalid("transfer slopes must be finite and > 0"));
        }
    }
    if !(controller.period_s.is_finite() && controller.period_s > 0.0) {
        return Err(invalid("controller period must be > 0"));
    }
    if !(controller.max_accel > 0.0) {
        return Err(invalid("max_accel must be > 0"));
    }
    if controller.min_speed > controller.max_speed {
        return Err(invalid("min_speed must be <= max_speed"));
    }
    if !(range.min_deg.is_finite() && range.max_deg.is_finite() && range.min_deg < range.max_deg)
    {
        return Err(invalid("motion range must satisfy min < max"));
    }
    if !(calibration.sweep_deg > 0.0) {
        return Err(invalid("calibration sweep must be > 0"));
    }

    // ── Assemble ─────────────────────────────────────────────────────────────
    let clock: Arc<dyn Clock + Send + Sync> =
        clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));

    let tracker_q = QuadratureTracker::new(tracker.clone());
    let pulse_deg = tracker_q.pulse_deg();
    let encoder = EncoderHandle::new(tracker_q, clock.clone());

    Ok(Rotator {
        encoder,
        actuator: Actuator::new(motor, actuator, transfer),
        controller: PositionController::new(controller, range, pulse_deg, clock.clone()),
        calibrator: Calibrator::new(calibration),
        report_timer: MsTimer::new(clock.clone()),
        clock,
        tracker_cfg: tracker,
        range,
        last_arrival: None,
    })
}

impl<M> RotatorBuilder<M> {
    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<Rotator> {
        let motor = self
            .motor
            .ok_or_else(|| eyre::Report::new(BuildError::MissingMotor))?;
        validate_and_build(
            motor,
            self.tracker.unwrap_or_default(),
            self.actuator.unwrap_or_default(),
            self.transfer.unwrap_or_default(),
            self.controller.unwrap_or_default(),
            self.range.unwrap_or_default(),
            self.calibration.unwrap_or_default(),
            self.clock,
        )
    }

    pub fn with_tracker(mut self, tracker: TrackerCfg) -> Self {
        self.tracker = Some(tracker);
        self
    }
    pub fn with_actuator(mut self, actuator: ActuatorCfg) -> Self {
        self.actuator = Some(actuator);
        self
    }
    pub fn with_transfer(mut self, transfer: TransferFunction) -> Self {
        self.transfer = Some(transfer);
        self
    }
    pub fn with_controller(mut self, controller: ControllerCfg) -> Self {
        self.controller = Some(controller);
        self
    }
    pub fn with_range(mut self, range: MotionRange) -> Self {
        self.range = Some(range);
        self
    }
    pub fn with_calibration(mut self, calibration: CalibrationCfg) -> Self {
        self.calibration = Some(calibration);
        self
    }
    /// Custom clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Apply every section of a loaded configuration file.
    pub fn with_config(self, cfg: &rotator_config::Config) -> Self {
        self.with_tracker((&cfg.encoder).into())
            .with_actuator((&cfg.actuator).into())
            .with_transfer((&cfg.transfer).into())
            .with_controller((&cfg.controller).into())
            .with_range((&cfg.limits).into())
            .with_calibration((&cfg.calibration).into())
    }
}

impl RotatorBuilder<Missing> {
    pub fn with_motor(self, motor: impl MotorDriver + Send + 'static) -> RotatorBuilder<Set> {
        RotatorBuilder {
            motor: Some(Box::new(motor)),
            tracker: self.tracker,
            actuator: self.actuator,
            transfer: self.transfer,
            controller: self.controller,
            range: self.range,
            calibration: self.calibration,
            clock: self.clock,
            _m: PhantomData,
        }
    }
}

impl RotatorBuilder<Set> {
    /// Validate and build. Only available once a motor is set.
    pub fn build(self) -> Result<Rotator> {
        self.try_build()
    }
}

/// Build a statically-dispatched `Rotator<M>` from a concrete motor driver.
#[allow(clippy::too_many_arguments)]
pub fn build_rotator<M: MotorDriver>(
    motor: M,
    tracker: TrackerCfg,
    actuator: ActuatorCfg,
    transfer: TransferFunction,
    controller: ControllerCfg,
    range: MotionRange,
    calibration: CalibrationCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<Rotator<M>> {
    validate_and_build(
        motor,
        tracker,
        actuator,
        transfer,
        controller,
        range,
        calibration,
        clock,
    )
}
