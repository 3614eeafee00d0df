//! Velocity-profile position controller.
//!
//! Each control period the controller derives a speed bound from the
//! remaining distance, `sign(e) * sqrt(2 * max_accel * |e|)`, i.e. the speed
//! from which decelerating at `max_accel` lands on the target at rest. A PID
//! on the difference between that bound and the commanded speed produces
//! the next command, which is then limited in acceleration and magnitude.
//!
//! The arrival test runs on every call; the PID update only when the
//! control-period timer has expired.

use crate::config::{ControllerCfg, MotionRange};
use crate::encoder::EncoderSnapshot;
use crate::error::RotatorError;
use crate::timer::MsTimer;
use crate::util::{period_ms, sign};
use rotator_traits::clock::Clock;
use std::sync::Arc;
use std::time::Instant;

/// Summary of a completed move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arrival {
    /// `target - start_position`, deg.
    pub travel_deg: f32,
    pub elapsed_s: f32,
    /// |travel| / elapsed, deg/s.
    pub avg_speed: f32,
    /// Encoder speed at the moment of arrival.
    pub final_speed: f32,
}

/// What the output stage should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlOutput {
    /// Controller disabled.
    Idle,
    /// Period not elapsed; keep the previous command.
    Hold,
    Drive(f32),
    /// Within one pulse and slow enough: stop the motor.
    Stop { arrival: Option<Arrival> },
}

pub struct PositionController {
    cfg: ControllerCfg,
    range: MotionRange,
    pulse_deg: f32,
    clock: Arc<dyn Clock + Send + Sync>,
    timer: MsTimer,

    target: f32,
    position: f32,
    commanded_speed: f32,
    prev_error: f32,
    integral_error: f32,
    derivative_error: f32,
    last_speed_bound: f32,

    enabled: bool,
    aiming: bool,
    done: bool,

    start_position: f32,
    start_time: Option<Instant>,
    time_to_target: f32,
    distance_to_target: f32,
}

impl std::fmt::Debug for PositionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionController")
            .field("target", &self.target)
            .field("position", &self.position)
            .field("commanded_speed", &self.commanded_speed)
            .field("enabled", &self.enabled)
            .field("aiming", &self.aiming)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl PositionController {
    pub fn new(
        cfg: ControllerCfg,
        range: MotionRange,
        pulse_deg: f32,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let timer = MsTimer::new(clock.clone());
        Self {
            cfg,
            range,
            pulse_deg,
            clock,
            timer,
            target: 0.0,
            position: 0.0,
            commanded_speed: 0.0,
            prev_error: 0.0,
            integral_error: 0.0,
            derivative_error: 0.0,
            last_speed_bound: 0.0,
            enabled: false,
            aiming: false,
            done: false,
            start_position: 0.0,
            start_time: None,
            time_to_target: 0.0,
            distance_to_target: 0.0,
        }
    }

    fn check_target(&self, target: f32) -> Result<(), RotatorError> {
        if self.range.contains(target) {
            Ok(())
        } else {
            Err(RotatorError::Range {
                name: "target",
                value: target,
                min: self.range.min_deg,
                max: self.range.max_deg,
            })
        }
    }

    /// Begin a move to `target` from `position_deg`.
    ///
    /// `current_speed` is the speed the output stage is producing right now;
    /// it seeds the commanded speed so a restart mid-motion has no step.
    pub fn start(
        &mut self,
        target: f32,
        position_deg: f32,
        current_speed: f32,
    ) -> Result<(), RotatorError> {
        self.check_target(target)?;
        self.target = target;
        self.position = position_deg;
        self.start_position = position_deg;
        self.start_time = Some(self.clock.now());
        self.time_to_target = 0.0;
        self.integral_error = 0.0;
        self.prev_error = 0.0;
        self.derivative_error = 0.0;
        self.commanded_speed = current_speed;
        self.enabled = true;
        self.aiming = true;
        self.done = false;
        self.timer.start(period_ms(self.cfg.period_s));
        tracing::debug!(target, from = position_deg, speed = current_speed, "controller start");
        Ok(())
    }

    /// Move the goalpost of a running move without resetting its state.
    pub fn retarget(&mut self, target: f32) -> Result<(), RotatorError> {
        self.check_target(target)?;
        self.target = target;
        Ok(())
    }

    pub fn stop(&mut self) {
        self.aiming = false;
        self.enabled = false;
        self.done = false;
        self.commanded_speed = 0.0;
        self.integral_error = 0.0;
        self.timer.stop();
        tracing::debug!(position = self.position, "controller stop");
    }

    /// Disable without touching the arrival bookkeeping.
    pub fn kill(&mut self) {
        self.enabled = false;
        self.aiming = false;
        self.commanded_speed = 0.0;
        self.timer.stop();
    }

    pub fn tick(&mut self, enc: &EncoderSnapshot) -> ControlOutput {
        if !self.enabled {
            return ControlOutput::Idle;
        }

        self.position = enc.position_deg;
        if let Some(t0) = self.start_time {
            self.time_to_target = self.clock.now().saturating_duration_since(t0).as_secs_f32();
        }
        let position_error = self.target - self.position;

        if position_error.abs() < self.pulse_deg && enc.instant_speed.abs() <= self.cfg.min_speed {
            self.commanded_speed = 0.0;
            self.integral_error = 0.0;
            let arrival = if self.aiming {
                self.aiming = false;
                self.enabled = false;
                self.done = true;
                self.timer.stop();
                self.distance_to_target = self.target - self.start_position;
                let avg_speed = if self.time_to_target > 0.0 {
                    self.distance_to_target.abs() / self.time_to_target
                } else {
                    0.0
                };
                let arrival = Arrival {
                    travel_deg: self.distance_to_target,
                    elapsed_s: self.time_to_target,
                    avg_speed,
                    final_speed: enc.instant_speed,
                };
                tracing::info!(
                    position = self.position,
                    travel_deg = arrival.travel_deg,
                    elapsed_s = arrival.elapsed_s,
                    avg_speed = arrival.avg_speed,
                    final_speed = arrival.final_speed,
                    "target reached"
                );
                Some(arrival)
            } else {
                None
            };
            return ControlOutput::Stop { arrival };
        }

        if !self.timer.poll() {
            return ControlOutput::Hold;
        }
        self.timer.reset();

        let period = self.cfg.period_s;
        let speed_bound = sign(position_error) * (2.0 * self.cfg.max_accel * position_error.abs()).sqrt();
        self.last_speed_bound = speed_bound;
        let speed_error = speed_bound - self.commanded_speed;

        self.integral_error += speed_error * period;
        self.derivative_error = (speed_error - self.prev_error) / period;

        let mut output = self.cfg.kp * speed_error
            + self.cfg.ki * self.integral_error
            + self.cfg.kd * self.derivative_error
            + self.cfg.bias;
        self.prev_error = speed_error;

        let accel = (output - self.commanded_speed) / period;
        if accel.abs() > self.cfg.max_accel {
            output = self.commanded_speed + sign(accel) * self.cfg.max_accel * period;
        }
        if output.abs() > self.cfg.max_speed {
            output = sign(output) * self.cfg.max_speed;
        }

        self.commanded_speed = output;
        self.aiming = true;
        tracing::trace!(
            position = self.position,
            position_error,
            speed_bound,
            output,
            "controller update"
        );
        ControlOutput::Drive(output)
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    pub fn target(&self) -> f32 {
        self.target
    }
    pub fn position(&self) -> f32 {
        self.position
    }
    pub fn commanded_speed(&self) -> f32 {
        self.commanded_speed
    }
    pub fn integral_error(&self) -> f32 {
        self.integral_error
    }
    pub fn derivative_error(&self) -> f32 {
        self.derivative_error
    }
    pub fn prev_error(&self) -> f32 {
        self.prev_error
    }
    /// Bound computed by the most recent PID update.
    pub fn last_speed_bound(&self) -> f32 {
        self.last_speed_bound
    }
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
    pub fn is_aiming(&self) -> bool {
        self.aiming
    }
    /// Set on arrival, cleared by the next start or stop.
    pub fn is_done(&self) -> bool {
        self.done
    }
    pub fn start_position(&self) -> f32 {
        self.start_position
    }
    pub fn time_to_target(&self) -> f32 {
        self.time_to_target
    }
    pub fn distance_to_target(&self) -> f32 {
        self.distance_to_target
    }
    pub fn cfg(&self) -> &ControllerCfg {
        &self.cfg
    }
    pub fn range(&self) -> MotionRange {
        self.range
    }
    pub fn pulse_deg(&self) -> f32 {
        self.pulse_deg
    }

    // ── Tuning ─────────────────────────────────────────────────────────────
    // Callers range-check; see `settings`.

    pub fn set_kp(&mut self, v: f32) {
        self.cfg.kp = v;
    }
    pub fn set_ki(&mut self, v: f32) {
        self.cfg.ki = v;
    }
    pub fn set_kd(&mut self, v: f32) {
        self.cfg.kd = v;
    }
    pub fn set_bias(&mut self, v: f32) {
        self.cfg.bias = v;
    }
    pub fn set_max_accel(&mut self, v: f32) {
        self.cfg.max_accel = v;
    }
    pub fn set_max_speed(&mut self, v: f32) {
        self.cfg.max_speed = v;
    }
    pub fn set_min_speed(&mut self, v: f32) {
        self.cfg.min_speed = v;
    }

    /// Takes effect immediately; a running period timer is re-armed.
    pub fn set_period(&mut self, period_s: f32) {
        self.cfg.period_s = period_s;
        if self.timer.enabled() {
            self.timer.start(period_ms(period_s));
        }
    }
}
