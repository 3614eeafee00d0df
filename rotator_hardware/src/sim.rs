//! Simulated rotator rig for host runs and tests.
//!
//! One shared shaft model backs both halves: `SimMotor` receives the drive
//! outputs and `SimLines` reports the encoder levels. The shaft angle is
//! integrated lazily against the supplied clock whenever either half is
//! touched, so a test clock gives fully deterministic motion.
//!
//! Shaft speed follows the drive command through a per-direction linear
//! response `speed = slope * command + intercept`; a command too small to
//! overcome the intercept leaves the shaft stalled.

use crate::error::HwError;
use rotator_traits::clock::Clock;
use rotator_traits::{InputLines, LineLevels, MotorDriver};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Which half of the rig should fail, for fault-path testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimFault {
    #[default]
    None,
    /// Every encoder read errors.
    Lines,
    /// Every motor write errors.
    Motor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimParams {
    /// Pulses per revolution (4x encoder lines).
    pub ppr: u32,
    /// Shaft angle at power-up, degrees from the index.
    pub start_deg: f64,
    /// deg/s per DAC level.
    pub resolution: f64,
    pub pos_slope: f64,
    pub pos_intercept: f64,
    pub neg_slope: f64,
    pub neg_intercept: f64,
    pub fault: SimFault,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            ppr: 4096,
            start_deg: 0.0,
            resolution: 36.0 / 1023.0,
            pos_slope: 1.1417,
            pos_intercept: -1.3754,
            neg_slope: 1.1598,
            neg_intercept: 1.1071,
            fault: SimFault::None,
        }
    }
}

impl SimParams {
    /// Override defaults from `ROTATOR_SIM_START_DEG` and
    /// `ROTATOR_SIM_FAIL` (`lines` | `motor`).
    pub fn from_env() -> Self {
        let mut p = Self::default();
        if let Some(deg) = std::env::var("ROTATOR_SIM_START_DEG")
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite())
        {
            p.start_deg = deg;
        }
        p.fault = match std::env::var("ROTATOR_SIM_FAIL").as_deref() {
            Ok("lines") => SimFault::Lines,
            Ok("motor") => SimFault::Motor,
            _ => SimFault::None,
        };
        p
    }
}

#[derive(Debug)]
struct SimState {
    /// Shaft position in (fractional) pulses from the index.
    counts: f64,
    level: u16,
    enabled: bool,
    reverse: bool,
    last: Instant,
}

/// Shared shaft model. Clone freely; all clones drive the same shaft.
#[derive(Clone)]
pub struct SimRig {
    state: Arc<Mutex<SimState>>,
    clock: Arc<dyn Clock + Send + Sync>,
    params: Arc<SimParams>,
}

impl std::fmt::Debug for SimRig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimRig")
            .field("angle_deg", &self.angle_deg())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl SimRig {
    pub fn new(params: SimParams, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let counts = params.start_deg * f64::from(params.ppr) / 360.0;
        let state = SimState {
            counts,
            level: 0,
            enabled: false,
            reverse: false,
            last: clock.now(),
        };
        tracing::debug!(start_deg = params.start_deg, "simulated rig ready");
        Self {
            state: Arc::new(Mutex::new(state)),
            clock,
            params: Arc::new(params),
        }
    }

    pub fn lines(&self) -> SimLines {
        SimLines { rig: self.clone() }
    }

    pub fn motor(&self) -> SimMotor {
        SimMotor { rig: self.clone() }
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Lock the state after bringing the shaft up to the current time.
    fn advance(&self) -> MutexGuard<'_, SimState> {
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        let dt = now.saturating_duration_since(st.last).as_secs_f64();
        let speed = self.speed_of(&st);
        st.counts += speed * dt * f64::from(self.params.ppr) / 360.0;
        st.last = now;
        st
    }

    fn speed_of(&self, st: &SimState) -> f64 {
        if !st.enabled || st.level == 0 {
            return 0.0;
        }
        let p = &*self.params;
        let command = f64::from(st.level) * p.resolution;
        let speed = if st.reverse {
            -command * p.neg_slope + p.neg_intercept
        } else {
            command * p.pos_slope + p.pos_intercept
        };
        // Below the breakaway point the shaft does not turn backwards.
        if (speed < 0.0) != st.reverse {
            return 0.0;
        }
        speed
    }

    /// Shaft angle in degrees from the index, unwrapped.
    pub fn angle_deg(&self) -> f64 {
        let st = self.advance();
        st.counts * 360.0 / f64::from(self.params.ppr)
    }

    /// Current shaft speed in deg/s.
    pub fn shaft_speed(&self) -> f64 {
        let st = self.advance();
        self.speed_of(&st)
    }

    pub fn is_enabled(&self) -> bool {
        self.advance().enabled
    }

    fn levels(&self) -> LineLevels {
        let st = self.advance();
        let pulse = st.counts.floor() as i64;
        let (a, b) = match pulse.rem_euclid(4) {
            0 => (false, false),
            1 => (true, false),
            2 => (true, true),
            _ => (false, true),
        };
        let index = pulse.rem_euclid(i64::from(self.params.ppr)) == 0;
        LineLevels::new(a, b, index)
    }
}

/// Encoder half of the rig.
#[derive(Debug, Clone)]
pub struct SimLines {
    rig: SimRig,
}

impl InputLines for SimLines {
    fn read(&mut self) -> Result<LineLevels, BoxError> {
        if self.rig.params.fault == SimFault::Lines {
            return Err(Box::new(HwError::Sim("encoder lines disconnected".into())));
        }
        Ok(self.rig.levels())
    }
}

/// Drive half of the rig.
#[derive(Debug, Clone)]
pub struct SimMotor {
    rig: SimRig,
}

impl SimMotor {
    fn write(&self, f: impl FnOnce(&mut SimState)) -> Result<(), BoxError> {
        if self.rig.params.fault == SimFault::Motor {
            return Err(Box::new(HwError::Sim("motor driver not responding".into())));
        }
        let mut st = self.rig.advance();
        f(&mut st);
        Ok(())
    }
}

impl MotorDriver for SimMotor {
    fn set_level(&mut self, level: u16) -> Result<(), BoxError> {
        self.write(|st| st.level = level)
    }

    fn set_enable(&mut self, on: bool) -> Result<(), BoxError> {
        self.write(|st| st.enabled = on)
    }

    fn set_reverse(&mut self, reverse: bool) -> Result<(), BoxError> {
        self.write(|st| st.reverse = reverse)
    }
}
