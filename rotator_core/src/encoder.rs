//! Quadrature position/velocity tracker.
//!
//! `QuadratureTracker` is advanced once per sampling tick with the raw
//! levels of phase A, phase B and the index line. It keeps a signed pulse
//! counter (4 pulses per encoder line), the direction of the last edge, the
//! timing of recent edges and the pulse offset of the zero index.
//!
//! The tracker is shared between the sampling thread and the main loop via
//! `EncoderHandle`. Every read goes through `snapshot()` under the lock so
//! the main loop never sees a half-updated position/offset/direction tuple.

use crate::config::TrackerCfg;
use crate::debounce::{DebounceChannel, Edge};
use crate::error::RotatorError;
use crate::util::{MICROS_PER_SEC, wrap_half_open};
use rotator_traits::LineLevels;
use rotator_traits::clock::Clock;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Forward,
    Backward,
    #[default]
    Unknown,
}

impl Direction {
    /// +1, -1 or 0.
    #[inline]
    pub fn signum(self) -> i32 {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
            Direction::Unknown => 0,
        }
    }
}

/// Fixed-capacity ring of recent pulse periods (µs).
#[derive(Debug, Clone)]
pub struct PeriodHistory {
    slots: Vec<u64>,
    next: usize,
    filled: usize,
}

impl PeriodHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![0; capacity.max(1)],
            next: 0,
            filled: 0,
        }
    }

    pub fn push(&mut self, period_us: u64) {
        self.slots[self.next] = period_us;
        self.next = (self.next + 1) % self.slots.len();
        self.filled = (self.filled + 1).min(self.slots.len());
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = 0);
        self.next = 0;
        self.filled = 0;
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Mean over the slots written so far; `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.filled == 0 {
            return None;
        }
        // Unfilled slots are still zero, so summing the whole ring is exact.
        let sum: u128 = self.slots.iter().map(|&p| u128::from(p)).sum();
        Some(sum as f64 / self.filled as f64)
    }
}

#[derive(Debug, Clone)]
pub struct EncoderState {
    pub position: i32,
    pub direction: Direction,
    pub zero_offset: i32,
    pub zero_known: bool,
    pub last_edge_time: u64,
    pub last_period: u64,
    pub period_history: PeriodHistory,
}

impl EncoderState {
    fn new(history_len: usize) -> Self {
        Self {
            position: 0,
            direction: Direction::Unknown,
            zero_offset: 0,
            zero_known: false,
            last_edge_time: 0,
            last_period: 0,
            period_history: PeriodHistory::new(history_len),
        }
    }
}

/// What one sampling tick observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tick {
    /// -1, 0 or +1 pulses.
    pub step: i32,
    pub index_rising: bool,
}

/// Consistent copy of the tracker state, taken under the lock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderSnapshot {
    pub position: i32,
    pub position_deg: f32,
    /// Position relative to the zero index, `None` until the index has been seen.
    pub real_position_deg: Option<f32>,
    pub zero_offset_deg: Option<f32>,
    pub zero_known: bool,
    pub direction: Direction,
    pub instant_speed: f32,
    pub average_speed: f32,
    /// Debounced level of the index line.
    pub at_index: bool,
    /// Ticks where A and B committed together and the step was discarded.
    pub glitches: u64,
}

#[derive(Debug, Clone)]
pub struct QuadratureTracker {
    cfg: TrackerCfg,
    ppr: i32,
    pulse_deg: f32,
    a: DebounceChannel,
    b: DebounceChannel,
    index: DebounceChannel,
    state: EncoderState,
    glitches: u64,
}

impl QuadratureTracker {
    pub fn new(cfg: TrackerCfg) -> Self {
        let ppr = cfg.ppr();
        let pulse_deg = cfg.pulse_deg();
        let state = EncoderState::new(cfg.history_len);
        Self {
            cfg,
            ppr,
            pulse_deg,
            a: DebounceChannel::default(),
            b: DebounceChannel::default(),
            index: DebounceChannel::default(),
            state,
            glitches: 0,
        }
    }

    pub fn cfg(&self) -> &TrackerCfg {
        &self.cfg
    }

    pub fn state(&self) -> &EncoderState {
        &self.state
    }

    #[inline]
    pub fn ppr(&self) -> i32 {
        self.ppr
    }

    #[inline]
    pub fn pulse_deg(&self) -> f32 {
        self.pulse_deg
    }

    /// Adopt the current line levels without producing edges.
    ///
    /// The zero reference is considered known iff the index line is high.
    pub fn prime(&mut self, levels: LineLevels, now_us: u64) {
        self.a.prime(levels.a);
        self.b.prime(levels.b);
        self.index.prime(levels.index);
        self.state.zero_offset = 0;
        self.state.zero_known = levels.index;
        self.reset_speed(now_us);
        tracing::debug!(
            a = levels.a,
            b = levels.b,
            index = levels.index,
            "encoder primed"
        );
    }

    /// One sampling tick.
    pub fn sample(&mut self, levels: LineLevels, now_us: u64) -> Tick {
        let threshold = self.cfg.debounce_count;
        let ea = self.a.sample(levels.a, threshold);
        let eb = self.b.sample(levels.b, threshold);
        let ex = self.index.sample(levels.index, threshold);

        let mut tick = Tick::default();
        match (ea.is_edge(), eb.is_edge()) {
            (true, true) => {
                // Both phases moved at once: the direction is undecidable.
                self.glitches = self.glitches.saturating_add(1);
                tracing::trace!(glitches = self.glitches, "simultaneous A/B edge dropped");
            }
            (true, false) => {
                let dir = if self.a.stable_level() == self.b.stable_level() {
                    Direction::Backward
                } else {
                    Direction::Forward
                };
                tick.step = self.record_edge(dir, now_us);
            }
            (false, true) => {
                let dir = if self.a.stable_level() == self.b.stable_level() {
                    Direction::Forward
                } else {
                    Direction::Backward
                };
                tick.step = self.record_edge(dir, now_us);
            }
            (false, false) => {}
        }

        if ex == Edge::Rising {
            self.state.zero_offset = wrap_half_open(self.state.position, self.ppr);
            self.state.zero_known = true;
            tick.index_rising = true;
        }
        tick
    }

    fn record_edge(&mut self, dir: Direction, now_us: u64) -> i32 {
        let step = dir.signum();
        let st = &mut self.state;
        st.position = st.position.wrapping_add(step);
        st.direction = dir;
        st.last_period = now_us.saturating_sub(st.last_edge_time);
        st.period_history.push(st.last_period);
        st.last_edge_time = now_us;
        step
    }

    #[inline]
    pub fn position(&self) -> i32 {
        self.state.position
    }

    pub fn position_deg(&self) -> f32 {
        self.state.position as f32 * self.pulse_deg
    }

    pub fn real_position_deg(&self) -> Option<f32> {
        self.state.zero_known.then(|| {
            let real = wrap_half_open(
                self.state.position.wrapping_sub(self.state.zero_offset),
                self.ppr,
            );
            real as f32 * self.pulse_deg
        })
    }

    pub fn zero_offset_deg(&self) -> Option<f32> {
        self.state
            .zero_known
            .then(|| self.state.zero_offset as f32 * self.pulse_deg)
    }

    fn speed_from_period(&self, period_us: f64) -> f32 {
        if period_us <= 0.0 {
            return 0.0;
        }
        let pulse_speed = 360.0 * MICROS_PER_SEC as f64 / f64::from(self.ppr);
        (pulse_speed / period_us) as f32 * self.state.direction.signum() as f32
    }

    pub fn instant_speed(&self) -> f32 {
        self.speed_from_period(self.state.last_period as f64)
    }

    pub fn average_speed(&self) -> f32 {
        self.state
            .period_history
            .mean()
            .map_or(0.0, |p| self.speed_from_period(p))
    }

    /// Redefine the current position as `deg`.
    ///
    /// Rejected while the shaft is turning. With a known zero the real
    /// (index-relative) position is preserved by moving the offset along.
    pub fn set_position_deg(&mut self, deg: f32) -> Result<(), RotatorError> {
        if self.instant_speed() != 0.0 {
            return Err(RotatorError::Moving("set position"));
        }
        let pulses = (deg / self.pulse_deg).round() as i32;
        self.redefine(pulses);
        Ok(())
    }

    /// Define the current position as 0 after the output has been released.
    /// Speed left over from the shaft coasting to rest is discarded.
    pub fn settle_at_zero(&mut self, now_us: u64) {
        self.reset_speed(now_us);
        self.redefine(0);
    }

    fn redefine(&mut self, pulses: i32) {
        let st = &mut self.state;
        if st.zero_known {
            let real = wrap_half_open(st.position.wrapping_sub(st.zero_offset), self.ppr);
            st.position = pulses;
            st.zero_offset = wrap_half_open(pulses.wrapping_sub(real), self.ppr);
        } else {
            st.position = pulses;
        }
        tracing::debug!(
            position = st.position,
            offset = st.zero_offset,
            zero_known = st.zero_known,
            "position redefined"
        );
    }

    /// Forget the direction and pulse timing so speed reads zero.
    pub fn reset_speed(&mut self, now_us: u64) {
        let st = &mut self.state;
        st.direction = Direction::Unknown;
        st.last_period = 0;
        st.last_edge_time = now_us;
        st.period_history.clear();
    }

    /// Drop the zero reference; the next index rising edge re-establishes it.
    pub fn forget_zero(&mut self) {
        self.state.zero_known = false;
        self.state.zero_offset = 0;
    }

    pub fn snapshot(&self) -> EncoderSnapshot {
        EncoderSnapshot {
            position: self.state.position,
            position_deg: self.position_deg(),
            real_position_deg: self.real_position_deg(),
            zero_offset_deg: self.zero_offset_deg(),
            zero_known: self.state.zero_known,
            direction: self.state.direction,
            instant_speed: self.instant_speed(),
            average_speed: self.average_speed(),
            at_index: self.index.stable_level(),
            glitches: self.glitches,
        }
    }
}

// ── Shared handle ─────────────────────────────────────────────────────────

/// Cloneable handle to the single tracker instance.
///
/// The sampler thread calls `sample`; everything else takes snapshots.
#[derive(Clone)]
pub struct EncoderHandle {
    inner: Arc<Mutex<QuadratureTracker>>,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
}

impl std::fmt::Debug for EncoderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderHandle")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl EncoderHandle {
    pub fn new(tracker: QuadratureTracker, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let epoch = clock.now();
        Self {
            inner: Arc::new(Mutex::new(tracker)),
            clock,
            epoch,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QuadratureTracker> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Microseconds since this handle was created.
    pub fn now_us(&self) -> u64 {
        self.clock.us_since(self.epoch)
    }

    pub fn sample(&self, levels: LineLevels) -> Tick {
        let now = self.now_us();
        self.lock().sample(levels, now)
    }

    pub fn prime(&self, levels: LineLevels) {
        let now = self.now_us();
        self.lock().prime(levels, now);
    }

    pub fn snapshot(&self) -> EncoderSnapshot {
        self.lock().snapshot()
    }

    pub fn set_position_deg(&self, deg: f32) -> Result<(), RotatorError> {
        self.lock().set_position_deg(deg)
    }

    pub fn settle_at_zero(&self) {
        let now = self.now_us();
        self.lock().settle_at_zero(now);
    }

    pub fn reset_speed(&self) {
        let now = self.now_us();
        self.lock().reset_speed(now);
    }

    pub fn forget_zero(&self) {
        self.lock().forget_zero();
    }

    pub fn pulse_deg(&self) -> f32 {
        self.lock().pulse_deg()
    }

    pub fn ppr(&self) -> i32 {
        self.lock().ppr()
    }

    pub fn history_len(&self) -> usize {
        self.lock().state().period_history.len()
    }
}
