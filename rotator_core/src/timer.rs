//! Millisecond interval timer polled from the main loop.
//!
//! Nothing here blocks: `poll()` only compares the clock against the
//! deadline. Once expired the timer stays expired until `reset()`.

use rotator_traits::clock::Clock;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct MsTimer {
    clock: Arc<dyn Clock + Send + Sync>,
    interval: Duration,
    started: Option<Instant>,
    expired: bool,
}

impl std::fmt::Debug for MsTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MsTimer")
            .field("interval", &self.interval)
            .field("enabled", &self.started.is_some())
            .field("expired", &self.expired)
            .finish()
    }
}

impl MsTimer {
    /// A stopped timer.
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            clock,
            interval: Duration::ZERO,
            started: None,
            expired: false,
        }
    }

    /// (Re)arm with a new interval in milliseconds.
    pub fn start(&mut self, interval_ms: u64) {
        self.interval = Duration::from_millis(interval_ms);
        self.started = Some(self.clock.now());
        self.expired = false;
    }

    /// Begin the next interval from now, keeping the current length.
    pub fn reset(&mut self) {
        if self.started.is_some() {
            self.started = Some(self.clock.now());
            self.expired = false;
        }
    }

    pub fn stop(&mut self) {
        self.started = None;
        self.expired = false;
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.started.is_some()
    }

    pub fn interval_ms(&self) -> u64 {
        u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX)
    }

    /// `true` once the interval has elapsed; `false` while stopped.
    pub fn poll(&mut self) -> bool {
        let Some(started) = self.started else {
            return false;
        };
        if !self.expired
            && self.clock.now().saturating_duration_since(started) >= self.interval
        {
            self.expired = true;
        }
        self.expired
    }
}
