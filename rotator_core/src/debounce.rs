//! Debounced edge detection for one digital input.
//!
//! A new level is accepted only after it has been seen on `threshold`
//! consecutive samples; anything shorter is treated as a glitch. Response
//! latency is therefore bounded by `threshold * tick_period`.

/// Edge reported by a single `DebounceChannel::sample` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    None,
    Rising,
    Falling,
}

impl Edge {
    #[inline]
    pub fn is_edge(self) -> bool {
        !matches!(self, Edge::None)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceChannel {
    stable_level: bool,
    pending_count: u8,
}

impl DebounceChannel {
    pub const fn new(level: bool) -> Self {
        Self {
            stable_level: level,
            pending_count: 0,
        }
    }

    #[inline]
    pub fn stable_level(&self) -> bool {
        self.stable_level
    }

    #[inline]
    pub fn pending_count(&self) -> u8 {
        self.pending_count
    }

    /// Adopt `level` as the stable level without reporting an edge.
    pub fn prime(&mut self, level: bool) {
        self.stable_level = level;
        self.pending_count = 0;
    }

    /// Feed one raw sample. A `threshold` of 0 behaves like 1.
    pub fn sample(&mut self, raw_level: bool, threshold: u8) -> Edge {
        if raw_level == self.stable_level {
            self.pending_count = 0;
            return Edge::None;
        }
        self.pending_count = self.pending_count.saturating_add(1);
        if self.pending_count < threshold.max(1) {
            return Edge::None;
        }
        self.stable_level = raw_level;
        self.pending_count = 0;
        if raw_level { Edge::Rising } else { Edge::Falling }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commits_on_threshold_sample() {
        let mut ch = DebounceChannel::new(false);
        assert_eq!(ch.sample(true, 2), Edge::None);
        assert_eq!(ch.pending_count(), 1);
        assert_eq!(ch.sample(true, 2), Edge::Rising);
        assert!(ch.stable_level());
        assert_eq!(ch.pending_count(), 0);
        assert_eq!(ch.sample(false, 2), Edge::None);
        assert_eq!(ch.sample(false, 2), Edge::Falling);
    }

    #[test]
    fn zero_threshold_acts_as_one() {
        let mut ch = DebounceChannel::new(true);
        assert_eq!(ch.sample(false, 0), Edge::Falling);
    }
}
