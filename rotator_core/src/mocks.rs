//! Test and helper mocks for rotator_core.

use rotator_traits::{InputLines, LineLevels, MotorDriver};
use std::sync::{Arc, Mutex, PoisonError};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Motor driver that accepts every write and does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMotor;

impl MotorDriver for NoopMotor {
    fn set_level(&mut self, _level: u16) -> Result<(), BoxError> {
        Ok(())
    }
    fn set_enable(&mut self, _on: bool) -> Result<(), BoxError> {
        Ok(())
    }
    fn set_reverse(&mut self, _reverse: bool) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Last values written to a `SpyMotor`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MotorOutputs {
    pub level: u16,
    pub enabled: bool,
    pub reverse: bool,
    pub writes: u32,
}

/// Motor driver recording its outputs; clones share the record.
#[derive(Debug, Default, Clone)]
pub struct SpyMotor {
    outputs: Arc<Mutex<MotorOutputs>>,
}

impl SpyMotor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outputs(&self) -> MotorOutputs {
        *self.outputs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, f: impl FnOnce(&mut MotorOutputs)) {
        let mut o = self.outputs.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut o);
        o.writes = o.writes.saturating_add(1);
    }
}

impl MotorDriver for SpyMotor {
    fn set_level(&mut self, level: u16) -> Result<(), BoxError> {
        self.record(|o| o.level = level);
        Ok(())
    }
    fn set_enable(&mut self, on: bool) -> Result<(), BoxError> {
        self.record(|o| o.enabled = on);
        Ok(())
    }
    fn set_reverse(&mut self, reverse: bool) -> Result<(), BoxError> {
        self.record(|o| o.reverse = reverse);
        Ok(())
    }
}

/// Input lines stuck at fixed levels.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticLines(pub LineLevels);

impl InputLines for StaticLines {
    fn read(&mut self) -> Result<LineLevels, BoxError> {
        Ok(self.0)
    }
}

/// Input lines whose every read fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeadLines;

impl InputLines for DeadLines {
    fn read(&mut self) -> Result<LineLevels, BoxError> {
        Err(Box::new(std::io::Error::other("encoder lines unavailable")))
    }
}
