use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RotatorError {
    /// A requested target, gain or limit lies outside its bounds. State is unchanged.
    #[error("{name} = {value} is out of range [{min}, {max}]")]
    Range {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    /// Operation not allowed while the shaft is turning (e.g. redefining position).
    #[error("cannot {0} while the shaft is moving")]
    Moving(&'static str),
    #[error("calibration in progress")]
    Busy,
    #[error("setting '{0}' is read-only")]
    ReadOnly(&'static str),
    #[error("unknown setting '{0}'")]
    UnknownSetting(String),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timed out after {0} ms")]
    Timeout(u64),
    #[error("interrupted by operator")]
    Interrupted,
    #[error("calibration gave up after {0} attempts")]
    CalibrationFailed(u32),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing motor driver")]
    MissingMotor,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
