#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Motion-control core of a single-axis rotator (hardware-agnostic).
//!
//! All hardware interaction goes through `rotator_traits::InputLines` (the
//! encoder's A/B/index lines) and `rotator_traits::MotorDriver` (DAC level,
//! enable and reverse outputs).
//!
//! ## Architecture
//!
//! - **Debounce**: per-line glitch filter (`debounce`)
//! - **Tracker**: quadrature decode, pulse timing, zero offset (`encoder`)
//! - **Sampling**: background thread feeding the tracker (`sampler`)
//! - **Output stage**: transfer-function linearization, DAC quantization (`actuator`)
//! - **Control**: velocity-profile PID position controller (`controller`)
//! - **Calibration**: zero-seeking state machine (`calibration`)
//! - **Aggregate**: `Rotator`, its builder, settings and status (`rotator`, `builder`)
//!
//! Angles are degrees, speeds deg/s, accelerations deg/s². The tracker
//! itself counts in pulses (`4 * lines_per_rev` per revolution).

pub mod actuator;
pub mod builder;
pub mod calibration;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod debounce;
pub mod encoder;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod rotator;
pub mod runner;
pub mod sampler;
pub mod settings;
pub mod status;
pub mod timer;
pub mod util;

pub use actuator::{Actuator, Linear, TransferFunction};
pub use builder::{Missing, RotatorBuilder, Set, build_rotator};
pub use calibration::{CalibrationEvent, CalibrationState, Calibrator};
pub use config::{ActuatorCfg, CalibrationCfg, ControllerCfg, MotionRange, RunnerCfg, TrackerCfg};
pub use controller::{Arrival, ControlOutput, PositionController};
pub use encoder::{Direction, EncoderHandle, EncoderSnapshot, QuadratureTracker};
pub use error::{BuildError, Result, RotatorError};
pub use rotator::{Rotator, StepReport};
pub use settings::{Setting, UNKNOWN_POSITION_DEG, WriteMode};
pub use status::StatusFlags;
