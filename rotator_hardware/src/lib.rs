//! Hardware back-ends for the rotator: a simulated rig for host runs and,
//! behind the `hardware` feature, Raspberry Pi GPIO plus a TLC5615 DAC.

pub mod error;
#[cfg(feature = "hardware")]
pub mod gpio;
pub mod sim;
pub mod tlc5615;

pub use sim::{SimFault, SimLines, SimMotor, SimParams, SimRig};
