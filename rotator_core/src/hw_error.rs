//! Maps `Box<dyn Error>` from trait boundaries to typed `RotatorError`.
//!
//! The traits in `rotator_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `rotator_hardware::HwError` downcasting.

use crate::error::RotatorError;

/// Map a trait-boundary error to a typed `RotatorError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> RotatorError {
    #[cfg(feature = "hardware-errors")]
    {
        use rotator_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => RotatorError::Timeout(0),
                other => RotatorError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        RotatorError::Timeout(0)
    } else {
        RotatorError::Hardware(s)
    }
}

/// Convenience for `map_err` on boxed trait results.
pub(crate) fn report(e: Box<dyn std::error::Error + Send + Sync>) -> eyre::Report {
    eyre::Report::new(map_hw_error(&*e))
}
