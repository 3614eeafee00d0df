//! Human-readable error descriptions and structured JSON error formatting.

use crate::cli::LAST_LIMITS;

/// Stable name for the error class, used as the JSON `reason`.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    use rotator_core::error::{BuildError, RotatorError};

    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    match err.downcast_ref::<RotatorError>() {
        Some(RotatorError::Range { .. }) => "Range",
        Some(RotatorError::Moving(_)) => "Moving",
        Some(RotatorError::Busy) => "Busy",
        Some(RotatorError::ReadOnly(_)) => "ReadOnly",
        Some(RotatorError::UnknownSetting(_)) => "UnknownSetting",
        Some(RotatorError::Hardware(_) | RotatorError::HardwareFault(_)) => "Hardware",
        Some(RotatorError::Config(_)) => "Config",
        Some(RotatorError::Timeout(_)) => "Timeout",
        Some(RotatorError::Interrupted) => "Interrupted",
        Some(RotatorError::CalibrationFailed(_)) => "CalibrationFailed",
        None => "Error",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use rotator_core::error::{BuildError, RotatorError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingMotor => {
                "What happened: No motor driver was provided to the rotator.\nLikely causes: The motor backend failed to initialize or was not wired into the builder.\nHow to fix: Ensure the motor driver is created successfully and passed via with_motor(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/rotator.toml for a sample."
            ),
        };
    }

    if let Some(re) = err.downcast_ref::<RotatorError>() {
        return match re {
            RotatorError::Range {
                name,
                value,
                min,
                max,
            } => format!(
                "What happened: {name} = {value} is outside [{min}, {max}].\nLikely causes: Target beyond the travel limits, or a setting outside its allowed range.\nHow to fix: Pick a value inside the range; travel limits live in [limits] in the config."
            ),
            RotatorError::Timeout(ms) => format!(
                "What happened: The motion did not finish within {ms} ms.\nLikely causes: Long move at low max speed, stalled shaft, or a timeout set too low.\nHow to fix: Raise runner.timeout_ms (or --timeout-ms), check the mechanics, or raise maxspd."
            ),
            RotatorError::CalibrationFailed(n) => format!(
                "What happened: Calibration gave up after {n} attempts without confirming the index.\nLikely causes: Index line not wired, noisy index signal, or a sweep too short to reach it.\nHow to fix: Check the index input, raise calibration.sweep_deg, or raise calibration.max_retries."
            ),
            RotatorError::Interrupted => {
                "What happened: The run was interrupted; the motor was disabled.\nLikely causes: Ctrl-C or a termination signal.\nHow to fix: Rerun the command when ready.".to_string()
            }
            RotatorError::Busy => {
                "What happened: Calibration is in progress.\nLikely causes: A move was requested while the zero search was running.\nHow to fix: Wait for calibration to finish or stop it first.".to_string()
            }
            RotatorError::Moving(what) => format!(
                "What happened: Cannot {what} while the shaft is moving.\nLikely causes: The previous motion has not settled.\nHow to fix: Stop the rotator and retry."
            ),
            RotatorError::ReadOnly(name) => format!(
                "What happened: Setting '{name}' is read-only.\nLikely causes: Attempted to write a measured value.\nHow to fix: Use `rotator get {name}` to read it instead."
            ),
            RotatorError::UnknownSetting(name) => format!(
                "What happened: Unknown setting '{name}'.\nLikely causes: Typo in the setting name.\nHow to fix: Run `rotator get` to list every setting."
            ),
            RotatorError::Hardware(msg) | RotatorError::HardwareFault(msg) => format!(
                "What happened: Hardware error ({msg}).\nLikely causes: Encoder or DAC wiring, missing power, or insufficient GPIO/SPI permissions.\nHow to fix: Check [pins] in the config and the wiring, then rerun with --log-level=debug."
            ),
            RotatorError::Config(msg) => format!(
                "What happened: Configuration error ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file and try again."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err
        .chain()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open encoder pins") || lower.contains("open motor pins") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO/SPI permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO and SPI.".to_string();
    }

    if lower.contains("encoder lines unavailable") {
        return "What happened: The encoder lines could not be read.\nLikely causes: Encoder unplugged or a failing input.\nHow to fix: Check the encoder connector and [pins], then rerun.".to_string();
    }

    // Transfer CSV header special-case
    if lower.contains("transfer csv must have headers") {
        return "Invalid headers in transfer CSV. Expected 'command,measured'.".to_string();
    }

    if lower.contains("read config") || lower.contains("parse config") {
        return format!(
            "What happened: The configuration file could not be loaded.\nLikely causes: Wrong --config path or malformed TOML.\nHow to fix: Check the path and syntax. Original: {msg}"
        );
    }

    if lower.contains(" must ") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Map typed errors to stable exit codes; everything else returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use rotator_core::error::RotatorError;
    match err.downcast_ref::<RotatorError>() {
        Some(RotatorError::Range { .. }) => 3,
        Some(RotatorError::Timeout(_)) => 4,
        Some(RotatorError::CalibrationFailed(_)) => 5,
        Some(RotatorError::Interrupted) => 130,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use rotator_core::error::RotatorError;
    use serde_json::json;

    let msg = humanize(err);
    let reason = reason_name(err);
    let limits = LAST_LIMITS.get();

    let details = match err.downcast_ref::<RotatorError>() {
        Some(RotatorError::Range {
            name,
            value,
            min,
            max,
        }) => Some(json!({ "name": name, "value": value, "min": min, "max": max })),
        Some(RotatorError::Timeout(ms)) => Some(json!({ "timeout_ms": ms })),
        Some(RotatorError::CalibrationFailed(n)) => {
            Some(json!({ "attempts": n, "max_retries": limits.and_then(|l| l.max_retries) }))
        }
        _ => None,
    };

    let obj = if let Some(d) = details {
        json!({ "ok": false, "reason": reason, "details": d, "message": msg })
    } else {
        json!({ "ok": false, "reason": reason, "message": msg })
    };
    obj.to_string()
}
