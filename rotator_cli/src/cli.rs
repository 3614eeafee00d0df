//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();
/// Effective run limits for the current invocation (for JSON details).
pub static LAST_LIMITS: OnceLock<CliLimits> = OnceLock::new();

/// Default config location; silently replaced by built-in defaults when absent.
pub const DEFAULT_CONFIG: &str = "etc/rotator.toml";

#[derive(Copy, Clone, Debug)]
pub struct CliLimits {
    pub timeout_ms: u64,
    pub min_deg: f32,
    pub max_deg: f32,
    pub max_retries: Option<u32>,
}

#[derive(Parser, Debug)]
#[command(name = "rotator", version, about = "Single-axis rotator CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Optional transfer-function characterisation CSV (header: command,measured)
    #[arg(long, value_name = "FILE")]
    pub transfer: Option<PathBuf>,

    /// Emit results and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG wins when set
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Apply a setting after boot: NAME=VALUE, or NAME+=VALUE for a relative write.
    /// Repeatable.
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Move to an absolute position (degrees)
    Goto {
        #[arg(allow_negative_numbers = true)]
        degrees: f32,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Move by a relative amount (degrees)
    Move {
        #[arg(allow_negative_numbers = true)]
        degrees: f32,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Seek the index pulse and park on the zero reference
    Calibrate {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Boot, print position, speed and status flags
    Status,
    /// Print named settings (all of them when none are given)
    Get {
        names: Vec<String>,
    },
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
}

#[derive(clap::Args, Debug, Clone, Copy)]
pub struct RunArgs {
    /// Abort after this many ms (overrides runner.timeout_ms; 0 disables)
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
    /// Read the encoder inside the control loop instead of a sampler thread
    #[arg(long, action = ArgAction::SetTrue)]
    pub direct: bool,
}

/// One `--set` argument, parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct SetArg {
    pub name: String,
    pub value: f32,
    pub relative: bool,
}

impl std::str::FromStr for SetArg {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lhs, rhs) = s
            .split_once('=')
            .ok_or_else(|| eyre::eyre!("--set expects NAME=VALUE, got '{s}'"))?;
        let (name, relative) = match lhs.strip_suffix('+') {
            Some(n) => (n, true),
            None => (lhs, false),
        };
        let name = name.trim();
        if name.is_empty() {
            eyre::bail!("--set expects NAME=VALUE, got '{s}'");
        }
        let value: f32 = rhs
            .trim()
            .parse()
            .map_err(|e| eyre::eyre!("--set {name}: invalid number '{}': {e}", rhs.trim()))?;
        Ok(Self {
            name: name.to_string(),
            value,
            relative,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_arg_forms() {
        let a: SetArg = "maxspd=10".parse().unwrap();
        assert_eq!(
            a,
            SetArg {
                name: "maxspd".into(),
                value: 10.0,
                relative: false
            }
        );
        let b: SetArg = "position+=-2.5".parse().unwrap();
        assert!(b.relative);
        assert_eq!(b.value, -2.5);
        assert!("kp".parse::<SetArg>().is_err());
        assert!("=3".parse::<SetArg>().is_err());
        assert!("kp=abc".parse::<SetArg>().is_err());
    }

    #[test]
    fn negative_targets_parse() {
        let cli = Cli::try_parse_from(["rotator", "goto", "-45.5"]).unwrap();
        match cli.cmd {
            Commands::Goto { degrees, .. } => assert_eq!(degrees, -45.5),
            other => panic!("unexpected {other:?}"),
        }
    }
}
