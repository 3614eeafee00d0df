#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `rotator` command-line front end.

mod cli;
mod error_fmt;
mod motion;

use clap::Parser;
use cli::{Cli, Commands, DEFAULT_CONFIG, FILE_GUARD, JSON_MODE, SetArg};
use error_fmt::{exit_code_for_error, format_error_json, humanize};
use eyre::WrapErr;
use rotator_config::Config;
use rotator_core::runner::{Motion, RunOutcome};
use rotator_core::{Rotator, Setting};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let code = match real_main(cli) {
        Ok(()) => 0,
        Err(e) => {
            if JSON_MODE.get().copied().unwrap_or(false) {
                println!("{}", format_error_json(&e));
            } else {
                eprintln!("{}", humanize(&e));
            }
            tracing::error!(error = %e, "command failed");
            exit_code_for_error(&e)
        }
    };
    std::process::exit(code);
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(&cli, &cfg)?;
    cfg.validate().wrap_err("invalid configuration")?;

    let fit = cli
        .transfer
        .as_deref()
        .map(rotator_config::load_transfer_csv)
        .transpose()?;
    let sets = cli
        .set
        .iter()
        .map(|s| s.parse::<SetArg>())
        .collect::<eyre::Result<Vec<_>>>()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    let mut session = motion::open(&cfg, fit.as_ref())?;
    let applied = motion::apply_settings(&mut session.rotator, &sets)?;
    if !applied.is_empty() && !session.rotator.is_idle() {
        eyre::bail!("--set target starts a move; use `rotator goto` instead");
    }

    match cli.cmd {
        Commands::Goto { degrees, run } => {
            let out = motion::run_motion(
                session,
                Motion::Goto(degrees),
                &cfg.runner,
                run,
                shutdown,
            )?;
            report_run(cli.json, "goto", Some(degrees), &out);
        }
        Commands::Move { degrees, run } => {
            let out = motion::run_motion(
                session,
                Motion::Move(degrees),
                &cfg.runner,
                run,
                shutdown,
            )?;
            report_run(cli.json, "move", Some(degrees), &out);
        }
        Commands::Calibrate { run } => {
            let out =
                motion::run_motion(session, Motion::Calibrate, &cfg.runner, run, shutdown)?;
            report_run(cli.json, "calibrate", None, &out);
        }
        Commands::Status => report_status(cli.json, &session.rotator, session.backend),
        Commands::Get { names } => {
            let values = motion::read_settings(&session.rotator, &names)?;
            report_settings(cli.json, &values);
        }
        Commands::SelfCheck => {
            let level = motion::self_check(&mut session)?;
            if cli.json {
                println!(
                    "{}",
                    json!({ "ok": true, "command": "self-check", "backend": session.backend, "level": level })
                );
            } else {
                println!("OK ({} backend)", session.backend);
            }
        }
    }
    Ok(())
}

fn load_config(path: &Path) -> eyre::Result<Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&text).wrap_err_with(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}

fn init_tracing(cli: &Cli, cfg: &Config) -> eyre::Result<()> {
    let level = cli
        .log_level
        .clone()
        .or_else(|| cfg.logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&level))?;

    // Console logs always go to stderr so stdout stays machine-readable.
    let console = if cli.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    };

    let file = match cfg.logging.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file must name a file"))?;
            let appender = match cfg.logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| eyre::eyre!("init logging: {e}"))
}

fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn report_run(json_mode: bool, command: &str, degrees: Option<f32>, out: &RunOutcome) {
    if json_mode {
        let line = json!({
            "ok": true,
            "timestamp": timestamp_ms(),
            "command": command,
            "degrees": degrees,
            "position_deg": out.position_deg,
            "real_position_deg": out.real_position_deg,
            "travel_deg": out.arrival.map(|a| a.travel_deg),
            "time_to_target_s": out.arrival.map(|a| a.elapsed_s),
            "avg_speed": out.arrival.map(|a| a.avg_speed),
            "calibrated": out.calibrated,
            "duration_ms": out.elapsed_ms,
            "status": out.status.bits(),
            "flags": out.status.names(),
        });
        println!("{line}");
        return;
    }
    match out.arrival {
        Some(a) => println!(
            "{command} complete: position {:.3} deg (travel {:.3} deg in {:.2} s, avg {:.2} deg/s)",
            out.position_deg, a.travel_deg, a.elapsed_s, a.avg_speed
        ),
        None => println!("{command} complete: position {:.3} deg", out.position_deg),
    }
    if out.calibrated {
        println!("zero reference established");
    }
    println!("status {}", out.status);
}

fn report_status(json_mode: bool, rotator: &Rotator, backend: &str) {
    let snap = rotator.snapshot();
    let status = rotator.status();
    if json_mode {
        println!(
            "{}",
            json!({
                "ok": true,
                "timestamp": timestamp_ms(),
                "backend": backend,
                "position_deg": snap.position_deg,
                "real_position_deg": snap.real_position_deg,
                "zero_offset_deg": snap.zero_offset_deg,
                "zero_known": snap.zero_known,
                "speed": snap.instant_speed,
                "speed_avg": snap.average_speed,
                "calibration": rotator.calibration_state().as_str(),
                "status": status.bits(),
                "flags": status.names(),
            })
        );
        return;
    }
    println!("backend     {backend}");
    println!("position    {:.3} deg", snap.position_deg);
    match snap.real_position_deg {
        Some(real) => println!("realpos     {real:.3} deg"),
        None => println!("realpos     unknown (index not seen)"),
    }
    println!("speed       {:.3} deg/s", snap.instant_speed);
    println!("calibration {}", rotator.calibration_state());
    println!("status      {status}");
}

fn report_settings(json_mode: bool, values: &[(Setting, f32)]) {
    if json_mode {
        let map: serde_json::Map<String, serde_json::Value> = values
            .iter()
            .map(|(s, v)| (s.name().to_string(), json!(v)))
            .collect();
        println!("{}", serde_json::Value::Object(map));
        return;
    }
    for (s, v) in values {
        let access = if s.is_writable() { "rw" } else { "ro" };
        println!("{:<10} {access} {v}", s.name());
    }
}
