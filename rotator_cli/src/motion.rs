//! Rotator assembly and command execution: config mapping, backend
//! selection, settings overrides and motion runs.

use crate::cli::{CliLimits, LAST_LIMITS, RunArgs, SetArg};
use rotator_config::{Config, TransferFit};
use rotator_core::error::Result as CoreResult;
use rotator_core::runner::{Motion, RunOutcome, SamplingMode};
use rotator_core::{Rotator, RunnerCfg, Setting, TransferFunction, WriteMode};
use rotator_traits::clock::{Clock, MonotonicClock};
use rotator_traits::{InputLines, MotorDriver};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

type Lines = Box<dyn InputLines + Send>;
type Motor = Box<dyn MotorDriver + Send>;

/// A booted rotator plus the encoder lines it was booted from.
pub struct Session {
    pub rotator: Rotator,
    pub lines: Lines,
    pub backend: &'static str,
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn open_backend(
    cfg: &Config,
    _clock: Arc<dyn Clock + Send + Sync>,
) -> eyre::Result<(Lines, Motor, &'static str)> {
    use eyre::WrapErr;
    use rotator_hardware::gpio::{DacMotor, DacMotorPins, GpioLines};

    let p = &cfg.pins;
    let lines =
        GpioLines::new(p.enc_a, p.enc_b, p.enc_index).wrap_err("open encoder pins")?;
    let motor = DacMotor::new(DacMotorPins {
        enable: p.motor_enable,
        reverse: p.motor_reverse,
        spi_bus: p.dac_bus,
        spi_ss: p.dac_ss,
        spi_clock_hz: p.dac_clock_hz,
    })
    .wrap_err("open motor pins")?;
    tracing::info!(
        enc_a = p.enc_a,
        enc_b = p.enc_b,
        enc_index = p.enc_index,
        dac_bus = p.dac_bus,
        "hardware backend"
    );
    Ok((Box::new(lines), Box::new(motor), "hardware"))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn open_backend(
    cfg: &Config,
    clock: Arc<dyn Clock + Send + Sync>,
) -> eyre::Result<(Lines, Motor, &'static str)> {
    use rotator_hardware::SimParams;

    let mut params = SimParams::from_env();
    params.ppr = cfg.encoder.lines_per_rev.saturating_mul(4);
    let rig = rotator_hardware::SimRig::new(params, clock);
    tracing::info!(start_deg = rig.params().start_deg, "simulated backend");
    Ok((Box::new(rig.lines()), Box::new(rig.motor()), "sim"))
}

/// Build the rotator from config (and an optional fitted transfer function),
/// then boot it.
pub fn open(cfg: &Config, fit: Option<&TransferFit>) -> eyre::Result<Session> {
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let (mut lines, motor, backend) = open_backend(cfg, clock.clone())?;

    let mut builder = Rotator::builder().with_config(cfg).with_clock(clock);
    if let Some(fit) = fit {
        let tf: TransferFunction = fit.into();
        tracing::info!(
            pos_slope = tf.positive.slope,
            pos_intercept = tf.positive.intercept,
            neg_slope = tf.negative.slope,
            neg_intercept = tf.negative.intercept,
            "transfer function from CSV"
        );
        builder = builder.with_transfer(tf);
    }
    let mut rotator = builder.with_motor(motor).build()?;
    rotator.boot(&mut lines)?;

    let _ = LAST_LIMITS.set(CliLimits {
        timeout_ms: cfg.runner.timeout_ms,
        min_deg: cfg.limits.min_deg,
        max_deg: cfg.limits.max_deg,
        max_retries: cfg.calibration.max_retries,
    });

    Ok(Session {
        rotator,
        lines,
        backend,
    })
}

/// Apply `--set` overrides in order. Returns the values now in effect.
pub fn apply_settings(rotator: &mut Rotator, sets: &[SetArg]) -> CoreResult<Vec<(Setting, f32)>> {
    let mut applied = Vec::with_capacity(sets.len());
    for s in sets {
        let setting: Setting = s.name.parse()?;
        let mode = if s.relative {
            WriteMode::Relative
        } else {
            WriteMode::Absolute
        };
        let v = rotator.write_setting(setting, s.value, mode)?;
        tracing::info!(setting = %setting, value = v, "setting applied");
        applied.push((setting, v));
    }
    Ok(applied)
}

/// Run one motion to completion on a booted session.
pub fn run_motion(
    session: Session,
    motion: Motion,
    runner: &rotator_config::RunnerCfg,
    args: RunArgs,
    shutdown: Arc<AtomicBool>,
) -> CoreResult<RunOutcome> {
    let Session {
        mut rotator, lines, ..
    } = session;

    let mut runner: RunnerCfg = runner.into();
    if let Some(ms) = args.timeout_ms {
        runner.timeout_ms = ms;
    }
    if let Some(limits) = LAST_LIMITS.get() {
        tracing::debug!(
            timeout_ms = runner.timeout_ms,
            min_deg = limits.min_deg,
            max_deg = limits.max_deg,
            "run limits"
        );
    }
    let mode = if args.direct {
        SamplingMode::Direct
    } else {
        SamplingMode::Threaded
    };
    let interrupt = move || shutdown.load(Ordering::Relaxed);
    let interrupt: &(dyn Fn() -> bool + Send + Sync) = &interrupt;

    rotator_core::runner::run(&mut rotator, lines, motion, &runner, mode, Some(interrupt))
}

/// Every setting with its current value, in registry order.
pub fn read_settings(rotator: &Rotator, names: &[String]) -> CoreResult<Vec<(Setting, f32)>> {
    if names.is_empty() {
        return Ok(Setting::ALL
            .iter()
            .map(|&s| (s, rotator.read_setting(s)))
            .collect());
    }
    names
        .iter()
        .map(|n| {
            let s: Setting = n.parse()?;
            Ok((s, rotator.read_setting(s)))
        })
        .collect()
}

/// Exercise the outputs once and check the encoder lines answer.
pub fn self_check(session: &mut Session) -> CoreResult<u16> {
    let level = session.rotator.pulse_outputs()?;
    let levels = session
        .lines
        .read()
        .map_err(|e| eyre::eyre!("encoder lines unavailable: {e}"))?;
    tracing::info!(
        backend = session.backend,
        level,
        a = levels.a,
        b = levels.b,
        index = levels.index,
        "self-check ok"
    );
    Ok(level)
}
