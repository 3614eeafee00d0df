use crate::calibration::CalibrationEvent;
use crate::config::RunnerCfg;
use crate::controller::Arrival;
use crate::error::{Result as CoreResult, RotatorError};
use crate::hw_error::report;
use crate::rotator::Rotator;
use crate::sampler::Sampler;
use crate::status::StatusFlags;
use rotator_traits::{InputLines, MotorDriver};
use std::time::Duration;

/// How the encoder lines are sampled while a motion runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    /// Read the lines inline, several times per loop iteration, on the
    /// caller's thread. Deterministic under a test clock.
    Direct,
    /// Background `Sampler` thread at the tracker's sampling period.
    Threaded,
}

/// What to do for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    Goto(f32),
    Move(f32),
    Calibrate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub position_deg: f32,
    pub real_position_deg: Option<f32>,
    pub arrival: Option<Arrival>,
    pub calibrated: bool,
    pub elapsed_ms: u64,
    pub status: StatusFlags,
}

/// Number of inline line reads per loop iteration in `Direct` mode.
#[inline]
fn samples_per_loop(loop_period_ms: u64, sample_period_us: u64) -> u64 {
    (loop_period_ms.saturating_mul(1000) / sample_period_us.max(1)).max(1)
}

/// Run `motion` on an already booted rotator until it completes, fails,
/// times out or `interrupt` reports true.
///
/// The motor is killed on every error path.
pub fn run<M, L>(
    rotator: &mut Rotator<M>,
    lines: L,
    motion: Motion,
    runner: &RunnerCfg,
    mode: SamplingMode,
    interrupt: Option<&(dyn Fn() -> bool + Send + Sync)>,
) -> CoreResult<RunOutcome>
where
    M: MotorDriver,
    L: InputLines + Send + 'static,
{
    let clock = rotator.clock();
    let start = clock.now();

    match motion {
        Motion::Goto(t) => rotator.goto(t)?,
        Motion::Move(d) => rotator.goto_relative(d)?,
        Motion::Calibrate => rotator.start_calibration()?,
    }
    tracing::info!(?motion, ?mode, "run start");

    let sample_period = Duration::from_micros(rotator.tracker_cfg().sample_period_us);
    let loop_period = Duration::from_millis(runner.loop_period_ms);
    let inline_reads =
        samples_per_loop(runner.loop_period_ms, rotator.tracker_cfg().sample_period_us);

    let (sampler, mut inline) = match mode {
        SamplingMode::Threaded => (
            Some(Sampler::spawn(
                lines,
                rotator.encoder().clone(),
                sample_period,
                clock.clone(),
            )),
            None,
        ),
        SamplingMode::Direct => (None, Some(lines)),
    };

    let mut arrival = None;
    let mut calibrated = false;

    let result: CoreResult<()> = loop {
        if interrupt.is_some_and(|f| f()) {
            break Err(eyre::Report::new(RotatorError::Interrupted));
        }
        if let Some(fault) = sampler.as_ref().and_then(Sampler::take_fault) {
            break Err(eyre::Report::new(fault));
        }

        if let Some(lines) = inline.as_mut()
            && let Err(e) = sample_inline(rotator, lines, inline_reads, sample_period)
        {
            break Err(e);
        }

        let step = match rotator.step() {
            Ok(s) => s,
            Err(e) => break Err(e),
        };
        if step.arrival.is_some() {
            arrival = step.arrival;
        }
        match step.calibration {
            Some(CalibrationEvent::Completed) => calibrated = true,
            Some(CalibrationEvent::GaveUp { attempts }) => {
                break Err(eyre::Report::new(RotatorError::CalibrationFailed(attempts)));
            }
            _ => {}
        }
        if rotator.is_idle() {
            break Ok(());
        }

        if runner.timeout_ms > 0 && clock.ms_since(start) >= runner.timeout_ms {
            break Err(eyre::Report::new(RotatorError::Timeout(runner.timeout_ms)));
        }
        if inline.is_none() {
            clock.sleep(loop_period);
        }
    };

    drop(sampler);
    if let Err(e) = result {
        let _ = rotator.kill_motor();
        tracing::error!(error = %e, "run aborted");
        return Err(e);
    }

    let snap = rotator.snapshot();
    let outcome = RunOutcome {
        position_deg: snap.position_deg,
        real_position_deg: snap.real_position_deg,
        arrival,
        calibrated,
        elapsed_ms: clock.ms_since(start),
        status: rotator.status(),
    };
    tracing::info!(
        position = outcome.position_deg,
        elapsed_ms = outcome.elapsed_ms,
        calibrated,
        "run complete"
    );
    Ok(outcome)
}

fn sample_inline<M: MotorDriver, L: InputLines>(
    rotator: &Rotator<M>,
    lines: &mut L,
    reads: u64,
    period: Duration,
) -> CoreResult<()> {
    let clock = rotator.clock();
    for _ in 0..reads {
        let levels = lines.read().map_err(report)?;
        rotator.encoder().sample(levels);
        clock.sleep(period);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::samples_per_loop;

    #[test]
    fn inline_reads_cover_one_loop_period() {
        assert_eq!(samples_per_loop(1, 200), 5);
        assert_eq!(samples_per_loop(10, 200), 50);
        assert_eq!(samples_per_loop(1, 5000), 1);
        assert_eq!(samples_per_loop(0, 200), 1);
    }
}
