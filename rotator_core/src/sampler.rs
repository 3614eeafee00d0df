//! Background encoder sampling.
//!
//! Spawns a thread that owns the `InputLines`, reads them once per sampling
//! period and feeds the shared `EncoderHandle`. Read failures are forwarded
//! to the main loop over a bounded channel.
//!
//! Each `Sampler` spawns exactly one thread that is shut down and joined when
//! the `Sampler` is dropped.
use crate::encoder::EncoderHandle;
use crate::error::RotatorError;
use crate::hw_error::map_hw_error;
use crossbeam_channel as xch;
use rotator_traits::InputLines;
use rotator_traits::clock::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

pub struct Sampler {
    faults: xch::Receiver<RotatorError>,
    samples: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl Sampler {
    pub fn spawn<L, C>(mut lines: L, encoder: EncoderHandle, period: Duration, clock: C) -> Self
    where
        L: InputLines + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let (tx, faults) = xch::bounded(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let samples = Arc::new(AtomicU64::new(0));
        let samples_clone = samples.clone();

        let join_handle = std::thread::spawn(move || {
            let mut deadline = clock.now();
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("sampler thread received shutdown signal");
                    break;
                }

                match lines.read() {
                    Ok(levels) => {
                        encoder.sample(levels);
                        samples_clone.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        let err = map_hw_error(&*e);
                        tracing::warn!(error = %err, "encoder line read failed");
                        // Only the first pending fault matters to the main loop.
                        let _ = tx.try_send(err);
                    }
                }

                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                deadline += period;
                let now = clock.now();
                if deadline > now {
                    clock.sleep(deadline - now);
                } else {
                    // Overran; don't try to catch up with a burst.
                    deadline = now;
                }
            }
            tracing::trace!("sampler thread exiting cleanly");
        });

        Self {
            faults,
            samples,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Oldest unread fault from the sampling thread, if any.
    pub fn take_fault(&self) -> Option<RotatorError> {
        self.faults.try_recv().ok()
    }

    /// Number of successful samples so far.
    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("sampler thread joined"),
                Err(e) => tracing::warn!(?e, "sampler thread panicked during shutdown"),
            }
        }
    }
}
