use crate::measure::LagMeasurer;
use spdlog::{debug, info, trace};
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// Handle to the background thread that rotates a window's buckets.
///
/// The worker wakes on absolute deadlines (`start + k * granularity`), so a
/// late wakeup is caught up immediately instead of drifting. Dropping the
/// stop sender wakes it at once; `stop` then joins it. A deadline that no
/// longer fits in an `Instant` ends the worker.
pub(crate) struct RotationWorker {
    stop: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl RotationWorker {
    /// Spawns the worker on a thread named after the window. `step` performs
    /// one rotation and returns the new write position.
    pub(crate) fn spawn(
        name: &'static str,
        granularity: Duration,
        enable_latency_stats: bool,
        mut step: impl FnMut() -> usize + Send + 'static,
    ) -> io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new().name(name.into()).spawn(move || {
            debug!("[{}] rotation started, granularity={:?}", name, granularity);
            let mut measurer = enable_latency_stats.then(LagMeasurer::new);
            let mut next = Instant::now().checked_add(granularity);
            let mut steps: u64 = 0;

            while let Some(deadline) = next {
                let timeout = deadline.saturating_duration_since(Instant::now());
                match stop_rx.recv_timeout(timeout) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Some(measurer) = measurer.as_mut() {
                            measurer.record(Instant::now().saturating_duration_since(deadline));
                        }
                        let pos = step();
                        steps += 1;
                        trace!("[{}] rotated to bucket {}", name, pos);
                        next = deadline.checked_add(granularity);
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            if next.is_none() {
                debug!("[{}] next rotation deadline is out of range", name);
            }

            if let Some(measurer) = measurer {
                info!("[Latency/Rotation:{}]{}", name, measurer.format_stats());
            }
            debug!("[{}] rotation stopped after {} steps", name, steps);
        })?;

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signals the worker and waits for it to exit. Safe to call repeatedly.
    pub(crate) fn stop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            // A panicked step has already unwound the worker; nothing to recover.
            let _ = handle.join();
        }
    }
}

impl Drop for RotationWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
