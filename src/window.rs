use crate::error::{ArgumentError, ConfigError, Result};
use crate::rotation::RotationWorker;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Options for building a [`Window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowOptions {
    /// Label used in log lines and as the rotation thread name.
    pub name: &'static str,
    /// Total span covered by the window.
    pub window: Duration,
    /// Span covered by one bucket.
    pub granularity: Duration,
    /// Record how late each rotation tick fires and log a summary on stop.
    pub enable_latency_stats: bool,
}

impl WindowOptions {
    pub fn new(window: Duration, granularity: Duration) -> Self {
        Self {
            name: "window",
            window,
            granularity,
            enable_latency_stats: false,
        }
    }
}

/// Result of [`Window::last`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    /// Sum of every visited bucket.
    pub total: i64,
    /// Number of visited buckets holding a non-zero value.
    pub samples: usize,
}

impl Tally {
    /// Average over the active buckets only, `None` if none were active.
    pub fn average(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.total as f64 / self.samples as f64)
    }
}

/// Bucket ring guarded as one unit by the window's lock.
struct Buckets {
    slots: Box<[i64]>,
    pos: usize,
    filled: usize,
}

impl Buckets {
    fn new(len: usize) -> Self {
        Self {
            slots: vec![0; len].into_boxed_slice(),
            pos: 0,
            filled: 1,
        }
    }

    #[inline]
    fn add(&mut self, value: i64) {
        let slot = &mut self.slots[self.pos];
        *slot = slot.wrapping_add(value);
    }

    /// Moves to the next bucket and clears it. Returns the new position.
    fn rotate(&mut self) -> usize {
        self.pos = (self.pos + 1) % self.slots.len();
        self.slots[self.pos] = 0;
        self.filled = (self.filled + 1).min(self.slots.len());
        self.pos
    }

    /// Sums the `n` most recent buckets, nearest first. `n` must be in
    /// `1..=len`.
    fn tally(&self, n: usize) -> Tally {
        let len = self.slots.len();
        let mut tally = Tally::default();
        for k in 0..n {
            let value = self.slots[(self.pos + len - k) % len];
            tally.total = tally.total.wrapping_add(value);
            if value != 0 {
                tally.samples += 1;
            }
        }
        tally
    }
}

/// A sliding-window counter.
///
/// The window is split into `window / granularity` buckets arranged in a
/// ring. Values added now land in the current bucket; a background worker
/// moves to the next bucket every `granularity`, clearing it, so anything
/// older than `window` falls out.
///
/// All bucket state sits behind a single `RwLock`. `add` and rotation take
/// the write lock, `last` holds the read lock for its whole traversal, so a
/// query always sees the ring either entirely before or entirely after a
/// rotation.
///
/// ```text
///  pos = 2, last(3) visits 2, 1, 0
///  ---------------------------------
///  |  4  |  0  |  9  |  0  |  7   |
///  ---------------------------------
///     0     1     2     3     4
/// ```
pub struct Window {
    name: &'static str,
    window: Duration,
    granularity: Duration,
    len: usize,
    buckets: Arc<RwLock<Buckets>>,
    rotation: Mutex<Option<RotationWorker>>,
}

impl Window {
    pub fn new(window: Duration, granularity: Duration) -> Result<Self> {
        Self::with_options(WindowOptions::new(window, granularity), &[])
    }

    /// Builds a window pre-seeded with historical per-bucket values.
    ///
    /// Each sample occupies its own bucket, oldest first; the last sample
    /// lands in the bucket that is current once construction returns.
    pub fn from_samples(window: Duration, granularity: Duration, samples: &[i64]) -> Result<Self> {
        Self::with_options(WindowOptions::new(window, granularity), samples)
    }

    pub fn with_options(options: WindowOptions, samples: &[i64]) -> Result<Self> {
        let len = bucket_count(options.window, options.granularity)?;
        if samples.len() > len {
            return Err(ConfigError::TooManySamples {
                samples: samples.len(),
                buckets: len,
            }
            .into());
        }

        let mut buckets = Buckets::new(len);
        for (i, sample) in samples.iter().enumerate() {
            buckets.add(*sample);
            if i + 1 != samples.len() {
                buckets.rotate();
            }
        }

        let buckets = Arc::new(RwLock::new(buckets));
        let worker = {
            let buckets = buckets.clone();
            RotationWorker::spawn(
                options.name,
                options.granularity,
                options.enable_latency_stats,
                move || write(&buckets).rotate(),
            )?
        };

        Ok(Self {
            name: options.name,
            window: options.window,
            granularity: options.granularity,
            len,
            buckets,
            rotation: Mutex::new(Some(worker)),
        })
    }

    /// Adds `value` to the current bucket.
    pub fn add(&self, value: i64) {
        write(&self.buckets).add(value);
    }

    /// Sums the `n` most recent buckets, counting back from the current one.
    ///
    /// `n` must be between 1 and the number of buckets; larger requests are
    /// rejected rather than clamped. Buckets that were never written count
    /// as zero and are not included in [`Tally::samples`].
    pub fn last(&self, n: i64) -> Result<Tally> {
        if n <= 0 {
            return Err(ArgumentError::NonPositive { requested: n }.into());
        }
        let count = match usize::try_from(n) {
            Ok(count) if count <= self.len => count,
            _ => {
                return Err(ArgumentError::ExceedsWindow {
                    requested: n,
                    buckets: self.len,
                }
                .into());
            }
        };

        Ok(read(&self.buckets).tally(count))
    }

    /// Stops the rotation worker and waits for it to exit.
    ///
    /// The counter stays readable and writable afterwards; it simply stops
    /// moving forward in time. Calling this more than once is a no-op.
    pub fn stop(&self) {
        let worker = self
            .rotation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut worker) = worker {
            worker.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        self.rotation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(RotationWorker::is_running)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn granularity(&self) -> Duration {
        self.granularity
    }

    /// Number of buckets. Fixed for the lifetime of the window.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: a valid window holds at least two buckets.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets that have been current at least once.
    pub fn filled(&self) -> usize {
        read(&self.buckets).filled
    }
}

impl Debug for Window {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let buckets = read(&self.buckets);
        f.debug_struct("Window")
            .field("name", &self.name)
            .field("window", &self.window)
            .field("granularity", &self.granularity)
            .field("buckets", &buckets.slots)
            .field("pos", &buckets.pos)
            .field("filled", &buckets.filled)
            .finish()
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        self.stop();
    }
}

fn bucket_count(window: Duration, granularity: Duration) -> Result<usize> {
    if window.is_zero() {
        return Err(ConfigError::ZeroWindow.into());
    }
    if granularity.is_zero() {
        return Err(ConfigError::ZeroGranularity.into());
    }

    let (window_nanos, granularity_nanos) = (window.as_nanos(), granularity.as_nanos());
    if window_nanos <= granularity_nanos || window_nanos % granularity_nanos != 0 {
        return Err(ConfigError::NotMultiple {
            window,
            granularity,
        }
        .into());
    }

    // The rotation worker schedules its first tick at `now + granularity`.
    if Instant::now().checked_add(granularity).is_none() {
        return Err(ConfigError::GranularityOutOfRange { granularity }.into());
    }

    let buckets = window_nanos / granularity_nanos;
    usize::try_from(buckets).map_err(|_| ConfigError::TooManyBuckets { buckets }.into())
}

// Every mutation leaves `Buckets` valid, so a poisoned lock is still usable.
fn read(buckets: &RwLock<Buckets>) -> RwLockReadGuard<'_, Buckets> {
    buckets.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(buckets: &RwLock<Buckets>) -> RwLockWriteGuard<'_, Buckets> {
    buckets.write().unwrap_or_else(PoisonError::into_inner)
}
