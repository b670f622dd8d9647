use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Callback invoked with an upload percentage in `0..=100`.
pub type ProgressCallback = Box<dyn Fn(u8) + Send + Sync>;

/// Forwards percentages to a caller callback, never repeating or going back.
///
/// Values below 100 are capped at 99; only [`complete`](Self::complete)
/// emits 100, and only once. Cloning shares the same state, so parallel
/// part uploads can report through their own handle.
///
/// The callback runs without the internal lock held. Values reported while
/// a delivery is in flight, including from inside the callback, are queued
/// and delivered in order by the task already delivering.
#[derive(Clone)]
pub struct ProgressReporter {
    inner: Arc<ReporterInner>,
}

struct ReporterInner {
    callback: ProgressCallback,
    state: Mutex<ReporterState>,
}

#[derive(Default)]
struct ReporterState {
    last: Option<u8>,
    completed: bool,
    delivering: bool,
    queue: VecDeque<u8>,
}

impl ProgressReporter {
    pub fn new(callback: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(ReporterInner {
                callback: Box::new(callback),
                state: Mutex::new(ReporterState::default()),
            }),
        }
    }

    /// A reporter that discards every value.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    fn lock(&self) -> MutexGuard<'_, ReporterState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reports `percent` if it is higher than anything reported so far.
    pub fn report(&self, percent: u8) {
        let percent = percent.min(99);
        let mut state = self.lock();
        if state.completed || state.last.is_some_and(|last| percent <= last) {
            return;
        }
        state.last = Some(percent);
        self.deliver(state, percent);
    }

    /// Emits 100. Later calls are ignored.
    pub fn complete(&self) {
        let mut state = self.lock();
        if state.completed {
            return;
        }
        state.completed = true;
        state.last = Some(100);
        self.deliver(state, 100);
    }

    fn deliver<'a>(&'a self, mut state: MutexGuard<'a, ReporterState>, percent: u8) {
        state.queue.push_back(percent);
        if state.delivering {
            return;
        }
        state.delivering = true;
        while let Some(next) = state.queue.pop_front() {
            drop(state);
            (self.inner.callback)(next);
            state = self.lock();
        }
        state.delivering = false;
    }

    /// Last value delivered to the callback.
    pub fn last(&self) -> Option<u8> {
        self.lock().last
    }

    pub fn is_complete(&self) -> bool {
        self.lock().completed
    }

    /// Maps a `done/total` fraction onto `[start, end]` of this reporter.
    pub fn scaled(&self, start: u8, end: u8) -> ScaledProgress {
        ScaledProgress {
            reporter: self.clone(),
            start: start.min(end),
            end,
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("last", &self.last())
            .finish_non_exhaustive()
    }
}

/// A sub-range of a [`ProgressReporter`].
#[derive(Debug, Clone)]
pub struct ScaledProgress {
    reporter: ProgressReporter,
    start: u8,
    end: u8,
}

impl ScaledProgress {
    /// Reports `done` of `total` units. An empty total maps to the end of the range.
    pub fn update(&self, done: u64, total: u64) {
        let span = u64::from(self.end - self.start);
        let offset = if total == 0 {
            span
        } else {
            span * done.min(total) / total
        };
        self.reporter.report(self.start + offset as u8);
    }

    /// Reports the end of the range.
    pub fn finish(&self) {
        self.reporter.report(self.end);
    }
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

struct SpeedSample {
    bytes: u64,
    timestamp: Instant,
}

/// Calculates transfer speed using a sliding window of samples.
pub struct SpeedCalculator {
    inner: Mutex<SpeedInner>,
}

struct SpeedInner {
    samples: Vec<SpeedSample>,
    max_samples: usize,
    window_size: Duration,
}

impl SpeedCalculator {
    /// Creates a new calculator.
    ///
    /// - `window_size`: time window for speed calculation (default 5 s).
    /// - `max_samples`: maximum retained samples (default 100).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(SpeedInner {
                samples: Vec::new(),
                max_samples: max_samples.unwrap_or(100),
                window_size: window_size.unwrap_or(Duration::from_secs(5)),
            }),
        }
    }

    /// Records `bytes` transferred at the current instant.
    pub fn add_sample(&self, bytes: u64) {
        let mut s = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        s.samples.push(SpeedSample {
            bytes,
            timestamp: now,
        });

        if let Some(cutoff) = now.checked_sub(s.window_size) {
            s.samples.retain(|sample| sample.timestamp >= cutoff);
        }

        if s.samples.len() > s.max_samples {
            let excess = s.samples.len() - s.max_samples;
            s.samples.drain(..excess);
        }
    }

    /// Average speed in bytes/second within the window; 0 with fewer than 2 samples.
    pub fn bytes_per_second(&self) -> f64 {
        let s = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let (Some(first), Some(last)) = (s.samples.first(), s.samples.last()) else {
            return 0.0;
        };
        let elapsed = last.timestamp.duration_since(first.timestamp);
        if s.samples.len() < 2 || elapsed.is_zero() {
            return 0.0;
        }
        let total_bytes: u64 = s.samples.iter().map(|sample| sample.bytes).sum();
        total_bytes as f64 / elapsed.as_secs_f64()
    }
}
