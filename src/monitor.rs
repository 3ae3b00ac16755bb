//! Wall-clock progress estimation for an encode whose real progress is not observable.
//!
//! The monitor assumes constant throughput: `elapsed / expected_duration`. Mid-run values can be
//! off for content of varying complexity; the last reported value is always exactly 100.

use std::time::{Duration, Instant};

use crate::error::AppError;

const LOG_TARGET: &str = "vidpress::monitor";

/// Delay between liveness checks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Updates are emitted only once the estimate has moved by at least this many percent.
const MIN_STEP_PERCENT: f64 = 1.0;

pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Handle to a running external encode.
pub trait EncodeProcess {
    /// Non-blocking; `Ok(true)` once the process has terminated.
    fn has_exited(&mut self) -> Result<bool, AppError>;

    /// Blocks until the process exits. A non-zero exit is an `AppError::EncodeFailed`.
    fn wait(&mut self) -> Result<(), AppError>;
}

impl<P: EncodeProcess + ?Sized> EncodeProcess for Box<P> {
    fn has_exited(&mut self) -> Result<bool, AppError> {
        (**self).has_exited()
    }

    fn wait(&mut self) -> Result<(), AppError> {
        (**self).wait()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Running,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    /// In [0, 100].
    pub percent: f64,
    pub state: MonitorState,
}

impl ProgressUpdate {
    pub fn whole_percent(&self) -> u64 {
        self.percent.floor() as u64
    }
}

pub struct ProgressMonitor<C: Clock> {
    clock: C,
    expected_secs: f64,
    started_at: Instant,
    last_reported: f64,
    state: MonitorState,
}

impl<C: Clock> ProgressMonitor<C> {
    /// Starts the clock. Returns `None` when `expected_secs` is not a positive finite number,
    /// in which case the caller has nothing to estimate against.
    pub fn new(clock: C, expected_secs: f64) -> Option<Self> {
        if !expected_secs.is_finite() || expected_secs <= 0.0 {
            return None;
        }
        let started_at = clock.now();
        Some(Self {
            clock,
            expected_secs,
            started_at,
            last_reported: 0.0,
            state: MonitorState::Running,
        })
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn last_reported(&self) -> f64 {
        self.last_reported
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.started_at)
    }

    /// Time-based estimate right now, clamped to [0, 100].
    pub fn estimate(&self) -> f64 {
        let ratio = self.elapsed().as_secs_f64() / self.expected_secs;
        (ratio * 100.0).clamp(0.0, 100.0)
    }

    /// One poll while the process is still running. Returns an update when the estimate has
    /// advanced by a whole percent since the last one.
    pub fn tick(&mut self) -> Option<ProgressUpdate> {
        if self.state == MonitorState::Completed {
            return None;
        }
        let estimate = self.estimate();
        if estimate - self.last_reported < MIN_STEP_PERCENT {
            return None;
        }
        self.last_reported = estimate;
        log::trace!(target: LOG_TARGET, "progress {:.1}%", estimate);
        Some(ProgressUpdate {
            percent: estimate,
            state: MonitorState::Running,
        })
    }

    /// Process has terminated: pins the reported value to 100.
    pub fn complete(&mut self) -> ProgressUpdate {
        if self.state == MonitorState::Running {
            log::debug!(
                target: LOG_TARGET,
                "encode finished after {:.1}s (expected {:.1}s, last estimate {:.1}%)",
                self.elapsed().as_secs_f64(),
                self.expected_secs,
                self.last_reported
            );
        }
        self.state = MonitorState::Completed;
        self.last_reported = 100.0;
        ProgressUpdate {
            percent: 100.0,
            state: MonitorState::Completed,
        }
    }

    /// Polls `process` every [`POLL_INTERVAL`] on the calling thread until it exits, feeding
    /// `on_update`. Ends with a 100% update, then returns the process' exit result.
    pub fn run<P>(
        &mut self,
        process: &mut P,
        mut on_update: impl FnMut(ProgressUpdate),
    ) -> Result<(), AppError>
    where
        P: EncodeProcess + ?Sized,
    {
        while !process.has_exited()? {
            if let Some(update) = self.tick() {
                on_update(update);
            }
            self.clock.sleep(POLL_INTERVAL);
        }
        let result = process.wait();
        on_update(self.complete());
        result
    }
}
