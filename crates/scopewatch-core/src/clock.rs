//! Monotonic clock sources and the per-scope elapsed timer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic time source. `now` is an offset from an arbitrary, fixed origin.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// `Instant`-backed clock; the origin is the moment the clock was built.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to. Clones share the same timeline.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

const RUNNING: u64 = u64::MAX;

/// Start/stop timer over a shared clock. Starts on construction; `stop` freezes
/// the reading and is idempotent.
pub struct ElapsedTimer {
    clock: Arc<dyn Clock>,
    started: Duration,
    stopped_nanos: AtomicU64,
}

impl ElapsedTimer {
    pub fn start(clock: Arc<dyn Clock>) -> Self {
        let started = clock.now();
        Self {
            clock,
            started,
            stopped_nanos: AtomicU64::new(RUNNING),
        }
    }

    /// Clock reading at start.
    pub fn started(&self) -> Duration {
        self.started
    }

    pub fn stop(&self) {
        let elapsed = self.measure();
        let _ = self.stopped_nanos.compare_exchange(
            RUNNING,
            elapsed,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub fn is_running(&self) -> bool {
        self.stopped_nanos.load(Ordering::Acquire) == RUNNING
    }

    /// Running value, or the frozen one after `stop`.
    pub fn elapsed(&self) -> Duration {
        match self.stopped_nanos.load(Ordering::Acquire) {
            RUNNING => Duration::from_nanos(self.measure()),
            frozen => Duration::from_nanos(frozen),
        }
    }

    pub fn milliseconds(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn measure(&self) -> u64 {
        let span = self.clock.now().saturating_sub(self.started);
        // RUNNING is reserved as the sentinel.
        u64::try_from(span.as_nanos()).unwrap_or(RUNNING - 1).min(RUNNING - 1)
    }
}

impl std::fmt::Debug for ElapsedTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElapsedTimer")
            .field("started", &self.started)
            .field("elapsed", &self.elapsed())
            .field("running", &self.is_running())
            .finish()
    }
}
