//! Time sources for the pacing scheduler.
//!
//! All scheduling decisions derive from `now - start` on a [`Clock`]. Swapping the clock is how
//! dry runs accelerate time without a separate scheduling path.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

/// A source of the current time.
pub trait Clock: fmt::Debug + Send + Sync {
    /// Returns the current instant on this clock.
    fn now(&self) -> Instant;
}

/// Shared handle to a [`Clock`].
pub type SharedClock = Arc<dyn Clock>;

/// The real monotonic clock of the tokio runtime.
///
/// Honors paused time in tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that runs `factor` times faster than real time, starting from its creation.
#[derive(Clone, Copy, Debug)]
pub struct ScaledClock {
    origin: Instant,
    factor: f64,
}

impl ScaledClock {
    /// Speed-up used for dry runs.
    pub const DRY_RUN_FACTOR: f64 = 10.0;

    /// Creates a clock running `factor` times faster than real time.
    pub fn new(factor: f64) -> Self {
        Self {
            origin: Instant::now(),
            factor,
        }
    }

    /// The speed-up factor of this clock.
    pub fn factor(&self) -> f64 {
        self.factor
    }
}

impl Clock for ScaledClock {
    fn now(&self) -> Instant {
        self.origin + self.origin.elapsed().mul_f64(self.factor)
    }
}

/// A clock that only moves when told to.
#[derive(Clone, Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Default::default(),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, duration: Duration) {
        *self.offset.lock().unwrap() += duration;
    }

    /// Moves the clock to `elapsed` after its creation.
    pub fn set_elapsed(&self, elapsed: Duration) {
        *self.offset.lock().unwrap() = elapsed;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap()
    }
}
