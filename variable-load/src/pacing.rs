//! The pacing scheduler.
//!
//! [`PacingState`] turns a continuous [`Demand`] curve into discrete operations. On every tick
//! it compares the cumulative demand with what has already been accounted for and decides how
//! many new operations to start, subject to two limits:
//!
//! - **Backlog**: if the workload fell behind by more than `max_backlog` operations, the excess
//!   is counted as skipped instead of being issued late.
//! - **Concurrency**: no more than `max_concurrent` operations are outstanding at any time.
//!
//! No fractional remainder is carried between ticks. The demand is recomputed from the elapsed
//! time on every tick, so tick jitter never accumulates into drift.
//!
//! The state is a plain synchronous state machine. Serializing ticks and completions is the job
//! of the caller, see [`WorkloadHandle`](crate::workload::WorkloadHandle).

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::demand::Demand;

/// Limits applied by the scheduler on every tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacingLimits {
    /// Maximum number of outstanding operations.
    pub max_concurrent: u64,
    /// Maximum number of due operations that may be caught up on before excess is skipped.
    pub max_backlog: u64,
}

impl Default for PacingLimits {
    fn default() -> Self {
        Self {
            max_concurrent: 150,
            max_backlog: 2000,
        }
    }
}

/// Round-robin selection over a fixed set of object names.
#[derive(Clone, Debug)]
pub struct ObjectPool {
    prefix: String,
    count: usize,
    next: usize,
}

impl ObjectPool {
    /// Creates a pool of `count` objects named `<prefix><index>`.
    pub fn new(prefix: impl Into<String>, count: usize) -> Self {
        Self {
            prefix: prefix.into(),
            count: count.max(1),
            next: 0,
        }
    }

    /// Returns the name of the next object in the rotation.
    pub fn next_object(&mut self) -> String {
        self.next = (self.next + 1) % self.count;
        format!("{}{}", self.prefix, self.next)
    }
}

/// Lifecycle of a [`PacingState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacingPhase {
    /// Dispatching operations according to demand.
    Active,
    /// Stop requested; waiting for outstanding operations to complete.
    Draining,
    /// Stop requested and nothing is outstanding. Terminal.
    Stopped,
}

/// Snapshot of the operation counters of a workload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    /// Operations handed to the backend.
    pub started: u64,
    /// Operations that completed, successfully or not.
    pub done: u64,
    /// Operations that were due but dropped because the backlog was too large.
    pub skipped: u64,
    /// Completed operations that reported an error.
    pub failed: u64,
    /// Value of `done` at the last report.
    pub reported: u64,
}

impl Counters {
    /// Operations started but not yet completed.
    pub fn outstanding(&self) -> u64 {
        self.started - self.done
    }
}

/// The outcome of a single [`PacingState::tick`].
#[derive(Debug)]
pub struct Tick {
    /// Cumulative demand at the time of the tick.
    pub target: f64,
    /// Objects to write, one per newly started operation.
    pub dispatch: Vec<String>,
    /// Operations skipped during this tick.
    pub skipped: u64,
    /// Operations outstanding after this tick, including the new ones.
    pub outstanding: u64,
    /// Whether the reporting deadline of this workload has passed.
    pub report_due: bool,
    /// Lifecycle phase after this tick.
    pub phase: PacingPhase,
}

impl Tick {
    /// Returns `true` if nothing is in flight, so no completion will trigger the next tick.
    pub fn is_idle(&self) -> bool {
        self.outstanding == 0
    }
}

/// Mutable scheduling state of a single workload.
#[derive(Debug)]
pub struct PacingState {
    demand: Arc<dyn Demand>,
    limits: PacingLimits,
    objects: ObjectPool,
    counters: Counters,

    start: Instant,
    report_interval: Duration,
    next_report: Instant,

    stopping: bool,
    stopped: bool,
}

impl PacingState {
    /// Creates the state for a workload activated at `start`.
    pub fn new(
        demand: Arc<dyn Demand>,
        limits: PacingLimits,
        objects: ObjectPool,
        start: Instant,
        report_interval: Duration,
    ) -> Self {
        Self {
            demand,
            limits,
            objects,
            counters: Counters::default(),

            start,
            report_interval,
            next_report: start + report_interval,

            stopping: false,
            stopped: false,
        }
    }

    /// Computes and starts the operations that are due at `now`.
    pub fn tick(&mut self, now: Instant) -> Tick {
        let elapsed = now.saturating_duration_since(self.start).as_secs_f64();
        let target = self.demand.due(elapsed);
        let report_due = now >= self.next_report;

        if self.stopping {
            if self.counters.outstanding() == 0 {
                self.stopped = true;
            }
            return self.finish(target, Vec::new(), 0, report_due);
        }

        let accounted = saturating_i64(self.counters.started + self.counters.skipped);
        let mut pending = (target.floor() as i64).saturating_sub(accounted);

        let max_backlog = saturating_i64(self.limits.max_backlog);
        let mut skipped = 0;
        if pending > max_backlog {
            skipped = (pending - max_backlog) as u64;
            self.counters.skipped += skipped;
            pending = max_backlog;
        }

        let outstanding = saturating_i64(self.counters.outstanding());
        let max_concurrent = saturating_i64(self.limits.max_concurrent);
        if pending.saturating_add(outstanding) > max_concurrent {
            pending = max_concurrent - outstanding;
        }

        let mut dispatch = Vec::new();
        if pending >= 1 {
            dispatch.reserve(pending as usize);
            for _ in 0..pending {
                self.counters.started += 1;
                dispatch.push(self.objects.next_object());
            }
        }

        self.finish(target, dispatch, skipped, report_due)
    }

    fn finish(&self, target: f64, dispatch: Vec<String>, skipped: u64, report_due: bool) -> Tick {
        Tick {
            target,
            dispatch,
            skipped,
            outstanding: self.counters.outstanding(),
            report_due,
            phase: self.phase(),
        }
    }

    /// Records the completion of an operation started by [`tick`](Self::tick).
    pub fn complete(&mut self, success: bool) {
        debug_assert!(self.counters.done < self.counters.started);
        self.counters.done += 1;
        if !success {
            self.counters.failed += 1;
        }
    }

    /// Stops dispatching new operations. Outstanding operations still complete.
    pub fn request_stop(&mut self) {
        self.stopping = true;
    }

    /// Returns `true` once stopping was requested and all operations have completed.
    pub fn is_stopped(&self) -> bool {
        self.stopped && self.counters.outstanding() == 0
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> PacingPhase {
        if !self.stopping {
            PacingPhase::Active
        } else if self.is_stopped() {
            PacingPhase::Stopped
        } else {
            PacingPhase::Draining
        }
    }

    /// Returns the operations completed since the previous report and advances the deadline.
    ///
    /// Returns `None` without touching the counters if the deadline has not passed at `now`.
    pub fn take_report(&mut self, now: Instant) -> Option<u64> {
        if now < self.next_report {
            return None;
        }

        let completed = self.counters.done - self.counters.reported;
        self.counters.reported = self.counters.done;
        self.next_report += self.report_interval;
        Some(completed)
    }

    /// A snapshot of the operation counters.
    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// The instant this workload was activated.
    pub fn start(&self) -> Instant {
        self.start
    }

    /// The configured limits.
    pub fn limits(&self) -> PacingLimits {
        self.limits
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
