//! A module for defining a [`Workload`] and controlling it while it runs.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use sketches_ddsketch::DDSketch;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::config::Limits;
use crate::demand::Demand;
use crate::error::ConfigError;
use crate::pacing::{Counters, ObjectPool, PacingLimits, PacingPhase, PacingState, Tick};
use crate::params::{DemandBuilder, WorkloadParams};

/// A builder for creating a [`Workload`].
#[derive(Debug)]
pub struct WorkloadBuilder {
    name: String,
    demand: Arc<dyn Demand>,
    limits: PacingLimits,

    object_prefix: String,
    object_count: usize,
    payload_size: usize,
}

impl WorkloadBuilder {
    /// The maximum number of concurrent operations that can be performed within this workload.
    pub fn concurrency(mut self, concurrency: u64) -> Self {
        self.limits.max_concurrent = concurrency;
        self
    }

    /// The number of due operations this workload may fall behind before skipping.
    pub fn max_backlog(mut self, max_backlog: u64) -> Self {
        self.limits.max_backlog = max_backlog;
        self
    }

    /// The objects written in rotation, named `<prefix><index>`.
    pub fn objects(mut self, prefix: impl Into<String>, count: usize) -> Self {
        self.object_prefix = prefix.into();
        self.object_count = count;
        self
    }

    /// The size of every written payload in bytes.
    pub fn payload_size(mut self, payload_size: usize) -> Self {
        self.payload_size = payload_size;
        self
    }

    /// Creates the workload instance.
    pub fn build(self) -> Workload {
        Workload {
            name: self.name,
            demand: self.demand,
            limits: self.limits,
            objects: ObjectPool::new(self.object_prefix, self.object_count),
            payload: Bytes::from(vec![b'c'; self.payload_size]),
        }
    }
}

/// A load curve that can be run against a storage backend.
#[derive(Debug)]
pub struct Workload {
    /// Name of the workload for identification in logs and reports.
    pub(crate) name: String,
    demand: Arc<dyn Demand>,
    limits: PacingLimits,
    objects: ObjectPool,
    payload: Bytes,
}

impl Workload {
    /// Constructs a new workload builder with the given name and demand curve.
    pub fn builder(name: impl Into<String>, demand: impl Demand + 'static) -> WorkloadBuilder {
        let limits = Limits::default();
        WorkloadBuilder {
            name: name.into(),
            demand: Arc::new(demand),
            limits: PacingLimits {
                max_concurrent: limits.iodepth,
                max_backlog: limits.max_backlog,
            },

            object_prefix: limits.object_prefix,
            object_count: limits.object_count,
            payload_size: limits.payload_size.as_u64() as usize,
        }
    }

    /// Creates the `index`-th workload from its parameter string.
    ///
    /// The `name`, `iodepth` and `backlog` parameters override the defaults from `limits`.
    pub fn from_params(
        index: usize,
        params: &WorkloadParams,
        limits: &Limits,
    ) -> Result<Self, ConfigError> {
        for key in params.unknown_keys() {
            tracing::warn!(key, "ignoring unknown workload parameter");
        }

        let name = params
            .get("name")
            .map(str::to_owned)
            .unwrap_or_else(|| format!("workload_{index}"));
        let demand = DemandBuilder::from_params(params)?.build()?;
        let iodepth = params.parse("iodepth")?.unwrap_or(limits.iodepth);
        let backlog = params.parse("backlog")?.unwrap_or(limits.max_backlog);

        Ok(Self::builder(name, demand)
            .concurrency(iodepth)
            .max_backlog(backlog)
            .objects(limits.object_prefix.clone(), limits.object_count)
            .payload_size(limits.payload_size.as_u64() as usize)
            .build())
    }

    /// The name of this workload.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The limits this workload is paced with.
    pub fn limits(&self) -> PacingLimits {
        self.limits
    }

    /// Activates the workload at `start`, returning the handle used to drive it.
    pub fn activate(self, start: Instant, report_interval: Duration) -> WorkloadHandle {
        let state = PacingState::new(
            self.demand,
            self.limits,
            self.objects,
            start,
            report_interval,
        );

        WorkloadHandle {
            shared: Arc::new(Shared {
                name: self.name,
                payload: self.payload,
                state: Mutex::new(state),
                latency: Mutex::new(DDSketch::default()),
                wake: Notify::new(),
                stopped: Notify::new(),
            }),
        }
    }
}

struct Shared {
    name: String,
    payload: Bytes,
    state: Mutex<PacingState>,
    latency: Mutex<DDSketch>,
    /// Wakes the dispatch loop after a completion or a stop request.
    wake: Notify,
    /// Signalled once the dispatch loop observed the stopped state.
    stopped: Notify,
}

/// Handle to an active workload.
///
/// All mutations of the pacing state go through this handle and are serialized by a mutex, so
/// ticks and completions may arrive from any task in any order. Clones refer to the same
/// workload.
#[derive(Clone)]
pub struct WorkloadHandle {
    shared: Arc<Shared>,
}

impl WorkloadHandle {
    /// The name of this workload.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The payload written by every operation.
    pub fn payload(&self) -> Bytes {
        self.shared.payload.clone()
    }

    /// The instant this workload was activated.
    pub fn start(&self) -> Instant {
        self.shared.state.lock().unwrap().start()
    }

    /// Runs one scheduler tick at `now`.
    pub fn tick(&self, now: Instant) -> Tick {
        self.shared.state.lock().unwrap().tick(now)
    }

    /// Records a finished operation and wakes the dispatch loop.
    ///
    /// Must be called exactly once per dispatched operation, whether it succeeded or not.
    pub fn complete(&self, success: bool, latency: Duration) {
        self.shared.state.lock().unwrap().complete(success);
        if success {
            self.shared.latency.lock().unwrap().add(latency.as_secs_f64());
        }
        self.shared.wake.notify_one();
    }

    /// Waits until a completion or a stop request wakes the dispatch loop.
    pub(crate) async fn woken(&self) {
        self.shared.wake.notified().await;
    }

    /// Waits for `idle`, returning early if woken.
    pub(crate) async fn idle(&self, idle: Duration) {
        tokio::select! {
            _ = self.shared.wake.notified() => {}
            _ = tokio::time::sleep(idle) => {}
        }
    }

    /// Announces that the dispatch loop has exited.
    pub(crate) fn notify_stopped(&self) {
        self.shared.stopped.notify_waiters();
    }

    /// Returns the operations completed since the previous report if the deadline passed at
    /// `now`, and advances the deadline.
    pub fn take_report(&self, now: Instant) -> Option<u64> {
        self.shared.state.lock().unwrap().take_report(now)
    }

    /// A snapshot of the operation counters.
    pub fn counters(&self) -> Counters {
        self.shared.state.lock().unwrap().counters()
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> PacingPhase {
        self.shared.state.lock().unwrap().phase()
    }

    /// Returns `true` once the workload drained all operations after [`stop`](Self::stop).
    pub fn is_stopped(&self) -> bool {
        self.shared.state.lock().unwrap().is_stopped()
    }

    /// Stops dispatching and waits until all outstanding operations completed.
    ///
    /// In-flight operations are never cancelled.
    pub async fn stop(&self) {
        self.shared.state.lock().unwrap().request_stop();
        self.shared.wake.notify_one();

        loop {
            let stopped = self.shared.stopped.notified();
            if self.is_stopped() {
                break;
            }
            tracing::debug!(
                workload = self.name(),
                in_flight = self.counters().outstanding(),
                "waiting for workload to drain"
            );
            stopped.await;
        }

        tracing::debug!(workload = self.name(), "workload stopped");
    }

    /// Collects counters and latencies for the final report.
    pub fn summary(&self) -> WorkloadSummary {
        let (counters, limits) = {
            let state = self.shared.state.lock().unwrap();
            (state.counters(), state.limits())
        };

        WorkloadSummary {
            name: self.shared.name.clone(),
            counters,
            limits,
            latency: self.shared.latency.lock().unwrap().clone(),
        }
    }
}

impl fmt::Debug for WorkloadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkloadHandle")
            .field("name", &self.shared.name)
            .field("counters", &self.counters())
            .finish()
    }
}

/// Final numbers of a workload.
pub struct WorkloadSummary {
    /// Name of the workload.
    pub name: String,
    /// Operation counters at shutdown.
    pub counters: Counters,
    /// The limits the workload was paced with.
    pub limits: PacingLimits,
    /// Latencies of successful writes, in seconds.
    pub latency: DDSketch,
}

impl fmt::Debug for WorkloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkloadSummary")
            .field("name", &self.name)
            .field("counters", &self.counters)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::{DemandFunction, SineComponent};

    #[derive(Debug)]
    struct Burst(f64);

    impl Demand for Burst {
        fn due(&self, _elapsed: f64) -> f64 {
            self.0
        }
    }

    #[test]
    fn from_params_applies_overrides() {
        let params = "name=bursty iodepth=8 backlog=20 cnt=1 amp=100 period=10 rand=3"
            .parse()
            .unwrap();
        let limits = Limits {
            payload_size: bytesize::ByteSize::b(16),
            ..Default::default()
        };

        let workload = Workload::from_params(4, &params, &limits).unwrap();
        assert_eq!(workload.name(), "bursty");
        assert_eq!(
            workload.limits(),
            PacingLimits {
                max_concurrent: 8,
                max_backlog: 20
            }
        );
        assert_eq!(workload.payload.len(), 16);

        let workload = Workload::from_params(4, &"".parse().unwrap(), &limits).unwrap();
        assert_eq!(workload.name(), "workload_4");
        assert_eq!(workload.limits().max_concurrent, 150);
    }

    #[test]
    fn from_params_rejects_invalid_limits() {
        let params = "iodepth=-3".parse().unwrap();
        let err = Workload::from_params(0, &params, &Limits::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { key: "iodepth", .. }));
    }

    #[test]
    fn handle_serializes_ticks_and_completions() {
        let workload = Workload::builder("test", Burst(1000.0))
            .concurrency(5)
            .build();
        let handle = workload.activate(Instant::now(), Duration::from_secs(1));

        let tick = handle.tick(handle.start());
        assert_eq!(tick.dispatch.len(), 5);
        assert_eq!(tick.outstanding, 5);

        for _ in 0..5 {
            handle.complete(true, Duration::from_millis(3));
        }
        let summary = handle.summary();
        assert_eq!(summary.counters.done, 5);
        assert_eq!(summary.latency.count(), 5);
    }

    #[test]
    fn from_params_accepts_huge_limits() {
        let params = "iodepth=18446744073709551615 backlog=18446744073709551615 cnt=1 amp=100 \
                      period=10 shift=0 rand=1"
            .parse()
            .unwrap();
        let workload = Workload::from_params(0, &params, &Limits::default()).unwrap();
        assert_eq!(workload.limits().max_concurrent, u64::MAX);

        let handle = workload.activate(Instant::now(), Duration::from_secs(1));
        let tick = handle.tick(handle.start() + Duration::from_secs(5));
        assert!(!tick.dispatch.is_empty());
        assert_eq!(tick.skipped, 0);
    }

    #[tokio::test]
    async fn stop_waits_for_drain() {
        let demand = DemandFunction::new(vec![SineComponent::from_period(100.0, 10.0, 0.0)], 1.0);
        let handle = Workload::builder("test", demand)
            .build()
            .activate(Instant::now(), Duration::from_secs(1));
        let tick = handle.tick(handle.start() + Duration::from_secs(2));
        let in_flight = tick.dispatch.len();
        assert!(in_flight > 0);

        let stop = tokio::spawn({
            let handle = handle.clone();
            async move { handle.stop().await }
        });

        // Play the dispatch loop: drain, then observe the stopped state.
        while handle.phase() != PacingPhase::Draining {
            tokio::task::yield_now().await;
        }
        for _ in 0..in_flight {
            handle.complete(false, Duration::ZERO);
        }
        let tick = handle.tick(handle.start() + Duration::from_secs(3));
        assert_eq!(tick.phase, PacingPhase::Stopped);
        handle.notify_stopped();

        stop.await.unwrap();
        let counters = handle.counters();
        assert!(handle.is_stopped());
        assert_eq!(counters.started, counters.done);
        assert_eq!(counters.failed, in_flight as u64);
        assert_eq!(handle.summary().latency.count(), 0);
    }
}
