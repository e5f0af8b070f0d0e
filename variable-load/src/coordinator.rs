//! Run workloads concurrently against a storage backend and print reports.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::backend::{self, IoContext, NullBackend, SharedBackend};
use crate::clock::{RealClock, ScaledClock, SharedClock};
use crate::config::Config;
use crate::dispatch::dispatch_loop;
use crate::params::WorkloadParams;
use crate::report::{self, Reporter};
use crate::workload::{Workload, WorkloadHandle, WorkloadSummary};

/// Owns the set of active workloads for the duration of a run.
///
/// Workloads are added with [`start`](Self::start), sampled by the reporter while they run, and
/// drained by [`shutdown`](Self::shutdown).
#[derive(Debug)]
pub struct Coordinator {
    context: IoContext,
    clock: SharedClock,
    report_interval: Duration,
    report_due: Arc<Notify>,

    workloads: Vec<WorkloadHandle>,
    loops: Vec<JoinHandle<()>>,
    reporter: Option<JoinHandle<()>>,
}

impl Coordinator {
    /// Creates a coordinator issuing operations through `context`.
    pub fn new(context: IoContext, clock: SharedClock, report_interval: Duration) -> Self {
        Self {
            context,
            clock,
            report_interval,
            report_due: Arc::new(Notify::new()),

            workloads: Vec::new(),
            loops: Vec::new(),
            reporter: None,
        }
    }

    /// Activates all workloads at the current instant and starts reporting.
    pub fn start(&mut self, workloads: Vec<Workload>) {
        let start = self.clock.now();

        for workload in workloads {
            tracing::info!(
                workload = workload.name(),
                iodepth = workload.limits().max_concurrent,
                backlog = workload.limits().max_backlog,
                "starting workload"
            );
            let handle = workload.activate(start, self.report_interval);
            let task = tokio::spawn(dispatch_loop(
                handle.clone(),
                self.context.clone(),
                Arc::clone(&self.clock),
                Arc::clone(&self.report_due),
            ));

            self.workloads.push(handle);
            self.loops.push(task);
        }

        if let Some(reporter) = self.reporter.take() {
            reporter.abort();
        }
        let reporter = Reporter::new(
            self.workloads.clone(),
            Arc::clone(&self.clock),
            self.report_interval,
        );
        self.reporter = Some(tokio::spawn(reporter.run(Arc::clone(&self.report_due))));
    }

    /// The active workloads.
    pub fn workloads(&self) -> &[WorkloadHandle] {
        &self.workloads
    }

    /// Stops all workloads, waits for their outstanding operations and returns their summaries.
    pub async fn shutdown(mut self) -> Result<Vec<WorkloadSummary>> {
        for workload in &self.workloads {
            workload.stop().await;
        }
        for task in self.loops.drain(..) {
            task.await.context("dispatch loop panicked")?;
        }
        if let Some(reporter) = self.reporter.take() {
            reporter.abort();
        }

        let summaries = self
            .workloads
            .drain(..)
            .map(|workload| workload.summary())
            .collect();
        Ok(summaries)
    }
}

/// Parses all configured workloads.
///
/// Fails on the first invalid workload, before any of them is started.
pub fn build_workloads(config: &Config) -> Result<Vec<Workload>> {
    config
        .workloads
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let params: WorkloadParams = line.parse()?;
            Workload::from_params(index, &params, &config.limits)
                .with_context(|| format!("invalid workload `{line}`"))
        })
        .collect()
}

/// Runs the configured workloads for the configured duration, then prints a summary.
///
/// In a dry run, time passes [`ScaledClock::DRY_RUN_FACTOR`] times faster and no backend I/O
/// takes place.
pub async fn run(config: &Config) -> Result<Vec<WorkloadSummary>> {
    let workloads = build_workloads(config)?;

    let (backend, clock, wall_time): (SharedBackend, SharedClock, _) = if config.dry_run {
        let clock = ScaledClock::new(ScaledClock::DRY_RUN_FACTOR);
        let wall_time = config.duration.div_f64(clock.factor());
        (Arc::new(NullBackend::new()), Arc::new(clock), wall_time)
    } else {
        let backend = backend::connect(&config.storage)
            .await
            .context("failed to connect to storage")?;
        (backend, Arc::new(RealClock), config.duration)
    };

    let context = IoContext::open(Arc::clone(&backend), &config.pool)
        .await
        .with_context(|| format!("failed to open pool `{}`", config.pool))?;

    let mut coordinator = Coordinator::new(context, clock, config.report_interval);
    coordinator.start(workloads);
    tokio::time::sleep(wall_time).await;

    tracing::info!("run finished, waiting for outstanding operations");
    let summaries = coordinator.shutdown().await?;
    backend.close().await.context("failed to close storage")?;

    report::print_summary(&summaries, config.duration);
    Ok(summaries)
}
