//! Aggregate rate reports while running and the final summary afterwards.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use sketches_ddsketch::DDSketch;
use tokio::sync::Notify;
use tokio::time::Instant;
use yansi::Paint;

use crate::clock::SharedClock;
use crate::pacing::Counters;
use crate::workload::{WorkloadHandle, WorkloadSummary};

/// One line of the periodic report.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Report {
    /// Time since the first workload started, on the run's clock.
    pub elapsed: Duration,
    /// Operations completed across all workloads since the previous report.
    pub operations: u64,
    /// `operations` scaled to operations per second.
    pub rate: u64,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "time={:7.3} iops={}",
            self.elapsed.as_secs_f64(),
            self.rate
        )
    }
}

/// Samples the counters of all active workloads.
///
/// Only the reporter resets the per-workload `reported` counters, so no completion is counted
/// twice.
#[derive(Debug)]
pub struct Reporter {
    workloads: Vec<WorkloadHandle>,
    clock: SharedClock,
    interval: Duration,
    origin: Instant,
}

impl Reporter {
    /// Creates a reporter for `workloads`, emitting one report per `interval`.
    pub fn new(workloads: Vec<WorkloadHandle>, clock: SharedClock, interval: Duration) -> Self {
        let origin = workloads
            .first()
            .map(WorkloadHandle::start)
            .unwrap_or_else(|| clock.now());

        Self {
            workloads,
            clock,
            interval,
            origin,
        }
    }

    /// Collects completions from every workload whose reporting deadline passed.
    ///
    /// Returns `None` if no deadline passed since the previous sample, so repeated wakeups for
    /// the same deadline produce a single report.
    pub fn sample(&self) -> Option<Report> {
        let now = self.clock.now();
        let mut due = false;
        let mut operations = 0;
        for workload in &self.workloads {
            if let Some(completed) = workload.take_report(now) {
                due = true;
                operations += completed;
            }
        }
        if !due {
            return None;
        }

        let rate = (operations as f64 / self.interval.as_secs_f64()) as u64;
        Some(Report {
            elapsed: now.saturating_duration_since(self.origin),
            operations,
            rate,
        })
    }

    /// Prints a report to stdout every time a workload signals that its deadline passed.
    ///
    /// This future runs forever and is intended to be spawned next to the workloads.
    pub async fn run(self, report_due: Arc<Notify>) {
        loop {
            report_due.notified().await;
            let Some(report) = self.sample() else {
                tracing::trace!("reporting deadline already sampled");
                continue;
            };
            tracing::trace!(operations = report.operations, "sampled workloads");
            println!("{report}");
        }
    }
}

/// Prints the per-workload and total numbers of a finished run.
pub fn print_summary(summaries: &[WorkloadSummary], duration: Duration) {
    let mut total = Counters::default();
    let mut total_latency = DDSketch::default();

    for summary in summaries {
        println!();
        println!(
            "{} {} (iodepth: {}, backlog: {})",
            "## Workload".bold(),
            summary.name.bold().blue(),
            summary.limits.max_concurrent.bold(),
            summary.limits.max_backlog.bold()
        );
        print_counters(&summary.counters, duration);
        print_percentiles(&summary.latency);

        total.started += summary.counters.started;
        total.done += summary.counters.done;
        total.skipped += summary.counters.skipped;
        total.failed += summary.counters.failed;
        if let Err(error) = total_latency.merge(&summary.latency) {
            tracing::warn!(?error, "failed to merge latencies");
        }
    }

    println!();
    println!("{}", "## TOTALS".bold());
    print_counters(&total, duration);
    print_percentiles(&total_latency);
}

fn print_counters(counters: &Counters, duration: Duration) {
    print!(
        "{} ({} ops",
        "WRITE:".bold().green(),
        counters.done.bold()
    );
    if counters.failed > 0 {
        print!(
            ", {}",
            format!("{} FAILURES", counters.failed).bold().red()
        );
    }
    if counters.skipped > 0 {
        print!(
            ", {}",
            format!("{} SKIPPED", counters.skipped).bold().yellow()
        );
    }
    println!(")");

    let ops_ps = counters.done as f64 / duration.as_secs_f64();
    println!(
        "  {:.2} operations/s; {} started",
        ops_ps.bold(),
        counters.started
    );
}

fn print_percentiles(sketch: &DDSketch) {
    let ops = sketch.count();
    if ops == 0 {
        return;
    }

    let quantile = |q| {
        let value = sketch.quantile(q).ok().flatten().unwrap_or_default();
        Duration::from_secs_f64(value.max(0.0))
    };
    let avg = Duration::from_secs_f64(sketch.sum().unwrap_or_default() / ops as f64);
    let p50 = quantile(0.5);
    let p90 = quantile(0.9);
    let p99 = quantile(0.99);
    println!(
        "  avg: {:.2?}; p50: {p50:.2?}; p90: {p90:.2?}; p99: {p99:.2?}",
        avg.bold()
    );
}
