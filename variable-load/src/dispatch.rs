//! The dispatch loop driving a single workload.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::backend::IoContext;
use crate::clock::SharedClock;
use crate::pacing::PacingPhase;
use crate::workload::WorkloadHandle;

/// Delay before the next tick when nothing is in flight.
pub const IDLE_RETRY: Duration = Duration::from_millis(10);

/// Ticks the workload until it has stopped.
///
/// Newly due operations are spawned as separate tasks. Their completions wake this loop for an
/// immediate tick; when nothing is in flight, the loop retries after [`IDLE_RETRY`] instead.
/// Whenever a tick finds the reporting deadline passed, `report_due` is notified.
pub async fn dispatch_loop(
    workload: WorkloadHandle,
    context: IoContext,
    clock: SharedClock,
    report_due: Arc<Notify>,
) {
    loop {
        let tick = workload.tick(clock.now());

        if tick.report_due {
            report_due.notify_one();
        }
        if tick.skipped > 0 {
            tracing::debug!(
                workload = workload.name(),
                skipped = tick.skipped,
                "backlog exceeded, skipping operations"
            );
        }
        if tick.phase == PacingPhase::Stopped {
            workload.notify_stopped();
            break;
        }

        let idle = tick.is_idle();
        for object in tick.dispatch {
            tokio::spawn(write_object(workload.clone(), context.clone(), object));
        }

        if idle {
            workload.idle(IDLE_RETRY).await;
        } else {
            workload.woken().await;
        }
    }
}

async fn write_object(workload: WorkloadHandle, context: IoContext, object: String) {
    let start = Instant::now();
    let result = context.write(&object, workload.payload()).await;

    if let Err(ref error) = result {
        tracing::warn!(
            workload = workload.name(),
            object,
            %error,
            "write failed"
        );
    }
    workload.complete(result.is_ok(), start.elapsed());
}
