//! Worker loop: dequeue a job, call the endpoint client, record one outcome.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::client::EndpointClient;
use crate::error::FetchError;
use crate::types::{Outcome, OutcomeStatus, Params};

use super::{EngineCounters, QueuedJob};

/// Everything one worker needs, cloned per worker at engine construction
pub(super) struct WorkerContext {
    pub(super) worker: usize,
    pub(super) client: Arc<dyn EndpointClient>,
    pub(super) queue: Arc<Mutex<mpsc::UnboundedReceiver<QueuedJob>>>,
    pub(super) cancel: CancellationToken,
    pub(super) job_timeout: Option<Duration>,
    pub(super) counters: Arc<EngineCounters>,
}

/// Run until the engine shuts down or the queue is closed and empty.
pub(super) async fn run_worker(ctx: WorkerContext) {
    tracing::debug!(worker = ctx.worker, "Worker started");

    loop {
        let Some(queued) = next_job(&ctx).await else {
            break;
        };
        ctx.counters.queued.fetch_sub(1, Ordering::Relaxed);

        let QueuedJob { job, batch } = queued;
        let index = job.sequence_index;

        ctx.counters.in_flight.fetch_add(1, Ordering::SeqCst);
        let status = execute_job(ctx.client.as_ref(), &job.params, ctx.job_timeout).await;
        ctx.counters.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &status {
            OutcomeStatus::Success(_) => {
                ctx.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    worker = ctx.worker,
                    batch_id = job.batch_id.0,
                    sequence_index = index,
                    "Job succeeded"
                );
            }
            OutcomeStatus::Failure(e) => {
                ctx.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    worker = ctx.worker,
                    batch_id = job.batch_id.0,
                    sequence_index = index,
                    kind = e.kind(),
                    error = %e,
                    "Job failed"
                );
            }
        }

        batch.record(Outcome {
            sequence_index: index,
            status,
        });
    }

    tracing::debug!(worker = ctx.worker, "Worker stopped");
}

/// Wait for the next queued job; `None` on shutdown or when the queue is closed.
async fn next_job(ctx: &WorkerContext) -> Option<QueuedJob> {
    let mut queue = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => return None,
        guard = ctx.queue.lock() => guard,
    };
    tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => None,
        job = queue.recv() => job,
    }
}

/// Call the endpoint client once, folding every way the call can end into a status.
pub(super) async fn execute_job(
    client: &dyn EndpointClient,
    params: &Params,
    job_timeout: Option<Duration>,
) -> OutcomeStatus {
    let call = AssertUnwindSafe(client.execute(params)).catch_unwind();

    let result = match job_timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => return OutcomeStatus::Failure(FetchError::Timeout(limit)),
        },
        None => call.await,
    };

    match result {
        Ok(Ok(payload)) => OutcomeStatus::Success(payload),
        Ok(Err(e)) => OutcomeStatus::Failure(e),
        Err(panic) => OutcomeStatus::Failure(FetchError::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
