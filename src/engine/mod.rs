//! Chunked concurrent fetch engine.
//!
//! A [`FetchEngine`] owns one FIFO job queue and a fixed pool of worker tasks.
//! Callers hand it an ordered list of parameter bundles and get back one
//! [`Outcome`] per bundle, in the same order:
//!
//! - [`batch`] - per-batch outcome table and completion barrier
//! - [`worker`] - worker loop and single-job execution
//!
//! Every submitted job ends with exactly one outcome. Endpoint errors,
//! deadlines, panics in the endpoint client and shutdown all produce a
//! failure outcome rather than a missing one, so [`FetchEngine::collect`]
//! always returns.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use eia_fetch::client::EndpointClient;
//! use eia_fetch::config::EngineConfig;
//! use eia_fetch::engine::FetchEngine;
//! use eia_fetch::types::Params;
//!
//! # async fn example(client: Arc<dyn EndpointClient>) -> eia_fetch::Result<()> {
//! let engine = FetchEngine::new(EngineConfig::with_workers(4), client)?;
//! let handle = engine.submit(vec![
//!     Params::new().with("series_id", "ELEC.GEN.ALL-US-99.A"),
//!     Params::new().with("series_id", "PET.RWTC.D"),
//! ])?;
//! let outcomes = engine.collect(handle).await;
//! assert_eq!(outcomes.len(), 2);
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod batch;
mod worker;


pub use batch::BatchHandle;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::EndpointClient;
use crate::config::EngineConfig;
use crate::error::{Error, FetchError, Result};
use crate::types::{BatchId, Job, Outcome, Params};

use batch::BatchState;
use worker::{WorkerContext, run_worker};

/// How long shutdown waits for in-flight jobs before giving up on the workers
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// A job on the shared queue, paired with the batch that receives its outcome
pub(crate) struct QueuedJob {
    pub(crate) job: Job,
    pub(crate) batch: Arc<BatchState>,
}

/// Counters shared between the engine and its workers
#[derive(Default)]
pub(crate) struct EngineCounters {
    pub(crate) queued: AtomicUsize,
    pub(crate) in_flight: AtomicUsize,
    pub(crate) succeeded: AtomicU64,
    pub(crate) failed: AtomicU64,
}

/// Point-in-time view of engine activity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Number of workers in the pool
    pub worker_count: usize,
    /// Jobs waiting on the queue
    pub queued: usize,
    /// Jobs currently executing in the endpoint client
    pub in_flight: usize,
    /// Jobs finished with a success outcome since construction
    pub succeeded: u64,
    /// Jobs finished with a failure outcome since construction
    pub failed: u64,
}

/// Fixed-size worker pool with a shared job queue and per-batch completion barriers
///
/// Must be constructed inside a Tokio runtime. Dropping the engine closes the
/// queue: workers finish the jobs already queued and then exit. Call
/// [`shutdown`](Self::shutdown) to stop the pool explicitly.
pub struct FetchEngine {
    config: EngineConfig,
    job_tx: mpsc::UnboundedSender<QueuedJob>,
    job_rx: Arc<Mutex<mpsc::UnboundedReceiver<QueuedJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
    accepting_new: AtomicBool,
    next_batch_id: AtomicU64,
    counters: Arc<EngineCounters>,
}

impl FetchEngine {
    /// Create an engine and start its workers
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config.worker_count` is zero or the job
    /// timeout is zero.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(config: EngineConfig, client: Arc<dyn EndpointClient>) -> Result<Self> {
        config.validate()?;

        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let cancel = CancellationToken::new();
        let counters = Arc::new(EngineCounters::default());

        let workers = (0..config.worker_count)
            .map(|worker| {
                tokio::spawn(run_worker(WorkerContext {
                    worker,
                    client: Arc::clone(&client),
                    queue: Arc::clone(&job_rx),
                    cancel: cancel.clone(),
                    job_timeout: config.job_timeout,
                    counters: Arc::clone(&counters),
                }))
            })
            .collect();

        tracing::info!(
            worker_count = config.worker_count,
            job_timeout_ms = config.job_timeout.map(|d| d.as_millis() as u64),
            "Fetch engine started"
        );

        Ok(Self {
            config,
            job_tx,
            job_rx,
            workers: Mutex::new(workers),
            cancel,
            accepting_new: AtomicBool::new(true),
            next_batch_id: AtomicU64::new(1),
            counters,
        })
    }

    /// Number of workers in the pool
    pub fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    /// Current queue and execution counters
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            worker_count: self.config.worker_count,
            queued: self.counters.queued.load(Ordering::Relaxed),
            in_flight: self.counters.in_flight.load(Ordering::SeqCst),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Enqueue one job per parameter bundle and return a handle to the batch
    ///
    /// Jobs get sequence indices `0..jobs.len()` in input order. Never blocks
    /// and performs no I/O. An empty list yields an already complete batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown) has
    /// started; nothing is enqueued in that case.
    pub fn submit(&self, jobs: Vec<Params>) -> Result<BatchHandle> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let batch_id = BatchId(self.next_batch_id.fetch_add(1, Ordering::Relaxed));
        let batch = Arc::new(BatchState::new(batch_id, jobs.len()));

        tracing::debug!(batch_id = batch_id.0, job_count = jobs.len(), "Submitting batch");

        for (sequence_index, params) in jobs.into_iter().enumerate() {
            let queued = QueuedJob {
                job: Job {
                    batch_id,
                    sequence_index,
                    params,
                },
                batch: Arc::clone(&batch),
            };

            self.counters.queued.fetch_add(1, Ordering::Relaxed);
            if let Err(mpsc::error::SendError(rejected)) = self.job_tx.send(queued) {
                // Queue closed by a concurrent shutdown
                self.counters.queued.fetch_sub(1, Ordering::Relaxed);
                rejected.batch.record(Outcome::failure(
                    rejected.job.sequence_index,
                    FetchError::Cancelled,
                ));
            }
        }

        Ok(BatchHandle { batch })
    }

    /// Wait for every job of the batch and return the outcomes in submission order
    ///
    /// Per-job failures are part of the returned sequence; this never fails.
    pub async fn collect(&self, handle: BatchHandle) -> Vec<Outcome> {
        let batch = handle.batch;
        batch.wait().await;
        let outcomes = batch.take_outcomes();
        tracing::debug!(
            batch_id = batch.id().0,
            job_count = outcomes.len(),
            failed = outcomes.iter().filter(|o| !o.is_success()).count(),
            "Batch collected"
        );
        outcomes
    }

    /// Submit a batch and wait for its outcomes
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] if the engine no longer accepts batches.
    pub async fn run(&self, jobs: Vec<Params>) -> Result<Vec<Outcome>> {
        let handle = self.submit(jobs)?;
        Ok(self.collect(handle).await)
    }

    /// Stop the worker pool
    ///
    /// The shutdown sequence:
    /// 1. Stops accepting new batches
    /// 2. Signals workers to stop after the job currently in hand
    /// 3. Waits for workers to exit (up to 30 seconds)
    /// 4. Closes the queue and records a cancelled outcome for every job still queued
    ///
    /// Waiters on outstanding batches are released by step 4. Calling
    /// shutdown more than once is harmless.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating fetch engine shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        self.cancel.cancel();

        let workers: Vec<_> = std::mem::take(&mut *self.workers.lock().await);
        let join_all = futures::future::join_all(workers);
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, join_all).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Worker task ended abnormally");
                    }
                }
                tracing::debug!("All workers stopped");
            }
            Err(_) => {
                tracing::warn!("Timeout waiting for workers to stop, proceeding with shutdown");
            }
        }

        let mut queue = self.job_rx.lock().await;
        queue.close();
        let mut cancelled = 0usize;
        while let Ok(QueuedJob { job, batch }) = queue.try_recv() {
            self.counters.queued.fetch_sub(1, Ordering::Relaxed);
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            batch.record(Outcome::failure(job.sequence_index, FetchError::Cancelled));
            cancelled += 1;
        }

        if cancelled > 0 {
            tracing::warn!(cancelled, "Cancelled queued jobs during shutdown");
        }
        tracing::info!("Fetch engine shutdown complete");
    }
}

impl std::fmt::Debug for FetchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchEngine")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
