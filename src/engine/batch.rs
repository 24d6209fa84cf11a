//! Per-batch outcome table and completion barrier.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Notify;

use crate::error::FetchError;
use crate::types::{BatchId, Outcome};

/// Shared state of one submitted batch
///
/// Each sequence index owns one write-once slot. `pending` counts the slots
/// still empty; the worker that takes it to zero raises `complete`.
pub(crate) struct BatchState {
    id: BatchId,
    slots: Vec<Mutex<Option<Outcome>>>,
    pending: AtomicUsize,
    complete: Notify,
}

impl BatchState {
    pub(crate) fn new(id: BatchId, job_count: usize) -> Self {
        Self {
            id,
            slots: (0..job_count).map(|_| Mutex::new(None)).collect(),
            pending: AtomicUsize::new(job_count),
            complete: Notify::new(),
        }
    }

    pub(crate) fn id(&self) -> BatchId {
        self.id
    }

    pub(crate) fn job_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.pending() == 0
    }

    /// Record the outcome of one job.
    ///
    /// Returns `false` (and changes nothing) if the slot was already written
    /// or the index is out of range. The countdown only moves after the slot
    /// is filled, so a complete batch never has an empty slot.
    pub(crate) fn record(&self, outcome: Outcome) -> bool {
        let index = outcome.sequence_index;
        let Some(slot) = self.slots.get(index) else {
            tracing::error!(
                batch_id = self.id.0,
                sequence_index = index,
                job_count = self.slots.len(),
                "Outcome index out of range, ignoring"
            );
            return false;
        };

        {
            let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.is_some() {
                tracing::error!(
                    batch_id = self.id.0,
                    sequence_index = index,
                    "Outcome already recorded for job, refusing to overwrite"
                );
                return false;
            }
            *guard = Some(outcome);
        }

        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            tracing::debug!(batch_id = self.id.0, "Batch complete");
            // notify_one stores a permit, so a waiter arriving late still wakes
            self.complete.notify_one();
        }
        true
    }

    /// Wait until every job of the batch has an outcome.
    pub(crate) async fn wait(&self) {
        while !self.is_complete() {
            self.complete.notified().await;
        }
    }

    /// Move the outcomes out of the table in sequence order.
    ///
    /// Only called after [`wait`](Self::wait) returned.
    pub(crate) fn take_outcomes(&self) -> Vec<Outcome> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                let taken = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
                taken.unwrap_or_else(|| {
                    tracing::error!(
                        batch_id = self.id.0,
                        sequence_index = index,
                        "Complete batch has no outcome for job"
                    );
                    Outcome::failure(index, FetchError::Cancelled)
                })
            })
            .collect()
    }
}

/// Handle to a submitted batch, redeemed with [`FetchEngine::collect`](super::FetchEngine::collect)
///
/// Not `Clone`: a batch has exactly one waiter.
#[must_use = "a batch handle must be collected to obtain its outcomes"]
pub struct BatchHandle {
    pub(crate) batch: Arc<BatchState>,
}

impl BatchHandle {
    /// Identifier of the batch
    pub fn id(&self) -> BatchId {
        self.batch.id()
    }

    /// Number of jobs submitted in the batch
    pub fn job_count(&self) -> usize {
        self.batch.job_count()
    }

    /// Number of jobs that do not have an outcome yet
    pub fn pending(&self) -> usize {
        self.batch.pending()
    }

    /// Whether every job has an outcome
    pub fn is_complete(&self) -> bool {
        self.batch.is_complete()
    }
}

impl std::fmt::Debug for BatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchHandle")
            .field("id", &self.id())
            .field("job_count", &self.job_count())
            .field("pending", &self.pending())
            .finish()
    }
}
