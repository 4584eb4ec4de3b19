//! Queue operations: admission control, priority scheduling, status
//! tracking, retry with backoff, and maintenance.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{Duration, Utc};
use tracing::{info, warn};

use super::item::{Priority, QueueStats, RetryConfig, Status, WorkItem};
use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::store::QueueStore;

/// Persistent priority work queue.
///
/// Every operation is a full load-mutate-save cycle against the backing
/// store. An internal mutex serializes those cycles, so a `WorkQueue`
/// shared behind an `Arc` is safe for concurrent producers and consumers
/// within one process: two dequeues cannot claim the same item and an
/// enqueue cannot overwrite a racing append. Multi-process coordination
/// is out of scope.
pub struct WorkQueue {
    store: Mutex<QueueStore>,
    retry: RetryConfig,
}

impl WorkQueue {
    pub fn new(config: &QueueConfig) -> Self {
        Self::with_store(
            QueueStore::new(&config.data_dir),
            RetryConfig {
                max_retries: config.max_retries,
                retry_base_ms: config.retry_base_ms,
            },
        )
    }

    pub fn with_store(store: QueueStore, retry: RetryConfig) -> Self {
        Self {
            store: Mutex::new(store),
            retry,
        }
    }

    // A poisoned lock only means another thread panicked mid-operation;
    // the store holds no in-memory state that could have been left torn.
    fn store(&self) -> MutexGuard<'_, QueueStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admits a new work item unless an active duplicate exists.
    ///
    /// Returns `None` when an item with the same `(subject_id, repository)`
    /// is already `pending` or `processing`: repeated submissions of the
    /// same logical work are safe no-ops while one is outstanding. Once
    /// that item reaches a terminal status the pair may be enqueued again.
    pub fn enqueue(
        &self,
        subject_id: u64,
        repository: &str,
        priority: Priority,
    ) -> Result<Option<WorkItem>, QueueError> {
        let store = self.store();
        let mut items = store.load_all()?;

        if let Some(duplicate) = items
            .iter()
            .find(|i| i.subject_id == subject_id && i.repository == repository && i.is_active())
        {
            warn!(
                subject_id,
                repository,
                status = %duplicate.status,
                "duplicate enqueue rejected"
            );
            return Ok(None);
        }

        let item = WorkItem::new(subject_id, repository, priority, self.retry.max_retries);
        items.push(item.clone());
        store.save_all(&items)?;

        info!(subject_id, repository, priority = %item.priority, id = %item.id, "enqueued");
        Ok(Some(item))
    }

    /// Claims the next eligible item, or `None` if there is none.
    ///
    /// Tiers are scanned in `high, medium, low` order; within a tier the
    /// earliest insertion wins. Priority strictly dominates age: an
    /// eligible `low` item is never chosen while any `high` item is
    /// eligible, however long the `low` item has waited. A claimed item
    /// moves to `processing` with its retry schedule cleared.
    pub fn dequeue(&self) -> Result<Option<WorkItem>, QueueError> {
        let store = self.store();
        let mut items = store.load_all()?;
        let now = Utc::now();

        let found = Priority::TIERS
            .iter()
            .find_map(|&tier| items.iter().position(|i| i.priority == tier && i.is_eligible(now)));
        let Some(pos) = found else {
            return Ok(None);
        };

        let item = &mut items[pos];
        item.status = Status::Processing;
        item.next_retry_at = None;
        item.started_at = Some(now);
        let claimed = item.clone();
        store.save_all(&items)?;

        info!(subject_id = claimed.subject_id, id = %claimed.id, "dequeued");
        Ok(Some(claimed))
    }

    /// Records a status transition for `id`.
    ///
    /// An unknown id is a logged no-op, not an error. Transitions outside
    /// the fixed table (`pending → processing`, `processing → completed`,
    /// `processing → failed`) are rejected with
    /// [`QueueError::IllegalTransition`]; [`Self::mark_for_retry`] is the
    /// only route back to `pending`. `completed_at` is stamped the first
    /// time a terminal status is reached, and `error`, when supplied,
    /// overwrites the previous message.
    pub fn update_status(
        &self,
        id: &str,
        status: Status,
        error: Option<&str>,
    ) -> Result<(), QueueError> {
        let store = self.store();
        let mut items = store.load_all()?;
        let Some(item) = items.iter_mut().find(|i| i.id == id) else {
            warn!(id, "queue item not found");
            return Ok(());
        };

        if !item.status.can_transition_to(status) {
            return Err(QueueError::IllegalTransition {
                from: item.status,
                to: status,
            });
        }

        item.status = status;
        if status.is_terminal() && item.completed_at.is_none() {
            item.completed_at = Some(Utc::now());
        }
        if let Some(error) = error {
            item.error = Some(error.to_string());
        }
        store.save_all(&items)?;

        info!(id, status = %status, "status updated");
        Ok(())
    }

    /// Schedules a failed attempt for retry with exponential backoff.
    ///
    /// Returns `true` when a retry was scheduled and `false` when the item
    /// is unknown or its retry budget is exhausted. Exhaustion forces the
    /// item into terminal `failed` with the last error preserved; the item
    /// is never selected by [`Self::dequeue`] again. The delay for retry
    /// `n` is `retry_base_ms * 2^(n - 1)`, capped at one hour.
    pub fn mark_for_retry(&self, id: &str, error: &str) -> Result<bool, QueueError> {
        let store = self.store();
        let mut items = store.load_all()?;
        let Some(item) = items.iter_mut().find(|i| i.id == id) else {
            warn!(id, "queue item not found for retry");
            return Ok(false);
        };

        let attempt = item.retry_count + 1;
        let max_retries = item.max_retries;

        if attempt > max_retries {
            item.status = Status::Failed;
            if item.completed_at.is_none() {
                item.completed_at = Some(Utc::now());
            }
            item.error = Some(error.to_string());
            store.save_all(&items)?;

            info!(id, retry_count = attempt, max_retries, "retries exhausted, marking failed");
            return Ok(false);
        }

        let delay_ms = self.retry.delay_ms(attempt);
        item.status = Status::Pending;
        item.retry_count = attempt;
        item.error = Some(error.to_string());
        item.next_retry_at = Some(Utc::now() + Duration::milliseconds(delay_ms as i64));
        item.started_at = None;
        store.save_all(&items)?;

        info!(id, retry_count = attempt, max_retries, delay_ms, "retry scheduled");
        Ok(true)
    }

    /// Purges every `completed` or `failed` item, returning how many were
    /// removed.
    pub fn remove_completed(&self) -> Result<usize, QueueError> {
        let store = self.store();
        let mut items = store.load_all()?;
        let before = items.len();
        items.retain(|i| !i.status.is_terminal());
        let removed = before - items.len();
        store.save_all(&items)?;

        if removed > 0 {
            info!(removed, "removed completed/failed items");
        }
        Ok(removed)
    }

    /// Removes a single item regardless of status. Returns `false` if the
    /// id is unknown.
    pub fn remove_item(&self, id: &str) -> Result<bool, QueueError> {
        let store = self.store();
        let mut items = store.load_all()?;
        let Some(pos) = items.iter().position(|i| i.id == id) else {
            return Ok(false);
        };
        items.remove(pos);
        store.save_all(&items)?;

        info!(id, "queue item removed");
        Ok(true)
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<WorkItem>, QueueError> {
        let items = self.store().load_all()?;
        Ok(items.into_iter().find(|i| i.id == id))
    }

    /// Full collection, in insertion order.
    pub fn items(&self) -> Result<Vec<WorkItem>, QueueError> {
        self.store().load_all()
    }

    /// Items currently `pending`.
    pub fn pending(&self) -> Result<Vec<WorkItem>, QueueError> {
        let mut items = self.store().load_all()?;
        items.retain(|i| i.status == Status::Pending);
        Ok(items)
    }

    /// Aggregate counts per status.
    pub fn stats(&self) -> Result<QueueStats, QueueError> {
        let items = self.store().load_all()?;
        let mut stats = QueueStats {
            total: items.len(),
            ..QueueStats::default()
        };
        for item in &items {
            match item.status {
                Status::Pending => stats.pending += 1,
                Status::Processing => stats.processing += 1,
                Status::Completed => stats.completed += 1,
                Status::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    /// Returns `processing` items older than `max_age` to `pending`.
    ///
    /// A consumer that crashes mid-work leaves its item `processing`
    /// forever; this sweep is the recovery path. The requeue does not
    /// count against the retry budget. Nothing runs it automatically: the
    /// embedding application decides the cadence, if any.
    pub fn requeue_stale(&self, max_age: Duration) -> Result<usize, QueueError> {
        let store = self.store();
        let mut items = store.load_all()?;
        let cutoff = Utc::now() - max_age;

        let mut requeued = 0;
        for item in &mut items {
            if item.status == Status::Processing && item.started_at.is_some_and(|at| at < cutoff) {
                item.status = Status::Pending;
                item.started_at = None;
                requeued += 1;
                warn!(id = %item.id, subject_id = item.subject_id, "stale processing item requeued");
            }
        }
        if requeued > 0 {
            store.save_all(&items)?;
        }
        Ok(requeued)
    }
}
