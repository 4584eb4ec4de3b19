use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scheduling tier of a work item, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Tier scan order used by dequeue. A lower tier is never chosen
    /// while a higher tier holds any eligible item, regardless of age.
    pub const TIERS: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

/// Lifecycle status of a work item.
///
/// Items flow `pending → processing → {completed, failed}`. The retry path
/// is the only route from `processing` back to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl Status {
    /// Can transition from self to `to` via `update_status`?
    pub fn can_transition_to(self, to: Status) -> bool {
        use Status::*;
        matches!(
            (self, to),
            (Pending, Processing) | (Processing, Completed) | (Processing, Failed)
        )
    }

    /// Is this a terminal status?
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Pending => write!(f, "pending"),
            Status::Processing => write!(f, "processing"),
            Status::Completed => write!(f, "completed"),
            Status::Failed => write!(f, "failed"),
        }
    }
}

/// Hard ceiling on the backoff delay: one hour.
pub const MAX_BACKOFF_MS: u64 = 3_600_000;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries before an item is marked failed.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub retry_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_ms: 1000,
        }
    }
}

impl RetryConfig {
    /// Calculate the delay for a given retry attempt using exponential
    /// backoff: `retry_base_ms * 2^(attempt - 1)`, capped at one hour.
    /// The first retry (`attempt = 1`) waits exactly `retry_base_ms`.
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        self.retry_base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS)
    }
}

// Fallback for records persisted without a maxRetries field.
fn default_max_retries() -> u32 {
    3
}

/// A single unit of schedulable work.
///
/// At most one item per `(subject_id, repository)` pair may be active
/// (`pending` or `processing`) at a time; terminal items do not count, so
/// the same subject can be resubmitted after it completes or fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub id: String,
    pub subject_id: u64,
    pub repository: String,
    pub priority: Priority,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    /// Stamped when the item is dequeued; drives stale-processing recovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Stamped the first time the item reaches a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Last recorded failure message; overwritten, never cleared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Absent while eligible immediately; cleared when dequeued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl WorkItem {
    pub fn new(
        subject_id: u64,
        repository: impl Into<String>,
        priority: Priority,
        max_retries: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            subject_id,
            repository: repository.into(),
            priority,
            status: Status::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            retry_count: 0,
            max_retries,
            next_retry_at: None,
        }
    }

    /// Counts toward the dedup invariant?
    pub fn is_active(&self) -> bool {
        matches!(self.status, Status::Pending | Status::Processing)
    }

    /// Eligible for dequeue: `pending` and past any scheduled retry time.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.status == Status::Pending && self.next_retry_at.is_none_or(|at| at <= now)
    }
}

/// Aggregate per-status counts. The four buckets always sum to `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}
