//! Persistent, priority-ordered work-item queue.
//!
//! The queue admits work items keyed by `(subject_id, repository)`, hands
//! them out in strict priority order (`high` before `medium` before `low`),
//! and schedules failed attempts for retry with exponential backoff capped
//! at one hour. The whole collection lives in a single JSON file that is
//! rewritten on every mutation; a mutex inside [`WorkQueue`] serializes
//! those read-modify-write cycles so concurrent producers and consumers
//! sharing one queue cannot lose updates.
//!
//! Producers and the consumer loop are external: a producer calls
//! [`WorkQueue::enqueue`], a consumer polls [`WorkQueue::dequeue`], performs
//! the work, and reports back through [`WorkQueue::update_status`] or
//! [`WorkQueue::mark_for_retry`].

pub mod config;
pub mod error;
pub mod queue;
pub mod store;

pub use config::QueueConfig;
pub use error::QueueError;
pub use queue::{Priority, QueueStats, RetryConfig, Status, WorkItem, WorkQueue};
pub use store::QueueStore;
