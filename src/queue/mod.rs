mod item;
mod work_queue;

pub use item::{MAX_BACKOFF_MS, Priority, QueueStats, RetryConfig, Status, WorkItem};
pub use work_queue::WorkQueue;
