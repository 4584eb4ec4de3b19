//! End-to-end scenarios driving the queue the way a producer and a
//! consumer loop would.

use anyhow::Result;
use dispatchq::{Priority, QueueConfig, Status, WorkQueue};
use tempfile::TempDir;

fn make_queue(max_retries: u32, retry_base_ms: u64) -> Result<(TempDir, WorkQueue)> {
    let dir = tempfile::tempdir()?;
    let config = QueueConfig {
        data_dir: dir.path().to_path_buf(),
        max_retries,
        retry_base_ms,
    };
    Ok((dir, WorkQueue::new(&config)))
}

#[test]
fn duplicate_submission_is_rejected_until_terminal() -> Result<()> {
    let (_dir, queue) = make_queue(3, 1000)?;

    let a = queue.enqueue(42, "octo/repo", Priority::High)?.expect("first enqueue");
    assert_eq!(a.status, Status::Pending);

    // Same pair while pending, even with a different priority: rejected.
    assert!(queue.enqueue(42, "octo/repo", Priority::Low)?.is_none());

    // Drive the item to a terminal status, then the pair is admissible again.
    let claimed = queue.dequeue()?.expect("claim");
    assert_eq!(claimed.id, a.id);
    queue.update_status(&a.id, Status::Completed, None)?;
    assert!(queue.enqueue(42, "octo/repo", Priority::Low)?.is_some());

    Ok(())
}

#[test]
fn high_priority_wins_over_older_low_priority() -> Result<()> {
    let (_dir, queue) = make_queue(3, 1000)?;

    let b = queue.enqueue(1, "octo/repo", Priority::Low)?.expect("enqueue b");
    let c = queue.enqueue(2, "octo/repo", Priority::High)?.expect("enqueue c");

    assert_eq!(queue.dequeue()?.expect("first claim").id, c.id);
    assert_eq!(queue.dequeue()?.expect("second claim").id, b.id);
    assert!(queue.dequeue()?.is_none());

    Ok(())
}

#[test]
fn retry_cycle_exhausts_into_failed() -> Result<()> {
    // retry_base_ms = 0 keeps every retry immediately eligible.
    let (_dir, queue) = make_queue(3, 0)?;
    let item = queue.enqueue(7, "octo/repo", Priority::Medium)?.expect("enqueue");

    for attempt in 1..=3u32 {
        let claimed = queue.dequeue()?.expect("claim for attempt");
        assert_eq!(claimed.id, item.id);
        assert!(queue.mark_for_retry(&item.id, "worker crashed")?);
        let retried = queue.find_by_id(&item.id)?.expect("lookup");
        assert_eq!(retried.retry_count, attempt);
        assert_eq!(retried.status, Status::Pending);
        assert!(retried.next_retry_at.is_some());
    }

    // Fourth failure exceeds max_retries = 3.
    queue.dequeue()?.expect("final claim");
    assert!(!queue.mark_for_retry(&item.id, "still crashing")?);

    let failed = queue.find_by_id(&item.id)?.expect("lookup");
    assert_eq!(failed.status, Status::Failed);
    assert_eq!(failed.error.as_deref(), Some("still crashing"));
    assert!(failed.completed_at.is_some());
    assert!(queue.dequeue()?.is_none());

    Ok(())
}

#[test]
fn dequeue_on_empty_queue_returns_none() -> Result<()> {
    let (_dir, queue) = make_queue(3, 1000)?;
    assert!(queue.dequeue()?.is_none());
    assert_eq!(queue.stats()?.total, 0);
    Ok(())
}

#[test]
fn stats_and_purge_agree() -> Result<()> {
    let (_dir, queue) = make_queue(3, 1000)?;

    for n in 1..=5 {
        queue.enqueue(n, "octo/repo", Priority::Medium)?.expect("enqueue");
    }
    let a = queue.dequeue()?.expect("claim");
    queue.update_status(&a.id, Status::Completed, None)?;
    let b = queue.dequeue()?.expect("claim");
    queue.update_status(&b.id, Status::Failed, Some("boom"))?;
    queue.dequeue()?.expect("claim");

    let stats = queue.stats()?;
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.processing, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(
        stats.pending + stats.processing + stats.completed + stats.failed,
        stats.total
    );

    assert_eq!(queue.remove_completed()?, 2);
    let stats = queue.stats()?;
    assert_eq!(stats.total, 3);
    assert_eq!(stats.completed + stats.failed, 0);

    Ok(())
}

#[test]
fn queue_survives_reopening_from_the_same_directory() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = QueueConfig {
        data_dir: dir.path().to_path_buf(),
        max_retries: 3,
        retry_base_ms: 1000,
    };

    let queue = WorkQueue::new(&config);
    let item = queue.enqueue(42, "octo/repo", Priority::High)?.expect("enqueue");
    drop(queue);

    let reopened = WorkQueue::new(&config);
    let found = reopened.find_by_id(&item.id)?.expect("persisted item");
    assert_eq!(found.subject_id, 42);
    assert_eq!(found.status, Status::Pending);
    assert!(reopened.enqueue(42, "octo/repo", Priority::High)?.is_none());

    Ok(())
}
