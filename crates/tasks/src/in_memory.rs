//! In-memory task queue (for tests/dev).
//!
//! Items are recorded, not run. [`InMemoryTaskQueue::drain`] executes them in
//! FIFO order on the caller's task, which makes delivery timing deterministic.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::queue::{BackgroundTaskQueue, QueueError, WorkItem};

/// Result of draining an [`InMemoryTaskQueue`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub completed: usize,
    pub failed: usize,
}

#[derive(Default)]
pub struct InMemoryTaskQueue {
    items: Mutex<VecDeque<WorkItem>>,
    enqueued: AtomicU64,
    closed: AtomicBool,
}

impl core::fmt::Debug for InMemoryTaskQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryTaskQueue")
            .field("pending", &self.len())
            .field("enqueued", &self.total_enqueued())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<WorkItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of items waiting to run.
    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items accepted since creation, drained or not.
    pub fn total_enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::SeqCst)
    }

    /// Reject further items. Pending items stay drainable.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Run pending items one after another until the queue is empty.
    ///
    /// Items enqueued while draining run too. `token` is handed to each item.
    pub async fn drain(&self, token: &CancellationToken) -> DrainReport {
        let mut report = DrainReport::default();

        loop {
            let next = self.items().pop_front();
            let Some(item) = next else { break };

            match item(token.clone()).await {
                Ok(()) => report.completed += 1,
                Err(e) => {
                    debug!(error = %e, "drained task failed");
                    report.failed += 1;
                }
            }
        }

        report
    }
}

impl BackgroundTaskQueue for InMemoryTaskQueue {
    fn enqueue(&self, item: WorkItem) -> Result<(), QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }
        self.items().push_back(item);
        self.enqueued.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::work_item;
    use std::sync::Arc;

    #[tokio::test]
    async fn enqueue_does_not_run_items() {
        let queue = InMemoryTaskQueue::new();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();

        queue
            .enqueue(work_item(move |_| async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();

        assert_eq!(queue.len(), 1);
        assert!(!ran.load(Ordering::SeqCst));

        let report = queue.drain(&CancellationToken::new()).await;
        assert_eq!(report, DrainReport { completed: 1, failed: 0 });
        assert!(ran.load(Ordering::SeqCst));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn drain_runs_items_enqueued_while_draining() {
        let queue = Arc::new(InMemoryTaskQueue::new());
        let inner = queue.clone();

        queue
            .enqueue(work_item(move |_| async move {
                inner
                    .enqueue(work_item(|_| async { Err(anyhow::anyhow!("second fails")) }))
                    .map_err(anyhow::Error::from)
            }))
            .unwrap();

        let report = queue.drain(&CancellationToken::new()).await;
        assert_eq!(report, DrainReport { completed: 1, failed: 1 });
        assert_eq!(queue.total_enqueued(), 2);
    }

    #[tokio::test]
    async fn drain_hands_token_to_items() {
        let queue = InMemoryTaskQueue::new();
        let token = CancellationToken::new();
        token.cancel();

        queue
            .enqueue(work_item(|token| async move {
                if token.is_cancelled() {
                    Err(anyhow::anyhow!("cancelled"))
                } else {
                    Ok(())
                }
            }))
            .unwrap();

        let report = queue.drain(&token).await;
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn closed_queue_rejects_items() {
        let queue = InMemoryTaskQueue::new();
        queue.close();
        let err = queue.enqueue(work_item(|_| async { Ok(()) })).unwrap_err();
        assert_eq!(err, QueueError::Closed);
        assert_eq!(queue.total_enqueued(), 0);
    }
}
