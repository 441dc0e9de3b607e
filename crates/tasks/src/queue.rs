//! Queue abstraction (mechanics only).
//!
//! A queue accepts opaque units of asynchronous work. Acceptance is the only
//! promise: once `enqueue` returns `Ok`, the item runs eventually unless the
//! queue shuts down first. Items must observe the token they are given and
//! stop promptly when it is cancelled.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Future produced by a work item.
pub type WorkFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A unit of background work. The token is the queue's shutdown token.
pub type WorkItem = Box<dyn FnOnce(CancellationToken) -> WorkFuture + Send>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("task queue is closed")]
    Closed,
}

/// Accepts work items for execution in the background.
///
/// `enqueue` never blocks and never runs the item inline.
pub trait BackgroundTaskQueue: Send + Sync {
    fn enqueue(&self, item: WorkItem) -> Result<(), QueueError>;
}

impl<Q> BackgroundTaskQueue for Arc<Q>
where
    Q: BackgroundTaskQueue + ?Sized,
{
    fn enqueue(&self, item: WorkItem) -> Result<(), QueueError> {
        (**self).enqueue(item)
    }
}

/// Box an async closure into a [`WorkItem`].
pub fn work_item<F, Fut>(f: F) -> WorkItem
where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Box::new(move |token| Box::pin(f(token)))
}
