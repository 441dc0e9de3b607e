//! Background work scheduling for the web hook engine.
//!
//! The dispatch engine never waits for deliveries. It hands each unit of work
//! to a [`BackgroundTaskQueue`] and returns. Two queues ship here:
//!
//! - [`WorkerPool`]: a fixed set of tokio workers sharing one channel. This is
//!   what services run.
//! - [`InMemoryTaskQueue`]: records items until [`InMemoryTaskQueue::drain`] is
//!   called. Tests and dev wiring use it to run work deterministically.
//!
//! Every item receives a [`CancellationToken`] it is expected to observe.

pub mod cancellation;
pub mod in_memory;
pub mod queue;
pub mod worker_pool;

pub use cancellation::linked_token;
pub use in_memory::{DrainReport, InMemoryTaskQueue};
pub use queue::{BackgroundTaskQueue, QueueError, WorkFuture, WorkItem, work_item};
pub use tokio_util::sync::CancellationToken;
pub use worker_pool::{ChannelTaskQueue, QueueStats, WorkerPool, WorkerPoolConfig, WorkerPoolHandle};
