//! Tokio worker pool backing [`BackgroundTaskQueue`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::queue::{BackgroundTaskQueue, QueueError, WorkItem};

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Name for logging
    pub name: String,
    /// Number of items that may run at once
    pub workers: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            name: "webhook-workers".to_string(),
            workers: 8,
        }
    }
}

impl WorkerPoolConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

/// Pool runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub completed: u64,
    pub failed: u64,
    pub panicked: u64,
    pub running: usize,
}

type SharedStats = Arc<Mutex<QueueStats>>;

fn lock_stats(stats: &SharedStats) -> MutexGuard<'_, QueueStats> {
    stats.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Producer side of a [`WorkerPool`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ChannelTaskQueue {
    sender: mpsc::UnboundedSender<WorkItem>,
    shutdown: CancellationToken,
    stats: SharedStats,
}

impl BackgroundTaskQueue for ChannelTaskQueue {
    fn enqueue(&self, item: WorkItem) -> Result<(), QueueError> {
        if self.shutdown.is_cancelled() {
            return Err(QueueError::Closed);
        }
        self.sender.send(item).map_err(|_| QueueError::Closed)?;
        lock_stats(&self.stats).enqueued += 1;
        Ok(())
    }
}

/// Fixed-size pool of tokio workers sharing a single queue.
#[derive(Debug)]
pub struct WorkerPool {
    config: WorkerPoolConfig,
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig) -> Self {
        Self { config }
    }

    /// Start the workers on the current tokio runtime.
    pub fn spawn(self) -> WorkerPoolHandle {
        let config = self.config;
        let workers = config.workers.max(1);
        let (sender, receiver) = mpsc::unbounded_channel::<WorkItem>();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let shutdown = CancellationToken::new();
        let stats = SharedStats::default();

        let joins = (0..workers)
            .map(|worker| {
                tokio::spawn(worker_loop(
                    config.name.clone(),
                    worker,
                    receiver.clone(),
                    shutdown.clone(),
                    stats.clone(),
                ))
            })
            .collect();

        info!(pool = %config.name, workers, "worker pool started");

        WorkerPoolHandle {
            name: config.name,
            queue: ChannelTaskQueue {
                sender,
                shutdown: shutdown.clone(),
                stats: stats.clone(),
            },
            shutdown,
            workers: joins,
            stats,
        }
    }
}

/// Handle to control a running pool.
#[derive(Debug)]
pub struct WorkerPoolHandle {
    name: String,
    queue: ChannelTaskQueue,
    shutdown: CancellationToken,
    workers: Vec<JoinHandle<()>>,
    stats: SharedStats,
}

impl WorkerPoolHandle {
    /// Queue feeding this pool.
    pub fn queue(&self) -> ChannelTaskQueue {
        self.queue.clone()
    }

    /// Token handed to every item; cancelled on shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> QueueStats {
        lock_stats(&self.stats).clone()
    }

    /// Cancel in-flight items, close the queue and wait for the workers.
    ///
    /// Items still waiting in the queue are dropped without running.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!(pool = %self.name, error = %e, "worker terminated abnormally");
            }
        }
        let stats = lock_stats(&self.stats).clone();
        info!(
            pool = %self.name,
            completed = stats.completed,
            failed = stats.failed,
            panicked = stats.panicked,
            "worker pool stopped"
        );
    }
}

async fn worker_loop(
    name: String,
    worker: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<WorkItem>>>,
    shutdown: CancellationToken,
    stats: SharedStats,
) {
    debug!(pool = %name, worker, "worker started");

    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                item = receiver.recv() => item,
            }
        };

        let Some(item) = next else { break };

        lock_stats(&stats).running += 1;
        let token = shutdown.clone();
        let outcome = tokio::spawn(async move { item(token).await }).await;

        let mut s = lock_stats(&stats);
        s.running = s.running.saturating_sub(1);
        match outcome {
            Ok(Ok(())) => s.completed += 1,
            Ok(Err(e)) => {
                s.failed += 1;
                warn!(pool = %name, worker, error = %e, "background task failed");
            }
            Err(e) if e.is_panic() => {
                s.panicked += 1;
                error!(pool = %name, worker, error = %e, "background task panicked");
            }
            Err(e) => {
                s.failed += 1;
                warn!(pool = %name, worker, error = %e, "background task aborted");
            }
        }
    }

    debug!(pool = %name, worker, "worker stopped");
}
