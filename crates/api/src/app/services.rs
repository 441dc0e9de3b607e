//! Service wiring: store, background workers and the dispatch engine.

use std::sync::Arc;

use tracing::info;

use webhooks_infra::{
    CallerError, CallerOptionsHandle, InMemorySubscriptionStore, PostgresSubscriptionStore,
    SubscriptionStore, WebHookCaller, http_client,
};
use webhooks_tasks::{BackgroundTaskQueue, WorkerPool, WorkerPoolConfig, WorkerPoolHandle};

use crate::actions::ResourceActions;
use crate::config::{ApiConfig, StoreBackend};

pub type DynStore = dyn SubscriptionStore<ResourceActions>;

/// Everything the handlers need.
pub struct AppServices {
    pub store: Arc<DynStore>,
    pub caller: WebHookCaller<ResourceActions, DynStore>,
}

impl AppServices {
    pub fn new(
        store: Arc<DynStore>,
        queue: Arc<dyn BackgroundTaskQueue>,
        client: reqwest::Client,
        options: CallerOptionsHandle,
    ) -> Result<Self, CallerError> {
        let caller = WebHookCaller::with_options(store.clone(), queue, client, options)?;
        Ok(Self { store, caller })
    }
}

/// Build services for `config` and start the worker pool.
///
/// The returned handle must be shut down by the caller.
pub async fn build_services(config: &ApiConfig) -> anyhow::Result<(Arc<AppServices>, WorkerPoolHandle)> {
    let store: Arc<DynStore> = match &config.store {
        StoreBackend::InMemory => {
            info!("using in-memory subscription store");
            Arc::new(InMemorySubscriptionStore::<ResourceActions>::new())
        }
        StoreBackend::Postgres { database_url } => {
            info!("using postgres subscription store");
            let store = PostgresSubscriptionStore::<ResourceActions>::connect(database_url).await?;
            store.ensure_schema().await?;
            Arc::new(store)
        }
    };

    let pool = WorkerPool::new(
        WorkerPoolConfig::default()
            .with_name("webhook-deliveries")
            .with_workers(config.workers),
    )
    .spawn();

    let services = AppServices::new(
        store,
        Arc::new(pool.queue()),
        http_client(config.http_timeout)?,
        config.caller.clone().into(),
    )?;

    Ok((Arc::new(services), pool))
}
