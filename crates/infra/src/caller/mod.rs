//! Web hook dispatch engine.
//!
//! [`WebHookCaller::invoke_subscriptions`] pages through the store for
//! subscriptions matching an action and hands one delivery unit per
//! subscription to the background queue. It returns once everything it found
//! has been enqueued; deliveries complete (or fail) on their own.
//!
//! ## Pagination
//!
//! Pages are read by offset with a fixed page size. Paging stops on an empty
//! page, on a short page, or when the caller's token is cancelled. There is no
//! snapshot: a subscription added or removed mid-dispatch may be skipped or
//! delivered twice at the page boundary where the change lands.
//!
//! ## Cancellation
//!
//! Each unit runs under a token linked to both the queue's shutdown token and
//! the token passed to `invoke_subscriptions`. Cancelling either stops that
//! unit's retries and skips its store update; it never un-enqueues work.

use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use webhooks_core::{Actions, DomainError, Subscription, action_names, validate_actions};
use webhooks_tasks::{BackgroundTaskQueue, WorkItem, linked_token, work_item};

use crate::store::{StoreError, SubscriptionStore};

pub mod delivery;
pub mod options;

pub use delivery::{DeliveryFailure, DeliveryOutcome, JSON_CONTENT_TYPE};
pub use options::{CallerOptions, CallerOptionsHandle, http_client};

/// Default number of subscriptions read per store page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Error)]
pub enum CallerError {
    #[error(transparent)]
    Configuration(#[from] DomainError),

    #[error("subscription store: {0}")]
    Store(#[from] StoreError),

    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("http client: {0}")]
    Client(#[source] reqwest::Error),
}

/// What one `invoke_subscriptions` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Store pages read, including a trailing empty page.
    pub pages: usize,
    /// Delivery units accepted by the queue.
    pub enqueued: usize,
    /// Delivery units the queue refused.
    pub rejected: usize,
    /// Paging stopped because the token was cancelled.
    pub cancelled: bool,
}

/// Dispatches actions to matching web hook subscriptions.
pub struct WebHookCaller<A, S: ?Sized> {
    store: Arc<S>,
    queue: Arc<dyn BackgroundTaskQueue>,
    client: reqwest::Client,
    options: CallerOptionsHandle,
    page_size: usize,
    _actions: PhantomData<fn() -> A>,
}

impl<A, S: ?Sized> core::fmt::Debug for WebHookCaller<A, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WebHookCaller")
            .field("action_type", &core::any::type_name::<A>())
            .field("page_size", &self.page_size)
            .field("options", &self.options.current())
            .finish_non_exhaustive()
    }
}

impl<A, S> WebHookCaller<A, S>
where
    A: Actions,
    S: SubscriptionStore<A> + ?Sized + 'static,
{
    /// Build a caller with default options.
    ///
    /// Fails with a configuration error when `A` is not a flags bitmask.
    pub fn new(
        store: Arc<S>,
        queue: Arc<dyn BackgroundTaskQueue>,
        client: reqwest::Client,
    ) -> Result<Self, CallerError> {
        Self::with_options(store, queue, client, CallerOptionsHandle::default())
    }

    pub fn with_options(
        store: Arc<S>,
        queue: Arc<dyn BackgroundTaskQueue>,
        client: reqwest::Client,
        options: CallerOptionsHandle,
    ) -> Result<Self, CallerError> {
        validate_actions::<A>()?;

        Ok(Self {
            store,
            queue,
            client,
            options,
            page_size: DEFAULT_PAGE_SIZE,
            _actions: PhantomData,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn options(&self) -> &CallerOptionsHandle {
        &self.options
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Enqueue a delivery of `payload` to every subscription matching `action`.
    #[instrument(skip_all, fields(action = ?action_names(action), page_size = self.page_size))]
    pub async fn invoke_subscriptions<P>(
        &self,
        action: A,
        payload: &P,
        token: &CancellationToken,
    ) -> Result<DispatchReport, CallerError>
    where
        P: Serialize + ?Sized,
    {
        let body = Bytes::from(serde_json::to_vec(payload)?);
        let mut report = DispatchReport::default();
        let mut offset = 0usize;

        'pages: loop {
            let page = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    report.cancelled = true;
                    break 'pages;
                }
                page = self.store.get_subscriptions_for(action, self.page_size, offset) => page,
            };

            let page = match page {
                Ok(page) => page,
                Err(e) => {
                    error!(offset, error = %e, "failed to read subscription page");
                    return Err(e.into());
                }
            };

            report.pages += 1;
            let count = page.len();
            debug!(offset, count, "fetched subscription page");

            if count == 0 {
                break;
            }

            for subscription in page {
                if token.is_cancelled() {
                    report.cancelled = true;
                    break 'pages;
                }

                let subscription_id = subscription.id;
                match self.queue.enqueue(self.delivery_unit(subscription, body.clone(), token.clone())) {
                    Ok(()) => report.enqueued += 1,
                    Err(e) => {
                        warn!(%subscription_id, error = %e, "delivery unit rejected by queue");
                        report.rejected += 1;
                    }
                }
            }

            offset += count;
            if count < self.page_size {
                break;
            }
        }

        debug!(
            pages = report.pages,
            enqueued = report.enqueued,
            rejected = report.rejected,
            cancelled = report.cancelled,
            "dispatch enqueued"
        );
        Ok(report)
    }

    /// Deliver `payload` to one subscription inline, with retries.
    pub async fn invoke_subscription<P>(
        &self,
        subscription: &Subscription<A>,
        payload: &P,
        token: &CancellationToken,
    ) -> Result<DeliveryOutcome, CallerError>
    where
        P: Serialize + ?Sized,
    {
        let body = Bytes::from(serde_json::to_vec(payload)?);
        let options = self.options.current();
        delivery::deliver(&self.client, &*self.store, &options, subscription, body, token).await
    }

    fn delivery_unit(&self, subscription: Subscription<A>, body: Bytes, origin: CancellationToken) -> WorkItem {
        let store = self.store.clone();
        let client = self.client.clone();
        let options = self.options.clone();

        work_item(move |shutdown| run_delivery_unit(store, client, options, subscription, body, origin, shutdown))
    }
}

async fn run_delivery_unit<A, S>(
    store: Arc<S>,
    client: reqwest::Client,
    options: CallerOptionsHandle,
    subscription: Subscription<A>,
    body: Bytes,
    origin: CancellationToken,
    shutdown: CancellationToken,
) -> anyhow::Result<()>
where
    A: Actions,
    S: SubscriptionStore<A> + ?Sized + 'static,
{
    let token = linked_token(&shutdown, &origin);
    let _unlink = token.clone().drop_guard();
    let options = options.current();

    match delivery::deliver(&client, &*store, &options, &subscription, body, &token).await? {
        DeliveryOutcome::Exhausted { attempts, last_failure } => Err(anyhow::anyhow!(
            "delivery to {} failed after {attempts} attempts: {last_failure}",
            subscription.callback_uri
        )),
        DeliveryOutcome::Delivered { .. } | DeliveryOutcome::Cancelled { .. } => Ok(()),
    }
}
