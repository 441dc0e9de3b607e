use std::sync::Arc;

use thiserror::Error;

use webhooks_core::{Actions, Subscription, SubscriptionId};

/// Store errors.
///
/// - **NotFound**: the subscription vanished (e.g. unsubscribed mid-delivery)
/// - **Storage**: the backing store failed (connection, lock, SQL error)
/// - **Corrupt**: a persisted row could not be turned back into a subscription
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("subscription {0} not found")]
    NotFound(SubscriptionId),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("corrupt subscription record: {0}")]
    Corrupt(String),
}

/// Paginated, action-filtered access to web hook subscriptions.
///
/// Implementations must present a stable ordering across calls so that offset
/// pagination is meaningful. No snapshot is required: a subscription added or
/// removed while a caller pages through the store may be skipped or seen twice
/// at the page boundary where the change lands.
///
/// Implementations must be safe for concurrent reads and concurrent
/// single-subscription writes.
#[async_trait::async_trait]
pub trait SubscriptionStore<A: Actions>: Send + Sync {
    /// Unfiltered page, for administrative listing.
    async fn get_subscriptions(
        &self,
        size: usize,
        offset: usize,
    ) -> Result<Vec<Subscription<A>>, StoreError>;

    /// Page of subscriptions sharing at least one bit with `action`.
    async fn get_subscriptions_for(
        &self,
        action: A,
        size: usize,
        offset: usize,
    ) -> Result<Vec<Subscription<A>>, StoreError>;

    /// Insert or replace by identifier; returns the stored subscription.
    ///
    /// An unpersisted subscription is assigned a fresh identifier.
    async fn subscribe(&self, subscription: Subscription<A>) -> Result<Subscription<A>, StoreError>;

    /// Remove by identifier; `false` if it was not present.
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, StoreError>;

    /// Set `last_success` to now.
    async fn mark_successful(&self, id: SubscriptionId) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<A, S> SubscriptionStore<A> for Arc<S>
where
    A: Actions,
    S: SubscriptionStore<A> + ?Sized,
{
    async fn get_subscriptions(
        &self,
        size: usize,
        offset: usize,
    ) -> Result<Vec<Subscription<A>>, StoreError> {
        (**self).get_subscriptions(size, offset).await
    }

    async fn get_subscriptions_for(
        &self,
        action: A,
        size: usize,
        offset: usize,
    ) -> Result<Vec<Subscription<A>>, StoreError> {
        (**self).get_subscriptions_for(action, size, offset).await
    }

    async fn subscribe(&self, subscription: Subscription<A>) -> Result<Subscription<A>, StoreError> {
        (**self).subscribe(subscription).await
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, StoreError> {
        (**self).unsubscribe(id).await
    }

    async fn mark_successful(&self, id: SubscriptionId) -> Result<(), StoreError> {
        (**self).mark_successful(id).await
    }
}
