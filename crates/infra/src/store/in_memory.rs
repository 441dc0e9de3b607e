use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use webhooks_core::{Actions, Subscription, SubscriptionId};

use super::r#trait::{StoreError, SubscriptionStore};

/// In-memory subscription store.
///
/// Intended for tests/dev. Subscriptions are kept in insertion order, which
/// gives offset pagination a stable ordering.
#[derive(Debug)]
pub struct InMemorySubscriptionStore<A> {
    subscriptions: RwLock<Vec<Subscription<A>>>,
}

impl<A> Default for InMemorySubscriptionStore<A> {
    fn default() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
        }
    }
}

impl<A: Actions> InMemorySubscriptionStore<A> {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Subscription<A>>>, StoreError> {
        self.subscriptions
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Subscription<A>>>, StoreError> {
        self.subscriptions
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))
    }

    /// Snapshot of a single subscription.
    pub fn get(&self, id: SubscriptionId) -> Result<Option<Subscription<A>>, StoreError> {
        Ok(self.read()?.iter().find(|s| s.id == id).cloned())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait::async_trait]
impl<A: Actions> SubscriptionStore<A> for InMemorySubscriptionStore<A> {
    async fn get_subscriptions(
        &self,
        size: usize,
        offset: usize,
    ) -> Result<Vec<Subscription<A>>, StoreError> {
        Ok(self.read()?.iter().skip(offset).take(size).cloned().collect())
    }

    async fn get_subscriptions_for(
        &self,
        action: A,
        size: usize,
        offset: usize,
    ) -> Result<Vec<Subscription<A>>, StoreError> {
        Ok(self
            .read()?
            .iter()
            .filter(|s| s.matches(action))
            .skip(offset)
            .take(size)
            .cloned()
            .collect())
    }

    async fn subscribe(&self, mut subscription: Subscription<A>) -> Result<Subscription<A>, StoreError> {
        let now = Utc::now();
        let mut subscriptions = self.write()?;

        if !subscription.is_persisted() {
            subscription.id = SubscriptionId::new();
        }

        match subscriptions.iter_mut().find(|s| s.id == subscription.id) {
            Some(existing) => {
                subscription.created = existing.created;
                subscription.last_modified = Some(now);
                *existing = subscription.clone();
            }
            None => {
                subscription.created = Some(subscription.created.unwrap_or(now));
                subscriptions.push(subscription.clone());
            }
        }

        Ok(subscription)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, StoreError> {
        let mut subscriptions = self.write()?;
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        Ok(subscriptions.len() != before)
    }

    async fn mark_successful(&self, id: SubscriptionId) -> Result<(), StoreError> {
        let mut subscriptions = self.write()?;
        let subscription = subscriptions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::NotFound(id))?;
        subscription.last_success = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    bitflags::bitflags! {
        #[derive(Debug, Copy, Clone, PartialEq, Eq)]
        struct TestActions: u32 {
            const ACTION1 = 1 << 0;
            const ACTION2 = 1 << 1;
            const ACTION3 = 1 << 2;
            const ALL = Self::ACTION1.bits() | Self::ACTION2.bits() | Self::ACTION3.bits();
        }
    }

    fn subscription(n: usize, actions: TestActions) -> Subscription<TestActions> {
        Subscription::new(format!("client-{n}"), &format!("http://localhost/{n}"), actions).unwrap()
    }

    async fn seeded(count: usize, actions: TestActions) -> InMemorySubscriptionStore<TestActions> {
        let store = InMemorySubscriptionStore::new();
        for n in 0..count {
            store.subscribe(subscription(n, actions)).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn returns_exactly_the_requested_page() {
        let store = seeded(50, TestActions::ACTION1).await;
        assert_eq!(store.get_subscriptions(50, 0).await.unwrap().len(), 50);
    }

    #[tokio::test]
    async fn oversized_page_returns_what_exists() {
        let store = seeded(50, TestActions::ACTION1).await;
        assert_eq!(store.get_subscriptions(60, 0).await.unwrap().len(), 50);
        assert_eq!(
            store.get_subscriptions_for(TestActions::ACTION1, 60, 0).await.unwrap().len(),
            50
        );
    }

    #[tokio::test]
    async fn pages_follow_insertion_order() {
        let store = seeded(5, TestActions::ACTION1).await;
        let first = store.get_subscriptions(2, 0).await.unwrap();
        let second = store.get_subscriptions(2, 2).await.unwrap();
        let last = store.get_subscriptions(2, 4).await.unwrap();

        assert_eq!(first[0].client_id, "client-0");
        assert_eq!(second[0].client_id, "client-2");
        assert_eq!(last.len(), 1);
        assert!(store.get_subscriptions(2, 6).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn filter_returns_only_matching_single_flag() {
        let store = InMemorySubscriptionStore::new();
        store.subscribe(subscription(1, TestActions::ACTION1)).await.unwrap();
        store.subscribe(subscription(2, TestActions::ACTION2)).await.unwrap();
        store.subscribe(subscription(3, TestActions::ACTION3)).await.unwrap();

        let page = store.get_subscriptions_for(TestActions::ACTION1, 10, 0).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].subscribed_actions, TestActions::ACTION1);
    }

    #[tokio::test]
    async fn combined_flags_match_single_action() {
        let store = seeded(1, TestActions::ALL).await;
        let page = store.get_subscriptions_for(TestActions::ACTION1, 10, 0).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].subscribed_actions, TestActions::ALL);
    }

    #[tokio::test]
    async fn subscribe_assigns_identity_and_created() {
        let store = InMemorySubscriptionStore::new();
        let stored = store.subscribe(subscription(1, TestActions::ACTION1)).await.unwrap();

        assert!(stored.is_persisted());
        assert!(stored.created.is_some());
        assert!(stored.last_modified.is_none());
        assert_eq!(store.get(stored.id).unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn subscribe_replaces_by_id_and_keeps_created() {
        let store = InMemorySubscriptionStore::new();
        let stored = store.subscribe(subscription(1, TestActions::ACTION1)).await.unwrap();

        let mut changed = stored.clone();
        changed.subscribed_actions = TestActions::ACTION2;
        changed.created = None;
        let replaced = store.subscribe(changed).await.unwrap();

        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(replaced.id, stored.id);
        assert_eq!(replaced.created, stored.created);
        assert!(replaced.last_modified.is_some());
        assert_eq!(replaced.subscribed_actions, TestActions::ACTION2);
    }

    #[tokio::test]
    async fn unsubscribe_reports_presence() {
        let store = InMemorySubscriptionStore::new();
        let stored = store.subscribe(subscription(1, TestActions::ACTION1)).await.unwrap();

        assert!(store.unsubscribe(stored.id).await.unwrap());
        assert!(!store.unsubscribe(stored.id).await.unwrap());
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn mark_successful_sets_last_success() {
        let store = InMemorySubscriptionStore::new();
        let stored = store.subscribe(subscription(1, TestActions::ACTION1)).await.unwrap();

        store.mark_successful(stored.id).await.unwrap();
        assert!(store.get(stored.id).unwrap().unwrap().last_success.is_some());
    }

    #[tokio::test]
    async fn mark_successful_on_missing_subscription_is_not_found() {
        let store = InMemorySubscriptionStore::<TestActions>::new();
        let id = SubscriptionId::new();
        let err = store.mark_successful(id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(missing) if missing == id));
    }
}
