//! Run with `DATABASE_URL=postgres://... cargo test -p webhooks-infra -- --ignored`.

use webhooks_core::{Subscription, SubscriptionId};
use webhooks_infra::{PostgresSubscriptionStore, StoreError, SubscriptionStore};

bitflags::bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    struct TestActions: u32 {
        const ACTION1 = 1 << 0;
        const ACTION2 = 1 << 1;
        const ACTION3 = 1 << 2;
        const ALL = Self::ACTION1.bits() | Self::ACTION2.bits() | Self::ACTION3.bits();
    }
}

async fn store() -> PostgresSubscriptionStore<TestActions> {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
    let store = PostgresSubscriptionStore::connect(&url).await.unwrap();
    store.ensure_schema().await.unwrap();
    store
}

/// Callbacks are namespaced per test run so tests can share a database.
fn subscription(run: SubscriptionId, n: usize, actions: TestActions) -> Subscription<TestActions> {
    Subscription::new(format!("pg-{run}"), &format!("http://localhost/{run}/{n}"), actions).unwrap()
}

#[tokio::test]
#[ignore]
async fn subscribe_assigns_identity_and_round_trips() {
    let store = store().await;
    let run = SubscriptionId::new();

    let stored = store.subscribe(subscription(run, 1, TestActions::ALL)).await.unwrap();
    assert!(stored.is_persisted());
    assert!(stored.created.is_some());
    assert_eq!(stored.subscribed_actions, TestActions::ALL);

    let mut changed = stored.clone();
    changed.subscribed_actions = TestActions::ACTION2;
    let replaced = store.subscribe(changed).await.unwrap();
    assert_eq!(replaced.id, stored.id);
    assert_eq!(replaced.created, stored.created);
    assert!(replaced.last_modified.is_some());

    assert!(store.unsubscribe(stored.id).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn action_filter_uses_bitwise_intersection() {
    let store = store().await;
    let run = SubscriptionId::new();

    let one = store.subscribe(subscription(run, 1, TestActions::ACTION1)).await.unwrap();
    let two = store.subscribe(subscription(run, 2, TestActions::ACTION2)).await.unwrap();
    let all = store.subscribe(subscription(run, 3, TestActions::ALL)).await.unwrap();

    let matched: Vec<_> = store
        .get_subscriptions_for(TestActions::ACTION1, 10_000, 0)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();

    assert!(matched.contains(&one.id));
    assert!(matched.contains(&all.id));
    assert!(!matched.contains(&two.id));

    for id in [one.id, two.id, all.id] {
        store.unsubscribe(id).await.unwrap();
    }
}

#[tokio::test]
#[ignore]
async fn mark_successful_and_missing_rows() {
    let store = store().await;
    let run = SubscriptionId::new();

    let stored = store.subscribe(subscription(run, 1, TestActions::ACTION3)).await.unwrap();
    store.mark_successful(stored.id).await.unwrap();
    assert!(store.unsubscribe(stored.id).await.unwrap());
    assert!(!store.unsubscribe(stored.id).await.unwrap());

    let err = store.mark_successful(stored.id).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == stored.id));
}
