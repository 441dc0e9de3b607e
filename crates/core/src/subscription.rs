//! Web hook subscription model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::actions::Actions;
use crate::error::{DomainError, DomainResult};
use crate::id::SubscriptionId;

/// A registered callback for one or more actions.
///
/// Stores own the lifecycle (`id`, `created`, `last_modified`, `last_success`);
/// the dispatch engine only reads a snapshot and asks the store to mark it
/// successful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription<A> {
    /// Assigned by the store on first persist; unassigned until then.
    #[serde(default)]
    pub id: SubscriptionId,
    /// Owning application. Descriptive only, not unique.
    pub client_id: String,
    /// Target of the POST requests.
    pub callback_uri: Url,
    pub subscribed_actions: A,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    /// Last time a delivery to this callback succeeded.
    #[serde(default)]
    pub last_success: Option<DateTime<Utc>>,
}

impl<A: Actions> Subscription<A> {
    /// Create an unpersisted subscription.
    ///
    /// The callback must be an absolute `http`/`https` URI.
    pub fn new(
        client_id: impl Into<String>,
        callback_uri: &str,
        subscribed_actions: A,
    ) -> DomainResult<Self> {
        let callback_uri = Url::parse(callback_uri)
            .map_err(|e| DomainError::validation(format!("callback uri '{callback_uri}': {e}")))?;

        if !matches!(callback_uri.scheme(), "http" | "https") {
            return Err(DomainError::validation(format!(
                "callback uri must use http or https, got '{}'",
                callback_uri.scheme()
            )));
        }

        Ok(Self {
            id: SubscriptionId::unassigned(),
            client_id: client_id.into(),
            callback_uri,
            subscribed_actions,
            created: None,
            last_modified: None,
            last_success: None,
        })
    }

    pub fn with_id(mut self, id: SubscriptionId) -> Self {
        self.id = id;
        self
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_assigned()
    }

    /// `true` when the subscription opted into any bit of `action`.
    pub fn matches(&self, action: A) -> bool {
        self.subscribed_actions.intersects(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    bitflags::bitflags! {
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(transparent)]
        struct TestActions: u32 {
            const ACTION1 = 1 << 0;
            const ACTION2 = 1 << 1;
        }
    }

    #[test]
    fn new_subscription_is_unpersisted() {
        let sub = Subscription::new("client", "http://localhost/1", TestActions::ACTION1).unwrap();
        assert!(!sub.is_persisted());
        assert!(sub.last_success.is_none());
        assert_eq!(sub.callback_uri.as_str(), "http://localhost/1");
    }

    #[test]
    fn relative_and_non_http_callbacks_are_rejected() {
        assert!(Subscription::new("c", "/relative/path", TestActions::ACTION1).is_err());
        assert!(Subscription::new("c", "ftp://example.com/hook", TestActions::ACTION1).is_err());
    }

    #[test]
    fn matching_uses_bitwise_intersection() {
        let sub = Subscription::new(
            "c",
            "https://example.com/hook",
            TestActions::ACTION1 | TestActions::ACTION2,
        )
        .unwrap();
        assert!(sub.matches(TestActions::ACTION1));
        assert!(sub.matches(TestActions::ACTION2));

        let narrow = Subscription::new("c", "https://example.com/hook", TestActions::ACTION2).unwrap();
        assert!(!narrow.matches(TestActions::ACTION1));
    }

    #[test]
    fn deserializes_without_bookkeeping_fields() {
        let json = serde_json::json!({
            "client_id": "c",
            "callback_uri": "https://example.com/hook",
            "subscribed_actions": "ACTION1 | ACTION2",
        });
        let sub: Subscription<TestActions> = serde_json::from_value(json).unwrap();
        assert!(!sub.is_persisted());
        assert_eq!(sub.subscribed_actions, TestActions::ACTION1 | TestActions::ACTION2);
    }
}
