use serde::Deserialize;
use serde_json::{Value, json};

use webhooks_core::{Subscription, SubscriptionId};

use crate::actions::{ResourceActions, to_names};

/// Listing cap for `GET /subscriptions`.
pub const MAX_PAGE_SIZE: usize = 1000;
pub const DEFAULT_PAGE_SIZE: usize = 50;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    /// Present to replace an existing subscription.
    pub id: Option<SubscriptionId>,
    pub client_id: String,
    pub callback_uri: String,
    pub actions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    pub actions: Vec<String>,
    #[serde(default)]
    pub payload: Value,
}

// -------------------------
// Response mapping
// -------------------------

pub fn subscription_to_json(sub: &Subscription<ResourceActions>) -> Value {
    json!({
        "id": sub.id.to_string(),
        "client_id": sub.client_id,
        "callback_uri": sub.callback_uri.as_str(),
        "actions": to_names(sub.subscribed_actions),
        "created": sub.created,
        "last_modified": sub.last_modified,
        "last_success": sub.last_success,
    })
}
