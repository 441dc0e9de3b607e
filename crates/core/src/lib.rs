//! `webhooks-core`: domain building blocks for outbound web hooks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the subscription model, the action bitmask contract and the retry policy.

pub mod actions;
pub mod error;
pub mod id;
pub mod retry;
pub mod subscription;

pub use actions::{ActionShape, Actions, action_names, parse_action_names, validate_actions};
pub use error::{DomainError, DomainResult};
pub use id::SubscriptionId;
pub use retry::{DEFAULT_RETRY_UNIT, RetryDelay, RetryPolicy};
pub use subscription::Subscription;
