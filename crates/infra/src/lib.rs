//! Infrastructure for outbound web hooks.
//!
//! - [`store`]: the subscription store contract with in-memory and Postgres
//!   variants.
//! - [`caller`]: the dispatch engine, its delivery units and their options.

pub mod caller;
pub mod store;

pub use caller::{
    CallerError, CallerOptions, CallerOptionsHandle, DeliveryFailure, DeliveryOutcome,
    DispatchReport, WebHookCaller, http_client,
};
pub use store::{InMemorySubscriptionStore, PostgresSubscriptionStore, StoreError, SubscriptionStore};
