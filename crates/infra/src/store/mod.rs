//! Subscription store boundary.
//!
//! The dispatch engine only consumes the [`SubscriptionStore`] contract. Two
//! variants ship: an in-memory store for tests/dev and a Postgres store.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemorySubscriptionStore;
pub use postgres::PostgresSubscriptionStore;
pub use r#trait::{StoreError, SubscriptionStore};
