//! Postgres-backed subscription store.
//!
//! Subscriptions live in a single `webhook_subscriptions` table. Actions are
//! stored as a `BIGINT` bitmask so the action filter runs in SQL:
//! `(subscribed_actions & $1) <> 0`. Pages are ordered by `(created, id)`,
//! which is stable across calls as long as rows are not inserted mid-dispatch.
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError |
//! |------------|------------|
//! | Database / PoolClosed / Io / other | `Storage` |
//! | Row decoding failures | `Corrupt` |
//! | `UPDATE` touching zero rows | `NotFound` |

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;
use url::Url;
use uuid::Uuid;

use webhooks_core::{Actions, Subscription, SubscriptionId};

use super::r#trait::{StoreError, SubscriptionStore};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS webhook_subscriptions (
    id UUID PRIMARY KEY,
    client_id TEXT NOT NULL,
    callback_uri TEXT NOT NULL,
    subscribed_actions BIGINT NOT NULL,
    created TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    last_modified TIMESTAMPTZ NULL,
    last_success TIMESTAMPTZ NULL
)
"#;

const CREATE_ORDER_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS webhook_subscriptions_created_idx
    ON webhook_subscriptions (created, id)
"#;

const COLUMNS: &str =
    "id, client_id, callback_uri, subscribed_actions, created, last_modified, last_success";

/// Postgres subscription store.
///
/// `Send + Sync`; all operations go through the SQLx connection pool.
#[derive(Debug, Clone)]
pub struct PostgresSubscriptionStore<A> {
    pool: Arc<PgPool>,
    _actions: PhantomData<fn() -> A>,
}

impl<A: Actions> PostgresSubscriptionStore<A> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            _actions: PhantomData,
        }
    }

    /// Connect to `database_url` with a default pool.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the table and its ordering index if missing.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in [CREATE_TABLE, CREATE_ORDER_INDEX] {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    fn decode_rows(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<Subscription<A>>, StoreError> {
        rows.iter()
            .map(|row| SubscriptionRow::from_row(row).and_then(SubscriptionRow::into_subscription::<A>))
            .collect()
    }
}

#[async_trait::async_trait]
impl<A: Actions> SubscriptionStore<A> for PostgresSubscriptionStore<A> {
    #[instrument(skip(self), err)]
    async fn get_subscriptions(
        &self,
        size: usize,
        offset: usize,
    ) -> Result<Vec<Subscription<A>>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM webhook_subscriptions ORDER BY created, id LIMIT $1 OFFSET $2"
        ))
        .bind(to_i64(size))
        .bind(to_i64(offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_subscriptions", e))?;

        Self::decode_rows(rows)
    }

    #[instrument(skip(self), fields(action_bits = action.bits()), err)]
    async fn get_subscriptions_for(
        &self,
        action: A,
        size: usize,
        offset: usize,
    ) -> Result<Vec<Subscription<A>>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM webhook_subscriptions \
             WHERE (subscribed_actions & $1) <> 0 \
             ORDER BY created, id LIMIT $2 OFFSET $3"
        ))
        .bind(bits_to_column(action.bits()))
        .bind(to_i64(size))
        .bind(to_i64(offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_subscriptions_for", e))?;

        Self::decode_rows(rows)
    }

    #[instrument(skip(self, subscription), fields(subscription_id = %subscription.id), err)]
    async fn subscribe(&self, subscription: Subscription<A>) -> Result<Subscription<A>, StoreError> {
        let id = if subscription.is_persisted() {
            subscription.id
        } else {
            SubscriptionId::new()
        };

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO webhook_subscriptions
                (id, client_id, callback_uri, subscribed_actions, created, last_success)
            VALUES ($1, $2, $3, $4, COALESCE($5, NOW()), $6)
            ON CONFLICT (id) DO UPDATE SET
                client_id = EXCLUDED.client_id,
                callback_uri = EXCLUDED.callback_uri,
                subscribed_actions = EXCLUDED.subscribed_actions,
                last_success = EXCLUDED.last_success,
                last_modified = NOW()
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(&subscription.client_id)
        .bind(subscription.callback_uri.as_str())
        .bind(bits_to_column(subscription.subscribed_actions.bits()))
        .bind(subscription.created)
        .bind(subscription.last_success)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("subscribe", e))?;

        SubscriptionRow::from_row(&row)?.into_subscription()
    }

    #[instrument(skip(self), fields(subscription_id = %id), err)]
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM webhook_subscriptions WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("unsubscribe", e))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(subscription_id = %id), err)]
    async fn mark_successful(&self, id: SubscriptionId) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE webhook_subscriptions SET last_success = NOW() WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("mark_successful", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

/// The column is signed; the mask is reinterpreted bit for bit.
fn bits_to_column(bits: u64) -> i64 {
    bits as i64
}

fn bits_from_column(value: i64) -> u64 {
    value as u64
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            StoreError::Storage(format!("database error in {}: {}", operation, db_err.message()))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Storage(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("{} in {}", err, operation))
        }
        _ => StoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

struct SubscriptionRow {
    id: Uuid,
    client_id: String,
    callback_uri: String,
    subscribed_actions: i64,
    created: Option<DateTime<Utc>>,
    last_modified: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
}

impl SubscriptionRow {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, StoreError> {
        let read = |e: sqlx::Error| map_sqlx_error("decode row", e);
        Ok(Self {
            id: row.try_get("id").map_err(read)?,
            client_id: row.try_get("client_id").map_err(read)?,
            callback_uri: row.try_get("callback_uri").map_err(read)?,
            subscribed_actions: row.try_get("subscribed_actions").map_err(read)?,
            created: row.try_get("created").map_err(read)?,
            last_modified: row.try_get("last_modified").map_err(read)?,
            last_success: row.try_get("last_success").map_err(read)?,
        })
    }

    fn into_subscription<A: Actions>(self) -> Result<Subscription<A>, StoreError> {
        let bits = bits_from_column(self.subscribed_actions);
        let subscribed_actions = A::from_bits(bits).ok_or_else(|| {
            StoreError::Corrupt(format!("subscription {}: unknown action bits {bits:#x}", self.id))
        })?;
        let callback_uri = Url::parse(&self.callback_uri)
            .map_err(|e| StoreError::Corrupt(format!("subscription {}: callback uri: {e}", self.id)))?;

        Ok(Subscription {
            id: SubscriptionId::from_uuid(self.id),
            client_id: self.client_id,
            callback_uri,
            subscribed_actions,
            created: self.created,
            last_modified: self.last_modified,
            last_success: self.last_success,
        })
    }
}
