//! Process configuration, read from the environment.

use std::time::Duration;

use webhooks_core::{DomainError, DomainResult};
use webhooks_infra::CallerOptions;

pub const ENV_BIND: &str = "WEBHOOKS_BIND";
pub const ENV_WORKERS: &str = "WEBHOOKS_WORKERS";
pub const ENV_HTTP_TIMEOUT_MS: &str = "WEBHOOKS_HTTP_TIMEOUT_MS";
pub const ENV_USE_PERSISTENT_STORES: &str = "USE_PERSISTENT_STORES";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Postgres { database_url: String },
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind: String,
    pub workers: usize,
    pub http_timeout: Duration,
    pub caller: CallerOptions,
    pub store: StoreBackend,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            workers: 8,
            http_timeout: Duration::from_secs(10),
            caller: CallerOptions::default(),
            store: StoreBackend::InMemory,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> DomainResult<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> DomainResult<Self> {
        let mut config = Self {
            caller: CallerOptions::from_vars(&lookup)?,
            ..Self::default()
        };

        if let Some(bind) = lookup(ENV_BIND) {
            config.bind = bind.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_WORKERS) {
            config.workers = parse_number(ENV_WORKERS, &raw)?;
            if config.workers == 0 {
                return Err(DomainError::configuration(format!("{ENV_WORKERS} must be at least 1")));
            }
        }

        if let Some(raw) = lookup(ENV_HTTP_TIMEOUT_MS) {
            config.http_timeout = Duration::from_millis(parse_number(ENV_HTTP_TIMEOUT_MS, &raw)?);
        }

        let persistent = lookup(ENV_USE_PERSISTENT_STORES)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if persistent {
            let database_url = lookup(ENV_DATABASE_URL).ok_or_else(|| {
                DomainError::configuration(format!(
                    "{ENV_DATABASE_URL} must be set when {ENV_USE_PERSISTENT_STORES}=true"
                ))
            })?;
            config.store = StoreBackend::Postgres { database_url };
        }

        Ok(config)
    }
}

fn parse_number<T>(key: &str, raw: &str) -> DomainResult<T>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| DomainError::configuration(format!("{key}='{raw}': {e}")))
}
