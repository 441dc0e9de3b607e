//! Caller configuration.
//!
//! Options are read once per delivery unit through a [`CallerOptionsHandle`],
//! so a running engine picks up changes on the next delivery without a restart.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use webhooks_core::{DEFAULT_RETRY_UNIT, DomainError, DomainResult, RetryPolicy};

use super::CallerError;

pub const ENV_MAX_RETRIES: &str = "WEBHOOKS_MAX_RETRIES";
pub const ENV_RETRY_POLICY: &str = "WEBHOOKS_RETRY_POLICY";
pub const ENV_RETRY_UNIT_MS: &str = "WEBHOOKS_RETRY_UNIT_MS";

/// Retry behaviour of delivery units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallerOptions {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    pub retry_policy: RetryPolicy,
    /// Time unit the policy's delays are expressed in.
    pub retry_unit: Duration,
}

impl Default for CallerOptions {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_policy: RetryPolicy::Exponential,
            retry_unit: DEFAULT_RETRY_UNIT,
        }
    }
}

impl CallerOptions {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_retry_unit(mut self, retry_unit: Duration) -> Self {
        self.retry_unit = retry_unit;
        self
    }

    /// Load from `WEBHOOKS_*` environment variables; unset keys keep defaults.
    pub fn from_env() -> DomainResult<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> DomainResult<Self> {
        let mut options = Self::default();

        if let Some(raw) = lookup(ENV_MAX_RETRIES) {
            options.max_retries = raw.trim().parse().map_err(|e| {
                DomainError::configuration(format!("{ENV_MAX_RETRIES}='{raw}': {e}"))
            })?;
        }

        if let Some(raw) = lookup(ENV_RETRY_POLICY) {
            options.retry_policy = match raw.trim().parse::<i64>() {
                Ok(discriminant) => RetryPolicy::try_from(discriminant)?,
                Err(_) => raw.parse()?,
            };
        }

        if let Some(raw) = lookup(ENV_RETRY_UNIT_MS) {
            let millis: u64 = raw.trim().parse().map_err(|e| {
                DomainError::configuration(format!("{ENV_RETRY_UNIT_MS}='{raw}': {e}"))
            })?;
            options.retry_unit = Duration::from_millis(millis);
        }

        Ok(options)
    }
}

/// Shared, live-updatable [`CallerOptions`].
#[derive(Debug, Clone, Default)]
pub struct CallerOptionsHandle {
    inner: Arc<RwLock<CallerOptions>>,
}

impl CallerOptionsHandle {
    pub fn new(options: CallerOptions) -> Self {
        Self {
            inner: Arc::new(RwLock::new(options)),
        }
    }

    /// Snapshot of the current options.
    pub fn current(&self) -> CallerOptions {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, options: CallerOptions) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = options;
    }

    pub fn update(&self, f: impl FnOnce(&mut CallerOptions)) {
        f(&mut self.inner.write().unwrap_or_else(PoisonError::into_inner));
    }
}

impl From<CallerOptions> for CallerOptionsHandle {
    fn from(options: CallerOptions) -> Self {
        Self::new(options)
    }
}

/// HTTP client used for deliveries. `timeout` bounds each attempt.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, CallerError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(CallerError::Client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let options = CallerOptions::from_vars(vars(&[])).unwrap();
        assert_eq!(options, CallerOptions::default());
        assert_eq!(options.max_retries, 5);
        assert_eq!(options.retry_policy, RetryPolicy::Exponential);
        assert_eq!(options.retry_unit, Duration::from_secs(1));
    }

    #[test]
    fn reads_every_key() {
        let options = CallerOptions::from_vars(vars(&[
            (ENV_MAX_RETRIES, "2"),
            (ENV_RETRY_POLICY, "Linear"),
            (ENV_RETRY_UNIT_MS, "10"),
        ]))
        .unwrap();

        assert_eq!(options.max_retries, 2);
        assert_eq!(options.retry_policy, RetryPolicy::Linear);
        assert_eq!(options.retry_unit, Duration::from_millis(10));
    }

    #[test]
    fn policy_accepts_discriminants() {
        let options = CallerOptions::from_vars(vars(&[(ENV_RETRY_POLICY, "1")])).unwrap();
        assert_eq!(options.retry_policy, RetryPolicy::Immediate);
    }

    #[test]
    fn bad_values_are_configuration_errors() {
        for pairs in [
            [(ENV_MAX_RETRIES, "-1")],
            [(ENV_RETRY_POLICY, "sometimes")],
            [(ENV_RETRY_POLICY, "9")],
            [(ENV_RETRY_UNIT_MS, "soon")],
        ] {
            let err = CallerOptions::from_vars(vars(&pairs)).unwrap_err();
            assert!(err.is_configuration(), "{pairs:?} gave {err:?}");
        }
    }

    #[test]
    fn handle_updates_are_visible_to_clones() {
        let handle = CallerOptionsHandle::default();
        let reader = handle.clone();

        handle.update(|o| o.max_retries = 1);
        assert_eq!(reader.current().max_retries, 1);

        handle.replace(CallerOptions::default().with_retry_policy(RetryPolicy::None));
        assert_eq!(reader.current().retry_policy, RetryPolicy::None);
        assert_eq!(reader.current().max_retries, 5);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: CallerOptions =
            serde_json::from_value(serde_json::json!({ "retry_policy": "fixed" })).unwrap();
        assert_eq!(options.retry_policy, RetryPolicy::Fixed);
        assert_eq!(options.max_retries, 5);
    }
}
