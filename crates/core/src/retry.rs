//! Retry policies for failed deliveries.
//!
//! A policy maps a 1-based retry number to the delay before that retry. The
//! function is pure and is looked up fresh for every delivery unit.

use core::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Delay unit used by [`RetryPolicy::delay_fn`].
pub const DEFAULT_RETRY_UNIT: Duration = Duration::from_secs(1);

const FIXED_FACTOR: u64 = 30;
const LINEAR_FACTOR: u64 = 30;
const EXPONENTIAL_BASE: u64 = 5;
const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Specifies how failed web hook invocations are retried.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Failed requests are not retried.
    None,
    /// Failed requests are retried without waiting.
    Immediate,
    /// Constant delay between retries.
    Fixed,
    /// Delay grows linearly with the retry number.
    Linear,
    /// Delay grows exponentially with the retry number.
    ///
    /// Steps keep growing until the delay no longer fits a [`Duration`]
    /// (retry 28 with a one second unit); from there it stays at
    /// [`Duration::MAX`].
    #[default]
    Exponential,
}

/// Outcome of a delay lookup.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RetryDelay {
    /// Stop retrying. Never a real wait.
    DoNotRetry,
    /// Wait this long, then retry.
    After(Duration),
}

impl RetryDelay {
    pub fn duration(self) -> Option<Duration> {
        match self {
            RetryDelay::DoNotRetry => None,
            RetryDelay::After(d) => Some(d),
        }
    }
}

impl RetryPolicy {
    pub const ALL: [RetryPolicy; 5] = [
        RetryPolicy::None,
        RetryPolicy::Immediate,
        RetryPolicy::Fixed,
        RetryPolicy::Linear,
        RetryPolicy::Exponential,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RetryPolicy::None => "none",
            RetryPolicy::Immediate => "immediate",
            RetryPolicy::Fixed => "fixed",
            RetryPolicy::Linear => "linear",
            RetryPolicy::Exponential => "exponential",
        }
    }

    /// Delay function in seconds (30 s fixed, 30·n s linear, 5ⁿ s exponential).
    pub fn delay_fn(self) -> impl Fn(u32) -> RetryDelay + Send + Sync + 'static {
        self.delay_fn_scaled(DEFAULT_RETRY_UNIT)
    }

    /// Same shapes as [`delay_fn`](Self::delay_fn), measured in `unit`.
    pub fn delay_fn_scaled(self, unit: Duration) -> impl Fn(u32) -> RetryDelay + Send + Sync + 'static {
        move |retry| self.delay(retry, unit)
    }

    /// Parse a raw configuration value and return its delay function.
    pub fn delay_fn_for(raw: &str) -> DomainResult<impl Fn(u32) -> RetryDelay + Send + Sync + 'static> {
        Ok(raw.parse::<RetryPolicy>()?.delay_fn())
    }

    fn delay(self, retry: u32, unit: Duration) -> RetryDelay {
        match self {
            RetryPolicy::None => RetryDelay::DoNotRetry,
            RetryPolicy::Immediate => RetryDelay::After(Duration::ZERO),
            RetryPolicy::Fixed => RetryDelay::After(scale(unit, FIXED_FACTOR)),
            RetryPolicy::Linear => {
                RetryDelay::After(scale(unit, LINEAR_FACTOR.saturating_mul(u64::from(retry))))
            }
            RetryPolicy::Exponential => match EXPONENTIAL_BASE.checked_pow(retry) {
                Some(factor) => RetryDelay::After(scale(unit, factor)),
                None => RetryDelay::After(Duration::MAX),
            },
        }
    }
}

/// `unit * factor`, saturating at [`Duration::MAX`].
fn scale(unit: Duration, factor: u64) -> Duration {
    let nanos = unit.as_nanos().saturating_mul(u128::from(factor));
    match u64::try_from(nanos / NANOS_PER_SEC) {
        Ok(secs) => Duration::new(secs, (nanos % NANOS_PER_SEC) as u32),
        Err(_) => Duration::MAX,
    }
}

impl core::fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetryPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        RetryPolicy::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| DomainError::configuration(format!("unknown retry policy '{s}'")))
    }
}

impl TryFrom<i64> for RetryPolicy {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| RetryPolicy::ALL.get(idx).copied())
            .ok_or_else(|| DomainError::configuration(format!("retry policy value {value} is out of range")))
    }
}
