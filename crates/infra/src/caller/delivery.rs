//! Per-subscription delivery unit: retrying POST plus success bookkeeping.

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use webhooks_core::{Actions, RetryDelay, Subscription};

use super::CallerError;
use super::options::CallerOptions;
use crate::store::SubscriptionStore;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Why a single attempt did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DeliveryFailure {
    /// The subscriber answered with a non-2xx status.
    Status(u16),
    /// Connection error, timeout or another client-side fault.
    Transport(String),
}

impl core::fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DeliveryFailure::Status(status) => write!(f, "status {status}"),
            DeliveryFailure::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

/// Final result of one delivery unit.
///
/// `attempts` counts requests that produced an outcome; a request interrupted
/// by cancellation is not counted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered { attempts: u32, status: u16 },
    Exhausted { attempts: u32, last_failure: DeliveryFailure },
    Cancelled { attempts: u32 },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Delivered { attempts, .. }
            | DeliveryOutcome::Exhausted { attempts, .. }
            | DeliveryOutcome::Cancelled { attempts } => *attempts,
        }
    }
}

/// Run the retry loop for one subscription.
///
/// Attempt 1 is the initial request; up to `options.max_retries` retries
/// follow, each after the policy's delay for that retry number. The token is
/// raced against every request, every delay and the final store write.
pub(crate) async fn deliver<A, S>(
    client: &reqwest::Client,
    store: &S,
    options: &CallerOptions,
    subscription: &Subscription<A>,
    body: Bytes,
    token: &CancellationToken,
) -> Result<DeliveryOutcome, CallerError>
where
    A: Actions,
    S: SubscriptionStore<A> + ?Sized,
{
    let delay_for = options.retry_policy.delay_fn_scaled(options.retry_unit);
    let subscription_id = subscription.id;
    let callback = subscription.callback_uri.as_str();
    let mut attempts = 0u32;

    loop {
        if token.is_cancelled() {
            return Ok(DeliveryOutcome::Cancelled { attempts });
        }

        let request = client
            .post(subscription.callback_uri.clone())
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(body.clone())
            .send();

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(DeliveryOutcome::Cancelled { attempts }),
            response = request => response,
        };
        attempts += 1;

        let failure = match response {
            Ok(response) if response.status().is_success() => {
                let status = response.status().as_u16();
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Ok(DeliveryOutcome::Cancelled { attempts }),
                    marked = store.mark_successful(subscription_id) => marked?,
                }
                info!(%subscription_id, callback, attempt = attempts, status, "web hook delivered");
                return Ok(DeliveryOutcome::Delivered { attempts, status });
            }
            Ok(response) => DeliveryFailure::Status(response.status().as_u16()),
            Err(e) => DeliveryFailure::Transport(e.to_string()),
        };

        debug!(%subscription_id, callback, attempt = attempts, failure = %failure, "delivery attempt failed");

        let retry = attempts;
        if retry > options.max_retries {
            warn!(%subscription_id, callback, attempts, failure = %failure, "web hook retries exhausted");
            return Ok(DeliveryOutcome::Exhausted { attempts, last_failure: failure });
        }

        match delay_for(retry) {
            RetryDelay::DoNotRetry => {
                warn!(%subscription_id, callback, attempts, failure = %failure, "web hook delivery failed, policy does not retry");
                return Ok(DeliveryOutcome::Exhausted { attempts, last_failure: failure });
            }
            RetryDelay::After(delay) => {
                debug!(%subscription_id, retry, delay_ms = delay.as_millis() as u64, "scheduling retry");
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Ok(DeliveryOutcome::Cancelled { attempts }),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}
