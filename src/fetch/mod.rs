//! # Fetch Client
//! Single outbound JSON GET with rate-limit retries, cooperative cancellation and
//! error classification.
//!
//! Retry policy: only HTTP 429 is retried. The delay honours a positive
//! `Retry-After` (seconds) and otherwise doubles from `initial_backoff_ms`
//! (1s, 2s, 4s, ...). Both the request and the backoff sleep race the run's
//! cancellation token, so a superseded run stops immediately.

pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::clock::{Sleeper, TokioSleeper};
use crate::error::{RadarError, Result};

pub use transport::{HttpTransport, RawResponse, Transport};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
        }
    }
}

/// Per-call options. `max_attempts` overrides the client policy when set.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub cancel: CancellationToken,
    pub max_attempts: Option<u32>,
}

impl FetchOptions {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            max_attempts: None,
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = Some(n);
        self
    }
}

/// Delay before retry number `attempt + 1` (attempt is 0-based).
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32, retry_after: Option<&str>) -> Duration {
    if let Some(ms) = retry_after.and_then(parse_retry_after_ms) {
        return Duration::from_millis(ms);
    }
    let factor = 1u64.checked_shl(attempt.min(20)).unwrap_or(u64::MAX);
    Duration::from_millis(policy.initial_backoff_ms.saturating_mul(factor))
}

/// Seconds → ms when the header is a positive number; HTTP-date hints are ignored.
fn parse_retry_after_ms(raw: &str) -> Option<u64> {
    let secs = raw.trim().parse::<f64>().ok()?;
    if !secs.is_finite() || secs <= 0.0 {
        return None;
    }
    // float → int casts saturate
    Some((secs * 1000.0).round() as u64)
}

pub struct FetchClient {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
}

impl FetchClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            sleeper: Arc::new(TokioSleeper),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn fetch_json(
        &self,
        path: &str,
        params: &[(&str, String)],
        opts: &FetchOptions,
    ) -> Result<Value> {
        let max_attempts = opts.max_attempts.unwrap_or(self.policy.max_attempts).max(1);
        let cancel = &opts.cancel;

        for attempt in 0..max_attempts {
            if cancel.is_cancelled() {
                return Err(RadarError::Cancelled);
            }

            let resp = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RadarError::Cancelled),
                r = self.transport.get(path, params) => r,
            };
            let resp = match resp {
                Ok(r) => r,
                Err(e) => {
                    warn!(path, error = %e, "fetch failed");
                    return Err(e);
                }
            };

            if resp.status == 429 {
                if attempt + 1 >= max_attempts {
                    warn!(path, attempts = max_attempts, "rate limit budget exhausted");
                    return Err(RadarError::RateLimited {
                        attempts: max_attempts,
                    });
                }
                let delay = backoff_delay(&self.policy, attempt, resp.retry_after.as_deref());
                debug!(
                    path,
                    attempt = attempt + 1,
                    max = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "429, backing off"
                );
                counter!("radar_fetch_retries_total").increment(1);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(RadarError::Cancelled),
                    _ = self.sleeper.sleep(delay) => {}
                }
                continue;
            }

            if !resp.is_success() {
                let message = body_snippet(&resp.body);
                warn!(path, status = resp.status, "non-success response");
                return Err(RadarError::Http {
                    status: resp.status,
                    message,
                });
            }

            return serde_json::from_slice(&resp.body)
                .map_err(|e| RadarError::Decode(format!("{path}: {e}")));
        }

        Err(RadarError::RateLimited {
            attempts: max_attempts,
        })
    }
}

/// First 200 chars of the body for error messages.
fn body_snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.chars().count() > 200 {
        trimmed.chars().take(200).collect()
    } else {
        trimmed.to_string()
    }
}
