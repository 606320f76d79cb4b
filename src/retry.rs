//! Retry-with-backoff around a single HTTP exchange.
//!
//! Only the transport call is retried. Response parsing happens after
//! [`RetryPolicy::send`] returns, so a malformed body is never re-requested.
//!
//! Delays grow exponentially: with a 500 ms base and 3 attempts the schedule
//! is attempt 1 immediately, attempt 2 after 500 ms, attempt 3 after 1 s.
//! The wait is a `tokio::time::sleep`, so dropping the future cancels it.

use crate::error::InferenceError;
use crate::pipeline::llm::{HttpRequest, HttpResponse, Transport};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Statuses retried by default: rate limiting and gateway/server hiccups.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// When and how often an HTTP call is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Treated as 1 when 0.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Statuses that count as transient.
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Is this HTTP status worth another attempt?
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Delay to wait before `attempt` (1-indexed). None for the first attempt.
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt <= 1 {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt - 2);
        Some(self.base_delay.saturating_mul(factor))
    }

    /// Perform `request`, retrying transport failures and retryable statuses.
    ///
    /// Returns the first response whose status is not retryable, whether it
    /// is a success or not; the caller inspects the status. When every
    /// attempt fails, the last failure is returned: a retryable status
    /// becomes [`InferenceError::Http`], a transport failure
    /// [`InferenceError::Transport`].
    pub async fn send(
        &self,
        transport: &dyn Transport,
        request: &HttpRequest,
    ) -> Result<HttpResponse, InferenceError> {
        let attempts = self.max_attempts.max(1);
        let mut last_err: Option<InferenceError> = None;

        for attempt in 1..=attempts {
            if let Some(delay) = self.delay_before(attempt) {
                warn!(
                    "Retry {}/{} after {}ms",
                    attempt,
                    attempts,
                    delay.as_millis()
                );
                sleep(delay).await;
            }

            match transport.send(request).await {
                Ok(response) if !self.is_retryable(response.status) => {
                    debug!("Attempt {} → HTTP {}", attempt, response.status);
                    return Ok(response);
                }
                Ok(response) => {
                    warn!("Attempt {} → retryable HTTP {}", attempt, response.status);
                    last_err = Some(InferenceError::Http {
                        status: response.status,
                        body: response.body,
                    });
                }
                Err(e) => {
                    warn!("Attempt {} failed — {}", attempt, e);
                    last_err = Some(InferenceError::Transport {
                        attempts: attempt,
                        detail: e.to_string(),
                    });
                }
            }
        }

        Err(last_err.unwrap_or_else(|| InferenceError::Transport {
            attempts,
            detail: "no attempt was made".into(),
        }))
    }
}
