//! When and how long to wait before re-sending a model request.

use crate::config::ModelConfig;
use crate::error::ApiError;
use std::time::Duration;

/// Longest wait between two attempts, whatever the server asks for.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Retries configured by `[model] max_retries` and `retry_backoff_ms`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct RetryPolicy {
    /// Extra attempts after the first request. Zero disables retrying.
    pub(super) max_retries: u32,
    /// First delay; doubles on each further retry.
    pub(super) backoff: Duration,
}

impl RetryPolicy {
    pub(super) fn from_config(config: &ModelConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Delay before retry number `retry` (zero-based), or `None` to give up.
    ///
    /// Only failures a local server recovers from on its own are retried:
    /// refused or timed-out connections while it starts, 503 while a model
    /// loads, 429 and other 5xx.
    pub(super) fn next_delay(&self, retry: u32, err: &ApiError) -> Option<Duration> {
        if retry >= self.max_retries || !is_transient(err) {
            return None;
        }
        let delay = match err.retry_after_secs() {
            Some(secs) => Duration::from_secs(secs),
            None => self.backoff.saturating_mul(2u32.saturating_pow(retry)),
        };
        Some(delay.min(MAX_RETRY_DELAY))
    }
}

fn is_transient(err: &ApiError) -> bool {
    match err {
        ApiError::Http(inner) => inner.is_timeout() || inner.is_connect(),
        ApiError::Status { code, .. } => *code == 429 || (500..=599).contains(code),
        ApiError::InvalidResponse(_) => false,
    }
}
