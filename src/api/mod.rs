//! HTTP client for the local model server.
//!
//! - `completions`: one `/chat/completions` round trip
//! - `client`: retry orchestration and the [`ModelClient`] implementation

use crate::error::ApiError;
use crate::types::ChatRequest;
use async_trait::async_trait;
use std::time::{Duration, SystemTime};

mod client;
mod completions;

pub use client::ApiClient;

/// Minimal model API interface used by the agent loop.
///
/// The loop only needs `(turns) -> text | error`; tests provide scripted
/// implementations without network calls while production uses
/// [`ApiClient`].
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ApiError>;
}

/// Parse a `Retry-After` header as delta-seconds or an HTTP date.
pub(crate) fn parse_retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    let raw = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim();
    parse_retry_after_value(raw, SystemTime::now())
}

fn parse_retry_after_value(raw: &str, now: SystemTime) -> Option<u64> {
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(secs);
    }
    let at = httpdate::parse_http_date(raw).ok()?;
    Some(
        at.duration_since(now)
            .unwrap_or(Duration::ZERO)
            .as_secs(),
    )
}
