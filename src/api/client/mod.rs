//! API client for OpenAI-compatible local model servers.

mod retry;

use super::completions;
use super::ModelClient;
use crate::config::ModelConfig;
use crate::error::ApiError;
use crate::types::ChatRequest;
use async_trait::async_trait;
use retry::RetryPolicy;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Client for `/chat/completions` endpoints.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    retry_policy: RetryPolicy,
}

impl ApiClient {
    /// Build a client from resolved model configuration.
    pub fn new(config: &ModelConfig) -> Self {
        Self::new_with_retry_policy(config, RetryPolicy::from_config(config))
    }

    fn new_with_retry_policy(config: &ModelConfig, retry_policy: RetryPolicy) -> Self {
        // Fall back to reqwest defaults if builder creation fails for any reason.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.trim().to_string(),
            retry_policy,
        }
    }

    fn bearer(&self) -> Option<&str> {
        (!self.api_key.is_empty()).then_some(self.api_key.as_str())
    }

    async fn dispatch_request_with_retries(
        &self,
        request: &ChatRequest,
    ) -> Result<String, ApiError> {
        let mut retry: u32 = 0;
        loop {
            let err =
                match completions::request(&self.http, &self.base_url, request, self.bearer())
                    .await
                {
                    Ok(text) => return Ok(text),
                    Err(err) => err,
                };
            let Some(delay) = self.retry_policy.next_delay(retry, &err) else {
                return Err(with_diagnostic_hints(&self.base_url, err));
            };
            retry += 1;
            warn!(retry, ?delay, error = %err, "model request failed; retrying");
            sleep(delay).await;
        }
    }
}

#[async_trait]
impl ModelClient for ApiClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ApiError> {
        debug!(
            model = %request.model,
            turns = request.messages.len(),
            "sending chat completion request"
        );
        self.dispatch_request_with_retries(request).await
    }
}

/// Add hints for the most common local-server misconfigurations.
fn with_diagnostic_hints(base_url: &str, err: ApiError) -> ApiError {
    match err {
        ApiError::Status {
            code: 404,
            mut body,
            retry_after_secs,
        } => {
            body.push_str(&format!(
                "\nHint: check that `{base_url}` ends in the server's OpenAI-compatible prefix (for Ollama: http://localhost:11434/v1) and that the model is pulled."
            ));
            ApiError::status(404, body, retry_after_secs)
        }
        other => other,
    }
}
