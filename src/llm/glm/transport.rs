//! HTTP transport for the GLM chat-completions endpoint
//!
//! One POST per call. The outcome is classified as a decoded completion, an
//! open streaming body or an error; no retries.

use reqwest::{Client, Response};
use std::future::Future;
use tokio_util::sync::CancellationToken;

use super::config::GlmConfig;
use super::wire::{ChatCompletion, ChatCompletionRequest};
use crate::core::{AdapterError, AdapterResult};
use crate::llm::auth::AuthConfig;

/// Run `fut` unless `cancel` fires first
pub(crate) async fn with_cancel<F, T>(
    cancel: Option<&CancellationToken>,
    fut: F,
) -> AdapterResult<T>
where
    F: Future<Output = AdapterResult<T>>,
{
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::info!("[GLM] Request cancelled");
                Err(AdapterError::Cancelled)
            }
            result = fut => result,
        },
        None => fut.await,
    }
}

/// Authenticated POSTs against the configured endpoint
#[derive(Debug, Clone)]
pub struct GlmTransport {
    client: Client,
    config: GlmConfig,
}

impl GlmTransport {
    pub fn new(client: Client, config: GlmConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &GlmConfig {
        &self.config
    }

    async fn post(
        &self,
        auth: &AuthConfig,
        request: &ChatCompletionRequest,
        cancel: Option<&CancellationToken>,
    ) -> AdapterResult<Response> {
        let url = self.config.endpoint(auth.base_url.as_deref());
        let request_json = serde_json::to_string(request)?;

        tracing::debug!("[GLM] POST {}", url);
        tracing::debug!("[GLM] Request JSON: {}", request_json);

        let mut request_builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("User-Agent", &self.config.user_agent)
            .bearer_auth(&auth.api_key);

        for (name, value) in &self.config.extra_headers {
            request_builder = request_builder.header(name.as_str(), value.as_str());
        }

        let response = with_cancel(cancel, async {
            request_builder
                .body(request_json)
                .send()
                .await
                .map_err(AdapterError::from)
        })
        .await?;

        let status = response.status();
        tracing::debug!("[GLM] Response status: {}", status);

        if !status.is_success() {
            // Best effort: an unreadable error body becomes an empty detail
            let body = response.text().await.unwrap_or_default();
            tracing::error!("[GLM] API error: {} - {}", status, body);
            return Err(AdapterError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    /// Non-streaming call, decoded into a completion
    pub async fn send_json(
        &self,
        auth: &AuthConfig,
        request: &ChatCompletionRequest,
        cancel: Option<&CancellationToken>,
    ) -> AdapterResult<ChatCompletion> {
        let response = self.post(auth, request, cancel).await?;

        let response_text = with_cancel(cancel, async {
            response.text().await.map_err(AdapterError::from)
        })
        .await?;
        tracing::debug!("[GLM] Response body: {}", response_text);

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!("[GLM] Failed to parse response: {}", e);
            AdapterError::InvalidResponse(format!("failed to parse GLM response: {}", e))
        })
    }

    /// Streaming call; returns the response whose body carries the SSE records
    pub async fn open_stream(
        &self,
        auth: &AuthConfig,
        request: &ChatCompletionRequest,
        cancel: Option<&CancellationToken>,
    ) -> AdapterResult<Response> {
        let response = self.post(auth, request, cancel).await?;

        if response.content_length() == Some(0) {
            tracing::error!("[GLM] Streaming response has no body");
            return Err(AdapterError::MissingBody);
        }

        tracing::info!("[GLM] Streaming response started");
        Ok(response)
    }
}
