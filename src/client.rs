//! Async client orchestrating configuration, transport, retry and parsing.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::{redact_api_key, ClientError};
use crate::request::{ApiRequest, Message, RequestBuilder, RequestOptions};
use crate::response::{self, ChatResult, CompletionResult, EmbeddingResult, HealthStatus};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::stream::CompletionStream;
use crate::transport::Transport;

/// High-level async client for Gemini-style HTTP APIs.
///
/// Owns the pooled transport; multiple calls may be in flight concurrently
/// against one client, sharing only the read-only settings and the pool.
/// Dropping (or [`GeminiClient::close`]) releases pooled connections.
pub struct GeminiClient {
    settings: Arc<Settings>,
    transport: Transport,
    policy: RetryPolicy,
}

impl GeminiClient {
    pub fn new(settings: Settings) -> Result<Self, ClientError> {
        let transport = Transport::new(&settings)?;
        let policy = RetryPolicy::new(settings.max_retries, settings.backoff.clone());
        Ok(Self {
            settings: Arc::new(settings),
            transport,
            policy,
        })
    }

    /// Construct from environment variables (see `config` for names).
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(Settings::from_env()?)
    }

    /// The immutable settings this client was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Single-shot completion for a prompt.
    #[tracing::instrument(name = "complete", skip(self, prompt, options), err)]
    pub async fn complete(
        &self,
        prompt: &str,
        options: &RequestOptions,
    ) -> Result<CompletionResult, ClientError> {
        let request = RequestBuilder::new(&self.settings).complete(prompt, options)?;
        let response = self.send_with_retry(&request).await?;
        response::parse_completion(response).await
    }

    /// Chat reply for an ordered, non-empty message history.
    #[tracing::instrument(name = "chat", skip(self, messages, options), err)]
    pub async fn chat(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<ChatResult, ClientError> {
        let request = RequestBuilder::new(&self.settings).chat(messages, options)?;
        let response = self.send_with_retry(&request).await?;
        response::parse_chat(response).await
    }

    /// Embedding vectors for a non-empty list of texts; output order
    /// mirrors input order.
    #[tracing::instrument(name = "embed", skip(self, texts), err)]
    pub async fn embed(&self, texts: &[String]) -> Result<EmbeddingResult, ClientError> {
        let request = RequestBuilder::new(&self.settings).embed(texts)?;
        let response = self.send_with_retry(&request).await?;
        response::parse_embeddings(response).await
    }

    /// Streaming completion. The returned stream yields text fragments in
    /// arrival order and ends with a single terminal token; issue a fresh
    /// call to stream again.
    #[tracing::instrument(name = "stream_complete", skip(self, prompt, options), err)]
    pub async fn stream_complete(
        &self,
        prompt: &str,
        options: &RequestOptions,
    ) -> Result<CompletionStream, ClientError> {
        let request = RequestBuilder::new(&self.settings).stream_complete(prompt, options)?;
        let response = self.send_with_retry(&request).await?;
        Ok(CompletionStream::new(response))
    }

    /// Lightweight reachability probe. Expected diagnostic statuses are
    /// reported, not raised; a single attempt, no retries.
    #[tracing::instrument(name = "health_check", skip(self))]
    pub async fn health_check(&self) -> HealthStatus {
        let request = RequestBuilder::new(&self.settings).health();
        match self.transport.send(&request).await {
            Ok(response) => {
                let status = response.status().as_u16();
                debug!(status, "health probe answered");
                match status {
                    200..=299 => HealthStatus::Healthy,
                    401 | 403 => HealthStatus::AuthFailed { status },
                    _ => HealthStatus::Unreachable {
                        status: Some(status),
                    },
                }
            }
            Err(err) => {
                debug!(error = %err, "health probe failed");
                HealthStatus::Unreachable { status: None }
            }
        }
    }

    /// Release pooled connections deterministically.
    pub fn close(self) {}

    /// Retry loop: Building -> Sending -> (Succeeded | Retrying -> Sending
    /// | Failed). Attempts are strictly sequential; the request is rebuilt
    /// with identical content each time.
    async fn send_with_retry(&self, request: &ApiRequest) -> Result<reqwest::Response, ClientError> {
        let mut attempt: u32 = 0;
        loop {
            let failure = match self.transport.send(request).await {
                Ok(response) if response.status().is_success() => {
                    debug!(
                        operation = request.operation.as_str(),
                        attempt = attempt + 1,
                        "request succeeded"
                    );
                    return Ok(response);
                }
                Ok(response) => response::into_error(response).await,
                Err(err) => err,
            };

            match self.policy.decide(attempt, failure) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        operation = request.operation.as_str(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        api_key = %redact_api_key(&self.settings.api_key),
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::GiveUp(err) => return Err(err),
            }
        }
    }
}
