//! Blocking facade over the async client.
//!
//! Each operation runs the async call to completion on a runtime owned by
//! the facade, so callers in non-async contexts get ordinary blocking
//! calls without managing any concurrency primitives.

use tokio::runtime::{Builder, Runtime};
use tokio_stream::StreamExt;

use crate::client::GeminiClient;
use crate::config::Settings;
use crate::error::ClientError;
use crate::request::{Message, RequestOptions};
use crate::response::{ChatResult, CompletionResult, EmbeddingResult, HealthStatus};

/// Blocking client delegating every operation to [`GeminiClient`].
///
/// The transport pool is thread-safe, so one `BlockingClient` may be
/// shared across threads; concurrent calls serialize on runtime entry.
pub struct BlockingClient {
    inner: GeminiClient,
    runtime: Runtime,
}

impl BlockingClient {
    pub fn new(settings: Settings) -> Result<Self, ClientError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ClientError::Config(format!("failed to start blocking runtime: {e}")))?;
        let inner = GeminiClient::new(settings)?;
        Ok(Self { inner, runtime })
    }

    /// Construct from environment variables (see `config` for names).
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(Settings::from_env()?)
    }

    pub fn settings(&self) -> &Settings {
        self.inner.settings()
    }

    pub fn complete(
        &self,
        prompt: &str,
        options: &RequestOptions,
    ) -> Result<CompletionResult, ClientError> {
        self.runtime.block_on(self.inner.complete(prompt, options))
    }

    pub fn chat(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<ChatResult, ClientError> {
        self.runtime.block_on(self.inner.chat(messages, options))
    }

    pub fn embed(&self, texts: &[String]) -> Result<EmbeddingResult, ClientError> {
        self.runtime.block_on(self.inner.embed(texts))
    }

    /// Stream a completion, invoking `callback` synchronously once per
    /// text fragment, in arrival order. Blocks until the stream's terminal
    /// event; the callback is never invoked after it.
    pub fn stream_complete<F>(
        &self,
        prompt: &str,
        options: &RequestOptions,
        mut callback: F,
    ) -> Result<(), ClientError>
    where
        F: FnMut(&str),
    {
        self.runtime.block_on(async {
            let mut stream = self.inner.stream_complete(prompt, options).await?;
            while let Some(item) = stream.next().await {
                let token = item?;
                if !token.text.is_empty() {
                    callback(&token.text);
                }
                if token.done {
                    break;
                }
            }
            Ok(())
        })
    }

    pub fn health_check(&self) -> HealthStatus {
        self.runtime.block_on(self.inner.health_check())
    }

    /// Release pooled connections deterministically.
    pub fn close(self) {}
}
