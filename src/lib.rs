//! # gemini-wrapper
//!
//! Resilient HTTP client for Gemini-style (REST+JSON) LLM APIs: completion,
//! chat, embedding, streaming completion and health checks with automatic
//! retry/backoff, typed errors, and both async and blocking call styles.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gemini_wrapper::{GeminiClient, RequestOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GEMINI_API_KEY and GEMINI_API_ENDPOINT (plus optional
//!     // GEMINI_TIMEOUT / GEMINI_MAX_RETRIES / GEMINI_PROJECT).
//!     let client = GeminiClient::from_env()?;
//!
//!     let result = client
//!         .complete("Say hello.", &RequestOptions::default().max_tokens(64))
//!         .await?;
//!     println!("{}", result.text);
//!     Ok(())
//! }
//! ```
//!
//! Blocking callers use [`BlockingClient`] with the same operations and the
//! same [`ClientError`] taxonomy. Explicit configuration (no environment)
//! goes through [`Settings::builder`].

pub mod blocking;
pub mod client;
pub mod config;
pub mod error;
pub mod request;
pub mod response;
pub mod retry;
pub mod stream;
pub mod transport;

pub use blocking::BlockingClient;
pub use client::GeminiClient;
pub use config::{BackoffConfig, EndpointPaths, Settings, SettingsBuilder};
pub use error::{redact_api_key, ClientError, Result};
pub use request::{ChatRole, Message, Operation, RequestOptions};
pub use response::{ChatResult, CompletionResult, EmbeddingResult, HealthStatus, Usage};
pub use retry::{RetryDecision, RetryPolicy};
pub use stream::{CompletionStream, StreamToken};
