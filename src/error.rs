//! Error taxonomy shared by every operation of the client.

use std::time::Duration;

use thiserror::Error;

/// Convenience alias for fallible client results.
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Maximum number of bytes of a response body kept in diagnostics.
const SNIPPET_LIMIT: usize = 256;

/// Unified error type surfaced by the client.
///
/// Transport and parsing raise the most specific kind; the retry policy
/// either resolves a retryable kind, escalates a non-retryable one
/// unchanged, or wraps the final failure as [`ClientError::RetriesExhausted`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Bad or missing settings. Raised at construction, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// A single attempt exceeded the configured per-attempt timeout.
    #[error("request timed out")]
    Timeout,

    /// DNS/TLS/connectivity failure before a response was received.
    #[error("connection failure: {0}")]
    Connection(String),

    /// Provider returned HTTP 429.
    #[error("rate limited by provider: {message}")]
    RateLimited {
        message: String,
        /// Parsed `Retry-After` header, when the provider sent one.
        retry_after: Option<Duration>,
    },

    /// Provider rejected the credentials (HTTP 401/403).
    #[error("authentication rejected (status {status})")]
    Auth { status: u16 },

    /// A 2xx body did not match any known response shape.
    #[error("malformed response (status {status}): {snippet}")]
    MalformedResponse { status: u16, snippet: String },

    /// Any other non-2xx provider response.
    #[error("provider error (status {status}): {message}")]
    Provider { status: u16, message: String },

    /// All retry attempts were used up; carries the final underlying error.
    #[error("retries exhausted after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ClientError>,
    },

    /// The call was cancelled before it resolved.
    #[error("call cancelled")]
    Cancelled,
}

impl ClientError {
    /// Provider-supplied status code, where one exists.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Auth { status }
            | ClientError::MalformedResponse { status, .. }
            | ClientError::Provider { status, .. } => Some(*status),
            ClientError::RateLimited { .. } => Some(429),
            ClientError::RetriesExhausted { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// Redacted representation of an API key for log lines.
///
/// The full key must never reach an error message or a log record.
pub fn redact_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Truncate a response body before it is attached to an error.
pub(crate) fn truncate_snippet(body: &str) -> String {
    if body.len() <= SNIPPET_LIMIT {
        return body.to_string();
    }
    let mut end = SNIPPET_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
