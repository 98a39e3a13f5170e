//! Typed results and response parsing.
//!
//! Provider payloads vary across Gemini-style APIs, so 2xx bodies are
//! parsed through a small closed set of known shape variants; anything
//! outside the set becomes [`ClientError::MalformedResponse`].

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use serde::Deserialize;

use crate::error::{truncate_snippet, ClientError};
use crate::transport;

/// Token accounting reported by the provider, when available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: Option<u32>,
    #[serde(default)]
    pub completion_tokens: Option<u32>,
    #[serde(default)]
    pub total_tokens: Option<u32>,
}

/// Result of a non-streaming completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResult {
    pub text: String,
    pub usage: Option<Usage>,
}

/// Result of a chat call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResult {
    pub reply: String,
    pub usage: Option<Usage>,
}

/// Result of an embedding call. Vector order mirrors input order exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    pub vectors: Vec<Vec<f64>>,
}

/// Outcome of a health probe. Expected diagnostic statuses are reported,
/// not raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    /// Endpoint reachable but credentials were rejected.
    AuthFailed { status: u16 },
    /// Endpoint unreachable, or reachable with an unexpected status.
    Unreachable { status: Option<u16> },
}

// Gemini candidate/content/parts nesting, shared with the stream decoder.

#[derive(Debug, Deserialize)]
pub(crate) struct Candidate {
    pub(crate) content: CandidateContent,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandidateContent {
    #[serde(default)]
    pub(crate) parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandidatePart {
    #[serde(default)]
    pub(crate) text: Option<String>,
}

pub(crate) fn first_candidate_text(candidates: &[Candidate]) -> Option<String> {
    candidates
        .first()?
        .content
        .parts
        .iter()
        .find_map(|part| part.text.clone())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
    #[serde(default)]
    total_token_count: Option<u32>,
}

impl From<UsageMetadata> for Usage {
    fn from(meta: UsageMetadata) -> Self {
        Usage {
            prompt_tokens: meta.prompt_token_count,
            completion_tokens: meta.candidates_token_count,
            total_tokens: meta.total_token_count,
        }
    }
}

/// Known text-bearing response shapes, tried in declaration order.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextPayload {
    Candidates {
        candidates: Vec<Candidate>,
        #[serde(rename = "usageMetadata", default)]
        usage_metadata: Option<UsageMetadata>,
    },
    Flat {
        text: String,
        #[serde(default)]
        usage: Option<Usage>,
    },
    Completion {
        completion: String,
        #[serde(default)]
        usage: Option<Usage>,
    },
    Reply {
        reply: String,
        #[serde(default)]
        usage: Option<Usage>,
    },
}

impl TextPayload {
    fn into_text(self) -> Option<(String, Option<Usage>)> {
        match self {
            TextPayload::Candidates {
                candidates,
                usage_metadata,
            } => first_candidate_text(&candidates)
                .map(|text| (text, usage_metadata.map(Usage::from))),
            TextPayload::Flat { text, usage } => Some((text, usage)),
            TextPayload::Completion { completion, usage } => Some((completion, usage)),
            TextPayload::Reply { reply, usage } => Some((reply, usage)),
        }
    }
}

/// Known embedding response shapes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbeddingPayload {
    Values { embeddings: Vec<ValueVector> },
    Named { vectors: Vec<Vec<f64>> },
    Flat { embeddings: Vec<Vec<f64>> },
}

#[derive(Debug, Deserialize)]
struct ValueVector {
    values: Vec<f64>,
}

impl EmbeddingPayload {
    fn into_vectors(self) -> Vec<Vec<f64>> {
        match self {
            EmbeddingPayload::Values { embeddings } => {
                embeddings.into_iter().map(|v| v.values).collect()
            }
            EmbeddingPayload::Named { vectors } => vectors,
            EmbeddingPayload::Flat { embeddings } => embeddings,
        }
    }
}

pub(crate) async fn parse_completion(
    response: reqwest::Response,
) -> Result<CompletionResult, ClientError> {
    let status = response.status().as_u16();
    let body = response.text().await.map_err(transport::classify)?;
    completion_from_body(status, &body)
}

pub(crate) async fn parse_chat(response: reqwest::Response) -> Result<ChatResult, ClientError> {
    let status = response.status().as_u16();
    let body = response.text().await.map_err(transport::classify)?;
    chat_from_body(status, &body)
}

pub(crate) async fn parse_embeddings(
    response: reqwest::Response,
) -> Result<EmbeddingResult, ClientError> {
    let status = response.status().as_u16();
    let body = response.text().await.map_err(transport::classify)?;
    embeddings_from_body(status, &body)
}

/// Translate a non-2xx response into the taxonomy before the retry policy
/// sees it.
pub(crate) async fn into_error(response: reqwest::Response) -> ClientError {
    let status = response.status().as_u16();
    let retry_after = parse_retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    error_from_parts(status, retry_after, &body)
}

fn completion_from_body(status: u16, body: &str) -> Result<CompletionResult, ClientError> {
    let (text, usage) = text_from_body(status, body)?;
    Ok(CompletionResult { text, usage })
}

fn chat_from_body(status: u16, body: &str) -> Result<ChatResult, ClientError> {
    let (reply, usage) = text_from_body(status, body)?;
    Ok(ChatResult { reply, usage })
}

fn text_from_body(status: u16, body: &str) -> Result<(String, Option<Usage>), ClientError> {
    serde_json::from_str::<TextPayload>(body)
        .ok()
        .and_then(TextPayload::into_text)
        .ok_or_else(|| malformed(status, body))
}

fn embeddings_from_body(status: u16, body: &str) -> Result<EmbeddingResult, ClientError> {
    serde_json::from_str::<EmbeddingPayload>(body)
        .map(|payload| EmbeddingResult {
            vectors: payload.into_vectors(),
        })
        .map_err(|_| malformed(status, body))
}

fn error_from_parts(status: u16, retry_after: Option<Duration>, body: &str) -> ClientError {
    match status {
        401 | 403 => ClientError::Auth { status },
        429 => ClientError::RateLimited {
            message: truncate_snippet(body),
            retry_after,
        },
        _ => ClientError::Provider {
            status,
            message: truncate_snippet(body),
        },
    }
}

fn malformed(status: u16, body: &str) -> ClientError {
    ClientError::MalformedResponse {
        status,
        snippet: truncate_snippet(body),
    }
}

/// Delta-seconds `Retry-After` values only; HTTP-date, negative or
/// out-of-range values fall back to the computed backoff.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let seconds: f64 = raw.trim().parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}
