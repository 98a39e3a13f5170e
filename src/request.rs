//! Request construction: per-operation URLs, headers and JSON bodies.

use reqwest::Method;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::Settings;
use crate::error::ClientError;

/// One of the client's wire operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Complete,
    Chat,
    Embed,
    StreamComplete,
    Health,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Complete => "complete",
            Operation::Chat => "chat",
            Operation::Embed => "embed",
            Operation::StreamComplete => "stream_complete",
            Operation::Health => "health",
        }
    }
}

/// Speaker role within a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single role/content pair in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: ChatRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Per-call options for the prompt-shaped operations.
///
/// Fields the builder does not recognize go through `extra` and are
/// forwarded to the provider untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestOptions {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Attach a provider-specific field the builder does not model.
    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A fully resolved request, rebuilt identically for each retry attempt.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub operation: Operation,
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Builds [`ApiRequest`]s against one settings snapshot.
pub struct RequestBuilder<'a> {
    settings: &'a Settings,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    pub fn complete(&self, prompt: &str, options: &RequestOptions) -> Result<ApiRequest, ClientError> {
        let body = self.prompt_body(prompt, options)?;
        Ok(self.post(Operation::Complete, &self.settings.paths.complete, body))
    }

    pub fn chat(&self, messages: &[Message], options: &RequestOptions) -> Result<ApiRequest, ClientError> {
        if messages.is_empty() {
            return Err(ClientError::Config(
                "chat requires at least one message".to_string(),
            ));
        }
        let mut body = options_map(options)?;
        body.insert(
            "messages".to_string(),
            serde_json::to_value(messages)
                .map_err(|e| ClientError::Config(format!("failed to serialize messages: {e}")))?,
        );
        Ok(self.post(Operation::Chat, &self.settings.paths.chat, body))
    }

    pub fn embed(&self, texts: &[String]) -> Result<ApiRequest, ClientError> {
        if texts.is_empty() {
            return Err(ClientError::Config(
                "embed requires at least one input text".to_string(),
            ));
        }
        let mut body = Map::new();
        body.insert(
            "texts".to_string(),
            Value::Array(texts.iter().map(|t| Value::String(t.clone())).collect()),
        );
        Ok(self.post(Operation::Embed, &self.settings.paths.embed, body))
    }

    pub fn stream_complete(
        &self,
        prompt: &str,
        options: &RequestOptions,
    ) -> Result<ApiRequest, ClientError> {
        let body = self.prompt_body(prompt, options)?;
        let mut request = self.post(
            Operation::StreamComplete,
            &self.settings.paths.stream_complete,
            body,
        );
        request
            .headers
            .push(("accept".to_string(), "text/event-stream".to_string()));
        Ok(request)
    }

    pub fn health(&self) -> ApiRequest {
        ApiRequest {
            operation: Operation::Health,
            method: Method::GET,
            url: self.url(&self.settings.paths.health),
            headers: self.headers(),
            body: None,
        }
    }

    fn prompt_body(&self, prompt: &str, options: &RequestOptions) -> Result<Map<String, Value>, ClientError> {
        let mut body = options_map(options)?;
        body.insert("prompt".to_string(), Value::String(prompt.to_string()));
        Ok(body)
    }

    fn post(&self, operation: Operation, path: &str, body: Map<String, Value>) -> ApiRequest {
        ApiRequest {
            operation,
            method: Method::POST,
            url: self.url(path),
            headers: self.headers(),
            body: Some(Value::Object(body)),
        }
    }

    fn url(&self, path: &str) -> String {
        let base = self.settings.endpoint.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![
            ("content-type".to_string(), "application/json".to_string()),
            ("x-goog-api-key".to_string(), self.settings.api_key.clone()),
        ];
        if let Some(project) = &self.settings.project {
            headers.push(("x-goog-project-id".to_string(), project.clone()));
        }
        headers
    }
}

fn options_map(options: &RequestOptions) -> Result<Map<String, Value>, ClientError> {
    match serde_json::to_value(options) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) | Err(_) => Err(ClientError::Config(
            "failed to serialize request options".to_string(),
        )),
    }
}
