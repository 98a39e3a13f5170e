//! Pooled HTTP connection manager. One raw attempt per send; retry lives
//! one layer up in the client.

use crate::config::Settings;
use crate::error::ClientError;
use crate::request::ApiRequest;

/// Wrapper over a pooled `reqwest::Client` bound to one base endpoint and
/// per-attempt timeout. Connections are reused across calls and released
/// when the owning client is dropped.
pub struct Transport {
    http: reqwest::Client,
}

impl Transport {
    pub fn new(settings: &Settings) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("gemini-wrapper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { http })
    }

    /// Perform exactly one network round trip.
    ///
    /// Exceeding the configured timeout yields [`ClientError::Timeout`]
    /// rather than a hang. Non-2xx statuses are returned as responses;
    /// translating them into errors is the parser's job.
    pub async fn send(&self, request: &ApiRequest) -> Result<reqwest::Response, ClientError> {
        let mut builder = self.http.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        builder.send().await.map_err(classify)
    }
}

/// Map a transport-level failure onto the error taxonomy.
pub(crate) fn classify(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Connection(err.to_string())
    }
}
