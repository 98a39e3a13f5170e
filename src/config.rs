//! Configuration resolution from environment variables or explicit overrides.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::error::ClientError;

/// Environment variable holding the provider API key.
pub const API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";
/// Environment variable holding the base endpoint URL.
pub const ENDPOINT_ENV_VAR: &str = "GEMINI_API_ENDPOINT";
/// Optional per-attempt timeout override, in seconds.
pub const TIMEOUT_ENV_VAR: &str = "GEMINI_TIMEOUT";
/// Optional maximum retry count override.
pub const MAX_RETRIES_ENV_VAR: &str = "GEMINI_MAX_RETRIES";
/// Optional project/tenant identifier.
pub const PROJECT_ENV_VAR: &str = "GEMINI_PROJECT";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: u32 = 4;

/// Relative paths for each operation, independently overridable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPaths {
    pub complete: String,
    pub chat: String,
    pub embed: String,
    pub stream_complete: String,
    /// Lightweight status probe used by `health_check`.
    pub health: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            complete: "/v1/complete".to_string(),
            chat: "/v1/chat".to_string(),
            embed: "/v1/embed".to_string(),
            stream_complete: "/v1/stream".to_string(),
            health: "/v1/health".to_string(),
        }
    }
}

/// Backoff knobs for the retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Base duration for exponential backoff; jitter is drawn from `[0, base)`.
    pub base: Duration,
    /// Ceiling on any single backoff delay.
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max: Duration::from_secs(10),
        }
    }
}

/// Immutable runtime settings, built once per client lifetime.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Secret credential. Never logged; use `redact_api_key` for diagnostics.
    pub api_key: String,
    /// Base endpoint URL, e.g. `https://generativelanguage.googleapis.com`.
    pub endpoint: String,
    pub paths: EndpointPaths,
    /// Per-attempt timeout, not a per-call deadline.
    pub timeout: Duration,
    pub max_retries: u32,
    pub project: Option<String>,
    pub backoff: BackoffConfig,
}

impl Settings {
    /// Resolve settings from the process environment, loading `.env` first.
    pub fn from_env() -> Result<Self, ClientError> {
        let _ = dotenv::dotenv();
        Self::from_vars(&env::vars().collect())
    }

    /// Resolve settings from an explicit variable mapping.
    ///
    /// Deterministic: identical inputs produce identical settings.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ClientError> {
        let api_key = require(vars, API_KEY_ENV_VAR)?;
        let endpoint = require(vars, ENDPOINT_ENV_VAR)?;

        let timeout = match vars.get(TIMEOUT_ENV_VAR).filter(|v| !v.is_empty()) {
            Some(raw) => parse_timeout(raw)?,
            None => DEFAULT_TIMEOUT,
        };

        let max_retries = match vars.get(MAX_RETRIES_ENV_VAR).filter(|v| !v.is_empty()) {
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                ClientError::Config(format!(
                    "{MAX_RETRIES_ENV_VAR} must be a non-negative integer, got {raw:?}"
                ))
            })?,
            None => DEFAULT_MAX_RETRIES,
        };

        let project = vars.get(PROJECT_ENV_VAR).filter(|v| !v.is_empty()).cloned();

        Ok(Self {
            api_key,
            endpoint,
            paths: EndpointPaths::default(),
            timeout,
            max_retries,
            project,
            backoff: BackoffConfig::default(),
        })
    }

    /// Explicit construction without touching the environment.
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }
}

fn require(vars: &HashMap<String, String>, name: &str) -> Result<String, ClientError> {
    vars.get(name)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| ClientError::Config(format!("{name} must be set")))
}

fn parse_timeout(raw: &str) -> Result<Duration, ClientError> {
    let seconds: f64 = raw.parse().map_err(|_| {
        ClientError::Config(format!("{TIMEOUT_ENV_VAR} must be a number, got {raw:?}"))
    })?;
    if seconds <= 0.0 {
        return Err(ClientError::Config(format!(
            "{TIMEOUT_ENV_VAR} must be positive, got {raw:?}"
        )));
    }
    Duration::try_from_secs_f64(seconds).map_err(|_| {
        ClientError::Config(format!("{TIMEOUT_ENV_VAR} is out of range, got {raw:?}"))
    })
}

/// Builder for [`Settings`] with explicit overrides.
#[derive(Debug, Default, Clone)]
pub struct SettingsBuilder {
    api_key: Option<String>,
    endpoint: Option<String>,
    paths: Option<EndpointPaths>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    project: Option<String>,
    backoff: Option<BackoffConfig>,
}

impl SettingsBuilder {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn paths(mut self, paths: EndpointPaths) -> Self {
        self.paths = Some(paths);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Validate and build. Fails fast when api_key or endpoint is missing.
    pub fn build(self) -> Result<Settings, ClientError> {
        let api_key = self
            .api_key
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ClientError::Config("api_key must be set".to_string()))?;
        let endpoint = self
            .endpoint
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ClientError::Config("endpoint must be set".to_string()))?;

        if let Some(timeout) = self.timeout {
            if timeout.is_zero() {
                return Err(ClientError::Config("timeout must be positive".to_string()));
            }
        }

        Ok(Settings {
            api_key,
            endpoint,
            paths: self.paths.unwrap_or_default(),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            project: self.project,
            backoff: self.backoff.unwrap_or_default(),
        })
    }
}
