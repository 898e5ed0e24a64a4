//! Backend selection, transport options and call defaults.
//!
//! Everything is resolved once, up front, by [`Options::from_env`]. A process
//! without any usable credentials fails there, before a session exists.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::debug;

use crate::client::ClientError;

pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
pub const DEFAULT_TOKENS: u32 = 2048;
pub const MAX_ASYNC: usize = 10;
pub const MAX_RETRIES: u32 = 50;

/// Total tries for a call whose answer comes back empty.
pub const EMPTY_RESULT_ATTEMPTS: usize = 3;

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Where the credentials came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Custom,
    OpenRouter,
    OpenAi,
}

/// Endpoint and credentials of the chat-completion API.
#[derive(Debug, Clone)]
pub struct Backend {
    pub kind: BackendKind,
    pub base_url: String,
    pub api_key: SecretString,
}

impl Backend {
    pub fn new(kind: BackendKind, base_url: impl Into<String>, api_key: impl Into<SecretString>) -> Self {
        Self {
            kind,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn openrouter(api_key: impl Into<SecretString>) -> Self {
        Self::new(BackendKind::OpenRouter, OPENROUTER_BASE_URL, api_key)
    }

    pub fn openai(api_key: impl Into<SecretString>) -> Self {
        Self::new(BackendKind::OpenAi, OPENAI_BASE_URL, api_key)
    }
}

/// HTTP transport configuration.
///
/// # Example
/// ```rust
/// use keeptalking::options::TransportOptions;
/// use std::time::Duration;
///
/// let options = TransportOptions::default()
///     .with_timeout(Duration::from_secs(30))
///     .with_max_retries(3)
///     .with_header("X-Title".to_string(), "keeptalking".to_string());
/// assert_eq!(options.max_retries, 3);
/// ```
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Request timeout
    pub timeout: Option<Duration>,

    /// Retries of failed HTTP exchanges (429, 5xx, connection errors)
    pub max_retries: u32,

    /// First backoff delay; doubles on every retry
    pub retry_base_delay: Duration,

    /// Additional HTTP headers to include in requests
    pub extra_headers: HashMap<String, String>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            max_retries: MAX_RETRIES,
            retry_base_delay: Duration::from_millis(500),
            extra_headers: HashMap::new(),
        }
    }
}

impl TransportOptions {
    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers.insert(key, value);
        self
    }
}

/// Per-call values used when a request does not set its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub model: String,
    pub tokens: u32,
    pub attempts: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            tokens: DEFAULT_TOKENS,
            attempts: EMPTY_RESULT_ATTEMPTS,
        }
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Options {
    pub backend: Backend,
    pub transport: TransportOptions,
    pub defaults: Defaults,
    pub max_async: usize,
}

impl Options {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            transport: TransportOptions::default(),
            defaults: Defaults::default(),
            max_async: MAX_ASYNC,
        }
    }

    /// Resolve options from the process environment (and `.env`, if present).
    pub fn from_env() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve options through `lookup`. Empty values count as unset.
    ///
    /// Backend priority: `BASE_URL` (+ `API_KEY`), then `OPENROUTER_API_KEY`,
    /// then `OPENAI_API_KEY`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = if let Some(base_url) = get("BASE_URL") {
            let api_key = get("API_KEY").or_else(|| get("OPENAI_API_KEY")).ok_or_else(|| {
                ClientError::Config("BASE_URL is set but API_KEY is missing".to_string())
            })?;
            Backend::new(BackendKind::Custom, base_url, api_key)
        } else if let Some(api_key) = get("OPENROUTER_API_KEY") {
            Backend::openrouter(api_key)
        } else if let Some(api_key) = get("OPENAI_API_KEY") {
            Backend::openai(api_key)
        } else {
            return Err(ClientError::Config(
                "No backend config found. Set BASE_URL and API_KEY or OPENROUTER_API_KEY or OPENAI_API_KEY environment variables"
                    .to_string(),
            ));
        };
        debug!(kind = ?backend.kind, base_url = %backend.base_url, "Selected backend");

        let mut options = Options::new(backend);
        if let Some(model) = get("DEFAULT_MODEL") {
            options.defaults.model = model;
        }
        if let Some(tokens) = parse_var(&get, "DEFAULT_TOKENS")? {
            options.defaults.tokens = tokens;
        }
        if let Some(max_async) = parse_var::<usize, _>(&get, "MAX_ASYNC")? {
            if max_async == 0 || max_async > Semaphore::MAX_PERMITS {
                return Err(ClientError::Config(format!(
                    "MAX_ASYNC must be between 1 and {}",
                    Semaphore::MAX_PERMITS
                )));
            }
            options.max_async = max_async;
        }
        if let Some(max_retries) = parse_var(&get, "MAX_RETRIES")? {
            options.transport.max_retries = max_retries;
        }
        if let Some(seconds) = parse_var::<u64, _>(&get, "REQUEST_TIMEOUT")? {
            options.transport.timeout = Some(Duration::from_secs(seconds));
        }

        Ok(options)
    }
}

fn parse_var<T, F>(get: &F, key: &str) -> Result<Option<T>, ClientError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| ClientError::Config(format!("{key}={raw:?} is invalid: {e}")))
        })
        .transpose()
}
