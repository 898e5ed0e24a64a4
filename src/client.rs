//! Core client traits and error types.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{ChatCompletion, ChatRequest};

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Provider error ({status}): {message}")]
    ProviderError { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Concurrency gate closed")]
    GateClosed,
}

impl ClientError {
    /// HTTP status reported by the provider, if this is a provider error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::ProviderError { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The provider does not know the requested model or endpoint.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// The provider failed internally (any 5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(500..=599))
    }
}

/// Asynchronous chat-completion backend.
///
/// Implement this trait to plug a different transport (or a fake) under
/// [`Session`](crate::session::Session). Implementations own transport-level
/// concerns such as authentication and retrying failed HTTP exchanges; the
/// caller only decides what to send and how to read the answer.
///
/// # Example
/// ```rust,ignore
/// struct Canned;
///
/// #[async_trait]
/// impl Completions for Canned {
///     async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ClientError> {
///         Ok(ChatCompletion::text("hello"))
///     }
/// }
/// ```
#[async_trait]
pub trait Completions: Send + Sync {
    /// Send one chat-completion request and return the raw completion.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ClientError>;
}

/// Blocking counterpart of [`Completions`], used by
/// [`BlockingSession`](crate::session::BlockingSession).
pub trait BlockingCompletions: Send + Sync {
    /// Send one chat-completion request, blocking the current thread.
    fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ClientError>;
}
