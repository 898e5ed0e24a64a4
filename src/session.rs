//! Sessions: the context every call runs in.
//!
//! A [`Session`] owns the async client, the concurrency gate and the call
//! defaults; [`BlockingSession`] is its blocking counterpart. Both resolve
//! a [`Chat`] into a typed answer, re-issuing calls whose answer comes back
//! empty.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::client::{BlockingCompletions, ClientError, Completions};
use crate::dispatch::{dispatch, dispatch_blocking};
use crate::model::Roles;
use crate::options::{Defaults, Options};
use crate::providers::{BlockingOpenAiClient, OpenAiClient};
use crate::retry::{is_usable, until_usable, until_usable_blocking};
use crate::shape::Shape;

/// One model call: the message contents plus anything that overrides the
/// session defaults.
///
/// # Example
/// ```rust
/// use keeptalking::session::Chat;
/// use keeptalking::shape::Shape;
///
/// let chat = Chat::texts(["You are terse.", "Capital of France?"])
///     .model("openai/gpt-4o-mini")
///     .tokens(16)
///     .shape(Shape::text());
/// assert_eq!(chat.messages.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Chat {
    pub messages: Vec<Option<String>>,
    pub roles: Roles,
    pub model: Option<String>,
    pub shape: Shape,
    pub tokens: Option<u32>,
}

impl Chat {
    /// Contents that may be missing; missing ones are not sent.
    pub fn new<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            messages: messages.into_iter().map(|m| m.map(Into::into)).collect(),
            ..Default::default()
        }
    }

    pub fn texts<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(messages.into_iter().map(Some))
    }

    pub fn roles(mut self, roles: Roles) -> Self {
        self.roles = roles;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    pub fn tokens(mut self, tokens: u32) -> Self {
        self.tokens = Some(tokens);
        self
    }
}

/// Async call context.
///
/// At most `max_async` calls are in flight at once across every task sharing
/// the session; waiting callers are admitted in FIFO order.
pub struct Session {
    client: Arc<dyn Completions>,
    gate: Semaphore,
    max_async: usize,
    defaults: Defaults,
}

impl Session {
    pub fn new(client: Arc<dyn Completions>, defaults: Defaults, max_async: usize) -> Self {
        let max_async = max_async.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            client,
            gate: Semaphore::new(max_async),
            max_async,
            defaults,
        }
    }

    /// Session over the configured OpenAI-compatible backend.
    pub fn from_options(options: &Options) -> Result<Self, ClientError> {
        let client = OpenAiClient::new(&options.backend, options.transport.clone())?;
        Ok(Self::new(Arc::new(client), options.defaults.clone(), options.max_async))
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    pub fn max_async(&self) -> usize {
        self.max_async
    }

    /// Gate slots currently free.
    pub fn available_permits(&self) -> usize {
        self.gate.available_permits()
    }

    /// Run `chat` and decode the answer into `T`.
    ///
    /// `Ok(None)` means the model kept answering with nothing usable.
    pub async fn write<T: DeserializeOwned>(&self, chat: Chat) -> Result<Option<T>, ClientError> {
        decode(self.write_value(&chat).await?)
    }

    /// Run `chat` and return the extracted JSON value.
    pub async fn write_value(&self, chat: &Chat) -> Result<Option<Value>, ClientError> {
        let client = self.client.as_ref();
        let gate = &self.gate;
        let model = chat.model.as_deref().unwrap_or(&self.defaults.model);
        let tokens = chat.tokens.unwrap_or(self.defaults.tokens);

        until_usable(self.defaults.attempts, is_usable, move || async move {
            let (pending, extractor) =
                dispatch(client, &chat.messages, chat.roles.iter(), model, &chat.shape, tokens);
            let completion = {
                let _permit = gate.acquire().await.map_err(|_| ClientError::GateClosed)?;
                pending.await?
            };
            extractor.extract(completion)
        })
        .await
    }
}

/// Blocking call context. Calls run one at a time on the calling thread.
pub struct BlockingSession {
    client: Arc<dyn BlockingCompletions>,
    defaults: Defaults,
}

impl BlockingSession {
    pub fn new(client: Arc<dyn BlockingCompletions>, defaults: Defaults) -> Self {
        Self { client, defaults }
    }

    /// Session over the configured OpenAI-compatible backend.
    ///
    /// Build it outside of any async runtime.
    pub fn from_options(options: &Options) -> Result<Self, ClientError> {
        let client = BlockingOpenAiClient::new(&options.backend, options.transport.clone())?;
        Ok(Self::new(Arc::new(client), options.defaults.clone()))
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// Run `chat` and decode the answer into `T`.
    pub fn talk<T: DeserializeOwned>(&self, chat: Chat) -> Result<Option<T>, ClientError> {
        decode(self.talk_value(&chat)?)
    }

    /// Run `chat` and return the extracted JSON value.
    pub fn talk_value(&self, chat: &Chat) -> Result<Option<Value>, ClientError> {
        let model = chat.model.as_deref().unwrap_or(&self.defaults.model);
        let tokens = chat.tokens.unwrap_or(self.defaults.tokens);

        until_usable_blocking(self.defaults.attempts, is_usable, || {
            let (outcome, extractor) = dispatch_blocking(
                self.client.as_ref(),
                &chat.messages,
                chat.roles.iter(),
                model,
                &chat.shape,
                tokens,
            );
            extractor.extract(outcome?)
        })
    }
}

fn decode<T: DeserializeOwned>(value: Option<Value>) -> Result<Option<T>, ClientError> {
    value
        .filter(|v| !v.is_null())
        .map(serde_json::from_value)
        .transpose()
        .map_err(ClientError::Parse)
}
