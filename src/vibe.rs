//! Turn plain functions into model-backed ones.
//!
//! A [`Vibe`] is the wrapper configuration: model, token budget, the
//! instruction text sent as the system message and the expected result
//! shape. [`Vibe::wrap`] and [`Vibe::wrap_async`] take a function producing
//! the content and return a function producing the model's answer instead.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use keeptalking::options::Options;
//! use keeptalking::session::BlockingSession;
//! use keeptalking::vibe::Vibe;
//!
//! # fn main() -> Result<(), keeptalking::ClientError> {
//! let session = Arc::new(BlockingSession::from_options(&Options::from_env()?)?);
//!
//! let is_capital = Vibe::new()
//!     .instructions("Answer strictly based on current geography")
//!     .returning::<bool>()
//!     .wrap(session, |city: String| format!("Is {city} a national capital?"));
//!
//! println!("{:?}", is_capital("Canberra".to_string())?);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use crate::client::ClientError;
use crate::session::{BlockingSession, Chat, Session};
use crate::shape::Shape;

/// Wrapper configuration producing answers of type `T`.
pub struct Vibe<T = String> {
    model: Option<String>,
    tokens: Option<u32>,
    instructions: Option<String>,
    shape: Shape,
    _output: PhantomData<fn() -> T>,
}

impl Vibe<String> {
    /// Plain-text answers with the session's default model and budget.
    pub fn new() -> Self {
        Self {
            model: None,
            tokens: None,
            instructions: None,
            shape: Shape::Text,
            _output: PhantomData,
        }
    }
}

impl Default for Vibe<String> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Vibe<T> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            tokens: self.tokens,
            instructions: self.instructions.clone(),
            shape: self.shape.clone(),
            _output: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Vibe<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vibe")
            .field("model", &self.model)
            .field("tokens", &self.tokens)
            .field("instructions", &self.instructions)
            .field("shape", &self.shape.label())
            .finish()
    }
}

impl<T> Vibe<T> {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn tokens(mut self, tokens: u32) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Text sent as the first (system) message of every call.
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Answer with `U`, shaped by [`Shape::of`].
    pub fn returning<U: JsonSchema>(self) -> Vibe<U> {
        self.shaped(Shape::of::<U>())
    }

    /// Answer with `U`, using an explicit shape.
    pub fn shaped<U>(self, shape: Shape) -> Vibe<U> {
        Vibe {
            model: self.model,
            tokens: self.tokens,
            instructions: self.instructions,
            shape,
            _output: PhantomData,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    fn chat(&self, content: String) -> Chat {
        let mut chat = Chat::new([self.instructions.clone(), Some(content)]).shape(self.shape.clone());
        chat.model = self.model.clone();
        chat.tokens = self.tokens;
        chat
    }
}

impl<T: DeserializeOwned + Send + 'static> Vibe<T> {
    /// Wrap a blocking function. Its output becomes the user message.
    pub fn wrap<A, R, F>(self, session: Arc<BlockingSession>, f: F) -> impl Fn(A) -> Result<Option<T>, ClientError>
    where
        F: Fn(A) -> R,
        R: Into<String>,
    {
        move |args| session.talk(self.chat(f(args).into()))
    }

    /// Wrap an async function. The wrapped call suspends on the model call
    /// without blocking other tasks.
    pub fn wrap_async<A, R, F, Fut>(
        self,
        session: Arc<Session>,
        f: F,
    ) -> impl Fn(A) -> BoxFuture<'static, Result<Option<T>, ClientError>>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
        R: Into<String>,
    {
        let vibe = Arc::new(self);
        move |args| {
            let session = session.clone();
            let vibe = vibe.clone();
            let content = f(args);
            async move {
                let chat = vibe.chat(content.await.into());
                session.write(chat).await
            }
            .boxed()
        }
    }
}
