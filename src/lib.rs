//! # keeptalking - typed answers from chat-completion models
//!
//! A small library that sends message lists to an OpenAI-compatible
//! chat-completions endpoint (OpenRouter, OpenAI or any `BASE_URL`) and
//! hands back plain text or values deserialized from a JSON Schema
//! constrained answer.
//!
//! ## Features
//! - Backend picked from the environment (`.env` supported)
//! - Async and blocking sessions sharing one request pipeline
//! - Async calls bounded by a per-session concurrency gate
//! - Structured output from any `serde` + `schemars` type; scalars are
//!   wrapped in a single-field object and unwrapped on the way back
//! - Empty answers re-issued, transport failures retried with backoff
//! - [`Vibe`] wrappers turning prompt-building functions into model calls
//!
//! ## Architecture
//!
//! - **`Options`**: backend, transport and per-call defaults
//! - **`Completions` / `BlockingCompletions`**: the transport seam;
//!   [`providers`] holds the HTTP implementations
//! - **`Shape`**: the expected answer form, which decides the request's
//!   `response_format` and how the answer is extracted
//! - **`Session` / `BlockingSession`**: run a [`Chat`] through the pipeline
//!
//! ## Example
//! ```no_run
//! use keeptalking::{Chat, Options, Session, Shape};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::from_options(&Options::from_env()?)?;
//!
//!     let chat = Chat::texts(["Answer with a number.", "How many legs does a spider have?"])
//!         .shape(Shape::of::<u32>());
//!
//!     let legs: Option<u32> = session.write(chat).await?;
//!     println!("{legs:?}");
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod client;
pub mod dispatch;
pub mod http;
pub mod logging;
pub mod model;
pub mod options;
pub mod providers;
pub mod retry;
pub mod session;
pub mod shape;
pub mod vibe;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use client::{BlockingCompletions, ClientError, Completions};
pub use model::{Message, Role, Roles};
pub use options::Options;
pub use session::{BlockingSession, Chat, Session};
pub use shape::Shape;
pub use vibe::Vibe;
