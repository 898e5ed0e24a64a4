//! OpenRouter catalog screening.
//!
//! Pulls the public model catalog, asks a judge model which entries are
//! general-purpose language models and greets each survivor to check that
//! it actually answers.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::ClientError;
use crate::session::Session;
use crate::vibe::Vibe;

pub const CATALOG_URL: &str = "https://openrouter.ai/api/frontend/models/find?order=top-weekly";

const JUDGE_INSTRUCTIONS: &str = "Filter out coding models and other non-general language models";
const GREETING_INSTRUCTIONS: &str = "Greeting test to check if the LLM is alive";
const GREETING: &str = "Hi!";

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogModel {
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    data: CatalogData,
}

#[derive(Debug, Deserialize)]
struct CatalogData {
    #[serde(default)]
    models: Vec<CatalogModel>,
}

/// Fetch the catalog at `url` (see [`CATALOG_URL`]).
pub async fn fetch_catalog(http: &reqwest::Client, url: &str) -> Result<Vec<CatalogModel>, ClientError> {
    let response = http.get(url).send().await?;
    let status = response.status();

    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ClientError::ProviderError {
            status: status.as_u16(),
            message,
        });
    }

    let catalog: CatalogResponse = response.json().await?;
    info!(models = catalog.data.models.len(), "Fetched model catalog");
    Ok(catalog.data.models)
}

type Judge = Box<dyn Fn(String) -> BoxFuture<'static, Result<Option<bool>, ClientError>> + Send + Sync>;

/// Screens catalog entries through a shared session.
pub struct Screener {
    session: Arc<Session>,
    judge: Judge,
}

impl Screener {
    /// Judge with the session's default model.
    pub fn new(session: Arc<Session>) -> Self {
        Self::build(session, Vibe::new())
    }

    /// Judge with `model` instead of the session default.
    pub fn with_judge_model(session: Arc<Session>, model: impl Into<String>) -> Self {
        Self::build(session, Vibe::new().model(model))
    }

    fn build(session: Arc<Session>, vibe: Vibe) -> Self {
        let judge = vibe
            .instructions(JUDGE_INSTRUCTIONS)
            .returning::<bool>()
            .wrap_async(session.clone(), |description: String| async move {
                format!("Is this a general purpose language model?\n\n{description}")
            });

        Self {
            session,
            judge: Box::new(judge),
        }
    }

    /// Ask the judge about `description`. No answer counts as `false`.
    pub async fn is_general_purpose(&self, description: &str) -> Result<bool, ClientError> {
        Ok((self.judge)(description.to_string()).await?.unwrap_or(false))
    }

    /// Greet `slug`. A 404 or 5xx from the provider means the model is down;
    /// any other error is passed on.
    pub async fn is_alive(&self, slug: &str) -> Result<bool, ClientError> {
        let greet = Vibe::new()
            .model(slug)
            .instructions(GREETING_INSTRUCTIONS)
            .wrap_async(self.session.clone(), |()| async { GREETING });

        match greet(()).await {
            Ok(reply) => {
                info!(slug, reply = reply.as_deref().unwrap_or_default(), "Model answered");
                Ok(true)
            }
            Err(e) if e.is_not_found() || e.is_server_error() => {
                debug!(slug, error = %e, "Model unavailable");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// `Some(model)` if it is general purpose and alive. Only general-purpose
    /// models are greeted.
    pub async fn screen(&self, model: CatalogModel) -> Result<Option<CatalogModel>, ClientError> {
        let description = model.description.as_deref().unwrap_or_default();
        if !self.is_general_purpose(description).await? {
            debug!(slug = %model.slug, "Not a general purpose model");
            return Ok(None);
        }
        if !self.is_alive(&model.slug).await? {
            return Ok(None);
        }
        Ok(Some(model))
    }

    /// Screen `models`, up to `parallelism` at a time, yielding results in
    /// catalog order.
    pub fn screen_all(
        &self,
        models: Vec<CatalogModel>,
        parallelism: usize,
    ) -> impl Stream<Item = Result<Option<CatalogModel>, ClientError>> + '_ {
        stream::iter(models)
            .map(move |model| self.screen(model))
            .buffered(parallelism.max(1))
    }
}
