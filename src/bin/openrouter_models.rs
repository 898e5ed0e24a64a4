//! List OpenRouter models that are general purpose and currently answering.
//!
//! Usage:
//!   openrouter-models                      # screen the top-weekly catalog
//!   openrouter-models --judge-model x/y    # judge with a different model
//!   openrouter-models --max-retries 2      # give up on flaky models sooner

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use tracing::warn;

use keeptalking::catalog::{fetch_catalog, Screener, CATALOG_URL};
use keeptalking::logging::{init_logging, LogFormat};
use keeptalking::options::Options;
use keeptalking::session::Session;

#[derive(Parser)]
#[command(
    name = "openrouter-models",
    version,
    about = "Print slugs of live, general-purpose models from the OpenRouter catalog"
)]
struct Cli {
    /// Catalog endpoint
    #[arg(long, default_value = CATALOG_URL)]
    url: String,

    /// Model that judges catalog descriptions (default: DEFAULT_MODEL)
    #[arg(long)]
    judge_model: Option<String>,

    /// Models screened at once
    #[arg(long, default_value_t = 4)]
    parallelism: usize,

    /// Transport retries per call (overrides MAX_RETRIES)
    #[arg(long)]
    max_retries: Option<u32>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = if cli.json_logs { LogFormat::Json } else { LogFormat::Pretty };
    init_logging(&cli.log_level, format);

    let mut options = Options::from_env().context("Failed to resolve backend configuration")?;
    if let Some(max_retries) = cli.max_retries {
        options.transport.max_retries = max_retries;
    }

    let session = Arc::new(Session::from_options(&options)?);
    let screener = match cli.judge_model {
        Some(model) => Screener::with_judge_model(session, model),
        None => Screener::new(session),
    };

    let models = fetch_catalog(&reqwest::Client::new(), &cli.url)
        .await
        .context("Failed to fetch model catalog")?;

    let mut screened = screener.screen_all(models, cli.parallelism);
    while let Some(result) = screened.next().await {
        match result {
            Ok(Some(model)) => println!("{}", model.slug),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Screening failed, skipping model"),
        }
    }

    Ok(())
}
