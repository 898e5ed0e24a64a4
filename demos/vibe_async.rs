//! Async wrappers called concurrently through one session.
//!
//! The session admits at most `MAX_ASYNC` calls at once; the rest wait.
//!
//! Run with:
//! ```bash
//! export OPENROUTER_API_KEY="your-api-key"
//! MAX_ASYNC=3 cargo run --example vibe_async
//! ```

use std::sync::Arc;

use futures::future::join_all;

use keeptalking::logging::{init_logging, LogFormat};
use keeptalking::{Options, Session, Vibe};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("info", LogFormat::Pretty);

    let session = Arc::new(Session::from_options(&Options::from_env()?)?);

    let population = Vibe::new()
        .instructions("Give your best estimate, in millions")
        .returning::<f64>()
        .wrap_async(session.clone(), |country: &'static str| async move {
            format!("What is the population of {country}?")
        });

    let countries = ["France", "Japan", "Brazil", "Kenya", "Canada", "Norway"];
    let answers = join_all(countries.iter().map(|c| population(*c))).await;

    for (country, answer) in countries.iter().zip(answers) {
        match answer? {
            Some(millions) => println!("{country}: {millions:.1}M"),
            None => println!("{country}: no answer"),
        }
    }
    println!("permits left: {}", session.available_permits());

    Ok(())
}
