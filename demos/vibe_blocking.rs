//! Blocking wrappers with text, scalar and object answers.
//!
//! Run with:
//! ```bash
//! export OPENROUTER_API_KEY="your-api-key"
//! cargo run --example vibe_blocking
//! ```

use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;

use keeptalking::logging::{init_logging, LogFormat};
use keeptalking::{BlockingSession, Options, Vibe};

#[derive(Debug, Deserialize, JsonSchema)]
struct Landmark {
    name: String,
    city: String,
    built: i32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("info", LogFormat::Pretty);

    let session = Arc::new(BlockingSession::from_options(&Options::from_env()?)?);

    let translate = Vibe::new()
        .instructions("Translate the text to French. Reply with the translation only.")
        .wrap(session.clone(), |text: &'static str| text.to_string());

    let is_capital = Vibe::new()
        .instructions("Answer strictly based on current geography")
        .returning::<bool>()
        .wrap(session.clone(), |city: &'static str| format!("Is {city} a national capital?"));

    let landmark = Vibe::new()
        .instructions("Describe the most famous landmark of the city")
        .tokens(256)
        .returning::<Landmark>()
        .wrap(session, |city: &'static str| city.to_string());

    println!("{:?}", translate("Where is the train station?")?);
    for city in ["Canberra", "Sydney"] {
        println!("{city}: capital = {:?}", is_capital(city)?);
    }
    println!("{:?}", landmark("Paris")?);

    Ok(())
}
