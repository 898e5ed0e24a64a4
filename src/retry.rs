//! Bounded retry for calls that succeed without a usable answer.
//!
//! Errors are never retried here; they belong to the transport.

use std::future::Future;

use serde_json::Value;
use tracing::warn;

/// `false` for an absent answer: `None`, JSON `null` or an empty string.
pub fn is_usable(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Run `call` until `usable` accepts its output or `attempts` tries are spent.
///
/// The last output is returned even when it is still unusable. An error ends
/// the loop immediately.
pub async fn until_usable<T, E, F, Fut, P>(attempts: usize, usable: P, mut call: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        let output = call().await?;
        if usable(&output) || attempt >= attempts {
            return Ok(output);
        }
        warn!(attempt, attempts, "Empty answer, retrying");
        attempt += 1;
    }
}

/// Blocking twin of [`until_usable`].
pub fn until_usable_blocking<T, E, F, P>(attempts: usize, usable: P, mut call: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    P: Fn(&T) -> bool,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        let output = call()?;
        if usable(&output) || attempt >= attempts {
            return Ok(output);
        }
        warn!(attempt, attempts, "Empty answer, retrying");
        attempt += 1;
    }
}
