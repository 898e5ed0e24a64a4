//! HTTP client utilities shared by the async and blocking transports.
//!
//! This module provides client construction (authentication and extra
//! headers are installed as default headers) and the transport retry policy.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;

use crate::client::ClientError;
use crate::options::{SecretString, TransportOptions};

const MAX_BACKOFF: Duration = Duration::from_secs(8);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Headers sent with every request: bearer auth, JSON content type and any
/// extra headers from the transport options.
pub fn default_headers(
    api_key: &SecretString,
    transport_options: &TransportOptions,
) -> Result<HeaderMap, ClientError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
        .map_err(|_| ClientError::Config("Invalid API key".to_string()))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);

    for (key, value) in &transport_options.extra_headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| ClientError::Config(format!("Invalid header name: {key}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ClientError::Config(format!("Invalid value for header {key}")))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

/// Build a configured async HTTP client from transport options.
///
/// # Example
/// ```ignore
/// let client = build_http_client(&api_key, &transport_options)?;
/// ```
pub fn build_http_client(
    api_key: &SecretString,
    transport_options: &TransportOptions,
) -> Result<reqwest::Client, ClientError> {
    let mut builder = reqwest::Client::builder().default_headers(default_headers(api_key, transport_options)?);

    if let Some(timeout) = transport_options.timeout {
        builder = builder.timeout(timeout);
    }

    Ok(builder.build()?)
}

/// Blocking twin of [`build_http_client`].
///
/// Must not be called (or dropped) from inside an async runtime.
pub fn build_blocking_http_client(
    api_key: &SecretString,
    transport_options: &TransportOptions,
) -> Result<reqwest::blocking::Client, ClientError> {
    let mut builder =
        reqwest::blocking::Client::builder().default_headers(default_headers(api_key, transport_options)?);

    if let Some(timeout) = transport_options.timeout {
        builder = builder.timeout(timeout);
    }

    Ok(builder.build()?)
}

/// Returns `true` if the HTTP status code is transient and should be retried.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 409 | 429) || status.is_server_error()
}

/// Returns `true` for transport failures worth another try.
pub fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}

/// Delay before retry number `retry` (0-based).
///
/// A `Retry-After` header given in seconds wins over the exponential backoff.
pub fn retry_delay(transport_options: &TransportOptions, retry: u32, headers: Option<&HeaderMap>) -> Duration {
    let retry_after = headers
        .and_then(|h| h.get(RETRY_AFTER))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .filter(|d| *d <= MAX_RETRY_AFTER);

    retry_after.unwrap_or_else(|| {
        transport_options
            .retry_base_delay
            .saturating_mul(2u32.saturating_pow(retry.min(16)))
            .min(MAX_BACKOFF)
    })
}
