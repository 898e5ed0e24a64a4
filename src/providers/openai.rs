//! OpenAI-compatible Chat Completions client implementation.
//!
//! One implementation covers every backend exposing `/chat/completions`
//! with `response_format: json_schema` (OpenAI, OpenRouter, vLLM, ...).
//! See: <https://platform.openai.com/docs/api-reference/chat>

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::{BlockingCompletions, ClientError, Completions};
use crate::http::{
    build_blocking_http_client, build_http_client, is_retryable_error, is_retryable_status, retry_delay,
};
use crate::model::{ChatCompletion, ChatRequest};
use crate::options::{Backend, TransportOptions};

/// Async OpenAI-compatible client using HTTP transport.
///
/// Failed HTTP exchanges (429, 5xx, connection errors) are retried up to
/// `max_retries` times with exponential backoff before the error surfaces.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    url: String,
    transport_options: TransportOptions,
}

impl OpenAiClient {
    pub fn new(backend: &Backend, transport_options: TransportOptions) -> Result<Self, ClientError> {
        let http = build_http_client(&backend.api_key, &transport_options)?;
        debug!(base_url = %backend.base_url, "Initialized async chat client");

        Ok(Self {
            http,
            url: completions_url(backend),
            transport_options,
        })
    }
}

#[async_trait]
impl Completions for OpenAiClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ClientError> {
        let mut retry = 0;

        loop {
            let outcome = self.http.post(&self.url).json(request).send().await;

            let (delay, error) = match outcome {
                Ok(response) => {
                    let status = response.status();
                    let headers = response.headers().clone();
                    let body = if status.is_success() {
                        response.text().await?
                    } else {
                        response.text().await.unwrap_or_default()
                    };

                    let error = match read_completion(status, &body) {
                        Ok(completion) => return Ok(completion),
                        Err(error) => error,
                    };
                    if !is_retryable(&error) || retry >= self.transport_options.max_retries {
                        return Err(error);
                    }
                    (retry_delay(&self.transport_options, retry, Some(&headers)), error)
                }
                Err(e) if is_retryable_error(&e) && retry < self.transport_options.max_retries => {
                    (retry_delay(&self.transport_options, retry, None), ClientError::Http(e))
                }
                Err(e) => return Err(e.into()),
            };

            retry += 1;
            warn!(
                model = %request.model,
                retry,
                max_retries = self.transport_options.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Chat completion failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Blocking OpenAI-compatible client.
///
/// Build, use and drop it outside of any async runtime.
#[derive(Debug, Clone)]
pub struct BlockingOpenAiClient {
    http: reqwest::blocking::Client,
    url: String,
    transport_options: TransportOptions,
}

impl BlockingOpenAiClient {
    pub fn new(backend: &Backend, transport_options: TransportOptions) -> Result<Self, ClientError> {
        let http = build_blocking_http_client(&backend.api_key, &transport_options)?;
        debug!(base_url = %backend.base_url, "Initialized blocking chat client");

        Ok(Self {
            http,
            url: completions_url(backend),
            transport_options,
        })
    }
}

impl BlockingCompletions for BlockingOpenAiClient {
    fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ClientError> {
        let mut retry = 0;

        loop {
            let outcome = self.http.post(&self.url).json(request).send();

            let (delay, error) = match outcome {
                Ok(response) => {
                    let status = response.status();
                    let headers: HeaderMap = response.headers().clone();
                    let body = if status.is_success() {
                        response.text()?
                    } else {
                        response.text().unwrap_or_default()
                    };

                    let error = match read_completion(status, &body) {
                        Ok(completion) => return Ok(completion),
                        Err(error) => error,
                    };
                    if !is_retryable(&error) || retry >= self.transport_options.max_retries {
                        return Err(error);
                    }
                    (retry_delay(&self.transport_options, retry, Some(&headers)), error)
                }
                Err(e) if is_retryable_error(&e) && retry < self.transport_options.max_retries => {
                    (retry_delay(&self.transport_options, retry, None), ClientError::Http(e))
                }
                Err(e) => return Err(e.into()),
            };

            retry += 1;
            warn!(
                model = %request.model,
                retry,
                max_retries = self.transport_options.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Chat completion failed, retrying"
            );
            std::thread::sleep(delay);
        }
    }
}

fn completions_url(backend: &Backend) -> String {
    format!("{}/chat/completions", backend.base_url)
}

/// Decode a response body. Gateways such as OpenRouter report upstream
/// failures as an `error` object under a 2xx status; those become
/// provider errors carrying the reported code.
fn read_completion(status: StatusCode, body: &str) -> Result<ChatCompletion, ClientError> {
    if !status.is_success() {
        return Err(handle_error_response(status, body));
    }
    if let Ok(ErrorBody { error }) = serde_json::from_str::<ErrorBody>(body) {
        let status = error
            .code
            .as_ref()
            .and_then(Value::as_u64)
            .and_then(|code| u16::try_from(code).ok())
            .unwrap_or(status.as_u16());
        return Err(ClientError::ProviderError {
            status,
            message: error.message,
        });
    }
    Ok(serde_json::from_str(body)?)
}

fn is_retryable(error: &ClientError) -> bool {
    error
        .status()
        .and_then(|status| StatusCode::from_u16(status).ok())
        .is_some_and(is_retryable_status)
}

/// Handle OpenAI error responses.
fn handle_error_response(status: StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.message())
        .unwrap_or_else(|_| body.to_string());

    ClientError::ProviderError {
        status: status.as_u16(),
        message,
    }
}

// --- Error Types ---

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorResponse {
    Single(ErrorBody),
    Multiple(Vec<ErrorBody>),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<Value>,
}

impl ErrorResponse {
    fn message(self) -> String {
        match self {
            Self::Single(b) => b.error.message,
            Self::Multiple(v) => v
                .into_iter()
                .next()
                .map(|b| b.error.message)
                .unwrap_or_else(|| "Unknown error".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Message, Role};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChatRequest {
        ChatRequest {
            model: "openai/gpt-4o-mini".to_string(),
            messages: vec![
                Message::new(Role::System, "Answer in one word"),
                Message::new(Role::User, "Capital of France?"),
            ],
            max_completion_tokens: 32,
            response_format: None,
        }
    }

    fn completion_body(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "model": "openai/gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
    }

    fn backend(server: &MockServer) -> Backend {
        Backend::new(
            crate::options::BackendKind::Custom,
            format!("{}/v1", server.uri()),
            "sk-test",
        )
    }

    fn fast_retries(max_retries: u32) -> TransportOptions {
        TransportOptions::default()
            .with_max_retries(max_retries)
            .with_retry_base_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_complete_sends_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "openai/gpt-4o-mini",
                "max_completion_tokens": 32,
                "messages": [
                    {"role": "system", "content": "Answer in one word"},
                    {"role": "user", "content": "Capital of France?"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Paris")))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&backend(&server), fast_retries(0)).unwrap();
        let completion = client.complete(&request()).await.unwrap();

        assert_eq!(completion.first_message().unwrap().content.as_deref(), Some("Paris"));
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"error": {"message": "No endpoints found for x/y", "code": 404}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&backend(&server), fast_retries(5)).unwrap();
        let err = client.complete(&request()).await.unwrap_err();

        assert!(err.is_not_found());
        assert!(matches!(err, ClientError::ProviderError { ref message, .. } if message == "No endpoints found for x/y"));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Paris")))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&backend(&server), fast_retries(2)).unwrap();
        let completion = client.complete(&request()).await.unwrap();
        assert_eq!(completion.first_message().unwrap().content.as_deref(), Some("Paris"));
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(3)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&backend(&server), fast_retries(2)).unwrap();
        let err = client.complete(&request()).await.unwrap_err();

        assert!(err.is_server_error());
        assert!(matches!(err, ClientError::ProviderError { ref message, .. } if message == "boom"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_blocking_client() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Paris")))
            .expect(1)
            .mount(&server)
            .await;

        let backend = backend(&server);
        let completion = tokio::task::spawn_blocking(move || {
            let client = BlockingOpenAiClient::new(&backend, fast_retries(0))?;
            client.complete(&request())
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(completion.first_message().unwrap().content.as_deref(), Some("Paris"));
    }

    #[tokio::test]
    async fn test_error_body_under_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"error": {"message": "No endpoints found for dead/model", "code": 404}}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&backend(&server), fast_retries(5)).unwrap();
        let err = client.complete(&request()).await.unwrap_err();

        assert!(err.is_not_found());
        assert!(matches!(err, ClientError::ProviderError { ref message, .. } if message == "No endpoints found for dead/model"));
    }

    #[tokio::test]
    async fn test_retryable_error_body_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": {"message": "Rate limited", "code": 429}})),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Paris")))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&backend(&server), fast_retries(2)).unwrap();
        let completion = client.complete(&request()).await.unwrap();
        assert_eq!(completion.first_message().unwrap().content.as_deref(), Some("Paris"));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&backend(&server), fast_retries(3)).unwrap();
        let err = client.complete(&request()).await.unwrap_err();

        assert!(matches!(err, ClientError::Parse(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_blocking_client_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": {"message": "Internal error", "code": 500}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let backend = backend(&server);
        let err = tokio::task::spawn_blocking(move || {
            let client = BlockingOpenAiClient::new(&backend, fast_retries(0))?;
            client.complete(&request())
        })
        .await
        .unwrap()
        .unwrap_err();

        assert!(err.is_server_error());
    }

    #[test]
    fn test_read_completion() {
        let err = read_completion(StatusCode::OK, r#"{"error": {"message": "upstream", "code": "bad_gateway"}}"#)
            .unwrap_err();
        assert!(matches!(err, ClientError::ProviderError { status: 200, ref message } if message == "upstream"));

        let completion = read_completion(StatusCode::OK, r#"{"id": "gen-1", "choices": []}"#).unwrap();
        assert!(completion.first_message().is_none());

        let err = read_completion(StatusCode::OK, "not json").unwrap_err();
        assert!(matches!(err, ClientError::Parse(_)));
    }

    #[test]
    fn test_handle_error_response() {
        let err = handle_error_response(
            StatusCode::BAD_REQUEST,
            r#"[{"error": {"message": "schema rejected"}}]"#,
        );
        assert!(matches!(err, ClientError::ProviderError { status: 400, ref message } if message == "schema rejected"));

        let err = handle_error_response(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert!(matches!(err, ClientError::ProviderError { status: 502, ref message } if message.contains("bad gateway")));
    }
}
