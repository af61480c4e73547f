//! HTTP transport
//!
//! One call to [`Transport::send`] is exactly one network attempt; retries live
//! in the backoff executor above it.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::error::PipelineError;
use crate::request::RequestPayload;
use crate::retry_api::{api_error_in_body, classify_http_error};

/// Sends one request payload and returns the decoded JSON body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, payload: &RequestPayload) -> Result<Value, PipelineError>;

    /// Fail before any network call when no credential is available.
    fn ensure_credential(&self) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// reqwest-backed transport for the Gemini/Imagen REST API.
#[derive(Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    request_timeout: Duration,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("has_api_key", &!self.api_key.expose_secret().is_empty())
            .finish()
    }
}

impl HttpTransport {
    pub fn new(config: &ProviderConfig) -> Result<Self, PipelineError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| PipelineError::HttpError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_http_client(config, http_client))
    }

    /// Use a caller-provided client (proxies, custom TLS, shared pools).
    pub fn with_http_client(config: &ProviderConfig, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_headers(&self) -> Result<HeaderMap, PipelineError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut key = HeaderValue::from_str(self.api_key.expose_secret().trim())
            .map_err(|_| PipelineError::MissingCredential("API key contains invalid characters".into()))?;
        key.set_sensitive(true);
        headers.insert("x-goog-api-key", key);
        Ok(headers)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: &RequestPayload) -> Result<Value, PipelineError> {
        let url = payload.url(&self.base_url);
        tracing::debug!(url = %url, model = %payload.model, "sending request");

        let response = self
            .http_client
            .post(&url)
            .headers(self.build_headers()?)
            .timeout(self.request_timeout)
            .json(&payload.body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(classify_http_error(
                status.as_u16(),
                &text,
                status.canonical_reason(),
            ));
        }

        let body: Value = serde_json::from_str(&text).map_err(|e| {
            PipelineError::ParseError(format!("response body is not valid JSON: {e}"))
        })?;
        if let Some(error) = api_error_in_body(status.as_u16(), &body) {
            return Err(error);
        }
        Ok(body)
    }

    fn ensure_credential(&self) -> Result<(), PipelineError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(PipelineError::MissingCredential(
                "no API key was supplied (set GEMINI_API_KEY)".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::request::Endpoint;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload() -> RequestPayload {
        RequestPayload {
            model: "gemini-test".into(),
            endpoint: Endpoint::GenerateContent,
            body: json!({ "contents": [{ "parts": [{ "text": "hi" }] }] }),
        }
    }

    fn transport(server: &MockServer) -> HttpTransport {
        HttpTransport::new(&ProviderConfig::new("test-api-key").with_base_url(server.uri())).unwrap()
    }

    #[tokio::test]
    async fn posts_json_with_api_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "test-api-key"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({ "contents": [{ "parts": [{ "text": "hi" }] }] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let body = transport(&server).send(&payload()).await.unwrap();
        assert_eq!(body, json!({ "candidates": [] }));
    }

    #[tokio::test]
    async fn maps_error_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "code": 400, "message": "Image too large", "status": "INVALID_ARGUMENT" }
            })))
            .mount(&server)
            .await;

        let err = transport(&server).send(&payload()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permanent);
        assert_eq!(err.message(), "Image too large");
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = transport(&server).send(&payload()).await.unwrap_err();
        assert_eq!(err.status_code(), Some(503));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn error_envelope_with_ok_status_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "error": { "message": "model not enabled" } })),
            )
            .mount(&server)
            .await;

        let err = transport(&server).send(&payload()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permanent);
        assert_eq!(err.message(), "model not enabled");
    }

    #[tokio::test]
    async fn non_json_success_body_is_unparseable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
            .mount(&server)
            .await;

        let err = transport(&server).send(&payload()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unparseable);
    }

    #[tokio::test]
    async fn slow_attempt_times_out_as_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "candidates": [] }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let config = ProviderConfig::new("k")
            .with_base_url(server.uri())
            .with_request_timeout(Duration::from_millis(50));
        let err = HttpTransport::new(&config)
            .unwrap()
            .send(&payload())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::TimeoutError(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn connection_failure_is_transient() {
        // Nothing listens on port 9 on loopback in test environments
        let config = ProviderConfig::new("k").with_base_url("http://127.0.0.1:9");
        let err = HttpTransport::new(&config)
            .unwrap()
            .send(&payload())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[test]
    fn blank_key_fails_credential_check() {
        let transport = HttpTransport::new(&ProviderConfig::new("  ")).unwrap();
        assert!(matches!(
            transport.ensure_credential(),
            Err(PipelineError::MissingCredential(_))
        ));
        assert!(
            HttpTransport::new(&ProviderConfig::new("k"))
                .unwrap()
                .ensure_credential()
                .is_ok()
        );
    }
}
