//! Outbound HTTP transport for webhook deliveries.
//!
//! A [`DispatchClient`] performs exactly one call. HTTP error statuses are
//! ordinary results; only calls that never produced a response surface as
//! [`TransportError`].

use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backoffice_db::entities::webhook::{HttpMethod, WebhookHeader};
use reqwest::Method;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

/// A fully built outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<WebhookHeader>,
    pub body: String,
}

/// What the remote server answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResponse {
    pub status_code: u16,
    pub body: String,
    pub elapsed: Duration,
}

impl DispatchResponse {
    /// 2xx status.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_code >= 200 && self.status_code < 300
    }
}

/// The call never completed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "error", content = "message", rename_all = "camelCase")]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("tls failure: {0}")]
    Tls(String),

    #[error("transport error: {0}")]
    Other(String),
}

/// Performs a single outbound webhook call.
#[async_trait]
pub trait DispatchClient: Send + Sync {
    /// Send one request, bounded by `timeout`.
    async fn send(
        &self,
        request: &OutboundRequest,
        timeout: Duration,
    ) -> Result<DispatchResponse, TransportError>;
}

/// Type alias for a shared dispatch client.
pub type DispatchClientRef = Arc<dyn DispatchClient>;

/// Response bytes kept when no limit is configured.
pub const DEFAULT_MAX_BODY_BYTES: usize = 4096;

/// reqwest-backed [`DispatchClient`].
///
/// Only the first `max_body_bytes` of a response body are read.
#[derive(Clone)]
pub struct HttpDispatchClient {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpDispatchClient {
    /// Create a client with a connection pool shared by all deliveries.
    #[must_use]
    #[allow(clippy::expect_used)] // Client build only fails with incompatible TLS settings
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("Backoffice-Webhook/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");
        Self::with_client(client)
    }

    /// Wrap an existing reqwest client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Keep at most `limit` bytes of each response body.
    #[must_use]
    pub const fn with_body_limit(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

impl Default for HttpDispatchClient {
    fn default() -> Self {
        Self::new()
    }
}

const fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Post => Method::POST,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn classify(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout;
    }

    let mut chain = String::new();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str(&cause.to_string().to_lowercase());
        chain.push(' ');
        source = cause.source();
    }

    if chain.contains("certificate") || chain.contains("tls") {
        TransportError::Tls(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else if err.is_builder() {
        TransportError::Other(format!("invalid request: {err}"))
    } else {
        TransportError::Other(err.to_string())
    }
}

/// Read at most `limit` bytes of the body. The remainder is never buffered.
///
/// The status line already arrived, so a broken body still counts as an answer.
async fn read_body(mut response: reqwest::Response, limit: usize) -> String {
    let mut buf = Vec::with_capacity(limit.min(8192));
    while buf.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = (limit - buf.len()).min(chunk.len());
                buf.extend_from_slice(&chunk[..take]);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read webhook response body");
                break;
            }
        }
    }

    // Drop a multi-byte character cut in half by the limit.
    if let Err(e) = std::str::from_utf8(&buf)
        && e.error_len().is_none()
    {
        buf.truncate(e.valid_up_to());
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[async_trait]
impl DispatchClient for HttpDispatchClient {
    async fn send(
        &self,
        request: &OutboundRequest,
        timeout: Duration,
    ) -> Result<DispatchResponse, TransportError> {
        let url = url::Url::parse(&request.url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", request.url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransportError::InvalidUrl(format!(
                "unsupported scheme {}",
                url.scheme()
            )));
        }

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), url)
            .timeout(timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        for header in &request.headers {
            builder = builder.header(header.field.as_str(), header.value.as_str());
        }

        let started = Instant::now();
        let response = builder
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| classify(&e))?;

        let status_code = response.status().as_u16();
        let body = read_body(response, self.max_body_bytes).await;

        Ok(DispatchResponse {
            status_code,
            body,
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(method: HttpMethod, url: String) -> OutboundRequest {
        OutboundRequest {
            method,
            url,
            headers: vec![WebhookHeader {
                field: "X-Tenant".to_string(),
                value: "coop-1".to_string(),
            }],
            body: r#"{"loanId":42}"#.to_string(),
        }
    }

    #[tokio::test]
    async fn test_sends_method_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(header("x-tenant", "coop-1"))
            .and(body_string(r#"{"loanId":42}"#))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpDispatchClient::new();
        let response = client
            .send(
                &request(HttpMethod::Put, format!("{}/hook", server.uri())),
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "ok");
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let client = HttpDispatchClient::new();
        let response = client
            .send(
                &request(HttpMethod::Post, server.uri()),
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(response.status_code, 503);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_large_body_is_read_up_to_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ascii"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(100_000)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/multibyte"))
            .respond_with(ResponseTemplate::new(500).set_body_string("é".repeat(100)))
            .mount(&server)
            .await;

        let client = HttpDispatchClient::new().with_body_limit(100);
        let response = client
            .send(
                &request(HttpMethod::Post, format!("{}/ascii", server.uri())),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body.len(), 100);

        let client = HttpDispatchClient::new().with_body_limit(5);
        let response = client
            .send(
                &request(HttpMethod::Post, format!("{}/multibyte", server.uri())),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(response.status_code, 500);
        assert_eq!(response.body, "éé");
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let client = HttpDispatchClient::new();
        let result = client
            .send(
                &request(HttpMethod::Post, server.uri()),
                Duration::from_millis(100),
            )
            .await;

        assert_eq!(result, Err(TransportError::Timeout));
    }

    #[tokio::test]
    async fn test_malformed_url() {
        let client = HttpDispatchClient::new();
        let result = client
            .send(
                &request(HttpMethod::Post, "not a url".to_string()),
                Duration::from_secs(1),
            )
            .await;

        assert!(matches!(result, Err(TransportError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let client = HttpDispatchClient::new();
        // Port 9 (discard) is closed on loopback.
        let result = client
            .send(
                &request(HttpMethod::Post, "http://127.0.0.1:9/hook".to_string()),
                Duration::from_secs(2),
            )
            .await;

        assert!(matches!(result, Err(TransportError::Connect(_))));
    }
}
