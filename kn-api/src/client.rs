//! HTTP client for the Kinnect backend REST API.
//!
//! Handles bearer-token authentication, timeout management, exponential
//! backoff retry for transient failures, and request/response lifecycle.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use kn_core::config::ServerConfig;
use kn_core::constants;
use kn_core::error::{KnError, KnResult};

use crate::response::ApiErrorBody;

/// Retry configuration for HTTP requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay between retries (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    /// HTTP status codes that trigger a retry.
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
            retryable_statuses: vec![502, 503, 504],
        }
    }
}

impl RetryConfig {
    /// A configuration that never retries. Used for tests and for calls
    /// where the caller owns the retry policy.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }
}

/// HTTP client for communicating with the Kinnect backend.
///
/// Wraps reqwest::Client with bearer-token authentication, retry logic,
/// and error classification. Cloning is cheap; the session token is
/// shared across clones so a login on one handle is visible to all.
#[derive(Clone)]
pub struct ApiClient {
    inner: Client,
    /// Base URL for the API (e.g. "https://api.kinnect.example").
    base_url: String,
    /// Bearer token for the current session, if any.
    token: Arc<RwLock<Option<String>>>,
    /// Default request timeout.
    timeout: Duration,
    /// Extended timeout for media uploads and large transfers.
    extended_timeout: Duration,
    /// Retry configuration.
    retry_config: RetryConfig,
}

impl ApiClient {
    /// Create a new ApiClient from server configuration.
    pub fn new(config: &ServerConfig) -> KnResult<Self> {
        let base_url =
            kn_core::config::AppConfig::sanitize_server_address(&config.address);
        if base_url.is_empty() {
            return Err(KnError::MissingConfig("server address".into()));
        }

        let timeout = Duration::from_millis(config.api_timeout_ms);
        let extended_timeout = timeout * constants::EXTENDED_TIMEOUT_MULTIPLIER as u32;

        let inner = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(15))
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| KnError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner,
            base_url,
            token: Arc::new(RwLock::new(None)),
            timeout,
            extended_timeout,
            retry_config: RetryConfig::default(),
        })
    }

    /// Set custom retry configuration.
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Get the base API URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Set the bearer token for subsequent requests.
    pub async fn set_token(&self, token: Option<String>) {
        let mut guard = self.token.write().await;
        *guard = token;
        if guard.is_some() {
            debug!("session token set");
        } else {
            debug!("session token cleared");
        }
    }

    /// Whether a session token is currently set.
    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Get the current token, failing fast with `AuthRequired` if absent.
    ///
    /// Called before any network I/O so that an unauthenticated call never
    /// reaches the wire only to be bounced with a 401.
    pub async fn require_token(&self) -> KnResult<String> {
        self.token
            .read()
            .await
            .clone()
            .ok_or_else(|| KnError::AuthRequired("no session token set".into()))
    }

    /// Build the full URL for an API path.
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Internal: build an authenticated request for the given method, URL,
    /// timeout, and optional JSON body.
    fn build_request(
        &self,
        method: Method,
        url: &str,
        token: &str,
        timeout: Duration,
        body: Option<&serde_json::Value>,
    ) -> RequestBuilder {
        let mut builder = self
            .inner
            .request(method, url)
            .bearer_auth(token)
            .timeout(timeout);
        if let Some(b) = body {
            builder = builder.json(b);
        }
        builder
    }

    /// Execute a request with exponential backoff retry.
    async fn request_with_retry(
        &self,
        method: Method,
        path: &str,
        timeout: Duration,
        body: Option<&serde_json::Value>,
    ) -> KnResult<Response> {
        let token = self.require_token().await?;
        let url = self.url(path);
        debug!("{} {}", method, path);

        let mut last_error: Option<KnError> = None;

        for attempt in 0..=self.retry_config.max_retries {
            if attempt > 0 {
                let delay = self.calculate_retry_delay(attempt - 1);
                warn!(
                    "retrying {} {} (attempt {}/{}) after {:.1}s",
                    method,
                    path,
                    attempt + 1,
                    self.retry_config.max_retries + 1,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }

            let builder = self.build_request(method.clone(), &url, &token, timeout, body);

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();

                    if self
                        .retry_config
                        .retryable_statuses
                        .contains(&status.as_u16())
                        && attempt < self.retry_config.max_retries
                    {
                        warn!("retryable status {} from {}", status.as_u16(), path);
                        last_error = Some(KnError::Api {
                            status: status.as_u16(),
                            message: format!("retryable status {status}"),
                        });
                        continue;
                    }

                    return Self::check_status(response).await;
                }
                Err(e) => {
                    let is_retryable = e.is_timeout() || e.is_connect();
                    let err = Self::classify_error(e);

                    if is_retryable && attempt < self.retry_config.max_retries {
                        warn!("retryable error on {}: {}", path, err);
                        last_error = Some(err);
                        continue;
                    }

                    return Err(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| KnError::Network("max retries exceeded".into())))
    }

    /// Calculate retry delay with exponential backoff.
    fn calculate_retry_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.retry_config.base_delay.as_millis() as u64;
        let delay_ms = base_ms.saturating_mul(1u64 << attempt);
        let max_ms = self.retry_config.max_delay.as_millis() as u64;
        Duration::from_millis(delay_ms.min(max_ms))
    }

    // --- Public HTTP methods ---

    /// Execute a GET request with automatic retry.
    pub async fn get(&self, path: &str) -> KnResult<Response> {
        self.request_with_retry(Method::GET, path, self.timeout, None)
            .await
    }

    /// Execute a POST request with a JSON body.
    pub async fn post(&self, path: &str, body: &serde_json::Value) -> KnResult<Response> {
        self.request_with_retry(Method::POST, path, self.timeout, Some(body))
            .await
    }

    /// Execute a PUT request with a JSON body.
    pub async fn put(&self, path: &str, body: &serde_json::Value) -> KnResult<Response> {
        self.request_with_retry(Method::PUT, path, self.timeout, Some(body))
            .await
    }

    /// Execute a DELETE request.
    pub async fn delete(&self, path: &str) -> KnResult<Response> {
        self.request_with_retry(Method::DELETE, path, self.timeout, None)
            .await
    }

    /// Execute a DELETE request with a JSON body.
    pub async fn delete_with_body(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> KnResult<Response> {
        self.request_with_retry(Method::DELETE, path, self.timeout, Some(body))
            .await
    }

    /// Execute a POST request with a multipart form (for media uploads).
    ///
    /// Uses the extended timeout. Multipart forms cannot be cloned, so no
    /// automatic retry on this method.
    pub async fn post_multipart(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> KnResult<Response> {
        let token = self.require_token().await?;
        let url = self.url(path);
        debug!("POST (multipart) {}", path);

        let response = self
            .inner
            .post(&url)
            .bearer_auth(&token)
            .multipart(form)
            .timeout(self.extended_timeout)
            .send()
            .await
            .map_err(Self::classify_error)?;

        Self::check_status(response).await
    }

    // --- Response helpers ---

    /// Deserialize a response body into T.
    pub async fn parse_response<T: DeserializeOwned>(response: Response) -> KnResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| KnError::Serialization(format!("failed to parse response: {e}")))
    }

    /// Convenience: GET + parse into T.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> KnResult<T> {
        let resp = self.get(path).await?;
        Self::parse_response(resp).await
    }

    /// Convenience: POST + parse into T.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> KnResult<T> {
        let resp = self.post(path, body).await?;
        Self::parse_response(resp).await
    }

    /// Convenience: PUT + parse into T.
    pub async fn put_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> KnResult<T> {
        let resp = self.put(path, body).await?;
        Self::parse_response(resp).await
    }

    /// Check the HTTP status code and convert to KnError if needed.
    ///
    /// Non-2xx responses become `Api { status, message }` with the
    /// server-provided message extracted from the error body when present.
    async fn check_status(response: Response) -> KnResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = Self::extract_error_message(response).await;
            return Err(KnError::Api {
                status: status.as_u16(),
                message: if message.is_empty() {
                    format!("authentication rejected ({status})")
                } else {
                    message
                },
            });
        }

        let message = Self::extract_error_message(response).await;
        Err(KnError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Pull the human-readable message out of an error response body.
    async fn extract_error_message(response: Response) -> String {
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(parsed) => parsed.message(),
            Err(_) => body,
        }
    }

    /// Classify a reqwest error into a KnError variant.
    fn classify_error(e: reqwest::Error) -> KnError {
        if e.is_timeout() {
            KnError::Timeout(e.to_string())
        } else if e.is_connect() {
            KnError::Network(format!("connection failed: {e}"))
        } else {
            KnError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            address: "http://localhost:4000".into(),
            api_timeout_ms: 30_000,
        }
    }

    #[test]
    fn test_base_url_sanitized() {
        let client = ApiClient::new(&ServerConfig {
            address: "api.kinnect.example/".into(),
            api_timeout_ms: 30_000,
        })
        .unwrap();
        assert_eq!(client.base_url(), "https://api.kinnect.example");
    }

    #[test]
    fn test_missing_address_rejected() {
        let result = ApiClient::new(&ServerConfig {
            address: String::new(),
            api_timeout_ms: 30_000,
        });
        assert!(matches!(result, Err(KnError::MissingConfig(_))));
    }

    #[test]
    fn test_retry_delay_calculation() {
        let client = ApiClient::new(&test_config()).unwrap();
        assert_eq!(client.calculate_retry_delay(0), Duration::from_secs(1));
        assert_eq!(client.calculate_retry_delay(1), Duration::from_secs(2));
        assert_eq!(client.calculate_retry_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_retry_delay_capped() {
        let client = ApiClient::new(&test_config()).unwrap();
        let d10 = client.calculate_retry_delay(10);
        assert!(d10 <= Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_require_token_fails_without_token() {
        let client = ApiClient::new(&test_config()).unwrap();
        let err = client.require_token().await.unwrap_err();
        assert!(matches!(err, KnError::AuthRequired(_)));
    }

    #[tokio::test]
    async fn test_token_shared_across_clones() {
        let client = ApiClient::new(&test_config()).unwrap();
        let clone = client.clone();
        client.set_token(Some("tok-1".into())).await;
        assert_eq!(clone.require_token().await.unwrap(), "tok-1");

        client.set_token(None).await;
        assert!(!clone.has_token().await);
    }

    #[tokio::test]
    async fn test_request_without_token_never_hits_network() {
        // The unroutable address would hang if a request were attempted;
        // AuthRequired must be returned before any I/O.
        let client = ApiClient::new(&ServerConfig {
            address: "http://192.0.2.1:9".into(),
            api_timeout_ms: 30_000,
        })
        .unwrap();
        let err = client.get("/chats").await.unwrap_err();
        assert!(matches!(err, KnError::AuthRequired(_)));
    }
}
