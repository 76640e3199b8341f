//! JSON HTTP client for the backend proxy
//!
//! Wraps a pooled `reqwest::Client` with:
//! - transient-failure retry (network errors and 5xx) with exponential backoff
//! - error body normalization (`message`, then `error`, then a generic text)
//! - per-request metrics

use crate::domain::error::{BookingError, Result};
use crate::infra::config::Config;
use crate::infra::metrics::ApiMetrics;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

const GENERIC_REQUEST_ERROR: &str = "Произошла ошибка при выполнении запроса";

/// Log a request that failed for good (cold path)
#[cold]
fn log_request_failed(method: &str, url: &str, attempts: u32, e: &BookingError) {
    error!(method = %method, url = %url, attempts = %attempts, error = %e, "api_request_failed");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, base_delay: Duration::from_millis(1000) }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self { max_retries: 0, base_delay: Duration::ZERO }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.api_max_retries(),
            base_delay: Duration::from_millis(config.api_retry_delay_ms()),
        }
    }

    /// Delay before retry number `attempt` (1-based): base * 2^(attempt-1)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// Extract a human readable message from an error response body
pub fn error_message(body: &[u8]) -> String {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return GENERIC_REQUEST_ERROR.to_string();
    };
    ["message", "error"]
        .iter()
        .filter_map(|key| value.get(key).and_then(|v| v.as_str()))
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| GENERIC_REQUEST_ERROR.to_string())
}

pub struct HttpClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
    metrics: Arc<ApiMetrics>,
    bearer_token: Option<String>,
}

impl HttpClient {
    pub fn new(config: &Config, metrics: Arc<ApiMetrics>) -> Result<Self> {
        // Create HTTP client once for reuse (connection pooling)
        let client = Client::builder()
            .timeout(Duration::from_millis(config.api_timeout_ms()))
            .build()
            .map_err(BookingError::Network)?;

        Ok(Self {
            client,
            base_url: config.api_url(""),
            retry: RetryPolicy::from_config(config),
            metrics,
            bearer_token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request
    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token;
        self
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn metrics(&self) -> &Arc<ApiMetrics> {
        &self.metrics
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET with the configured retry policy
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.url(path);
        self.execute("GET", &url, self.retry, || self.authorize(self.client.get(&url).query(query))).await
    }

    /// POST a JSON body. Non-idempotent calls pass `RetryPolicy::none()`.
    pub async fn post<B, T>(&self, path: &str, body: &B, retry: RetryPolicy) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        self.execute("POST", &url, retry, || self.authorize(self.client.post(&url).json(body))).await
    }

    async fn execute<T, F>(&self, method: &str, url: &str, retry: RetryPolicy, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let start = Instant::now();
        let mut attempt = 0u32;

        let result = loop {
            match Self::send_once(build()).await {
                Err(e) if e.is_transient() && attempt < retry.max_retries => {
                    attempt += 1;
                    let delay = retry.delay_for(attempt);
                    warn!(
                        method = %method,
                        url = %url,
                        attempt = %attempt,
                        max_retries = %retry.max_retries,
                        delay_ms = %delay.as_millis(),
                        error = %e,
                        "api_request_retry"
                    );
                    self.metrics.record_retry();
                    tokio::time::sleep(delay).await;
                }
                other => break other,
            }
        };

        let latency_ms = start.elapsed().as_millis() as u64;
        self.metrics.record_request(latency_ms, result.is_ok());
        match &result {
            Ok(_) => debug!(method = %method, url = %url, latency_ms = %latency_ms, "api_request_ok"),
            Err(e) => log_request_failed(method, url, attempt + 1, e),
        }
        result
    }

    async fn send_once<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(BookingError::Network)?;
        let status = response.status();
        let body = response.bytes().await.map_err(BookingError::Network)?;

        if status.is_success() {
            // Empty 2xx bodies decode as JSON null
            let body: &[u8] = if body.is_empty() { b"null" } else { &body };
            return serde_json::from_slice(body).map_err(BookingError::Decode);
        }

        let message = error_message(&body);
        Err(classify_status(status, message))
    }
}

fn classify_status(status: StatusCode, message: String) -> BookingError {
    if status.is_server_error() {
        BookingError::Server { status: status.as_u16(), message }
    } else {
        BookingError::Api { status: status.as_u16(), message }
    }
}
