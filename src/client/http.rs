//! HTTP Client
//!
//! Async HTTP client shared by provider clients. Requests are cancellable and
//! non-success responses are classified into provider errors.

use crate::client::rate_limit;
use crate::error::ProviderError;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// HTTP client for provider APIs
#[derive(Debug, Clone)]
pub struct HttpClient {
    /// Inner reqwest client
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| ProviderError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Build JSON request headers with bearer auth
    pub fn json_headers(api_key: &str, extra: &HeaderMap) -> Result<HeaderMap, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| ProviderError::Auth(format!("Invalid API key format: {}", e)))?,
        );

        for (key, value) in extra {
            headers.insert(key.clone(), value.clone());
        }

        Ok(headers)
    }

    /// POST a JSON body and parse the JSON response
    pub async fn post_json<T, R>(
        &self,
        cancel: &CancellationToken,
        url: &str,
        headers: HeaderMap,
        body: &T,
        provider: &str,
    ) -> Result<R, ProviderError>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let response = self.post(cancel, url, headers, body, provider).await?;

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            body = response.text() => body?,
        };

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::Response(format!(
                "Failed to parse response: {}. Body: {}",
                e,
                truncate(&body, 500)
            ))
        })
    }

    /// POST a JSON body, returning the successful response for the caller to read
    pub async fn post(
        &self,
        cancel: &CancellationToken,
        url: &str,
        headers: HeaderMap,
        body: &impl Serialize,
        provider: &str,
    ) -> Result<Response, ProviderError> {
        let request = self.client.post(url).headers(headers).json(body).send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            response = request => response?,
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let headers = response.headers().clone();
        let response_body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            body = response.text() => body.unwrap_or_default(),
        };

        Err(error_for_status(provider, status, &headers, &response_body))
    }
}

/// Classify a non-success response
pub fn error_for_status(
    provider: &str,
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
) -> ProviderError {
    if rate_limit::is_rate_limit_error(status.as_u16(), body) {
        return ProviderError::RateLimited {
            provider: provider.to_string(),
            retry_after: rate_limit::retry_after(headers),
        };
    }

    let detail = format!("{} returned {}: {}", provider, status, truncate(body, 500));

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ProviderError::Auth(detail)
    } else if status.is_server_error() {
        ProviderError::Unavailable(detail)
    } else {
        ProviderError::Request(detail)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
