//! HTTP client for the IoT Apps cloud REST API.
//!
//! `ApiClient` owns the reqwest connection pool and knows how to authenticate
//! requests with the `API_KEY` header, retry rate limited calls and turn both
//! HTTP failures and non-zero `resultCode` envelopes into `ApiError`s. The
//! endpoint wrappers live in the sibling modules.

use std::time::Duration;

use reqwest::{header, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::models::ApiResponseBase;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default cloud server
pub const DEFAULT_SERVER_URL: &str = "https://app.peoplepowerco.com";

/// Path prefix of the JSON API on every server
const API_PATH: &str = "/cloud/json";

/// Header carrying the API key
pub(crate) const API_KEY_HEADER: &str = "API_KEY";

/// Header carrying the password on login and password change calls
pub(crate) const PASSWORD_HEADER: &str = "PASSWORD";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the IoT Apps cloud.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    server_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("server_url", &self.server_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ApiClient {
    /// Create a new API client for the given server, e.g. `https://app.peoplepowerco.com`
    pub fn new(server_url: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            server_url: server_url.trim_end_matches('/').to_string(),
            api_key: None,
        })
    }

    /// Create a new ApiClient with the given API key, sharing the connection pool.
    pub fn with_api_key(&self, api_key: impl Into<String>) -> Self {
        Self {
            client: self.client.clone(),
            server_url: self.server_url.clone(),
            api_key: Some(api_key.into()),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Full URL of an API path such as `/login`
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.server_url, API_PATH, path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(ref key) = self.api_key {
            let value = header::HeaderValue::from_str(key)
                .map_err(|_| ApiError::InvalidResponse("API key is not a valid header value".to_string()))?;
            headers.insert(API_KEY_HEADER, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            // Rate limited - signal to retry
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Parse a JSON body, failing on a non-zero `resultCode`
    pub(crate) fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
        let envelope: ApiResponseBase = serde_json::from_str(body).map_err(|e| {
            ApiError::InvalidResponse(format!("{}: {}", e, ApiError::truncate_body(body)))
        })?;
        if !envelope.is_success() {
            return Err(ApiError::ResultCode {
                code: envelope.result_code,
                message: envelope.message(),
            });
        }
        serde_json::from_str(body).map_err(|e| {
            ApiError::InvalidResponse(format!("{}: {}", e, ApiError::truncate_body(body)))
        })
    }

    /// Send a request built by `build`, retrying with exponential backoff
    /// while the server answers 429.
    ///
    /// `build` is called once per attempt because a `RequestBuilder` can only
    /// be sent once.
    pub(crate) async fn execute<T, F>(&self, url: &str, build: F) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            debug!(url = url, "Sending request");
            let response = build(&self.client)
                .headers(self.auth_headers()?)
                .send()
                .await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let body = response.text().await?;
                    return Self::parse_body(&body);
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LoginResponse;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let client = ApiClient::new("https://example.test/").expect("Failed to build client");
        assert_eq!(client.endpoint("/login"), "https://example.test/cloud/json/login");
    }

    #[test]
    fn test_with_api_key_keeps_server() {
        let client = ApiClient::new(DEFAULT_SERVER_URL).expect("Failed to build client");
        assert_eq!(client.api_key(), None);

        let keyed = client.with_api_key("k-1");
        assert_eq!(keyed.api_key(), Some("k-1"));
        assert_eq!(keyed.server_url(), DEFAULT_SERVER_URL);
        assert!(!format!("{:?}", keyed).contains("k-1"));
    }

    #[test]
    fn test_parse_body_success() {
        let resp: LoginResponse = ApiClient::parse_body(r#"{"resultCode":0,"key":"k"}"#)
            .expect("Failed to parse body");
        assert_eq!(resp.key.as_deref(), Some("k"));
    }

    #[test]
    fn test_parse_body_result_code() {
        let err = ApiClient::parse_body::<LoginResponse>(
            r#"{"resultCode":17,"resultCodeMessage":"Passcode required"}"#,
        )
        .unwrap_err();
        match err {
            ApiError::ResultCode { code, message } => {
                assert_eq!(code, 17);
                assert_eq!(message, "Passcode required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_body_invalid_json() {
        let err = ApiClient::parse_body::<LoginResponse>("<html>").unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }
}
