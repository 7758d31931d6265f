//! HTTP client for the shop with browser-like headers and retry handling
//!
//! - Session cookies are kept (`cookie_store`) and initialized from the home page
//! - Redirects are never followed; a 301 on a detail page means the item is gone
//! - Connection failures and 5xx/429 responses are retried with exponential
//!   backoff plus jitter, so transient errors never reach the sync core

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::domain::errors::SyncError;
use crate::infrastructure::config::RemoteConfig;

/// Headers a desktop browser sends on top-level navigation
const BROWSER_HEADERS: &[(&str, &str)] = &[
    ("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8"),
    ("accept-language", "en-GB,en;q=0.7"),
    ("cache-control", "max-age=0"),
    ("priority", "u=0, i"),
    ("sec-ch-ua", "\"Not)A;Brand\";v=\"8\", \"Chromium\";v=\"138\", \"Brave\";v=\"138\""),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
    ("sec-gpc", "1"),
    ("upgrade-insecure-requests", "1"),
];

/// Upper bound for a single backoff pause
const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    /// Attempts per request, including the first one
    pub max_retries: u32,
    /// Base delay of the exponential backoff
    pub backoff_base: Duration,
}

impl HttpClientConfig {
    pub fn from_remote_config(remote: &RemoteConfig) -> Self {
        Self {
            user_agent: remote.user_agent.clone(),
            timeout_seconds: remote.request_timeout_seconds,
            max_retries: remote.max_retries,
            ..Self::default()
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        let remote = RemoteConfig::default();
        Self {
            user_agent: remote.user_agent,
            timeout_seconds: remote.request_timeout_seconds,
            max_retries: remote.max_retries,
            backoff_base: Duration::from_secs(1),
        }
    }
}

pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, SyncError> {
        let mut headers = HeaderMap::new();
        for &(name, value) in BROWSER_HEADERS {
            headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| SyncError::Config(format!("Invalid user agent: {e}")))?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// GET the home page once so later requests carry the session cookies
    pub async fn warm_up(&self, home_url: &str) -> Result<(), SyncError> {
        let response = self.get(home_url).await?;
        info!("🍪 Session initialized from {} ({})", home_url, response.status());
        Ok(())
    }

    /// GET with retries. Non-retryable statuses (including redirects and
    /// 404) are returned to the caller unchanged.
    pub async fn get(&self, url: &str) -> Result<Response, SyncError> {
        self.get_with_query(url, &[]).await
    }

    pub async fn get_with_query(&self, url: &str, query: &[(&str, String)]) -> Result<Response, SyncError> {
        let attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            debug!("🌐 HTTP GET (attempt {}/{}): {}", attempt, attempts, url);
            match self.client.get(url).query(query).send().await {
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable(status) {
                        return Ok(response);
                    }

                    error!("❌ HTTP error {} on attempt {}: {}", status, attempt, url);
                    last_error = Some(SyncError::http(url, format!("status {status}")));
                    if attempt < attempts {
                        let delay = retry_after(&response).unwrap_or_else(|| self.backoff(attempt));
                        sleep(delay).await;
                    }
                }
                Err(e) => {
                    warn!("⚠️ Network error on attempt {}: {}", attempt, e);
                    last_error = Some(SyncError::http(url, e));
                    if attempt < attempts {
                        sleep(self.backoff(attempt)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SyncError::http(url, "no attempt made")))
    }

    /// GET and decode a JSON body; any non-success status is an error
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, SyncError> {
        let response = self.get_with_query(url, query).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::http(url, format!("status {status}")));
        }

        let body = response.bytes().await.map_err(|e| SyncError::http(url, e))?;
        serde_json::from_slice(&body).map_err(|source| SyncError::Decode {
            what: url.to_string(),
            source,
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        backoff_delay(self.config.backoff_base, attempt)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs).min(MAX_BACKOFF))
}

/// `base * 2^(attempt-1)` plus up to 50% jitter, capped at [`MAX_BACKOFF`]
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponential = base.saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)));
    let jitter = exponential.mul_f64(fastrand::f64() * 0.5);
    exponential.saturating_add(jitter).min(MAX_BACKOFF)
}
