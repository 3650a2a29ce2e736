//! HTTP client with retry and backoff.
//!
//! Shared infrastructure for the Discogs collection client and the cover image
//! fetcher. Discogs throttles aggressively: image CDN requests come back 403
//! or 429 under load, so both are retried along with gateway errors.

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::{redirect, Client, Response, StatusCode};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use super::ImageFetcher;
use crate::error::{CoverscanError, Result};

/// User agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("coverscan/", env!("CARGO_PKG_VERSION"));

/// Configuration for a [`RetryingHttpClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// Retries after the first attempt; a transient failure on the last
    /// attempt is returned as is.
    pub max_retries: u32,
    /// Initial retry interval.
    pub initial_interval: Duration,
    /// Maximum retry interval.
    pub max_interval: Duration,
    /// User agent header.
    pub user_agent: String,
    /// Headers attached to every request. Mark secrets with `set_sensitive`.
    pub default_headers: HeaderMap,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            max_retries: 2,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(4),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_headers: HeaderMap::new(),
        }
    }
}

/// GET-only HTTP client that retries transient failures.
pub struct RetryingHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl RetryingHttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .default_headers(config.default_headers.clone())
            .redirect(redirect::Policy::limited(5))
            .build()
            .map_err(|e| CoverscanError::Fetch(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// GET `url`, retrying transient failures. Returns the successful response.
    pub async fn get(&self, url: &str, label: &str) -> Result<Response> {
        retry_bounded(self.build_backoff(), self.config.max_retries, |_| {
            self.get_once(url, label)
        })
        .await
    }

    /// GET `url` and return the body bytes.
    pub async fn get_bytes(&self, url: &str, label: &str) -> Result<Vec<u8>> {
        let response = self.get(url, label).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| CoverscanError::Fetch(format!("Failed to read {label} body: {e}")))?;
        Ok(body.to_vec())
    }

    async fn get_once(
        &self,
        url: &str,
        label: &str,
    ) -> std::result::Result<Response, backoff::Error<CoverscanError>> {
        let start = Instant::now();

        let response = self.client.get(url).send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis() as u64;
            if is_transient_error(&e) {
                warn!(error = %e, latency_ms, "Transient error, will retry");
                backoff::Error::transient(CoverscanError::Fetch(format!(
                    "Transient error (will retry): {e}"
                )))
            } else {
                warn!(error = %e, latency_ms, "Permanent error, aborting");
                backoff::Error::permanent(CoverscanError::Fetch(format!(
                    "{label} request failed: {e}"
                )))
            }
        })?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        if status.is_success() {
            debug!(
                latency_ms = start.elapsed().as_millis() as u64,
                "Request completed successfully"
            );
            return Ok(response);
        }

        let latency_ms = start.elapsed().as_millis() as u64;
        let err = CoverscanError::Fetch(describe_status(label, status));
        if is_transient_status(status) {
            warn!(status = %status, latency_ms, "Transient HTTP status, will retry");
            Err(backoff::Error::transient(err))
        } else {
            warn!(status = %status, latency_ms, "Permanent HTTP error");
            Err(backoff::Error::permanent(err))
        }
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.timeout * self.config.max_retries.max(1)),
            ..Default::default()
        }
    }
}

/// Run `operation` with exponential backoff, giving up after `max_retries`
/// retries. `operation` receives the 1-based attempt number.
pub(crate) async fn retry_bounded<T, F, Fut>(
    backoff: ExponentialBackoff,
    max_retries: u32,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, backoff::Error<CoverscanError>>>,
{
    let mut attempt = 0;
    retry_notify(
        backoff,
        || {
            attempt += 1;
            let current = attempt;
            let call = operation(current);
            async move {
                call.await
                    .map_err(|err| stop_after_last_attempt(err, current, max_retries))
            }
        },
        |err: CoverscanError, duration: Duration| {
            warn!(
                error = %err,
                retry_after_ms = duration.as_millis() as u64,
                "Retry scheduled"
            );
        },
    )
    .await
}

fn stop_after_last_attempt(
    err: backoff::Error<CoverscanError>,
    attempt: u32,
    max_retries: u32,
) -> backoff::Error<CoverscanError> {
    match err {
        backoff::Error::Transient { err, .. } if attempt > max_retries => {
            debug!(attempt, "Retry budget exhausted");
            backoff::Error::permanent(err)
        }
        other => other,
    }
}

fn describe_status(label: &str, status: StatusCode) -> String {
    match status {
        StatusCode::NOT_FOUND => format!("{label} not found (404)"),
        StatusCode::FORBIDDEN => format!("Access denied (403) for {label}, upstream may be throttling"),
        _ => format!("{label} returned status: {status}"),
    }
}

/// Check if a reqwest error is transient and should be retried.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Check if an HTTP status code indicates a transient error.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::FORBIDDEN
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}

/// Downloads cover art over HTTP.
///
/// Sends browser-like `Accept` and `Referer` headers; the Discogs image CDN
/// rejects bare clients.
pub struct HttpImageFetcher {
    http: RetryingHttpClient,
}

impl HttpImageFetcher {
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(mut config: HttpClientConfig) -> Result<Self> {
        let headers = &mut config.default_headers;
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("image/avif,image/webp,image/apng,image/*,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(REFERER, HeaderValue::from_static("https://www.discogs.com/"));

        Ok(Self {
            http: RetryingHttpClient::new(config)?,
        })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if url.trim().is_empty() {
            return Err(CoverscanError::Fetch("Empty image URL".into()));
        }
        self.http.get_bytes(url, "Image").await
    }
}
