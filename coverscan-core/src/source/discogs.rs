//! Discogs collection client.
//!
//! Pages through `/users/{username}/collection/folders/0/releases` and flattens
//! the result into [`SourceRecord`]s.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::http_client::{HttpClientConfig, RetryingHttpClient};
use super::CatalogSource;
use crate::catalog::SourceRecord;
use crate::error::{CoverscanError, Result};

/// Default Discogs API base URL.
const DEFAULT_API_URL: &str = "https://api.discogs.com";

/// Releases requested per page (Discogs maximum).
const DEFAULT_PER_PAGE: u32 = 100;

/// Configuration for the Discogs client.
#[derive(Clone)]
pub struct DiscogsConfig {
    /// API base URL
    pub api_url: String,
    /// Collection owner
    pub username: String,
    /// Personal access token
    pub user_token: String,
    /// Releases per page
    pub per_page: u32,
    /// Request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for DiscogsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscogsConfig")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("user_token", &"[REDACTED]")
            .field("per_page", &self.per_page)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl DiscogsConfig {
    /// Create configuration from environment variables.
    ///
    /// Required: `DISCOGS_USER_TOKEN`, `DISCOGS_USERNAME`
    /// Optional: `DISCOGS_API_URL`
    pub fn from_env() -> Result<Self> {
        let user_token = required_env("DISCOGS_USER_TOKEN")?;
        let username = required_env("DISCOGS_USERNAME")?;
        let api_url =
            std::env::var("DISCOGS_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        Ok(Self {
            api_url,
            username,
            user_token,
            per_page: DEFAULT_PER_PAGE,
            timeout: Duration::from_secs(30),
        })
    }

    fn collection_url(&self, page: u32) -> String {
        format!(
            "{}/users/{}/collection/folders/0/releases?page={}&per_page={}&sort=artist&sort_order=asc",
            self.api_url.trim_end_matches('/'),
            self.username,
            page,
            self.per_page
        )
    }
}

fn required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(CoverscanError::Config(format!(
            "{name} environment variable not set"
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct CollectionPage {
    pagination: Pagination,
    #[serde(default)]
    releases: Vec<CollectionRelease>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    page: u32,
    pages: u32,
}

#[derive(Debug, Deserialize)]
struct CollectionRelease {
    id: u64,
    basic_information: Option<BasicInformation>,
}

#[derive(Debug, Deserialize)]
struct BasicInformation {
    id: u64,
    #[serde(default)]
    master_id: Option<u64>,
    title: String,
    #[serde(default)]
    year: Option<u32>,
    #[serde(default)]
    formats: Vec<Named>,
    #[serde(default)]
    labels: Vec<Named>,
    #[serde(default)]
    artists: Vec<Named>,
    #[serde(default)]
    thumb: Option<String>,
    #[serde(default)]
    cover_image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

impl BasicInformation {
    fn into_record(self) -> SourceRecord {
        SourceRecord {
            id: self.id,
            master_id: self.master_id.filter(|id| *id != 0),
            artist: self
                .artists
                .into_iter()
                .next()
                .map(|a| a.name)
                .unwrap_or_else(|| "Unknown".to_string()),
            title: self.title,
            year: self.year.filter(|y| *y != 0),
            labels: self.labels.into_iter().map(|l| l.name).collect(),
            formats: self.formats.into_iter().map(|f| f.name).collect(),
            cover_url: self.cover_image.filter(|url| !url.is_empty()),
            thumb_url: self.thumb.filter(|url| !url.is_empty()),
        }
    }
}

/// Discogs collection client.
pub struct DiscogsCollection {
    http: RetryingHttpClient,
    config: DiscogsConfig,
}

impl DiscogsCollection {
    /// Create a client from `DISCOGS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(DiscogsConfig::from_env()?)
    }

    #[instrument(level = "debug", skip_all, fields(api_url = %config.api_url, username = %config.username))]
    pub fn new(config: DiscogsConfig) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Discogs token={}", config.user_token))
            .map_err(|e| CoverscanError::Config(format!("Invalid Discogs token: {e}")))?;
        auth.set_sensitive(true);

        let mut default_headers = HeaderMap::new();
        default_headers.insert(AUTHORIZATION, auth);

        let http = RetryingHttpClient::new(HttpClientConfig {
            timeout: config.timeout,
            default_headers,
            ..Default::default()
        })?;

        info!("Discogs client created");
        Ok(Self { http, config })
    }

    async fn fetch_page(&self, page: u32) -> Result<CollectionPage> {
        let url = self.config.collection_url(page);
        let response = self.http.get(&url, "Discogs collection").await?;
        response.json().await.map_err(|e| {
            CoverscanError::Serialization(format!("Failed to parse Discogs collection page: {e}"))
        })
    }
}

#[async_trait]
impl CatalogSource for DiscogsCollection {
    #[instrument(level = "info", skip(self), fields(username = %self.config.username))]
    async fn fetch_collection(&self) -> Result<Vec<SourceRecord>> {
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let body = self.fetch_page(page).await?;
            debug!(
                page = body.pagination.page,
                pages = body.pagination.pages,
                releases = body.releases.len(),
                "Fetched collection page"
            );
            records.extend(flatten_releases(body.releases));

            if page >= body.pagination.pages {
                break;
            }
            page += 1;
        }

        info!(records = records.len(), "Fetched Discogs collection");
        Ok(records)
    }

    fn source_name(&self) -> &str {
        "discogs"
    }
}

fn flatten_releases(releases: Vec<CollectionRelease>) -> Vec<SourceRecord> {
    releases
        .into_iter()
        .filter_map(|release| match release.basic_information {
            Some(info) => Some(info.into_record()),
            None => {
                warn!(release_id = release.id, "Skipping release without basic_information");
                None
            }
        })
        .collect()
}
