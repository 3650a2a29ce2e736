//! External collaborators consumed by the recognition core.
//!
//! The core never talks to Discogs, the camera or the AI/OCR service
//! directly. Each of them sits behind a narrow async trait:
//!
//! - [`CatalogSource`]: bulk fetch of the user's collection
//! - [`ImageFetcher`]: download of cover art by URL
//! - [`FrameSource`]: most recent camera still, already square-cropped
//! - [`SecondaryRecognizer`]: slow fallback identification
//!
//! ## Implementations
//!
//! - `DiscogsCollection` / `HttpImageFetcher`: real HTTP clients with retry
//!   and backoff (feature `network`)
//! - [`memory`]: deterministic in-memory collaborators for tests and offline use

#[cfg(feature = "network")]
mod discogs;
#[cfg(feature = "network")]
mod http_client;
pub mod memory;

#[cfg(feature = "network")]
pub use discogs::{DiscogsCollection, DiscogsConfig};
#[cfg(feature = "network")]
pub use http_client::{HttpClientConfig, HttpImageFetcher, RetryingHttpClient};
pub use memory::{MemoryImageFetcher, ScriptedFrameSource, ScriptedRecognizer, StaticCatalogSource};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::SourceRecord;
use crate::error::Result;

/// Bulk source of catalog records.
///
/// Pagination is the implementation's concern; callers receive a flat list.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_collection(&self) -> Result<Vec<SourceRecord>>;

    /// Human-readable name used in logs.
    fn source_name(&self) -> &str;
}

/// Downloads raw image bytes for a URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fails with `CoverscanError::Fetch` on auth, not-found or network errors.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// On-demand camera stills.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Returns the latest square-cropped still.
    ///
    /// `Ok(None)` means no frame is ready yet (camera warming up). `Err` means
    /// the source itself is unavailable.
    async fn capture(&self) -> Result<Option<Vec<u8>>>;
}

/// Slower, more capable identification used after the escalation deadline.
///
/// Failure to identify is an ordinary outcome, not an error, so implementations
/// fold their own errors into [`SecondaryOutcome::NotIdentified`].
#[async_trait]
pub trait SecondaryRecognizer: Send + Sync {
    async fn identify(&self, image: &[u8]) -> SecondaryOutcome;
}

/// Result of a secondary recognition attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SecondaryOutcome {
    Identified {
        artist: String,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f64>,
    },
    NotIdentified {
        reason: String,
    },
}

impl SecondaryOutcome {
    pub fn is_identified(&self) -> bool {
        matches!(self, Self::Identified { .. })
    }
}

impl std::fmt::Display for SecondaryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identified { artist, title, .. } => write!(f, "{artist} - {title}"),
            Self::NotIdentified { reason } => write!(f, "not identified ({reason})"),
        }
    }
}
