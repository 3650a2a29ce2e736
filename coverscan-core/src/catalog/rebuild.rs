//! Per-entry fingerprinting for catalog rebuilds.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use super::CatalogEntry;
use crate::error::Result;
use crate::fingerprint::{Fingerprint, HashCodec};
use crate::source::ImageFetcher;

/// Knobs for a fingerprinting rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildOptions {
    /// Persist the partial catalog after this many processed entries (0 disables).
    pub checkpoint_every: usize,
    /// Pause before every batch of this many entries (0 disables).
    pub pause_every: usize,
    /// Length of the rate-limit pause.
    pub pause: Duration,
    /// Also hash the thumbnail when the cover succeeded.
    pub hash_thumbnails: bool,
}

impl Default for RebuildOptions {
    fn default() -> Self {
        Self {
            checkpoint_every: 10,
            pause_every: 10,
            pause: Duration::from_secs(2),
            hash_thumbnails: false,
        }
    }
}

/// What happened during a rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    /// Entries in the rebuilt catalog
    pub total: usize,
    /// Entries that ended up with at least one fingerprint
    pub fingerprinted: usize,
    /// Entries fingerprinted from the thumbnail only
    pub thumbnail_only: usize,
    /// Entries with artwork where every image failed
    pub failed_ids: Vec<u64>,
    /// Entries without any artwork URL
    pub skipped_no_artwork: usize,
    /// Processed-entry counts at which checkpoints were written
    pub checkpoints: Vec<usize>,
}

/// Result of fingerprinting one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryOutcome {
    Cover,
    ThumbnailOnly,
    CoverAndThumbnail,
    Failed,
    NoArtwork,
}

impl RebuildReport {
    pub(crate) fn record(&mut self, entry_id: u64, outcome: EntryOutcome) {
        match outcome {
            EntryOutcome::Cover | EntryOutcome::CoverAndThumbnail => self.fingerprinted += 1,
            EntryOutcome::ThumbnailOnly => {
                self.fingerprinted += 1;
                self.thumbnail_only += 1;
            }
            EntryOutcome::Failed => self.failed_ids.push(entry_id),
            EntryOutcome::NoArtwork => self.skipped_no_artwork += 1,
        }
    }
}

async fn fetch_fingerprint(
    codec: &HashCodec,
    fetcher: &dyn ImageFetcher,
    url: &str,
) -> Result<Fingerprint> {
    let bytes = fetcher.fetch(url).await?;
    codec.compute_fingerprint(&bytes)
}

/// Fingerprint one entry in place.
///
/// Tries the cover first and falls back to the thumbnail. Failures are logged
/// and leave the corresponding fingerprint empty; they never propagate.
pub(crate) async fn fingerprint_entry(
    codec: &HashCodec,
    fetcher: &dyn ImageFetcher,
    entry: &mut CatalogEntry,
    hash_thumbnails: bool,
) -> EntryOutcome {
    if !entry.has_artwork() {
        debug!(entry_id = entry.id, "No artwork URL, skipping");
        return EntryOutcome::NoArtwork;
    }

    if let Some(url) = entry.cover_url.clone() {
        match fetch_fingerprint(codec, fetcher, &url).await {
            Ok(fp) => entry.primary_fingerprint = Some(fp),
            Err(e) => warn!(
                entry_id = entry.id,
                artist = %entry.artist,
                title = %entry.title,
                error = %e,
                "Failed to fingerprint cover image"
            ),
        }
    }

    let want_thumbnail = entry.primary_fingerprint.is_none() || hash_thumbnails;
    if let (true, Some(url)) = (want_thumbnail, entry.thumb_url.clone()) {
        match fetch_fingerprint(codec, fetcher, &url).await {
            Ok(fp) => entry.thumb_fingerprint = Some(fp),
            Err(e) => warn!(
                entry_id = entry.id,
                artist = %entry.artist,
                title = %entry.title,
                error = %e,
                "Failed to fingerprint thumbnail"
            ),
        }
    }

    match (
        entry.primary_fingerprint.is_some(),
        entry.thumb_fingerprint.is_some(),
    ) {
        (true, true) => EntryOutcome::CoverAndThumbnail,
        (true, false) => EntryOutcome::Cover,
        (false, true) => EntryOutcome::ThumbnailOnly,
        (false, false) => EntryOutcome::Failed,
    }
}
