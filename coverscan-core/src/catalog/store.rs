//! Durable catalog snapshot.
//!
//! The catalog lives in a single JSON document that is always replaced whole.
//! Writes go to a temporary file in the same directory which is then renamed
//! over the snapshot, so an interrupted write leaves the previous snapshot in
//! place.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use super::rebuild::{fingerprint_entry, RebuildOptions, RebuildReport};
use super::search::search_entries;
use super::{Catalog, CatalogEntry, CatalogStats, SharedCatalog, SourceRecord};
use crate::error::{CoverscanError, Result};
use crate::fingerprint::HashCodec;
use crate::source::ImageFetcher;

/// Default snapshot location, relative to the working directory.
pub const DEFAULT_CATALOG_PATH: &str = "data/covers-database.json";

/// Borrowed view with the same layout as [`Catalog`], used for checkpoints.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    entries: &'a [CatalogEntry],
    built_at: DateTime<Utc>,
    count: usize,
}

/// File-backed catalog plus the live in-memory reference.
pub struct CatalogStore {
    path: PathBuf,
    codec: HashCodec,
    options: RebuildOptions,
    live: SharedCatalog,
}

impl CatalogStore {
    /// Create a store for `path` with an empty live catalog. Nothing is read.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            codec: HashCodec::new(),
            options: RebuildOptions::default(),
            live: SharedCatalog::default(),
        }
    }

    /// Create a store and install the persisted snapshot as the live catalog.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(path);
        let catalog = store.load()?;
        info!(
            path = %store.path.display(),
            count = catalog.count,
            "Opened catalog"
        );
        store.live.install(Arc::new(catalog));
        Ok(store)
    }

    pub fn with_options(mut self, options: RebuildOptions) -> Self {
        self.options = options;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &RebuildOptions {
        &self.options
    }

    /// Handle to the live catalog, shared with matchers.
    pub fn live(&self) -> SharedCatalog {
        self.live.clone()
    }

    /// Read the persisted snapshot. A missing snapshot is an empty catalog.
    pub fn load(&self) -> Result<Catalog> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No catalog snapshot, starting empty");
                return Ok(Catalog::empty());
            }
            Err(e) => return Err(CoverscanError::store_io(&self.path, e)),
        };

        let mut catalog: Catalog = serde_json::from_slice(&bytes).map_err(|e| {
            CoverscanError::Serialization(format!(
                "Failed to parse catalog snapshot {}: {e}",
                self.path.display()
            ))
        })?;

        if catalog.count != catalog.entries.len() {
            warn!(
                stored = catalog.count,
                actual = catalog.entries.len(),
                "Catalog count out of sync with entries, using entry count"
            );
            catalog.count = catalog.entries.len();
        }
        Ok(catalog)
    }

    /// Atomically replace the persisted snapshot.
    pub fn save(&self, catalog: &Catalog) -> Result<()> {
        self.write_snapshot(&catalog.entries, catalog.built_at)
    }

    fn write_snapshot(&self, entries: &[CatalogEntry], built_at: DateTime<Utc>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| CoverscanError::store_io(dir, e))?;

        let snapshot = SnapshotRef {
            entries,
            built_at,
            count: entries.len(),
        };
        let json = serde_json::to_vec_pretty(&snapshot).map_err(|e| {
            CoverscanError::Serialization(format!("Failed to serialize catalog: {e}"))
        })?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| CoverscanError::store_io(dir, e))?;
        tmp.write_all(&json)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| CoverscanError::store_io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| CoverscanError::store_io(&self.path, e.error))?;

        debug!(path = %self.path.display(), entries = entries.len(), "Wrote catalog snapshot");
        Ok(())
    }

    /// Rebuild the catalog from source records.
    ///
    /// With `compute_fingerprints` each entry's artwork is downloaded and
    /// hashed; the partial catalog is checkpointed and the loop pauses
    /// periodically per [`RebuildOptions`]. Individual image failures are
    /// logged and counted, store failures abort the rebuild. The result is
    /// installed as the live catalog only after it has been persisted.
    #[instrument(level = "info", skip_all, fields(records = records.len(), compute_fingerprints = compute_fingerprints))]
    pub async fn rebuild(
        &self,
        records: Vec<SourceRecord>,
        compute_fingerprints: bool,
        fetcher: &dyn ImageFetcher,
    ) -> Result<(Arc<Catalog>, RebuildReport)> {
        let now = Utc::now();
        let mut entries: Vec<CatalogEntry> = records
            .into_iter()
            .map(|record| CatalogEntry::from_record(record, now))
            .collect();
        let total = entries.len();
        let mut report = RebuildReport {
            total,
            ..Default::default()
        };

        if compute_fingerprints {
            info!(total, "Fingerprinting catalog artwork");
            for index in 0..total {
                if self.pause_due(index) {
                    debug!(
                        processed = index,
                        pause_ms = self.options.pause.as_millis() as u64,
                        "Pausing to respect upstream rate limits"
                    );
                    tokio::time::sleep(self.options.pause).await;
                }

                let entry = &mut entries[index];
                let outcome =
                    fingerprint_entry(&self.codec, fetcher, entry, self.options.hash_thumbnails)
                        .await;
                report.record(entry.id, outcome);

                let processed = index + 1;
                if self.checkpoint_due(processed) {
                    self.write_snapshot(&entries, Utc::now())?;
                    report.checkpoints.push(processed);
                    info!(processed, total, "Checkpointed partial catalog");
                }
            }
        }

        let catalog = Arc::new(Catalog::new(entries, Utc::now()));
        self.save(&catalog)?;
        self.live.install(catalog.clone());

        info!(
            total,
            fingerprinted = report.fingerprinted,
            failed = report.failed_ids.len(),
            "Catalog rebuilt"
        );
        Ok((catalog, report))
    }

    fn pause_due(&self, index: usize) -> bool {
        let every = self.options.pause_every;
        every > 0 && index > 0 && index % every == 0 && !self.options.pause.is_zero()
    }

    fn checkpoint_due(&self, processed: usize) -> bool {
        let every = self.options.checkpoint_every;
        every > 0 && processed % every == 0
    }

    /// Name lookup against the live catalog.
    pub fn search(&self, artist: Option<&str>, album: Option<&str>) -> Vec<CatalogEntry> {
        search_entries(&self.live.current().entries, artist, album)
    }

    /// Lookup by release id in the live catalog.
    pub fn get(&self, id: u64) -> Option<CatalogEntry> {
        self.live.current().get(id).cloned()
    }

    pub fn stats(&self) -> CatalogStats {
        self.live.current().stats()
    }
}
