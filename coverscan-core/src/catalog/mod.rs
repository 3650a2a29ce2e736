//! The user's catalog of known releases.
//!
//! - [`CatalogEntry`] / [`Catalog`]: the persisted data model
//! - [`SharedCatalog`]: swappable in-memory reference read by every match
//! - [`CatalogStore`]: durable snapshot, rebuild with checkpoints, lookup

mod rebuild;
mod search;
mod store;

pub use rebuild::{RebuildOptions, RebuildReport};
pub use search::{normalize_name, search_entries};
pub use store::{CatalogStore, DEFAULT_CATALOG_PATH};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;

/// A release as delivered by the catalog source, before fingerprinting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: u64,
    #[serde(default)]
    pub master_id: Option<u64>,
    pub artist: String,
    pub title: String,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub formats: Vec<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub thumb_url: Option<String>,
}

/// One physical release in the user's collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Discogs release id
    pub id: u64,
    /// Edition-agnostic grouping id
    #[serde(default)]
    pub master_id: Option<u64>,
    pub artist: String,
    pub title: String,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub formats: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumb_url: Option<String>,
    /// Fingerprint of the full-size cover
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_fingerprint: Option<Fingerprint>,
    /// Fingerprint of the thumbnail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumb_fingerprint: Option<Fingerprint>,
    pub last_updated: DateTime<Utc>,
}

impl CatalogEntry {
    /// Map a source record into an unfingerprinted entry.
    pub fn from_record(record: SourceRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: record.id,
            master_id: record.master_id.filter(|id| *id != 0),
            artist: record.artist,
            title: record.title,
            year: record.year,
            labels: record.labels,
            formats: record.formats,
            cover_url: non_empty(record.cover_url),
            thumb_url: non_empty(record.thumb_url),
            primary_fingerprint: None,
            thumb_fingerprint: None,
            last_updated: now,
        }
    }

    /// Available fingerprints, primary first.
    pub fn fingerprints(&self) -> impl Iterator<Item = &Fingerprint> {
        self.primary_fingerprint
            .iter()
            .chain(self.thumb_fingerprint.iter())
    }

    /// Whether the entry can take part in matching.
    pub fn has_fingerprint(&self) -> bool {
        self.primary_fingerprint.is_some() || self.thumb_fingerprint.is_some()
    }

    pub fn has_artwork(&self) -> bool {
        self.cover_url.is_some() || self.thumb_url.is_some()
    }
}

fn non_empty(url: Option<String>) -> Option<String> {
    url.filter(|u| !u.trim().is_empty())
}

/// The full collection plus build metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
    pub built_at: DateTime<Utc>,
    /// Always `entries.len()`; persisted for readers of the raw snapshot.
    pub count: usize,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>, built_at: DateTime<Utc>) -> Self {
        let count = entries.len();
        Self {
            entries,
            built_at,
            count,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Utc::now())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            count: self.entries.len(),
            built_at: self.built_at,
            entries_with_artwork: self.entries.iter().filter(|e| e.has_artwork()).count(),
            entries_with_fingerprint: self.entries.iter().filter(|e| e.has_fingerprint()).count(),
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::empty()
    }
}

/// Summary counters for a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub count: usize,
    pub built_at: DateTime<Utc>,
    pub entries_with_artwork: usize,
    pub entries_with_fingerprint: usize,
}

/// Swappable reference to the live catalog.
///
/// Readers take a cheap `Arc` snapshot per call and never observe a partially
/// rebuilt catalog; a rebuild replaces the whole reference at once.
#[derive(Debug, Clone, Default)]
pub struct SharedCatalog {
    inner: Arc<RwLock<Arc<Catalog>>>,
}

impl SharedCatalog {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(catalog))),
        }
    }

    /// Snapshot of the catalog as of now.
    pub fn current(&self) -> Arc<Catalog> {
        self.inner.read().clone()
    }

    /// Replace the live catalog.
    pub fn install(&self, catalog: Arc<Catalog>) {
        *self.inner.write() = catalog;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64) -> SourceRecord {
        SourceRecord {
            id,
            master_id: Some(0),
            artist: "Can".into(),
            title: "Tago Mago".into(),
            year: Some(1971),
            labels: vec!["United Artists".into()],
            formats: vec!["Vinyl".into(), "LP".into()],
            cover_url: Some(String::new()),
            thumb_url: Some("https://img/thumb.jpg".into()),
        }
    }

    #[test]
    fn test_entry_from_record_drops_empty_urls_and_zero_master() {
        let entry = CatalogEntry::from_record(record(7), Utc::now());
        assert_eq!(entry.id, 7);
        assert_eq!(entry.master_id, None);
        assert_eq!(entry.cover_url, None);
        assert_eq!(entry.thumb_url.as_deref(), Some("https://img/thumb.jpg"));
        assert_eq!(entry.formats, vec!["Vinyl", "LP"]);
        assert!(entry.has_artwork());
        assert!(!entry.has_fingerprint());
        assert_eq!(entry.fingerprints().count(), 0);
    }

    #[test]
    fn test_fingerprints_primary_first() {
        let mut entry = CatalogEntry::from_record(record(1), Utc::now());
        let primary = Fingerprint::from_bytes(vec![0x01; 8]);
        let thumb = Fingerprint::from_bytes(vec![0x02; 8]);
        entry.thumb_fingerprint = Some(thumb.clone());
        entry.primary_fingerprint = Some(primary.clone());

        let fps: Vec<_> = entry.fingerprints().collect();
        assert_eq!(fps, vec![&primary, &thumb]);
    }

    #[test]
    fn test_catalog_count_and_stats() {
        let mut hashed = CatalogEntry::from_record(record(1), Utc::now());
        hashed.thumb_fingerprint = Some(Fingerprint::from_bytes(vec![0; 8]));
        let mut bare = CatalogEntry::from_record(record(2), Utc::now());
        bare.thumb_url = None;

        let catalog = Catalog::new(vec![hashed, bare], Utc::now());
        assert_eq!(catalog.count, 2);

        let stats = catalog.stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.entries_with_artwork, 1);
        assert_eq!(stats.entries_with_fingerprint, 1);
        assert!(catalog.get(2).is_some());
        assert!(catalog.get(3).is_none());
    }

    #[test]
    fn test_shared_catalog_swap_keeps_old_snapshot() {
        let shared = SharedCatalog::default();
        let before = shared.current();
        assert!(before.is_empty());

        let entry = CatalogEntry::from_record(record(1), Utc::now());
        shared.install(Arc::new(Catalog::new(vec![entry], Utc::now())));

        assert!(before.is_empty(), "existing readers keep their snapshot");
        assert_eq!(shared.current().count, 1);
    }

    #[test]
    fn test_entry_serialization_omits_missing_fingerprints() {
        let entry = CatalogEntry::from_record(record(1), Utc::now());
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("primary_fingerprint").is_none());
        assert!(json.get("cover_url").is_none());
        assert_eq!(json["thumb_url"], "https://img/thumb.jpg");
    }
}
