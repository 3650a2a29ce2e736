//! Common utility functions shared across CLI commands.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use coverscan_core::{CatalogEntry, CatalogStore, CoverscanConfig, MatchCandidate};

/// Load the configured catalog snapshot and make it live.
pub fn open_store(config: &CoverscanConfig) -> Result<CatalogStore> {
    CatalogStore::open(&config.catalog_path)
        .map(|store| store.with_options(config.rebuild.clone()))
        .with_context(|| {
            format!(
                "Failed to open catalog: {}",
                config.catalog_path.display()
            )
        })
}

/// Similarity as a percentage with one decimal.
pub fn format_similarity(similarity: f64) -> String {
    format!("{:.1}%", similarity * 100.0)
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// One-line summary: `Artist - Title (Year) [id]`.
pub fn describe_entry(entry: &CatalogEntry) -> String {
    let year = entry
        .year
        .map(|y| format!(" ({y})"))
        .unwrap_or_default();
    format!("{} - {}{} [{}]", entry.artist, entry.title, year, entry.id)
}

pub fn print_candidate(candidate: &MatchCandidate) {
    println!(
        "   {} {}  {} {}  {} {}",
        format_similarity(candidate.similarity).bold(),
        describe_entry(&candidate.entry),
        "distance:".dimmed(),
        candidate.distance,
        "formats:".dimmed(),
        candidate.entry.formats.join(", ")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use coverscan_core::SourceRecord;

    fn entry(year: Option<u32>) -> CatalogEntry {
        CatalogEntry::from_record(
            SourceRecord {
                id: 249504,
                master_id: None,
                artist: "Portishead".into(),
                title: "Dummy".into(),
                year,
                labels: vec![],
                formats: vec![],
                cover_url: None,
                thumb_url: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_format_similarity() {
        assert_eq!(format_similarity(0.90625), "90.6%");
        assert_eq!(format_similarity(1.0), "100.0%");
        assert_eq!(format_similarity(0.0), "0.0%");
    }

    #[test]
    fn test_describe_entry() {
        assert_eq!(describe_entry(&entry(Some(1994))), "Portishead - Dummy (1994) [249504]");
        assert_eq!(describe_entry(&entry(None)), "Portishead - Dummy [249504]");
    }

    #[test]
    fn test_format_timestamp() {
        let ts = DateTime::parse_from_rfc3339("2024-01-15T12:30:45Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(&ts), "2024-01-15 12:30:45 UTC");
    }
}
