//! Build command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use coverscan_core::source::StaticCatalogSource;
use coverscan_core::{
    CatalogSource, CatalogStore, CoverscanConfig, DiscogsCollection, HttpImageFetcher,
    RebuildOptions, SourceRecord,
};
use tracing::info;

use crate::utils::format_timestamp;

fn load_records_file(path: &Path) -> Result<StaticCatalogSource> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read records file: {}", path.display()))?;
    let records: Vec<SourceRecord> = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse records file: {}", path.display()))?;
    Ok(StaticCatalogSource::new(records))
}

/// Execute the build command.
pub async fn execute(
    config: &CoverscanConfig,
    hash: bool,
    hash_thumbnails: bool,
    records: Option<PathBuf>,
    quiet: bool,
) -> Result<()> {
    let source: Box<dyn CatalogSource> = match records {
        Some(path) => Box::new(load_records_file(&path)?),
        None => Box::new(
            DiscogsCollection::from_env().context("Failed to configure Discogs client")?,
        ),
    };

    let records = source
        .fetch_collection()
        .await
        .with_context(|| format!("Failed to fetch collection from {}", source.source_name()))?;
    info!(source = source.source_name(), records = records.len(), "Fetched collection");

    let store = CatalogStore::new(&config.catalog_path).with_options(RebuildOptions {
        hash_thumbnails,
        ..config.rebuild.clone()
    });
    let fetcher = HttpImageFetcher::new().context("Failed to create image fetcher")?;

    let (catalog, report) = store
        .rebuild(records, hash, &fetcher)
        .await
        .context("Failed to write catalog")?;

    if !quiet {
        println!();
        println!("{}", "Catalog rebuilt".green().bold());
        println!();
        println!("   {} {}", "Path:".dimmed(), store.path().display());
        println!("   {} {}", "Releases:".dimmed(), catalog.count);
        println!("   {} {}", "Built at:".dimmed(), format_timestamp(&catalog.built_at));
        if hash {
            println!("   {} {}", "Fingerprinted:".dimmed(), report.fingerprinted);
            println!("   {} {}", "Thumbnail only:".dimmed(), report.thumbnail_only);
            println!("   {} {}", "No artwork:".dimmed(), report.skipped_no_artwork);
            if report.failed_ids.is_empty() {
                println!("   {} {}", "Failed:".dimmed(), "none".green());
            } else {
                println!(
                    "   {} {} {:?}",
                    "Failed:".dimmed(),
                    report.failed_ids.len().to_string().yellow(),
                    report.failed_ids
                );
            }
        }
    }

    Ok(())
}
