//! Search command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use coverscan_core::CoverscanConfig;

use crate::utils::{describe_entry, open_store};

/// Execute the search command.
pub fn execute(
    config: &CoverscanConfig,
    artist: Option<String>,
    album: Option<String>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let store = open_store(config)?;
    let results = store.search(artist.as_deref(), album.as_deref());

    if json {
        let out = serde_json::to_string_pretty(&results).context("Failed to serialize results")?;
        println!("{out}");
        return Ok(());
    }

    if quiet {
        return Ok(());
    }

    if results.is_empty() {
        println!("{}", "No releases found".yellow());
        return Ok(());
    }

    println!("{} release(s) found", results.len().to_string().bold());
    for entry in &results {
        let marker = if entry.has_fingerprint() {
            "●".green()
        } else {
            "○".dimmed()
        };
        println!("   {} {}", marker, describe_entry(entry));
    }
    Ok(())
}
