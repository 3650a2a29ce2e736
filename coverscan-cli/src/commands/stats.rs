//! Stats command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use coverscan_core::CoverscanConfig;

use crate::utils::{format_timestamp, open_store};

/// Execute the stats command.
pub fn execute(config: &CoverscanConfig, json: bool, quiet: bool) -> Result<()> {
    let store = open_store(config)?;
    let stats = store.stats();

    if json {
        let out = serde_json::to_string_pretty(&stats).context("Failed to serialize stats")?;
        println!("{out}");
    } else if !quiet {
        println!("{}", "Catalog".bold());
        println!("   {} {}", "Path:".dimmed(), store.path().display());
        println!("   {} {}", "Releases:".dimmed(), stats.count);
        println!("   {} {}", "With artwork:".dimmed(), stats.entries_with_artwork);
        println!("   {} {}", "Fingerprinted:".dimmed(), stats.entries_with_fingerprint);
        println!("   {} {}", "Built at:".dimmed(), format_timestamp(&stats.built_at));
    }
    Ok(())
}
