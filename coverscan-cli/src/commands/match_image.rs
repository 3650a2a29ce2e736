//! Match command implementation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use coverscan_core::{Confidence, CoverscanConfig, HashCodec, MatchEngine};
use tracing::{debug, info};

use crate::utils::{describe_entry, format_similarity, open_store, print_candidate};

/// Execute the match command.
pub fn execute(config: &CoverscanConfig, image: PathBuf, json: bool, quiet: bool) -> Result<()> {
    let bytes = std::fs::read(&image)
        .with_context(|| format!("Failed to read image: {}", image.display()))?;
    info!(path = %image.display(), bytes = bytes.len(), "Read image");

    let query = HashCodec::new()
        .compute_fingerprint(&bytes)
        .with_context(|| format!("Failed to fingerprint {}", image.display()))?;
    debug!(fingerprint = %query, "Computed fingerprint");

    let store = open_store(config)?;
    let catalog = store.live().current();
    let engine = MatchEngine::new(config.policy);
    let verdict = engine
        .evaluate(&query, &catalog.entries)
        .context("Failed to compare fingerprints")?;

    if json {
        let out = serde_json::to_string_pretty(&verdict).context("Failed to serialize verdict")?;
        println!("{out}");
    }

    match (&verdict.best, verdict.confidence) {
        (Some(best), Some(confidence)) => {
            info!(
                entry_id = best.entry.id,
                distance = best.distance,
                similarity = best.similarity,
                "Match found"
            );
            if !json && !quiet {
                let label = match confidence {
                    Confidence::High => "MATCH (high confidence)".green().bold(),
                    Confidence::Medium => "MATCH (medium confidence)".yellow().bold(),
                    Confidence::Low => "MATCH (low confidence)".red().bold(),
                };
                println!();
                println!("{label}");
                println!();
                println!("   {} {}", "Release:".dimmed(), describe_entry(&best.entry));
                println!("   {} {}", "Similarity:".dimmed(), format_similarity(best.similarity));
                println!("   {} {} bits", "Distance:".dimmed(), best.distance);
                if !best.entry.labels.is_empty() {
                    println!("   {} {}", "Labels:".dimmed(), best.entry.labels.join(", "));
                }
            }
            Ok(())
        }
        _ => {
            if !json && !quiet {
                println!();
                println!("{}", "NO MATCH".red().bold());
                println!(
                    "   {} {} fingerprinted release(s)",
                    "Searched:".dimmed(),
                    verdict.searched
                );
                if !verdict.closest.is_empty() {
                    println!();
                    println!("{}", "Closest releases:".dimmed());
                    verdict.closest.iter().for_each(print_candidate);
                }
            }
            bail!(
                "No match found within {} bits (floor {})",
                config.policy.match_threshold,
                format_similarity(config.policy.confidence_floor)
            )
        }
    }
}
