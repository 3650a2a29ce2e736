//! Watch command implementation.
//!
//! Replays a directory of captured frames through the recognition scheduler,
//! one file per sampling tick, the same way a live camera feed would.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use coverscan_core::{
    CoverscanConfig, CoverscanError, FaultKind, FrameSource, HashCodec, Phase,
    RecognitionScheduler, SchedulerEvent, SecondaryOutcome, SecondaryRecognizer,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::utils::{describe_entry, format_similarity, open_store};

/// Frames read from image files in name order. Reports no frame once the
/// directory is exhausted.
struct DirectoryFrameSource {
    files: Mutex<std::vec::IntoIter<PathBuf>>,
}

impl DirectoryFrameSource {
    fn open(dir: &Path) -> Result<Self> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read frames directory: {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image_file(path))
            .collect();
        files.sort();

        if files.is_empty() {
            bail!("Failed to read frames: no images in {}", dir.display());
        }
        info!(dir = %dir.display(), frames = files.len(), "Loaded frames");
        Ok(Self {
            files: Mutex::new(files.into_iter()),
        })
    }
}

fn is_image_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|s| s.to_lowercase())
            .as_deref(),
        Some("jpg" | "jpeg" | "png" | "gif" | "webp")
    )
}

#[async_trait]
impl FrameSource for DirectoryFrameSource {
    async fn capture(&self) -> coverscan_core::Result<Option<Vec<u8>>> {
        let Some(path) = self.files.lock().await.next() else {
            return Ok(None);
        };
        debug!(frame = %path.display(), "Serving frame");
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            CoverscanError::FrameSource(format!("Failed to read frame {}: {e}", path.display()))
        })?;
        if !HashCodec::is_supported_format(&bytes) {
            debug!(frame = %path.display(), "Unrecognized image format");
        }
        Ok(Some(bytes))
    }
}

/// Placeholder for the AI/OCR fallback, which the CLI does not ship.
struct UnconfiguredRecognizer;

#[async_trait]
impl SecondaryRecognizer for UnconfiguredRecognizer {
    async fn identify(&self, _image: &[u8]) -> SecondaryOutcome {
        SecondaryOutcome::NotIdentified {
            reason: "no secondary recognizer configured".into(),
        }
    }
}

/// Execute the watch command.
pub async fn execute(config: &CoverscanConfig, frames_dir: PathBuf, quiet: bool) -> Result<()> {
    let frames = DirectoryFrameSource::open(&frames_dir)?;
    let store = open_store(config)?;

    let (scheduler, mut events) = RecognitionScheduler::new(
        config.scheduler(),
        store.live(),
        Arc::new(frames),
        Arc::new(UnconfiguredRecognizer),
    );
    scheduler.start().context("Failed to start recognition")?;

    if !quiet {
        println!(
            "{} {} (sampling every {} ms, escalating after {} ms)",
            "Watching".bold(),
            frames_dir.display(),
            config.sample_interval.as_millis(),
            config.escalation_timeout.as_millis()
        );
    }

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                scheduler.stop();
                bail!("Interrupted");
            }
        };
        let Some(event) = event else {
            bail!("Recognition stopped unexpectedly");
        };

        match event {
            SchedulerEvent::State(update) => {
                if !quiet && update.phase != Phase::Idle {
                    let confidence = update
                        .confidence
                        .map(format_similarity)
                        .unwrap_or_else(|| "-".into());
                    println!(
                        "   {} {:<10} {} {}  {} {}",
                        "phase:".dimmed(),
                        update.phase.to_string(),
                        "confidence:".dimmed(),
                        confidence,
                        "streak:".dimmed(),
                        update.consecutive
                    );
                }
            }
            SchedulerEvent::Confirmed(candidate) => {
                if !quiet {
                    println!();
                    println!("{}", "IDENTIFIED".green().bold());
                    println!("   {} {}", "Release:".dimmed(), describe_entry(&candidate.entry));
                    println!(
                        "   {} {}",
                        "Similarity:".dimmed(),
                        format_similarity(candidate.similarity)
                    );
                }
                return Ok(());
            }
            SchedulerEvent::Escalated(escalation) => {
                let outcome = escalation.outcome;
                if let SecondaryOutcome::Identified { artist, title, .. } = &outcome {
                    if !quiet {
                        println!();
                        println!("{}", "IDENTIFIED (secondary)".yellow().bold());
                        match &escalation.entry {
                            Some(entry) => {
                                println!("   {} {}", "Release:".dimmed(), describe_entry(entry))
                            }
                            None => println!(
                                "   {} {} - {} {}",
                                "Release:".dimmed(),
                                artist,
                                title,
                                "(not in catalog)".dimmed()
                            ),
                        }
                    }
                    return Ok(());
                }
                if !quiet {
                    println!();
                    println!("{}", "NOT IDENTIFIED".red().bold());
                }
                bail!("No match found: {outcome}");
            }
            SchedulerEvent::Fault { kind, message } => {
                return Err(fault_error(kind, message));
            }
        }
    }
}

/// Scheduler faults keep their kind as context so the exit code does not
/// depend on the message text.
fn fault_error(kind: FaultKind, message: String) -> anyhow::Error {
    anyhow!(message).context(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_codes::{ExitCode, GENERAL_ERROR, INPUT_ERROR};

    #[test]
    fn test_frame_source_fault_is_input_error() {
        let err = fault_error(FaultKind::FrameSource, "camera unplugged".into());
        let exit = ExitCode::from_anyhow(&err);
        assert_eq!(exit.code, INPUT_ERROR);
        assert_eq!(
            exit.message.as_deref(),
            Some("Recognition failed (frame source): camera unplugged")
        );
    }

    #[test]
    fn test_matching_fault_is_general_error() {
        let err = fault_error(
            FaultKind::Matching,
            "Fingerprint length mismatch: 40 bits vs 64 bits".into(),
        );
        assert_eq!(ExitCode::from_anyhow(&err).code, GENERAL_ERROR);
    }

    #[test]
    fn test_image_extensions() {
        assert!(is_image_file(Path::new("frames/0001.JPG")));
        assert!(is_image_file(Path::new("frames/0002.webp")));
        assert!(!is_image_file(Path::new("frames/notes.txt")));
        assert!(!is_image_file(Path::new("frames/README")));
    }
}
