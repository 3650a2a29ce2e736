//! In-memory collaborators.
//!
//! Deterministic stand-ins for Discogs, the image CDN, the camera and the
//! secondary recognizer. Used by tests and by offline tooling.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CatalogSource, FrameSource, ImageFetcher, SecondaryOutcome, SecondaryRecognizer};
use crate::catalog::SourceRecord;
use crate::error::{CoverscanError, Result};

/// Catalog source serving a fixed list of records.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalogSource {
    records: Vec<SourceRecord>,
}

impl StaticCatalogSource {
    pub fn new(records: Vec<SourceRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn fetch_collection(&self) -> Result<Vec<SourceRecord>> {
        Ok(self.records.clone())
    }

    fn source_name(&self) -> &str {
        "static"
    }
}

/// Image fetcher backed by a URL → bytes map. Unknown URLs fail like a 404.
#[derive(Debug, Default)]
pub struct MemoryImageFetcher {
    images: HashMap<String, Vec<u8>>,
    requested: Mutex<Vec<String>>,
}

impl MemoryImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.images.insert(url.into(), bytes);
        self
    }

    /// URLs requested so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl ImageFetcher for MemoryImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.requested.lock().push(url.to_string());
        self.images
            .get(url)
            .cloned()
            .ok_or_else(|| CoverscanError::Fetch(format!("Image not found (404): {url}")))
    }
}

/// Frame source replaying a script of captures.
///
/// Each `capture` pops the next scripted frame; `None` entries simulate a
/// camera that is not ready. Once the script runs out the source either
/// repeats its last frame or reports no frame, depending on construction.
#[derive(Debug, Default)]
pub struct ScriptedFrameSource {
    script: Mutex<VecDeque<Option<Vec<u8>>>>,
    repeat: Option<Vec<u8>>,
    captures: AtomicUsize,
}

impl ScriptedFrameSource {
    /// Replay `frames`, then report no frame.
    pub fn new(frames: Vec<Option<Vec<u8>>>) -> Self {
        Self {
            script: Mutex::new(frames.into()),
            ..Default::default()
        }
    }

    /// Always return the same frame.
    pub fn repeating(frame: Vec<u8>) -> Self {
        Self {
            repeat: Some(frame),
            ..Default::default()
        }
    }

    /// Number of `capture` calls so far.
    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSource for ScriptedFrameSource {
    async fn capture(&self) -> Result<Option<Vec<u8>>> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().pop_front() {
            Some(frame) => Ok(frame),
            None => Ok(self.repeat.clone()),
        }
    }
}

/// Secondary recognizer returning a fixed outcome.
#[derive(Debug)]
pub struct ScriptedRecognizer {
    outcome: SecondaryOutcome,
    inputs: Mutex<Vec<Vec<u8>>>,
}

impl ScriptedRecognizer {
    pub fn new(outcome: SecondaryOutcome) -> Self {
        Self {
            outcome,
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn identified(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(SecondaryOutcome::Identified {
            artist: artist.into(),
            title: title.into(),
            confidence: None,
        })
    }

    pub fn not_identified(reason: impl Into<String>) -> Self {
        Self::new(SecondaryOutcome::NotIdentified {
            reason: reason.into(),
        })
    }

    /// Number of identification attempts so far.
    pub fn calls(&self) -> usize {
        self.inputs.lock().len()
    }

    /// Image bytes of the most recent attempt.
    pub fn last_input(&self) -> Option<Vec<u8>> {
        self.inputs.lock().last().cloned()
    }
}

#[async_trait]
impl SecondaryRecognizer for ScriptedRecognizer {
    async fn identify(&self, image: &[u8]) -> SecondaryOutcome {
        self.inputs.lock().push(image.to_vec());
        self.outcome.clone()
    }
}
