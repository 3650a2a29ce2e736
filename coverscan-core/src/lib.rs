//! Coverscan Core - record sleeve recognition by perceptual hashing
//!
//! Identifies a physical record from a camera still by comparing a 64-bit
//! Blockhash fingerprint of the frame against fingerprints of the user's
//! collection artwork.
//!
//! # Modules
//!
//! - [`fingerprint`]: `HashCodec`, fingerprint computation and comparison
//! - [`catalog`]: catalog data model, durable store, rebuild, name search
//! - [`matching`]: nearest-match search and confidence policy
//! - [`recognition`]: continuous-capture scheduler with escalation deadline
//! - [`source`]: collaborator traits plus Discogs / HTTP / in-memory implementations
//! - [`config`]: environment-driven configuration
//!
//! # Example
//!
//! ```no_run
//! use coverscan_core::{CatalogStore, HashCodec, MatchEngine, MatchPolicy};
//!
//! # fn example(frame: &[u8]) -> coverscan_core::Result<()> {
//! let store = CatalogStore::open("data/covers-database.json")?;
//! let query = HashCodec::new().compute_fingerprint(frame)?;
//!
//! let catalog = store.live().current();
//! let verdict = MatchEngine::new(MatchPolicy::default()).evaluate(&query, &catalog.entries)?;
//! if let Some(best) = verdict.best {
//!     println!("{} - {} ({:.0}%)", best.entry.artist, best.entry.title, best.similarity * 100.0);
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod matching;
pub mod recognition;
pub mod source;

// Re-export main types for convenience
pub use catalog::{
    normalize_name, Catalog, CatalogEntry, CatalogStats, CatalogStore, RebuildOptions,
    RebuildReport, SharedCatalog, SourceRecord,
};
pub use config::CoverscanConfig;
pub use error::{CoverscanError, Result};
pub use fingerprint::{hamming_distance, similarity, Fingerprint, HashCodec};
pub use matching::{Confidence, MatchCandidate, MatchEngine, MatchPolicy, MatchVerdict};
pub use recognition::{
    Escalation, FaultKind, Phase, RecognitionScheduler, RecognitionSession, SchedulerConfig,
    SchedulerEvent, SessionUpdate,
};
pub use source::{
    CatalogSource, FrameSource, ImageFetcher, SecondaryOutcome, SecondaryRecognizer,
};

#[cfg(feature = "network")]
pub use source::{DiscogsCollection, DiscogsConfig, HttpImageFetcher};
