//! Nearest-match search over catalog fingerprints.
//!
//! Two independent knobs decide what counts as a match:
//!
//! - `match_threshold` (Hamming distance) bounds the search itself;
//! - `confidence_floor` (similarity) filters the final answer.
//!
//! They are allowed to disagree: the diagnostic near-miss listing uses a much
//! wider distance than anything the floor would ever accept.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::catalog::CatalogEntry;
use crate::error::{CoverscanError, Result};
use crate::fingerprint::{similarity, Fingerprint};

/// Maximum Hamming distance for a plausible match.
pub const DEFAULT_MATCH_THRESHOLD: u32 = 15;
/// Similarity below which a within-threshold candidate is noise.
pub const DEFAULT_CONFIDENCE_FLOOR: f64 = 0.70;
/// Similarity at which a sample counts toward automatic confirmation.
pub const DEFAULT_AUTO_ACCEPT: f64 = 0.85;
/// Search distance used when listing near misses.
pub const DEFAULT_DIAGNOSTIC_THRESHOLD: u32 = 30;
/// Number of near misses reported.
pub const DEFAULT_DIAGNOSTIC_LIMIT: usize = 5;

/// Matching policy knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchPolicy {
    pub match_threshold: u32,
    pub confidence_floor: f64,
    pub auto_accept: f64,
    pub diagnostic_threshold: u32,
    pub diagnostic_limit: usize,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
            auto_accept: DEFAULT_AUTO_ACCEPT,
            diagnostic_threshold: DEFAULT_DIAGNOSTIC_THRESHOLD,
            diagnostic_limit: DEFAULT_DIAGNOSTIC_LIMIT,
        }
    }
}

impl MatchPolicy {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("confidence_floor", self.confidence_floor),
            ("auto_accept", self.auto_accept),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CoverscanError::Config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.auto_accept < self.confidence_floor {
            return Err(CoverscanError::Config(format!(
                "auto_accept ({}) must not be below confidence_floor ({})",
                self.auto_accept, self.confidence_floor
            )));
        }
        Ok(())
    }

    pub fn confidence(&self, similarity: f64) -> Confidence {
        if similarity >= self.auto_accept {
            Confidence::High
        } else if similarity >= self.confidence_floor {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// Coarse confidence band of a similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// A catalog entry ranked against a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub entry: CatalogEntry,
    /// Distance to the closer of the entry's fingerprints
    pub distance: u32,
    pub similarity: f64,
}

/// Outcome of [`MatchEngine::evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchVerdict {
    /// Best candidate that passed both the threshold and the floor
    pub best: Option<MatchCandidate>,
    pub confidence: Option<Confidence>,
    /// Near misses, filled only when `best` is empty
    pub closest: Vec<MatchCandidate>,
    /// Entries that carried a fingerprint
    pub searched: usize,
}

/// Ranks catalog entries against a query fingerprint.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchEngine {
    policy: MatchPolicy,
}

impl MatchEngine {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Entries within `max_distance` of `query`, closest first.
    ///
    /// Entries without fingerprints are skipped. Equidistant entries keep
    /// their catalog order.
    pub fn find_candidates(
        &self,
        query: &Fingerprint,
        entries: &[CatalogEntry],
        max_distance: u32,
    ) -> Result<Vec<MatchCandidate>> {
        let mut candidates = Vec::new();

        for entry in entries {
            let Some(distance) = best_distance(query, entry)? else {
                continue;
            };
            if distance <= max_distance {
                candidates.push(MatchCandidate {
                    entry: entry.clone(),
                    distance,
                    similarity: similarity(distance, query.bit_len()),
                });
            }
        }

        candidates.sort_by_key(|c| c.distance);
        Ok(candidates)
    }

    /// Closest entry within `max_distance`, if any.
    pub fn find_best(
        &self,
        query: &Fingerprint,
        entries: &[CatalogEntry],
        max_distance: u32,
    ) -> Result<Option<MatchCandidate>> {
        Ok(self
            .find_candidates(query, entries, max_distance)?
            .into_iter()
            .next())
    }

    /// Apply the full policy: threshold, floor, and near-miss diagnostics.
    pub fn evaluate(&self, query: &Fingerprint, entries: &[CatalogEntry]) -> Result<MatchVerdict> {
        let searched = entries.iter().filter(|e| e.has_fingerprint()).count();
        let best = self
            .find_best(query, entries, self.policy.match_threshold)?
            .filter(|c| c.similarity >= self.policy.confidence_floor);

        let closest = if best.is_none() && searched > 0 {
            let mut near = self.find_candidates(query, entries, self.policy.diagnostic_threshold)?;
            near.truncate(self.policy.diagnostic_limit);
            near
        } else {
            Vec::new()
        };

        Ok(MatchVerdict {
            confidence: best.as_ref().map(|c| self.policy.confidence(c.similarity)),
            best,
            closest,
            searched,
        })
    }
}

/// Smaller distance over the entry's fingerprints, `None` if it has none.
fn best_distance(query: &Fingerprint, entry: &CatalogEntry) -> Result<Option<u32>> {
    let mut best: Option<u32> = None;
    for fingerprint in entry.fingerprints() {
        let distance = query.distance(fingerprint).inspect_err(|e| {
            error!(entry_id = entry.id, error = %e, "Fingerprint parameters disagree");
        })?;
        best = Some(best.map_or(distance, |b| b.min(distance)));
    }
    Ok(best)
}
