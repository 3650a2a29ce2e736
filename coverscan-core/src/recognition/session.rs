//! Per-session state and the events the scheduler publishes.

use serde::Serialize;
use tokio::time::Instant;

use crate::catalog::CatalogEntry;
use crate::matching::{MatchCandidate, MatchPolicy};
use crate::source::SecondaryOutcome;

/// Scheduler state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Sampling,
    Confirming,
    Escalating,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Sampling => write!(f, "sampling"),
            Self::Confirming => write!(f, "confirming"),
            Self::Escalating => write!(f, "escalating"),
        }
    }
}

/// Classification of one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleVerdict {
    /// Frame source had nothing ready
    NoFrame,
    /// Undecodable frame or no candidate within the threshold
    NoMatch,
    BelowFloor { similarity: f64 },
    Medium { similarity: f64 },
    High { similarity: f64 },
}

impl SampleVerdict {
    pub fn classify(candidate: Option<&MatchCandidate>, policy: &MatchPolicy) -> Self {
        let Some(candidate) = candidate else {
            return Self::NoMatch;
        };
        let similarity = candidate.similarity;
        if similarity >= policy.auto_accept {
            Self::High { similarity }
        } else if similarity >= policy.confidence_floor {
            Self::Medium { similarity }
        } else {
            Self::BelowFloor { similarity }
        }
    }
}

/// One continuous-capture attempt, from start to outcome.
#[derive(Debug, Clone)]
pub struct RecognitionSession {
    /// Generation number; results tagged with an older id are stale
    pub id: u64,
    pub consecutive_high_confidence: u32,
    pub started_at: Instant,
    pub escalation_deadline_at: Instant,
    pub last_verdict: Option<SampleVerdict>,
    /// Similarity of the latest sample that cleared the floor
    pub last_confidence: Option<f64>,
    pub samples_taken: u32,
    pub(crate) sample_in_flight: bool,
}

impl RecognitionSession {
    pub(crate) fn new(id: u64, started_at: Instant, escalation_deadline_at: Instant) -> Self {
        Self {
            id,
            consecutive_high_confidence: 0,
            started_at,
            escalation_deadline_at,
            last_verdict: None,
            last_confidence: None,
            samples_taken: 0,
            sample_in_flight: false,
        }
    }

    /// Fold a sample into the streak. Returns true once the streak reaches
    /// `required`.
    pub(crate) fn record(&mut self, verdict: SampleVerdict, required: u32) -> bool {
        self.samples_taken += 1;
        self.last_verdict = Some(verdict);

        match verdict {
            SampleVerdict::NoFrame | SampleVerdict::NoMatch | SampleVerdict::BelowFloor { .. } => {
                self.consecutive_high_confidence = 0;
            }
            SampleVerdict::Medium { similarity } => {
                self.last_confidence = Some(similarity);
                self.consecutive_high_confidence = 0;
            }
            SampleVerdict::High { similarity } => {
                self.last_confidence = Some(similarity);
                self.consecutive_high_confidence += 1;
            }
        }

        self.consecutive_high_confidence >= required
    }

    pub fn update(&self, phase: Phase) -> SessionUpdate {
        SessionUpdate {
            session_id: self.id,
            phase,
            confidence: self.last_confidence,
            consecutive: self.consecutive_high_confidence,
        }
    }
}

/// Snapshot published on every state change and sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionUpdate {
    pub session_id: u64,
    pub phase: Phase,
    pub confidence: Option<f64>,
    pub consecutive: u32,
}

/// Secondary recognizer answer, looked up in the catalog when it names a
/// release.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Escalation {
    pub outcome: SecondaryOutcome,
    /// Catalog entry matching the identified artist and title
    pub entry: Option<CatalogEntry>,
}

/// Which collaborator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// The camera or frame provider returned an error
    FrameSource,
    /// Catalog fingerprints could not be compared with the frame
    Matching,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FrameSource => write!(f, "Recognition failed (frame source)"),
            Self::Matching => write!(f, "Recognition failed (matching)"),
        }
    }
}

/// Notification delivered to the scheduler's consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent {
    State(SessionUpdate),
    Confirmed(MatchCandidate),
    Escalated(Escalation),
    /// Infrastructure failure that ended the session
    Fault { kind: FaultKind, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntry, SourceRecord};
    use chrono::Utc;

    fn candidate(similarity: f64) -> MatchCandidate {
        let record = SourceRecord {
            id: 1,
            master_id: None,
            artist: "Can".into(),
            title: "Tago Mago".into(),
            year: None,
            labels: vec![],
            formats: vec![],
            cover_url: None,
            thumb_url: None,
        };
        MatchCandidate {
            entry: CatalogEntry::from_record(record, Utc::now()),
            distance: 0,
            similarity,
        }
    }

    fn session() -> RecognitionSession {
        let now = Instant::now();
        RecognitionSession::new(1, now, now)
    }

    #[test]
    fn test_classify_bands() {
        let policy = MatchPolicy::default();
        assert_eq!(SampleVerdict::classify(None, &policy), SampleVerdict::NoMatch);
        assert!(matches!(
            SampleVerdict::classify(Some(&candidate(0.9)), &policy),
            SampleVerdict::High { .. }
        ));
        assert!(matches!(
            SampleVerdict::classify(Some(&candidate(0.8)), &policy),
            SampleVerdict::Medium { .. }
        ));
        assert!(matches!(
            SampleVerdict::classify(Some(&candidate(0.6)), &policy),
            SampleVerdict::BelowFloor { .. }
        ));
    }

    #[test]
    fn test_streak_requires_consecutive_high_samples() {
        let mut s = session();
        assert!(!s.record(SampleVerdict::High { similarity: 0.9 }, 2));
        assert!(!s.record(SampleVerdict::Medium { similarity: 0.8 }, 2));
        assert_eq!(s.consecutive_high_confidence, 0);
        assert_eq!(s.last_confidence, Some(0.8));

        assert!(!s.record(SampleVerdict::High { similarity: 0.9 }, 2));
        assert!(s.record(SampleVerdict::High { similarity: 0.95 }, 2));
        assert_eq!(s.samples_taken, 4);
    }

    #[test]
    fn test_missing_frame_resets_streak_but_keeps_confidence() {
        let mut s = session();
        s.record(SampleVerdict::High { similarity: 0.9 }, 2);
        s.record(SampleVerdict::NoFrame, 2);
        assert_eq!(s.consecutive_high_confidence, 0);
        assert_eq!(s.last_confidence, Some(0.9));
        assert_eq!(s.last_verdict, Some(SampleVerdict::NoFrame));
    }

    #[test]
    fn test_update_snapshot() {
        let mut s = session();
        s.record(SampleVerdict::High { similarity: 0.9 }, 3);
        let update = s.update(Phase::Sampling);
        assert_eq!(
            update,
            SessionUpdate {
                session_id: 1,
                phase: Phase::Sampling,
                confidence: Some(0.9),
                consecutive: 1,
            }
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = SchedulerEvent::Fault {
            kind: FaultKind::FrameSource,
            message: "camera unplugged".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "fault");
        assert_eq!(json["kind"], "frame_source");
        assert_eq!(json["message"], "camera unplugged");

        let event = SchedulerEvent::Escalated(Escalation {
            outcome: SecondaryOutcome::NotIdentified {
                reason: "blurry".into(),
            },
            entry: None,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "escalated");
        assert_eq!(json["outcome"]["status"], "not_identified");
        assert!(json["entry"].is_null());
    }
}
