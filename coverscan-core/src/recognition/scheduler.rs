//! Continuous-capture recognition loop.
//!
//! A session owns two timer tasks: a periodic sampler and a one-shot
//! escalation deadline. Samples run as separate tasks so a slow frame source
//! never delays the deadline. Every asynchronous result is tagged with the
//! session id it was started for and dropped if the session has moved on.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use super::session::{
    Escalation, FaultKind, Phase, RecognitionSession, SampleVerdict, SchedulerEvent,
    SessionUpdate,
};
use crate::catalog::{search_entries, CatalogEntry, SharedCatalog};
use crate::error::{CoverscanError, Result};
use crate::fingerprint::HashCodec;
use crate::matching::{MatchCandidate, MatchEngine, MatchPolicy};
use crate::source::{FrameSource, SecondaryOutcome, SecondaryRecognizer};

pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(1500);
pub const DEFAULT_ESCALATION_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_REQUIRED_STREAK: u32 = 2;

/// Timing and acceptance knobs for the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Period between samples; the first sample fires one period after start
    pub sample_interval: Duration,
    /// Time from start until the secondary recognizer takes over
    pub escalation_timeout: Duration,
    /// Consecutive high-confidence samples needed to confirm
    pub required_streak: u32,
    pub policy: MatchPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            escalation_timeout: DEFAULT_ESCALATION_TIMEOUT,
            required_streak: DEFAULT_REQUIRED_STREAK,
            policy: MatchPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_interval.is_zero() {
            return Err(CoverscanError::Config(
                "sample_interval must be greater than zero".into(),
            ));
        }
        if self.required_streak == 0 {
            return Err(CoverscanError::Config(
                "required_streak must be at least 1".into(),
            ));
        }
        self.policy.validate()
    }
}

/// Drives recognition sessions against the live catalog.
///
/// Must be used from within a tokio runtime. Dropping the scheduler stops any
/// active session.
pub struct RecognitionScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    config: SchedulerConfig,
    codec: HashCodec,
    engine: MatchEngine,
    catalog: SharedCatalog,
    frames: Arc<dyn FrameSource>,
    recognizer: Arc<dyn SecondaryRecognizer>,
    events: mpsc::UnboundedSender<SchedulerEvent>,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    phase: Phase,
    last_session_id: u64,
    session: Option<RecognitionSession>,
    paused: bool,
    /// Most recent captured frame of the current session
    last_frame: Option<Vec<u8>>,
    ticker: Option<JoinHandle<()>>,
    deadline: Option<JoinHandle<()>>,
}

impl State {
    fn is_current(&self, session_id: u64, phase: Phase) -> bool {
        self.phase == phase && self.session.as_ref().is_some_and(|s| s.id == session_id)
    }

    fn cancel_timers(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Some(deadline) = self.deadline.take() {
            deadline.abort();
        }
    }

    /// End the session and return to idle.
    fn release(&mut self) -> Option<SessionUpdate> {
        self.cancel_timers();
        self.phase = Phase::Idle;
        self.paused = false;
        self.last_frame = None;
        self.session.take().map(|s| s.update(Phase::Idle))
    }
}

enum TickAction {
    Sample,
    Skip,
    Finished,
}

impl RecognitionScheduler {
    /// Create a scheduler and the receiving end of its event stream.
    pub fn new(
        config: SchedulerConfig,
        catalog: SharedCatalog,
        frames: Arc<dyn FrameSource>,
        recognizer: Arc<dyn SecondaryRecognizer>,
    ) -> (Self, mpsc::UnboundedReceiver<SchedulerEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let inner = Inner {
            engine: MatchEngine::new(config.policy),
            codec: HashCodec::new(),
            config,
            catalog,
            frames,
            recognizer,
            events,
            state: Mutex::new(State::default()),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            receiver,
        )
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Begin a new session and return its id.
    ///
    /// Fails with `SessionActive` while another session is running.
    pub fn start(&self) -> Result<u64> {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        if let Some(active) = state.session.as_ref() {
            return Err(CoverscanError::SessionActive(active.id));
        }

        state.last_session_id += 1;
        let session_id = state.last_session_id;
        let started_at = Instant::now();
        let deadline_at = started_at + inner.config.escalation_timeout;
        let session = RecognitionSession::new(session_id, started_at, deadline_at);

        state.phase = Phase::Sampling;
        state.paused = false;
        state.last_frame = None;
        inner.emit(SchedulerEvent::State(session.update(Phase::Sampling)));
        state.session = Some(session);
        state.ticker = Some(tokio::spawn(inner.clone().run_ticker(session_id)));
        state.deadline = Some(tokio::spawn(
            inner.clone().run_deadline(session_id, deadline_at),
        ));

        info!(
            session_id,
            interval_ms = inner.config.sample_interval.as_millis() as u64,
            timeout_ms = inner.config.escalation_timeout.as_millis() as u64,
            "Recognition session started"
        );
        Ok(session_id)
    }

    /// Cancel the active session, if any. Safe to call repeatedly.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        if let Some(update) = state.release() {
            info!(session_id = update.session_id, "Recognition session stopped");
            self.inner.emit(SchedulerEvent::State(update));
        }
    }

    /// Hold off sampling. The escalation deadline keeps running.
    pub fn pause(&self) {
        let mut state = self.inner.state.lock();
        if state.session.is_some() {
            debug!("Sampling paused");
            state.paused = true;
        }
    }

    pub fn resume(&self) {
        let mut state = self.inner.state.lock();
        if state.paused {
            debug!("Sampling resumed");
            state.paused = false;
        }
    }

    pub fn is_paused(&self) -> bool {
        self.inner.state.lock().paused
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.lock().phase
    }

    /// Copy of the active session.
    pub fn session(&self) -> Option<RecognitionSession> {
        self.inner.state.lock().session.clone()
    }

    /// Whether either timer task is still scheduled.
    pub fn has_active_timers(&self) -> bool {
        let state = self.inner.state.lock();
        let live = |handle: &Option<JoinHandle<()>>| handle.as_ref().is_some_and(|h| !h.is_finished());
        live(&state.ticker) || live(&state.deadline)
    }
}

impl Drop for RecognitionScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn emit(&self, event: SchedulerEvent) {
        if self.events.send(event).is_err() {
            trace!("No event receiver");
        }
    }

    async fn run_ticker(self: Arc<Self>, session_id: u64) {
        let period = self.config.sample_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match self.begin_sample(session_id) {
                TickAction::Sample => {
                    tokio::spawn(self.clone().run_sample(session_id));
                }
                TickAction::Skip => {}
                TickAction::Finished => break,
            }
        }
    }

    fn begin_sample(&self, session_id: u64) -> TickAction {
        let mut state = self.state.lock();
        if !state.is_current(session_id, Phase::Sampling) {
            return TickAction::Finished;
        }
        let paused = state.paused;
        let Some(session) = state.session.as_mut() else {
            return TickAction::Finished;
        };
        if paused {
            trace!(session_id, "Tick dropped while paused");
            return TickAction::Skip;
        }
        if session.sample_in_flight {
            debug!(session_id, "Tick dropped, previous sample still running");
            return TickAction::Skip;
        }
        session.sample_in_flight = true;
        TickAction::Sample
    }

    async fn run_sample(self: Arc<Self>, session_id: u64) {
        let frame = match self.frames.capture().await {
            Ok(frame) => frame,
            Err(e) => {
                self.fault(session_id, Phase::Sampling, FaultKind::FrameSource, e);
                return;
            }
        };

        let (verdict, candidate) = match frame.as_deref() {
            None => (SampleVerdict::NoFrame, None),
            Some(bytes) => match self.match_frame(bytes) {
                Ok(result) => result,
                Err(e) => {
                    self.fault(session_id, Phase::Sampling, FaultKind::Matching, e);
                    return;
                }
            },
        };

        self.complete_sample(session_id, frame, verdict, candidate);
    }

    /// Fingerprint a frame and look it up in the current catalog.
    fn match_frame(&self, bytes: &[u8]) -> Result<(SampleVerdict, Option<MatchCandidate>)> {
        let query = match self.codec.compute_fingerprint(bytes) {
            Ok(fp) => fp,
            Err(e) => {
                debug!(error = %e, "Frame could not be fingerprinted");
                return Ok((SampleVerdict::NoMatch, None));
            }
        };

        let catalog = self.catalog.current();
        let candidate =
            self.engine
                .find_best(&query, &catalog.entries, self.config.policy.match_threshold)?;
        let verdict = SampleVerdict::classify(candidate.as_ref(), &self.config.policy);
        if let Some(c) = &candidate {
            debug!(
                entry_id = c.entry.id,
                distance = c.distance,
                similarity = c.similarity,
                "Closest catalog entry"
            );
        }
        Ok((verdict, candidate))
    }

    fn complete_sample(
        &self,
        session_id: u64,
        frame: Option<Vec<u8>>,
        verdict: SampleVerdict,
        candidate: Option<MatchCandidate>,
    ) {
        let mut state = self.state.lock();
        if !state.is_current(session_id, Phase::Sampling) {
            debug!(session_id, "Discarding stale sample result");
            return;
        }
        if frame.is_some() {
            state.last_frame = frame;
        }

        let required = self.config.required_streak;
        let Some(session) = state.session.as_mut() else {
            return;
        };
        session.sample_in_flight = false;
        let confirmed = session.record(verdict, required);
        debug!(
            session_id,
            verdict = ?verdict,
            consecutive = session.consecutive_high_confidence,
            "Sample recorded"
        );

        match (confirmed, candidate) {
            (true, Some(candidate)) => {
                let update = session.update(Phase::Confirming);
                state.cancel_timers();
                state.phase = Phase::Confirming;
                info!(
                    session_id,
                    entry_id = candidate.entry.id,
                    similarity = candidate.similarity,
                    "Match confirmed"
                );
                self.emit(SchedulerEvent::State(update));
                self.emit(SchedulerEvent::Confirmed(candidate));
                if let Some(idle) = state.release() {
                    self.emit(SchedulerEvent::State(idle));
                }
            }
            _ => {
                let update = session.update(Phase::Sampling);
                self.emit(SchedulerEvent::State(update));
            }
        }
    }

    async fn run_deadline(self: Arc<Self>, session_id: u64, deadline_at: Instant) {
        sleep_until(deadline_at).await;

        let frame = {
            let mut state = self.state.lock();
            if !state.is_current(session_id, Phase::Sampling) {
                return;
            }
            if let Some(ticker) = state.ticker.take() {
                ticker.abort();
            }
            state.phase = Phase::Escalating;
            if let Some(session) = state.session.as_ref() {
                info!(
                    session_id,
                    samples = session.samples_taken,
                    "No confident match before deadline, escalating"
                );
                self.emit(SchedulerEvent::State(session.update(Phase::Escalating)));
            }
            state.last_frame.take()
        };

        let frame = match frame {
            Some(frame) => Some(frame),
            None => match self.frames.capture().await {
                Ok(frame) => frame,
                Err(e) => {
                    self.fault(session_id, Phase::Escalating, FaultKind::FrameSource, e);
                    return;
                }
            },
        };

        let outcome = match frame {
            Some(bytes) => self.recognizer.identify(&bytes).await,
            None => SecondaryOutcome::NotIdentified {
                reason: "No frame available".into(),
            },
        };
        let entry = self.resolve(&outcome);

        let mut state = self.state.lock();
        if !state.is_current(session_id, Phase::Escalating) {
            debug!(session_id, "Discarding stale escalation result");
            return;
        }
        // This task is finishing on its own; detach rather than abort it.
        state.deadline.take();
        info!(
            session_id,
            outcome = %outcome,
            entry_id = entry.as_ref().map(|e| e.id),
            "Escalation finished"
        );
        self.emit(SchedulerEvent::Escalated(Escalation { outcome, entry }));
        if let Some(idle) = state.release() {
            self.emit(SchedulerEvent::State(idle));
        }
    }

    /// Look up a secondary identification in the live catalog.
    fn resolve(&self, outcome: &SecondaryOutcome) -> Option<CatalogEntry> {
        let SecondaryOutcome::Identified { artist, title, .. } = outcome else {
            return None;
        };
        let (artist, title) = (artist.as_str(), title.as_str());
        if artist.trim().is_empty() || title.trim().is_empty() {
            return None;
        }

        let catalog = self.catalog.current();
        let entry = search_entries(&catalog.entries, Some(artist), Some(title))
            .into_iter()
            .next();
        if entry.is_none() {
            debug!(artist = %artist, title = %title, "Identified release is not in the catalog");
        }
        entry
    }

    /// End the session after a collaborator failure, unless the session has
    /// already left `expected`.
    fn fault(&self, session_id: u64, expected: Phase, kind: FaultKind, error: CoverscanError) {
        let mut state = self.state.lock();
        if !state.is_current(session_id, expected) {
            warn!(session_id, error = %error, "Ignoring failure from a superseded task");
            return;
        }
        error!(session_id, error = %error, "Recognition session failed");
        self.emit(SchedulerEvent::Fault {
            kind,
            message: error.to_string(),
        });
        if let Some(idle) = state.release() {
            self.emit(SchedulerEvent::State(idle));
        }
    }
}
