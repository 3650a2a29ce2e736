//! Continuous-capture recognition.
//!
//! ```text
//! Idle ──start──▶ Sampling ──streak reached──▶ Confirming ──▶ Idle
//!                    │
//!                    └──deadline──▶ Escalating ──outcome──▶ Idle
//! ```
//!
//! `stop` returns to `Idle` from any phase. Consumers follow progress through
//! the [`SchedulerEvent`] stream returned by [`RecognitionScheduler::new`].

mod scheduler;
mod session;

pub use scheduler::{
    RecognitionScheduler, SchedulerConfig, DEFAULT_ESCALATION_TIMEOUT, DEFAULT_REQUIRED_STREAK,
    DEFAULT_SAMPLE_INTERVAL,
};
pub use session::{
    Escalation, FaultKind, Phase, RecognitionSession, SampleVerdict, SchedulerEvent, SessionUpdate,
};
