//! Status classification policies.
//!
//! Classification is a pure function of an [`Observation`]: no I/O, no clock
//! reads. `None` means no transcript could be resolved for the session.
//!
//! Two policies ship:
//!
//! - [`ContentAgePolicy`] (default) combines what the transcript tail says with
//!   how long ago it was written.
//! - [`MtimeDeltaPolicy`] only asks whether the file changed since the previous
//!   poll. Cheaper, and what the slot reader uses.

use crate::transcript::{LastRole, TranscriptTailSummary};
use chrono::{DateTime, Utc};
use claude_bar_protocol::Status;
use std::time::Duration;

/// Timing facts about a transcript at observation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationContext {
    pub mtime: DateTime<Utc>,
    /// The mtime seen on the previous poll of the same TTY, if any.
    pub previous_mtime: Option<DateTime<Utc>>,
    /// `now - mtime`, clamped at zero.
    pub age: Duration,
}

impl ClassificationContext {
    pub fn new(
        mtime: DateTime<Utc>,
        previous_mtime: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        let age = (now - mtime).to_std().unwrap_or(Duration::ZERO);
        Self {
            mtime,
            previous_mtime,
            age,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub summary: TranscriptTailSummary,
    pub context: ClassificationContext,
}

pub trait StatusPolicy {
    fn name(&self) -> &'static str;
    fn classify(&self, observation: Option<&Observation>) -> Status;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentAgePolicy {
    /// Tool calls younger than this are assumed to be auto-approved.
    pub pending_grace: Duration,
    /// Any write younger than this counts as activity.
    pub recent_activity: Duration,
    /// Pending or mid-processing states older than this are considered abandoned.
    pub stale_after: Duration,
}

impl Default for ContentAgePolicy {
    fn default() -> Self {
        Self {
            pending_grace: Duration::from_secs(3),
            recent_activity: Duration::from_secs(10),
            stale_after: Duration::from_secs(120),
        }
    }
}

impl StatusPolicy for ContentAgePolicy {
    fn name(&self) -> &'static str {
        "content_age"
    }

    fn classify(&self, observation: Option<&Observation>) -> Status {
        let Some(observation) = observation else {
            return Status::Active;
        };
        let age = observation.context.age;
        let summary = &observation.summary;

        if summary.has_unanswered_tool_call && age >= self.pending_grace {
            return if age < self.stale_after {
                Status::Pending
            } else {
                Status::Idle
            };
        }
        if age < self.recent_activity {
            return Status::Active;
        }
        if summary.last_role == LastRole::User {
            return if age < self.stale_after {
                Status::Active
            } else {
                Status::Idle
            };
        }
        Status::Idle
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MtimeDeltaPolicy;

impl StatusPolicy for MtimeDeltaPolicy {
    fn name(&self) -> &'static str {
        "mtime_delta"
    }

    fn classify(&self, observation: Option<&Observation>) -> Status {
        let Some(observation) = observation else {
            return Status::Active;
        };
        if observation.context.previous_mtime != Some(observation.context.mtime) {
            return Status::Active;
        }
        if observation.summary.has_unanswered_tool_call {
            Status::Pending
        } else {
            Status::Idle
        }
    }
}

/// The configured policy, chosen at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifierPolicy {
    ContentAge(ContentAgePolicy),
    MtimeDelta,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        ClassifierPolicy::ContentAge(ContentAgePolicy::default())
    }
}

impl StatusPolicy for ClassifierPolicy {
    fn name(&self) -> &'static str {
        match self {
            ClassifierPolicy::ContentAge(policy) => policy.name(),
            ClassifierPolicy::MtimeDelta => MtimeDeltaPolicy.name(),
        }
    }

    fn classify(&self, observation: Option<&Observation>) -> Status {
        match self {
            ClassifierPolicy::ContentAge(policy) => policy.classify(observation),
            ClassifierPolicy::MtimeDelta => MtimeDeltaPolicy.classify(observation),
        }
    }
}
