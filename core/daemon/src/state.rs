//! State shared between the refresher thread and connection handlers.
//!
//! The snapshot cache is the only session state. The refresher keeps it warm
//! and mirrors each new pass to the slot hand-off; handlers read through the
//! same cache, so a request arriving just after a tick never forces a second
//! pass.

use bar_core::{Handoff, HandoffStore, SessionProbe, SessionSnapshot, SnapshotCache};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub struct SharedState<P: SessionProbe> {
    cache: SnapshotCache<P>,
    handoff: Option<HandoffStore>,
    last_handoff: Mutex<Option<Handoff>>,
    started_at: DateTime<Utc>,
}

impl<P: SessionProbe> SharedState<P> {
    pub fn new(cache: SnapshotCache<P>, handoff: Option<HandoffStore>) -> Self {
        Self {
            cache,
            handoff,
            last_handoff: Mutex::new(None),
            started_at: Utc::now(),
        }
    }

    pub fn sessions_snapshot(&self, now: DateTime<Utc>) -> Arc<SessionSnapshot> {
        self.cache.get_or_refresh(now)
    }

    pub fn poll_interval(&self) -> Duration {
        self.cache.interval()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn last_computed_at(&self) -> Option<DateTime<Utc>> {
        self.cache.current().map(|snapshot| snapshot.computed_at)
    }

    /// One refresher tick: refresh if due, then publish the hand-off when the
    /// snapshot is new. Returns how long to wait before the next tick so the
    /// cadence counts from the start of each pass, not its end.
    pub fn tick(&self, now: DateTime<Utc>) -> Duration {
        let started = Instant::now();
        let snapshot = self.cache.get_or_refresh(now);
        self.publish(&snapshot);
        self.poll_interval().saturating_sub(started.elapsed())
    }

    fn publish(&self, snapshot: &SessionSnapshot) {
        let Some(store) = &self.handoff else {
            return;
        };

        // Recover from poisoning: the slot only ever holds a complete hand-off.
        let mut last = self
            .last_handoff
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if last
            .as_ref()
            .is_some_and(|handoff| handoff.written_at == snapshot.computed_at)
        {
            return;
        }

        let handoff = Handoff::from_snapshot(snapshot, last.as_ref());
        match store.write(&handoff) {
            Ok(()) => *last = Some(handoff),
            Err(err) => tracing::warn!(error = %err, "Failed to write slot hand-off"),
        }
    }
}
