//! One discovery pass shared by every observer polling in the same window.
//!
//! [`SessionProbe`] is the composed pass (discover → resolve → match terminal
//! → locate transcript → classify). [`SnapshotCache`] decides when to run it.
//!
//! ## Locking
//!
//! - `snapshot` (RwLock): holds an `Arc<SessionSnapshot>`, swapped wholesale.
//!   Readers clone the Arc and never see a half-built pass.
//! - `refresh_gate` (Mutex): serializes passes. Freshness is re-checked after
//!   acquiring it, so callers that queued behind a pass reuse its result.

use crate::classify::{ClassifierPolicy, StatusPolicy};
use crate::config::BarConfig;
use crate::process::{
    discover, resolve, CwdSource, LsofCwdSource, ProcessSource, PsProcessSource, Resolution,
};
use crate::storage::StorageConfig;
use crate::terminal::{TerminalInventory, TerminalMatcher};
use crate::transcript::{observe, TranscriptLocator};
use chrono::{DateTime, Utc};
use claude_bar_protocol::{Session, SessionSnapshot};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// Produces the current session list. Implementations must not fail; broken
/// OS queries degrade to fewer sessions or default fields.
pub trait SessionProbe: Send + Sync {
    /// `previous` is the last snapshot, used for per-TTY mtime deltas.
    fn poll(&self, previous: Option<&SessionSnapshot>, now: DateTime<Utc>) -> Vec<Session>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// SystemProbe
// ═══════════════════════════════════════════════════════════════════════════════

/// The real pass over `ps`, `lsof`, terminal backends and the transcript store.
pub struct SystemProbe {
    program: String,
    tail_window: u64,
    classifier: ClassifierPolicy,
    processes: Box<dyn ProcessSource>,
    cwds: Box<dyn CwdSource>,
    matcher: TerminalMatcher,
    locator: TranscriptLocator,
}

impl SystemProbe {
    pub fn from_config(config: &BarConfig, storage: StorageConfig) -> Self {
        Self::new(
            config,
            storage,
            Box::new(PsProcessSource),
            Box::new(LsofCwdSource),
            TerminalMatcher::for_kinds(&config.terminals),
        )
    }

    pub fn new(
        config: &BarConfig,
        storage: StorageConfig,
        processes: Box<dyn ProcessSource>,
        cwds: Box<dyn CwdSource>,
        matcher: TerminalMatcher,
    ) -> Self {
        Self {
            program: config.program.clone(),
            tail_window: config.tail_window_bytes,
            classifier: config.classifier(),
            processes,
            cwds,
            matcher,
            locator: TranscriptLocator::new(storage),
        }
    }

    pub fn matcher(&self) -> &TerminalMatcher {
        &self.matcher
    }
}

impl SessionProbe for SystemProbe {
    fn poll(&self, previous: Option<&SessionSnapshot>, now: DateTime<Utc>) -> Vec<Session> {
        let table = self.processes.process_table();
        let resolved: Vec<(u32, String, String)> = discover(&table, &self.program)
            .into_iter()
            .filter_map(|candidate| match resolve(&table, self.cwds.as_ref(), candidate.pid) {
                Resolution::Resolved { tty, cwd } => Some((candidate.pid, tty, cwd)),
                Resolution::Unresolved(reason) => {
                    tracing::trace!(pid = candidate.pid, ?reason, "Skipping candidate");
                    None
                }
            })
            .collect();

        if resolved.is_empty() {
            return Vec::new();
        }

        let inventory = self.matcher.inventory();
        let pass = Pass {
            inventory: &inventory,
            locator: &self.locator,
            classifier: &self.classifier,
            tail_window: self.tail_window,
            active_ttys: resolved.iter().map(|(_, tty, _)| tty.clone()).collect(),
            previous,
            now,
        };

        let mut sessions: Vec<Session> = resolved
            .into_iter()
            .map(|(pid, tty, cwd)| pass.session(pid, tty, cwd))
            .collect();
        sessions.sort_by_key(|session| session.pid);

        tracing::debug!(
            count = sessions.len(),
            policy = self.classifier.name(),
            "Discovery pass complete"
        );
        sessions
    }
}

/// Per-pass inputs shared by every session being assembled.
struct Pass<'a> {
    inventory: &'a TerminalInventory,
    locator: &'a TranscriptLocator,
    classifier: &'a ClassifierPolicy,
    tail_window: u64,
    active_ttys: HashSet<String>,
    previous: Option<&'a SessionSnapshot>,
    now: DateTime<Utc>,
}

impl Pass<'_> {
    fn session(&self, pid: u32, tty: String, cwd: String) -> Session {
        let matched = self.inventory.match_tty(&tty);
        let transcript = self.locator.locate(&tty, &cwd, &self.active_ttys);
        let previous_mtime = self
            .previous
            .and_then(|snapshot| snapshot.find_by_tty(&tty))
            .and_then(|session| session.transcript_mtime);

        let observation = transcript
            .as_deref()
            .and_then(|path| observe(path, previous_mtime, self.now, self.tail_window));
        let status = self.classifier.classify(observation.as_ref());

        Session {
            pid,
            tty,
            cwd,
            terminal: matched.terminal,
            host_tty: matched.host_tty,
            transcript: transcript.map(|path| path.to_string_lossy().to_string()),
            transcript_mtime: observation.map(|observation| observation.context.mtime),
            status,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SnapshotCache
// ═══════════════════════════════════════════════════════════════════════════════

pub struct SnapshotCache<P: SessionProbe> {
    probe: P,
    interval: Duration,
    snapshot: RwLock<Option<Arc<SessionSnapshot>>>,
    refresh_gate: Mutex<()>,
}

impl<P: SessionProbe> SnapshotCache<P> {
    pub fn new(probe: P, interval: Duration) -> Self {
        Self {
            probe,
            interval,
            snapshot: RwLock::new(None),
            refresh_gate: Mutex::new(()),
        }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Last computed snapshot without triggering a pass.
    pub fn current(&self) -> Option<Arc<SessionSnapshot>> {
        // Recover from poisoning: the slot only ever holds a complete Arc.
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns the cached snapshot while it is younger than the interval,
    /// otherwise runs one pass and publishes the result.
    pub fn get_or_refresh(&self, now: DateTime<Utc>) -> Arc<SessionSnapshot> {
        if let Some(snapshot) = self.fresh(now) {
            return snapshot;
        }

        let _gate = self
            .refresh_gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Another caller may have refreshed while we waited.
        if let Some(snapshot) = self.fresh(now) {
            return snapshot;
        }

        let previous = self.current();
        let sessions = self.probe.poll(previous.as_deref(), now);
        let snapshot = Arc::new(SessionSnapshot {
            sessions,
            computed_at: now,
        });

        *self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::clone(&snapshot));
        snapshot
    }

    fn fresh(&self, now: DateTime<Utc>) -> Option<Arc<SessionSnapshot>> {
        let snapshot = self.current()?;
        // Absolute difference so a clock stepping backwards also forces a pass.
        let elapsed = (now - snapshot.computed_at)
            .to_std()
            .or_else(|_| (snapshot.computed_at - now).to_std())
            .unwrap_or(Duration::MAX);
        (elapsed < self.interval).then_some(snapshot)
    }
}
