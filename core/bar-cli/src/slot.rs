//! `claude-bar slot <N>`: one line-oriented slot for per-slot observers.
//!
//! Menu-bar hosts often run one small plugin per slot. Each call reads the
//! shared hand-off file; whichever caller finds it stale and wins the lock
//! runs the discovery pass for everyone. The slot's status is then
//! re-derived from its live transcript so it never lags the file by a full
//! interval.

use crate::error::CliError;
use bar_core::{
    classify_slot, BarConfig, Handoff, HandoffSlot, HandoffStore, SessionProbe, SessionSnapshot,
    Status, StorageConfig, SystemProbe,
};
use chrono::{DateTime, Utc};
use std::fmt::Write;
use std::time::Duration;

pub fn run(index: usize, config: &BarConfig, storage: StorageConfig) -> Result<(), CliError> {
    let store = HandoffStore::new(&storage);
    let probe = SystemProbe::from_config(config, storage);
    let now = Utc::now();

    let handoff = refresh(&store, &probe, now, config.poll_interval())?;
    if let Some(slot) = handoff.as_ref().and_then(|handoff| handoff.slots.get(index)) {
        let status = classify_slot(slot, now, config.tail_window_bytes);
        print!("{}", render(slot, status));
    }
    Ok(())
}

fn refresh<P: SessionProbe>(
    store: &HandoffStore,
    probe: &P,
    now: DateTime<Utc>,
    interval: Duration,
) -> Result<Option<Handoff>, CliError> {
    let handoff = store.refresh_if_stale(now, interval, |previous| {
        let snapshot = SessionSnapshot {
            sessions: probe.poll(previous.map(Handoff::snapshot).as_ref(), now),
            computed_at: now,
        };
        tracing::debug!(sessions = snapshot.sessions.len(), "Refreshed slot hand-off");
        Handoff::from_snapshot(&snapshot, previous)
    })?;
    Ok(handoff)
}

fn render(slot: &HandoffSlot, status: Status) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "tty={}", slot.tty);
    let _ = writeln!(out, "cwd={}", slot.cwd);
    let _ = writeln!(out, "transcript={}", slot.transcript.as_deref().unwrap_or(""));
    let _ = writeln!(out, "pid={}", slot.pid);
    let _ = writeln!(out, "terminal={}", slot.terminal);
    let _ = writeln!(out, "status={}", status);
    out
}
