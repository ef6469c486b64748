//! Slot hand-off: a flat key/value file other observers read instead of
//! running discovery themselves.
//!
//! ```text
//! count=2
//! written_at=2026-03-01T12:00:00Z
//! slot.0.tty=/dev/ttys000
//! slot.0.cwd=/Users/me/proj
//! slot.0.transcript=/Users/me/.claude/projects/-Users-me-proj/abc.jsonl
//! slot.0.mtime=2026-03-01T11:59:58Z
//! slot.0.previous_mtime=
//! slot.0.pid=123
//! slot.0.terminal=iterm2
//! slot.0.status=active
//! ```
//!
//! The file is replaced atomically. A reader that finds it missing, or finds
//! any expected key missing or malformed, sees no sessions.

use crate::classify::{MtimeDeltaPolicy, StatusPolicy};
use crate::error::{BarError, Result};
use crate::storage::{atomic_write, StorageConfig};
use crate::transcript::observe;
use chrono::{DateTime, SecondsFormat, Utc};
use claude_bar_protocol::{Session, SessionSnapshot, Status, TerminalKind};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A lock file older than this is assumed to belong to a crashed writer.
pub const LOCK_STALE_AFTER: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffSlot {
    pub tty: String,
    pub cwd: String,
    pub transcript: Option<String>,
    pub mtime: Option<DateTime<Utc>>,
    pub previous_mtime: Option<DateTime<Utc>>,
    pub pid: u32,
    pub terminal: TerminalKind,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handoff {
    pub written_at: DateTime<Utc>,
    pub slots: Vec<HandoffSlot>,
}

impl Handoff {
    /// Slots in snapshot order. `previous` supplies each TTY's prior mtime.
    pub fn from_snapshot(snapshot: &SessionSnapshot, previous: Option<&Handoff>) -> Self {
        let slots = snapshot
            .sessions
            .iter()
            .map(|session| HandoffSlot {
                tty: session.tty.clone(),
                cwd: session.cwd.clone(),
                transcript: session.transcript.clone(),
                mtime: session.transcript_mtime,
                previous_mtime: previous
                    .and_then(|handoff| handoff.slot_by_tty(&session.tty))
                    .and_then(|slot| slot.mtime),
                pid: session.pid,
                terminal: session.terminal,
                status: session.status,
            })
            .collect();
        Self {
            written_at: snapshot.computed_at,
            slots,
        }
    }

    /// The hand-off viewed as a snapshot, for feeding back into a pass.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            sessions: self
                .slots
                .iter()
                .map(|slot| Session {
                    pid: slot.pid,
                    tty: slot.tty.clone(),
                    cwd: slot.cwd.clone(),
                    terminal: slot.terminal,
                    host_tty: None,
                    transcript: slot.transcript.clone(),
                    transcript_mtime: slot.mtime,
                    status: slot.status,
                })
                .collect(),
            computed_at: self.written_at,
        }
    }

    pub fn slot_by_tty(&self, tty: &str) -> Option<&HandoffSlot> {
        self.slots.iter().find(|slot| slot.tty == tty)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "count={}", self.slots.len());
        let _ = writeln!(out, "written_at={}", timestamp(Some(self.written_at)));
        for (index, slot) in self.slots.iter().enumerate() {
            let mut field = |key: &str, value: &str| {
                let _ = writeln!(out, "slot.{}.{}={}", index, key, sanitize(value));
            };
            field("tty", &slot.tty);
            field("cwd", &slot.cwd);
            field("transcript", slot.transcript.as_deref().unwrap_or(""));
            field("mtime", &timestamp(slot.mtime));
            field("previous_mtime", &timestamp(slot.previous_mtime));
            field("pid", &slot.pid.to_string());
            field("terminal", slot.terminal.as_str());
            field("status", slot.status.as_str());
        }
        out
    }

    /// `None` for anything incomplete: missing `count`, a missing slot key,
    /// or a value that does not parse.
    pub fn parse(content: &str) -> Option<Self> {
        let pairs: HashMap<&str, &str> = content
            .lines()
            .filter_map(|line| line.split_once('='))
            .collect();

        let count: usize = pairs.get("count")?.trim().parse().ok()?;
        let written_at = parse_timestamp(pairs.get("written_at")?)??;

        let slots = (0..count)
            .map(|index| {
                let get = |key: &str| pairs.get(format!("slot.{}.{}", index, key).as_str()).copied();
                let transcript = get("transcript")?;
                Some(HandoffSlot {
                    tty: get("tty")?.to_string(),
                    cwd: get("cwd")?.to_string(),
                    transcript: (!transcript.is_empty()).then(|| transcript.to_string()),
                    mtime: parse_timestamp(get("mtime")?)?,
                    previous_mtime: parse_timestamp(get("previous_mtime")?)?,
                    pid: get("pid")?.parse().ok()?,
                    terminal: TerminalKind::parse(get("terminal")?)?,
                    status: Status::parse(get("status")?)?,
                })
            })
            .collect::<Option<Vec<_>>>()?;

        Some(Self { written_at, slots })
    }

    fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.written_at)
            .to_std()
            .or_else(|_| (self.written_at - now).to_std())
            .unwrap_or(Duration::MAX)
    }
}

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Nanos, true))
        .unwrap_or_default()
}

/// Outer `None`: malformed. Inner `None`: empty field.
fn parse_timestamp(value: &str) -> Option<Option<DateTime<Utc>>> {
    if value.is_empty() {
        return Some(None);
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|at| Some(at.with_timezone(&Utc)))
}

fn sanitize(value: &str) -> String {
    value.replace(['\n', '\r'], " ")
}

/// Reclassifies one slot from its live transcript with the mtime-delta policy.
pub fn classify_slot(slot: &HandoffSlot, now: DateTime<Utc>, tail_window: u64) -> Status {
    let observation = slot
        .transcript
        .as_deref()
        .and_then(|path| observe(Path::new(path), slot.previous_mtime, now, tail_window));
    MtimeDeltaPolicy.classify(observation.as_ref())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Store
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct HandoffStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl HandoffStore {
    pub fn new(storage: &StorageConfig) -> Self {
        Self {
            path: storage.handoff_file(),
            lock_path: storage.handoff_lock_file(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, handoff: &Handoff) -> Result<()> {
        atomic_write(&self.path, &handoff.render())?;
        tracing::debug!(slots = handoff.slots.len(), "Wrote slot hand-off");
        Ok(())
    }

    /// Current hand-off, or `None` when absent or incomplete.
    pub fn read(&self) -> Option<Handoff> {
        let content = fs_err::read_to_string(&self.path).ok()?;
        let handoff = Handoff::parse(&content);
        if handoff.is_none() {
            tracing::debug!(path = %self.path.display(), "Ignoring incomplete hand-off");
        }
        handoff
    }

    /// Returns the stored hand-off while it is younger than `interval`.
    /// Otherwise the caller that wins the lock file runs `pass` and publishes
    /// its result; callers that lose read whatever is on disk.
    pub fn refresh_if_stale<F>(
        &self,
        now: DateTime<Utc>,
        interval: Duration,
        pass: F,
    ) -> Result<Option<Handoff>>
    where
        F: FnOnce(Option<&Handoff>) -> Handoff,
    {
        let current = self.read();
        if is_fresh(current.as_ref(), now, interval) {
            return Ok(current);
        }

        let Some(_lock) = self.try_lock(now)? else {
            tracing::debug!("Hand-off refresh in progress elsewhere");
            return Ok(current);
        };

        self.refresh_locked(now, interval, pass)
    }

    /// Runs with the lock held. Another writer may have published between
    /// our first read and acquiring the lock, so freshness is checked again.
    fn refresh_locked<F>(
        &self,
        now: DateTime<Utc>,
        interval: Duration,
        pass: F,
    ) -> Result<Option<Handoff>>
    where
        F: FnOnce(Option<&Handoff>) -> Handoff,
    {
        let current = self.read();
        if is_fresh(current.as_ref(), now, interval) {
            tracing::debug!("Hand-off refreshed by another writer");
            return Ok(current);
        }

        let fresh = pass(current.as_ref());
        self.write(&fresh)?;
        Ok(Some(fresh))
    }

    fn try_lock(&self, now: DateTime<Utc>) -> Result<Option<LockGuard>> {
        if let Some(parent) = self.lock_path.parent() {
            fs_err::create_dir_all(parent)
                .map_err(|e| BarError::io(format!("creating {}", parent.display()), e))?;
        }

        let token = lock_token();
        for _ in 0..2 {
            match fs_err::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.lock_path)
            {
                Ok(mut file) => {
                    // The guard owns the file from here, so a failed token
                    // write still releases it on drop.
                    let guard = LockGuard {
                        path: self.lock_path.clone(),
                        token: token.clone(),
                    };
                    file.write_all(token.as_bytes()).map_err(|e| {
                        BarError::io(format!("writing lock {}", self.lock_path.display()), e)
                    })?;
                    return Ok(Some(guard));
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if !self.lock_is_stale(now) {
                        return Ok(None);
                    }
                    tracing::warn!(path = %self.lock_path.display(), "Removing stale hand-off lock");
                    let _ = fs_err::remove_file(&self.lock_path);
                }
                Err(err) => {
                    return Err(BarError::io(
                        format!("creating lock {}", self.lock_path.display()),
                        err,
                    ))
                }
            }
        }
        Ok(None)
    }

    fn lock_is_stale(&self, now: DateTime<Utc>) -> bool {
        let Some(modified) = fs_err::metadata(&self.lock_path)
            .ok()
            .and_then(|meta| meta.modified().ok())
        else {
            // Vanished between create_new and stat: retry.
            return true;
        };
        let age = (now - DateTime::<Utc>::from(modified))
            .to_std()
            .unwrap_or(Duration::ZERO);
        age >= LOCK_STALE_AFTER
    }
}

fn is_fresh(handoff: Option<&Handoff>, now: DateTime<Utc>, interval: Duration) -> bool {
    handoff.is_some_and(|handoff| handoff.age(now) < interval)
}

/// `<pid>-<random>`: distinguishes writers across and within processes.
fn lock_token() -> String {
    format!("{}-{:016x}", std::process::id(), rand::random::<u64>())
}

/// Removes the lock file on drop, but only while it still carries our token.
/// A writer that outlived `LOCK_STALE_AFTER` must not release a lock that
/// someone else has since taken over.
struct LockGuard {
    path: PathBuf,
    token: String,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match fs_err::read_to_string(&self.path) {
            Ok(content) if content == self.token => {
                let _ = fs_err::remove_file(&self.path);
            }
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "Hand-off lock was taken over; leaving it");
            }
            Err(_) => {}
        }
    }
}
