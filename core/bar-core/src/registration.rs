//! Session-start registration.
//!
//! The assistant's `SessionStart` hook pipes a small JSON document to
//! `claude-bar session-start`. We find which session (TTY) the hook belongs
//! to by walking up the process tree from the hook's parent, then record the
//! transcript path for that TTY so the locator never has to guess.

use crate::error::{BarError, Result};
use crate::process::{find_owning_session, CwdSource, ProcessTable};
use crate::storage::StorageConfig;
use crate::transcript::{SessionStartRecord, TranscriptLocator};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HookInput {
    pub session_id: String,
    pub transcript_path: String,
    #[serde(default)]
    pub cwd: Option<String>,
}

impl HookInput {
    pub fn parse(input: &str) -> Result<Self> {
        let parsed: HookInput = serde_json::from_str(input.trim())
            .map_err(|err| BarError::InvalidHookInput(err.to_string()))?;
        if parsed.session_id.is_empty() || parsed.transcript_path.is_empty() {
            return Err(BarError::InvalidHookInput(
                "session_id and transcript_path must not be empty".to_string(),
            ));
        }
        Ok(parsed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub pid: u32,
    pub tty: String,
    pub cwd: String,
    pub record_path: PathBuf,
}

/// Writes the session-start record for the session owning `start_pid`.
///
/// The working directory is taken from the owning process when readable, so
/// it matches what discovery will see; the hook's `cwd` field is the fallback.
pub fn register_session_start(
    input: &HookInput,
    table: &ProcessTable,
    cwd_source: &dyn CwdSource,
    start_pid: u32,
    program: &str,
    storage: &StorageConfig,
    now: DateTime<Utc>,
) -> Result<Registration> {
    let (pid, tty) = find_owning_session(table, start_pid, program).ok_or_else(|| {
        BarError::OwningSessionNotFound {
            program: program.to_string(),
            start_pid,
        }
    })?;

    let cwd = cwd_source
        .cwd(pid)
        .or_else(|| input.cwd.clone())
        .unwrap_or_default();

    let record = SessionStartRecord {
        session_id: input.session_id.clone(),
        transcript_path: input.transcript_path.clone(),
        recorded_at: Some(now),
    };
    let record_path = TranscriptLocator::new(storage.clone()).write_record(&cwd, &tty, &record)?;

    tracing::info!(
        pid,
        tty = %tty,
        session_id = %input.session_id,
        "Registered session start"
    );

    Ok(Registration {
        pid,
        tty,
        cwd,
        record_path,
    })
}
