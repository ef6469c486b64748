//! SessionStart hook handler.
//!
//! ```bash
//! echo '{"session_id":"abc","transcript_path":"/path/abc.jsonl"}' | claude-bar session-start
//! ```
//!
//! The hook runs as a descendant of the session's process, so the walk up the
//! process tree starts at our parent.

use crate::error::CliError;
use bar_core::process::{CwdSource, LsofCwdSource, ProcessSource, ProcessTable, PsProcessSource};
use bar_core::{register_session_start, BarConfig, HookInput, Registration, StorageConfig};
use chrono::{DateTime, Utc};
use std::io::{self, Read};

pub fn run(config: &BarConfig, storage: &StorageConfig) -> Result<(), CliError> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;

    let table = PsProcessSource.process_table();
    register(
        &input,
        &table,
        &LsofCwdSource,
        parent_pid(),
        &config.program,
        storage,
        Utc::now(),
    )?;
    Ok(())
}

/// Empty input is not an error: the hook may fire with nothing to record.
fn register(
    input: &str,
    table: &ProcessTable,
    cwd_source: &dyn CwdSource,
    start_pid: u32,
    program: &str,
    storage: &StorageConfig,
    now: DateTime<Utc>,
) -> Result<Option<Registration>, CliError> {
    if input.trim().is_empty() {
        tracing::debug!("Empty session-start input; nothing to record");
        return Ok(None);
    }

    let hook_input = HookInput::parse(input)?;
    let registration =
        register_session_start(&hook_input, table, cwd_source, start_pid, program, storage, now)?;
    Ok(Some(registration))
}

fn parent_pid() -> u32 {
    // SAFETY: getppid() has no failure modes; it returns 1 once the parent exits.
    #[allow(unsafe_code)]
    let ppid = unsafe { libc::getppid() };
    ppid as u32
}
