//! File logging for the CLI.
//!
//! Daily-rolling files under `~/.claude-bar/logs`, written from a background
//! worker so a slow disk never delays a hook or a display refresh. The
//! returned guard must live until `main` returns or buffered lines are lost.

use std::env;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "claude-bar.log";

pub fn init(log_dir: &Path) -> Option<WorkerGuard> {
    // Logging is best-effort: an unwritable log dir must not break the command.
    fs_err::create_dir_all(log_dir).ok()?;

    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;

    Some(guard)
}

fn filter() -> EnvFilter {
    let debug_enabled = env::var("CLAUDE_BAR_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}
