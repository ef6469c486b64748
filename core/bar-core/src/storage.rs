//! Storage configuration and path management for claude-bar.
//!
//! Every path the engine reads or writes is decided here so tests can inject
//! temporary roots with `StorageConfig::with_roots`.

use crate::error::{BarError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const SOCKET_ENV: &str = "CLAUDE_BAR_SOCKET";

/// Central configuration for claude-bar storage paths.
///
/// Production code uses `StorageConfig::from_home()` which points to
/// `~/.claude-bar/` for our own files and `~/.claude/` for Claude Code's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Root directory for claude-bar data (default: ~/.claude-bar)
    root: PathBuf,
    /// Root directory for Claude Code data (default: ~/.claude)
    claude_root: PathBuf,
}

impl StorageConfig {
    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir().ok_or(BarError::HomeDirNotFound)?;
        Ok(Self {
            root: home.join(".claude-bar"),
            claude_root: home.join(".claude"),
        })
    }

    /// Creates a StorageConfig with both roots overridden.
    pub fn with_roots(root: PathBuf, claude_root: PathBuf) -> Self {
        Self { root, claude_root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Global Files
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Daemon socket; `CLAUDE_BAR_SOCKET` overrides the default location.
    pub fn socket_path(&self) -> PathBuf {
        match std::env::var(SOCKET_ENV) {
            Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
            _ => self.root.join("daemon.sock"),
        }
    }

    /// Key/value slot hand-off read by per-slot observers.
    pub fn handoff_file(&self) -> PathBuf {
        self.root.join("slots.kv")
    }

    /// Cross-process refresh gate for the hand-off.
    pub fn handoff_lock_file(&self) -> PathBuf {
        self.root.join("slots.lock")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Per-Project Paths
    // ─────────────────────────────────────────────────────────────────────────────

    /// Directory holding session-start records for one working directory.
    /// Example: ~/.claude-bar/sessions/-Users-pete-Code-my-project/
    pub fn state_dir_for_cwd(&self, cwd: &str) -> PathBuf {
        self.root.join("sessions").join(Self::encode_path(cwd))
    }

    /// Directory where Claude Code writes transcripts for a working directory.
    /// Example: ~/.claude/projects/-Users-pete-Code-my-project/
    pub fn transcript_dir_for_cwd(&self, cwd: &str) -> PathBuf {
        self.claude_root
            .join("projects")
            .join(Self::encode_path(cwd))
    }

    /// Encodes a path the way Claude Code names its project directories.
    pub fn encode_path(path: &str) -> String {
        path.replace(['/', '_', '.'], "-")
    }
}

/// Writes `contents` via a sibling temp file and rename, creating the parent
/// directory if needed. Readers see either the old file or the new one.
pub(crate) fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs_err::create_dir_all(dir)
        .map_err(|e| BarError::io(format!("creating directory {}", dir.display()), e))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| BarError::io(format!("creating temp file in {}", dir.display()), e))?;

    tmp.write_all(contents.as_bytes())
        .map_err(|e| BarError::io(format!("writing temp file for {}", path.display()), e))?;

    tmp.flush()
        .map_err(|e| BarError::io(format!("flushing temp file for {}", path.display()), e))?;

    tmp.persist(path).map_err(|e| {
        BarError::io(format!("persisting temp file to {}", path.display()), e.error)
    })?;

    Ok(())
}
