//! Error types for bar-core operations.
//!
//! The discovery engine itself degrades instead of failing (see the crate docs);
//! `BarError` covers the boundaries where a caller needs to know something went
//! wrong: loading config, persisting records, spawning activation scripts.

use std::path::PathBuf;

/// All errors that can occur in bar-core operations.
#[derive(Debug, thiserror::Error)]
pub enum BarError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Registration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid session-start input: {0}")]
    InvalidHookInput(String),

    #[error("No {program} process found among the ancestors of pid {start_pid}")]
    OwningSessionNotFound { program: String, start_pid: u32 },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Action Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Command execution failed: {command}: {details}")]
    CommandFailed { command: String, details: String },

    #[error("Unsupported terminal: {0}")]
    UnsupportedTerminal(String),
}

/// Convenience type alias for Results using BarError.
pub type Result<T> = std::result::Result<T, BarError>;

impl BarError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        BarError::Io {
            context: context.into(),
            source,
        }
    }
}
