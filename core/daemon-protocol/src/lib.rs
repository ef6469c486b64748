//! Snapshot and IPC types shared by claude-bar-daemon and its clients.
//!
//! The daemon, the CLI and the engine all use these exact types so the
//! snapshot schema cannot drift between writer and readers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

// ═══════════════════════════════════════════════════════════════════════════════
// Session Snapshot
// ═══════════════════════════════════════════════════════════════════════════════

/// Display status of a single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The assistant is working, or the session just started.
    Active,
    /// A tool call is waiting on the user.
    Pending,
    Idle,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Pending => "pending",
            Status::Idle => "idle",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Status::Active),
            "pending" => Some(Status::Pending),
            "idle" => Some(Status::Idle),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal application that owns a session's TTY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalKind {
    #[serde(rename = "iterm2")]
    ITerm2,
    Alacritty,
    Unknown,
}

impl TerminalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalKind::ITerm2 => "iterm2",
            TerminalKind::Alacritty => "alacritty",
            TerminalKind::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "iterm2" | "iterm" | "iterm.app" => Some(TerminalKind::ITerm2),
            "alacritty" => Some(TerminalKind::Alacritty),
            "unknown" => Some(TerminalKind::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for TerminalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed instance of the monitored program.
///
/// Rebuilt from scratch on every discovery pass. A pid that disappears is
/// simply absent from the next snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub pid: u32,
    pub tty: String,
    pub cwd: String,
    pub terminal: TerminalKind,
    /// Outer terminal TTY when the session runs inside tmux.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_tty: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_mtime: Option<DateTime<Utc>>,
    pub status: Status,
}

/// Result of one discovery pass, ordered by pid ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub sessions: Vec<Session>,
    pub computed_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn find_by_tty(&self, tty: &str) -> Option<&Session> {
        self.sessions.iter().find(|session| session.tty == tty)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Daemon IPC
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    GetSessions,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(method: Method) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            method,
            id: None,
            params: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }

    /// Decodes the `data` of a `get_sessions` response.
    pub fn into_snapshot(self) -> Result<SessionSnapshot, ErrorInfo> {
        if !self.ok {
            return Err(self
                .error
                .unwrap_or_else(|| ErrorInfo::new("unknown_error", "daemon returned ok=false")));
        }
        let data = self
            .data
            .ok_or_else(|| ErrorInfo::new("missing_data", "response carried no data"))?;
        serde_json::from_value(data).map_err(|err| {
            ErrorInfo::new(
                "invalid_snapshot",
                format!("snapshot payload is invalid: {}", err),
            )
        })
    }
}
