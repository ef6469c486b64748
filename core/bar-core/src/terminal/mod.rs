//! Terminal matching: which terminal application owns a session's TTY.
//!
//! Each supported terminal is a [`TerminalBackend`] with two capabilities,
//! enumerating the TTYs it owns and activating one of them. Add a terminal by
//! adding a backend, not by branching on names.
//!
//! Backends are tried in a fixed priority order. Sessions inside tmux are
//! matched through the tmux client's TTY so the multiplexer stays transparent.

mod alacritty;
mod iterm;
mod tmux;

pub use alacritty::{parse_lsof_ttys, AlacrittyBackend};
pub use iterm::{parse_iterm2_output, ITerm2Backend};
pub use tmux::{host_tty_map, TmuxSource};

use crate::error::Result;
use claude_bar_protocol::TerminalKind;
use std::collections::{HashMap, HashSet};

/// What a focus request needs to find the right window or tab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusTarget {
    pub tty: String,
    pub host_tty: Option<String>,
    pub cwd: String,
}

impl FocusTarget {
    /// The TTY the outer terminal knows about.
    pub fn terminal_tty(&self) -> &str {
        self.host_tty.as_deref().unwrap_or(&self.tty)
    }
}

/// Capability interface implemented once per supported terminal application.
pub trait TerminalBackend: Send + Sync {
    fn kind(&self) -> TerminalKind;

    /// TTYs currently owned by this terminal. Empty when the terminal is not
    /// running or cannot be queried.
    fn enumerate_ttys(&self) -> Vec<String>;

    /// Brings the window/tab owning the target to the foreground.
    /// Fire-and-forget: returns once the request has been dispatched.
    fn activate(&self, target: &FocusTarget) -> Result<()>;
}

/// Maps multiplexer pane TTYs to the TTY of the outer terminal client.
pub trait MultiplexerSource: Send + Sync {
    fn host_ttys(&self) -> HashMap<String, String>;
}

/// TTY inventories of every backend, in priority order.
#[derive(Debug, Clone, Default)]
pub struct TerminalInventory {
    entries: Vec<(TerminalKind, HashSet<String>)>,
    host_ttys: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalMatch {
    pub terminal: TerminalKind,
    /// Set when the TTY belongs to a multiplexer pane.
    pub host_tty: Option<String>,
}

impl TerminalInventory {
    pub fn new(
        entries: Vec<(TerminalKind, Vec<String>)>,
        host_ttys: HashMap<String, String>,
    ) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(kind, ttys)| (kind, ttys.into_iter().collect()))
                .collect(),
            host_ttys,
        }
    }

    fn owner_of(&self, tty: &str) -> Option<TerminalKind> {
        self.entries
            .iter()
            .find(|(_, ttys)| ttys.contains(tty))
            .map(|(kind, _)| *kind)
    }

    /// First backend owning the TTY directly, else the owner of its tmux
    /// client, else `unknown`.
    pub fn match_tty(&self, tty: &str) -> TerminalMatch {
        if let Some(terminal) = self.owner_of(tty) {
            return TerminalMatch {
                terminal,
                host_tty: None,
            };
        }
        if let Some(host) = self.host_ttys.get(tty) {
            return TerminalMatch {
                terminal: self.owner_of(host).unwrap_or(TerminalKind::Unknown),
                host_tty: Some(host.clone()),
            };
        }
        TerminalMatch {
            terminal: TerminalKind::Unknown,
            host_tty: None,
        }
    }
}

/// Owns the backends and the multiplexer source.
pub struct TerminalMatcher {
    backends: Vec<Box<dyn TerminalBackend>>,
    multiplexer: Box<dyn MultiplexerSource>,
}

impl TerminalMatcher {
    pub fn new(
        backends: Vec<Box<dyn TerminalBackend>>,
        multiplexer: Box<dyn MultiplexerSource>,
    ) -> Self {
        Self {
            backends,
            multiplexer,
        }
    }

    /// Built-in backends for the given kinds (priority = list order), with tmux
    /// lookup enabled. `unknown` and duplicates are ignored.
    pub fn for_kinds(kinds: &[TerminalKind]) -> Self {
        let mut seen = HashSet::new();
        let backends = kinds
            .iter()
            .filter(|kind| seen.insert(**kind))
            .filter_map(|kind| backend_for(*kind))
            .collect();
        Self::new(backends, Box::new(TmuxSource))
    }

    pub fn backend(&self, kind: TerminalKind) -> Option<&dyn TerminalBackend> {
        self.backends
            .iter()
            .find(|backend| backend.kind() == kind)
            .map(|backend| backend.as_ref())
    }

    /// Queries every backend and the multiplexer concurrently.
    pub fn inventory(&self) -> TerminalInventory {
        std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .backends
                .iter()
                .map(|backend| {
                    scope.spawn(move || (backend.kind(), backend.enumerate_ttys()))
                })
                .collect();
            let host_ttys = scope.spawn(|| self.multiplexer.host_ttys());

            let entries = handles
                .into_iter()
                .zip(self.backends.iter())
                .map(|(handle, backend)| {
                    handle.join().unwrap_or_else(|_| {
                        tracing::warn!(terminal = %backend.kind(), "Terminal enumeration panicked");
                        (backend.kind(), Vec::new())
                    })
                })
                .collect();
            let host_ttys = host_ttys.join().unwrap_or_default();

            TerminalInventory::new(entries, host_ttys)
        })
    }
}

fn backend_for(kind: TerminalKind) -> Option<Box<dyn TerminalBackend>> {
    match kind {
        TerminalKind::ITerm2 => Some(Box::new(ITerm2Backend)),
        TerminalKind::Alacritty => Some(Box::new(AlacrittyBackend)),
        TerminalKind::Unknown => None,
    }
}

/// Quotes a value for embedding in an AppleScript string literal.
pub(crate) fn applescript_quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// Dispatches an AppleScript without waiting for it to finish.
pub(crate) fn spawn_osascript(script: &str) -> Result<()> {
    std::process::Command::new("osascript")
        .arg("-e")
        .arg(script)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map(|_| ())
        .map_err(|err| crate::error::BarError::CommandFailed {
            command: "osascript".to_string(),
            details: err.to_string(),
        })
}
