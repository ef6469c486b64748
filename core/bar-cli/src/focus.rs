//! `claude-bar focus`: raise the terminal that owns a session.

use crate::error::CliError;
use bar_core::{activate, BarConfig, FocusTarget, TerminalKind, TerminalMatcher};

pub fn run(
    terminal: &str,
    tty: String,
    host_tty: Option<String>,
    cwd: String,
    config: &BarConfig,
) -> Result<(), CliError> {
    let kind = parse_terminal(terminal)?;
    let target = FocusTarget {
        tty,
        host_tty: host_tty.filter(|value| !value.is_empty()),
        cwd,
    };
    let matcher = TerminalMatcher::for_kinds(&config.terminals);
    activate(&matcher, kind, &target)?;
    Ok(())
}

fn parse_terminal(name: &str) -> Result<TerminalKind, CliError> {
    TerminalKind::parse(name).ok_or_else(|| CliError::UnknownTerminal(name.to_string()))
}
