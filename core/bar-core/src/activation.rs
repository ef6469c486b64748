//! One-shot "bring this session's terminal to the front".

use crate::error::{BarError, Result};
use crate::terminal::{FocusTarget, TerminalMatcher};
use claude_bar_protocol::TerminalKind;

/// Dispatches the focus request to the backend for `terminal`.
///
/// `unknown` is a no-op: there is nothing we know how to raise. A known kind
/// that was not enabled in config is an error.
pub fn activate(
    matcher: &TerminalMatcher,
    terminal: TerminalKind,
    target: &FocusTarget,
) -> Result<()> {
    if terminal == TerminalKind::Unknown {
        tracing::debug!(tty = %target.tty, "Focus skipped for unknown terminal");
        return Ok(());
    }

    let backend = matcher
        .backend(terminal)
        .ok_or_else(|| BarError::UnsupportedTerminal(terminal.to_string()))?;

    tracing::info!(
        terminal = %terminal,
        tty = %target.terminal_tty(),
        "Activating terminal"
    );
    backend.activate(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::test_utils::{FakeBackend, FakeMultiplexer};
    use crate::terminal::TerminalBackend;
    use std::sync::Arc;

    struct Shared(Arc<FakeBackend>);

    impl TerminalBackend for Shared {
        fn kind(&self) -> TerminalKind {
            self.0.kind()
        }

        fn enumerate_ttys(&self) -> Vec<String> {
            self.0.enumerate_ttys()
        }

        fn activate(&self, target: &FocusTarget) -> Result<()> {
            self.0.activate(target)
        }
    }

    fn target() -> FocusTarget {
        FocusTarget {
            tty: "/dev/ttys005".to_string(),
            host_tty: Some("/dev/ttys001".to_string()),
            cwd: "/Users/test/project".to_string(),
        }
    }

    fn matcher(backend: &Arc<FakeBackend>) -> TerminalMatcher {
        TerminalMatcher::new(
            vec![Box::new(Shared(Arc::clone(backend)))],
            Box::new(FakeMultiplexer(vec![])),
        )
    }

    #[test]
    fn dispatches_to_matching_backend() {
        let backend = Arc::new(FakeBackend::new(TerminalKind::ITerm2, &[]));
        activate(&matcher(&backend), TerminalKind::ITerm2, &target()).unwrap();
        assert_eq!(*backend.activated.lock().unwrap(), vec![target()]);
    }

    #[test]
    fn unknown_terminal_is_noop() {
        let backend = Arc::new(FakeBackend::new(TerminalKind::ITerm2, &[]));
        activate(&matcher(&backend), TerminalKind::Unknown, &target()).unwrap();
        assert!(backend.activated.lock().unwrap().is_empty());
    }

    #[test]
    fn disabled_terminal_is_an_error() {
        let backend = Arc::new(FakeBackend::new(TerminalKind::ITerm2, &[]));
        let err = activate(&matcher(&backend), TerminalKind::Alacritty, &target()).unwrap_err();
        assert!(matches!(err, BarError::UnsupportedTerminal(name) if name == "alacritty"));
    }
}
