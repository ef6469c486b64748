//! `claude-bar snapshot`: prints the session array as JSON.
//!
//! The daemon's cached snapshot is preferred. When it is unreachable, or with
//! `--local`, this process runs one discovery pass itself.

use crate::daemon_client;
use crate::error::CliError;
use bar_core::{BarConfig, SessionProbe, SessionSnapshot, StorageConfig, SystemProbe};
use chrono::{DateTime, Utc};
use std::path::Path;

pub fn run(local: bool, config: &BarConfig, storage: StorageConfig) -> Result<(), CliError> {
    let socket = storage.socket_path();
    let probe = SystemProbe::from_config(config, storage);
    let snapshot = collect(local, &socket, &probe, Utc::now());
    println!("{}", serde_json::to_string(&snapshot.sessions)?);
    Ok(())
}

fn collect<P: SessionProbe>(
    local: bool,
    socket: &Path,
    probe: &P,
    now: DateTime<Utc>,
) -> SessionSnapshot {
    if !local {
        match daemon_client::fetch_snapshot(socket) {
            Ok(snapshot) => return snapshot,
            Err(err) => {
                tracing::warn!(error = %err, "Daemon unavailable; running a local pass");
            }
        }
    }

    let sessions = probe.poll(None, now);
    tracing::debug!(sessions = sessions.len(), "Local snapshot pass");
    SessionSnapshot {
        sessions,
        computed_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bar_core::{Session, Status, TerminalKind};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProbe {
        passes: AtomicUsize,
    }

    impl SessionProbe for CountingProbe {
        fn poll(&self, previous: Option<&SessionSnapshot>, _now: DateTime<Utc>) -> Vec<Session> {
            assert!(previous.is_none());
            self.passes.fetch_add(1, Ordering::SeqCst);
            vec![Session {
                pid: 12,
                tty: "/dev/ttys001".to_string(),
                cwd: "/Users/test/project".to_string(),
                terminal: TerminalKind::Alacritty,
                host_tty: None,
                transcript: None,
                transcript_mtime: None,
                status: Status::Active,
            }]
        }
    }

    fn probe() -> CountingProbe {
        CountingProbe {
            passes: AtomicUsize::new(0),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn local_flag_skips_the_daemon() {
        let probe = probe();
        let snapshot = collect(true, Path::new("/nonexistent/daemon.sock"), &probe, now());
        assert_eq!(probe.passes.load(Ordering::SeqCst), 1);
        assert_eq!(snapshot.computed_at, now());
        assert_eq!(snapshot.sessions[0].pid, 12);
    }

    #[test]
    fn unreachable_daemon_falls_back_to_local_pass() {
        let dir = tempfile::tempdir().unwrap();
        let probe = probe();
        let snapshot = collect(false, &dir.path().join("daemon.sock"), &probe, now());
        assert_eq!(probe.passes.load(Ordering::SeqCst), 1);
        assert_eq!(snapshot.sessions.len(), 1);
    }

    #[test]
    fn output_is_a_json_array_of_sessions() {
        let snapshot = collect(true, Path::new("/nonexistent"), &probe(), now());
        let value = serde_json::to_value(&snapshot.sessions).unwrap();
        let sessions = value.as_array().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0]["terminal"], "alacritty");
        assert_eq!(sessions[0]["status"], "active");
        assert!(sessions[0]["transcript"].is_null());
    }
}
