//! Process discovery and TTY resolution.
//!
//! One `ps` call per pass produces a [`ProcessTable`]; everything after that
//! (filtering candidates, resolving TTYs, walking ancestors) is a pure function
//! over the table so it can be tested without spawning real OS queries.

use std::collections::HashMap;
use std::process::Command;

// ═══════════════════════════════════════════════════════════════════════════════
// Process Table
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRow {
    pub pid: u32,
    pub ppid: u32,
    /// Controlling terminal as `/dev/...`, `None` when detached.
    pub tty: Option<String>,
    pub command: String,
}

/// Snapshot of the OS process table keyed by pid.
#[derive(Debug, Clone, Default)]
pub struct ProcessTable {
    rows: HashMap<u32, ProcessRow>,
}

impl ProcessTable {
    pub fn from_rows(rows: impl IntoIterator<Item = ProcessRow>) -> Self {
        Self {
            rows: rows.into_iter().map(|row| (row.pid, row)).collect(),
        }
    }

    /// Parses `ps -axo pid=,ppid=,tty=,comm=` output. Unparseable lines are skipped.
    pub fn parse_ps_output(output: &str) -> Self {
        let rows = output.lines().filter_map(|line| {
            let mut fields = line.split_whitespace();
            let pid = fields.next()?.parse::<u32>().ok()?;
            let ppid = fields.next()?.parse::<u32>().ok()?;
            let tty = normalize_tty(fields.next()?);
            let command = fields.collect::<Vec<_>>().join(" ");
            if command.is_empty() {
                return None;
            }
            Some(ProcessRow {
                pid,
                ppid,
                tty,
                command,
            })
        });
        Self::from_rows(rows)
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessRow> {
        self.rows.get(&pid)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &ProcessRow> {
        self.rows.values()
    }
}

/// Maps a raw `ps` tty column to a device path. `??`, `?` and `-` mean detached.
pub fn normalize_tty(raw: &str) -> Option<String> {
    let tty = raw.trim();
    if tty.is_empty() || matches!(tty, "??" | "?" | "-") {
        return None;
    }
    if tty.starts_with("/dev/") {
        Some(tty.to_string())
    } else {
        Some(format!("/dev/{}", tty))
    }
}

/// Exact command-name match on the executable's basename.
pub fn command_matches(command: &str, program: &str) -> bool {
    let name = command.rsplit('/').next().unwrap_or(command);
    name == program
}

// ═══════════════════════════════════════════════════════════════════════════════
// Sources
// ═══════════════════════════════════════════════════════════════════════════════

/// Supplies the process table for one pass.
pub trait ProcessSource: Send + Sync {
    /// Returns an empty table when the OS query fails.
    fn process_table(&self) -> ProcessTable;
}

/// Supplies a process's working directory.
pub trait CwdSource: Send + Sync {
    fn cwd(&self, pid: u32) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct PsProcessSource;

impl ProcessSource for PsProcessSource {
    fn process_table(&self) -> ProcessTable {
        match command_stdout("ps", &["-axo", "pid=,ppid=,tty=,comm="]) {
            Some(output) => ProcessTable::parse_ps_output(&output),
            None => ProcessTable::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LsofCwdSource;

impl CwdSource for LsofCwdSource {
    fn cwd(&self, pid: u32) -> Option<String> {
        let pid = pid.to_string();
        let output = command_stdout("lsof", &["-a", "-p", &pid, "-d", "cwd", "-Fn"])?;
        parse_lsof_cwd(&output)
    }
}

/// Extracts the path of the `fcwd` entry from `lsof -Fn` output.
pub fn parse_lsof_cwd(output: &str) -> Option<String> {
    let mut in_cwd = false;
    for line in output.lines() {
        if let Some(descriptor) = line.strip_prefix('f') {
            in_cwd = descriptor == "cwd";
            continue;
        }
        if in_cwd {
            if let Some(path) = line.strip_prefix('n') {
                return Some(path.to_string());
            }
        }
    }
    None
}

/// Runs a command and returns its stdout, or `None` if it could not be spawned
/// or exited non-zero.
pub(crate) fn command_stdout(program: &str, args: &[&str]) -> Option<String> {
    match Command::new(program).args(args).output() {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).to_string())
        }
        Ok(output) => {
            tracing::debug!(
                program,
                status = ?output.status.code(),
                "Command exited unsuccessfully"
            );
            None
        }
        Err(err) => {
            tracing::debug!(program, error = %err, "Command unavailable");
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Discovery + Resolution
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub pid: u32,
    pub parent_pid: u32,
}

/// Every process whose command name is exactly `program`, sorted by pid.
pub fn discover(table: &ProcessTable, program: &str) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = table
        .rows()
        .filter(|row| command_matches(&row.command, program))
        .map(|row| Candidate {
            pid: row.pid,
            parent_pid: row.ppid,
        })
        .collect();
    candidates.sort_by_key(|candidate| candidate.pid);
    candidates
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved { tty: String, cwd: String },
    Unresolved(UnresolvedReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The pid is no longer in the table.
    Exited,
    NoControllingTerminal,
}

/// Looks up a candidate's controlling terminal and working directory.
///
/// An unreadable cwd yields an empty string; only a missing process or a
/// missing terminal makes the candidate unresolved.
pub fn resolve(table: &ProcessTable, cwd_source: &dyn CwdSource, pid: u32) -> Resolution {
    let Some(row) = table.get(pid) else {
        return Resolution::Unresolved(UnresolvedReason::Exited);
    };
    let Some(tty) = row.tty.clone() else {
        return Resolution::Unresolved(UnresolvedReason::NoControllingTerminal);
    };
    let cwd = cwd_source.cwd(pid).unwrap_or_default();
    Resolution::Resolved { tty, cwd }
}

/// Walks parent links from `start_pid` to the nearest `program` process that
/// has a TTY. Returns `(pid, tty)`.
pub fn find_owning_session(
    table: &ProcessTable,
    start_pid: u32,
    program: &str,
) -> Option<(u32, String)> {
    let mut pid = start_pid;
    // Bounded by the table size so a corrupted parent cycle cannot spin forever.
    for _ in 0..=table.len() {
        if pid <= 1 {
            return None;
        }
        let row = table.get(pid)?;
        if command_matches(&row.command, program) {
            return row.tty.clone().map(|tty| (pid, tty));
        }
        pid = row.ppid;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pid: u32, ppid: u32, tty: Option<&str>, command: &str) -> ProcessRow {
        ProcessRow {
            pid,
            ppid,
            tty: tty.map(str::to_string),
            command: command.to_string(),
        }
    }

    struct FixedCwd(Option<&'static str>);

    impl CwdSource for FixedCwd {
        fn cwd(&self, _pid: u32) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    #[test]
    fn parse_ps_output_reads_rows() {
        let output = "    1     0 ??       /sbin/launchd\n\
                      50     1 ttys000  claude\n\
                      77    50 ttys000  /bin/zsh\n\
                      90     1 ??       Google Chrome Helper\n\
                      garbage line\n";
        let table = ProcessTable::parse_ps_output(output);
        assert_eq!(table.len(), 4);
        assert_eq!(table.get(50).unwrap().tty.as_deref(), Some("/dev/ttys000"));
        assert_eq!(table.get(1).unwrap().tty, None);
        assert_eq!(table.get(90).unwrap().command, "Google Chrome Helper");
    }

    #[test]
    fn normalize_tty_handles_platform_sentinels() {
        assert_eq!(normalize_tty("ttys042"), Some("/dev/ttys042".to_string()));
        assert_eq!(normalize_tty("pts/3"), Some("/dev/pts/3".to_string()));
        assert_eq!(normalize_tty("/dev/ttys001"), Some("/dev/ttys001".to_string()));
        assert_eq!(normalize_tty("??"), None);
        assert_eq!(normalize_tty("?"), None);
        assert_eq!(normalize_tty("  "), None);
    }

    #[test]
    fn command_match_is_exact_on_basename() {
        assert!(command_matches("claude", "claude"));
        assert!(command_matches("/usr/local/bin/claude", "claude"));
        assert!(!command_matches("claude-bar", "claude"));
        assert!(!command_matches("Claude", "claude"));
    }

    #[test]
    fn discover_sorts_by_pid() {
        let table = ProcessTable::from_rows([
            row(50, 1, Some("/dev/ttys001"), "claude"),
            row(12, 1, Some("/dev/ttys002"), "claude"),
            row(77, 1, Some("/dev/ttys003"), "claude"),
            row(30, 1, Some("/dev/ttys004"), "zsh"),
        ]);
        let pids: Vec<u32> = discover(&table, "claude").iter().map(|c| c.pid).collect();
        assert_eq!(pids, vec![12, 50, 77]);
    }

    #[test]
    fn discover_empty_table_is_empty() {
        assert!(discover(&ProcessTable::default(), "claude").is_empty());
    }

    #[test]
    fn resolve_reports_tty_and_cwd() {
        let table = ProcessTable::from_rows([row(50, 1, Some("/dev/ttys000"), "claude")]);
        assert_eq!(
            resolve(&table, &FixedCwd(Some("/Users/test/project")), 50),
            Resolution::Resolved {
                tty: "/dev/ttys000".to_string(),
                cwd: "/Users/test/project".to_string(),
            }
        );
    }

    #[test]
    fn resolve_detached_and_exited_are_unresolved() {
        let table = ProcessTable::from_rows([row(50, 1, None, "claude")]);
        assert_eq!(
            resolve(&table, &FixedCwd(None), 50),
            Resolution::Unresolved(UnresolvedReason::NoControllingTerminal)
        );
        assert_eq!(
            resolve(&table, &FixedCwd(None), 51),
            Resolution::Unresolved(UnresolvedReason::Exited)
        );
    }

    #[test]
    fn resolve_keeps_session_when_cwd_unreadable() {
        let table = ProcessTable::from_rows([row(50, 1, Some("/dev/ttys000"), "claude")]);
        assert_eq!(
            resolve(&table, &FixedCwd(None), 50),
            Resolution::Resolved {
                tty: "/dev/ttys000".to_string(),
                cwd: String::new(),
            }
        );
    }

    #[test]
    fn parse_lsof_cwd_finds_cwd_entry() {
        let output = "p12345\nfcwd\nn/Users/test/project\nftxt\nn/usr/bin/claude\n";
        assert_eq!(
            parse_lsof_cwd(output),
            Some("/Users/test/project".to_string())
        );
        assert_eq!(parse_lsof_cwd("p12345\nftxt\nn/usr/bin/claude\n"), None);
        assert_eq!(parse_lsof_cwd(""), None);
    }

    #[test]
    fn owning_session_walks_ancestors() {
        let table = ProcessTable::from_rows([
            row(200, 150, Some("/dev/ttys001"), "python3"),
            row(150, 100, Some("/dev/ttys001"), "zsh"),
            row(100, 50, Some("/dev/ttys001"), "node"),
            row(50, 1, Some("/dev/ttys001"), "claude"),
        ]);
        assert_eq!(
            find_owning_session(&table, 200, "claude"),
            Some((50, "/dev/ttys001".to_string()))
        );
    }

    #[test]
    fn owning_session_requires_tty_and_program() {
        let detached = ProcessTable::from_rows([
            row(100, 50, None, "zsh"),
            row(50, 1, None, "claude"),
        ]);
        assert_eq!(find_owning_session(&detached, 100, "claude"), None);

        let no_claude = ProcessTable::from_rows([
            row(100, 50, Some("/dev/ttys000"), "zsh"),
            row(50, 1, Some("/dev/ttys000"), "bash"),
        ]);
        assert_eq!(find_owning_session(&no_claude, 100, "claude"), None);
    }

    #[test]
    fn owning_session_survives_parent_cycle() {
        let table = ProcessTable::from_rows([
            row(10, 20, Some("/dev/ttys000"), "zsh"),
            row(20, 10, Some("/dev/ttys000"), "bash"),
        ]);
        assert_eq!(find_owning_session(&table, 10, "claude"), None);
    }
}
