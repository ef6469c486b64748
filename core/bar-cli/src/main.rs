//! claude-bar: command-line entry points for the session status engine.
//!
//! ## Subcommands
//!
//! - `session-start`: SessionStart hook handler, reads JSON from stdin
//! - `snapshot`: prints the current sessions as a JSON array
//! - `slot <N>`: prints one slot of the hand-off file for per-slot observers
//! - `focus`: brings a session's terminal window to the front
//!
//! Stdout belongs to whatever consumes these commands, so logs go to a file
//! under `~/.claude-bar/logs`.

mod daemon_client;
mod error;
mod focus;
mod logging;
mod session_start;
mod slot;
mod snapshot;

use bar_core::{load_config, StorageConfig};
use clap::{Parser, Subcommand};
use error::CliError;

#[derive(Parser)]
#[command(name = "claude-bar")]
#[command(about = "Claude Code session status for menu-bar displays")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record the transcript of a starting session (reads hook JSON from stdin)
    SessionStart,

    /// Print the current sessions as JSON
    Snapshot {
        /// Run a discovery pass in this process instead of asking the daemon
        #[arg(long)]
        local: bool,
    },

    /// Print one slot of the hand-off file, refreshing it first if stale
    Slot {
        /// Zero-based slot index
        #[arg(value_name = "N")]
        index: usize,
    },

    /// Focus the terminal window that owns a session
    Focus {
        /// Terminal type: iterm2, alacritty or unknown
        #[arg(long)]
        terminal: String,

        /// TTY device path (e.g. /dev/ttys000)
        #[arg(long)]
        tty: String,

        /// Outer terminal TTY when the session runs inside tmux
        #[arg(long)]
        host_tty: Option<String>,

        /// Working directory (used for Alacritty window matching)
        #[arg(long, default_value = "")]
        cwd: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let storage = match StorageConfig::from_home() {
        Ok(storage) => storage,
        Err(err) => {
            eprintln!("claude-bar: {}", err);
            std::process::exit(1);
        }
    };
    let _logging_guard = logging::init(&storage.log_dir());

    if let Err(err) = run(cli.command, storage) {
        tracing::error!(error = %err, "claude-bar command failed");
        eprintln!("claude-bar: {}", err);
        std::process::exit(1);
    }
}

fn run(command: Commands, storage: StorageConfig) -> Result<(), CliError> {
    let config = load_config(&storage.config_file())?;

    match command {
        Commands::SessionStart => session_start::run(&config, &storage),
        Commands::Snapshot { local } => snapshot::run(local, &config, storage),
        Commands::Slot { index } => slot::run(index, &config, storage),
        Commands::Focus {
            terminal,
            tty,
            host_tty,
            cwd,
        } => focus::run(&terminal, tty, host_tty, cwd, &config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_focus_arguments() {
        let cli = Cli::try_parse_from([
            "claude-bar",
            "focus",
            "--terminal",
            "iterm2",
            "--tty",
            "/dev/ttys004",
            "--host-tty",
            "/dev/ttys001",
        ])
        .unwrap();

        match cli.command {
            Commands::Focus {
                terminal,
                tty,
                host_tty,
                cwd,
            } => {
                assert_eq!(terminal, "iterm2");
                assert_eq!(tty, "/dev/ttys004");
                assert_eq!(host_tty.as_deref(), Some("/dev/ttys001"));
                assert_eq!(cwd, "");
            }
            _ => panic!("expected focus"),
        }
    }

    #[test]
    fn focus_requires_tty() {
        assert!(Cli::try_parse_from(["claude-bar", "focus", "--terminal", "iterm2"]).is_err());
    }

    #[test]
    fn parses_snapshot_and_slot() {
        let cli = Cli::try_parse_from(["claude-bar", "snapshot", "--local"]).unwrap();
        assert!(matches!(cli.command, Commands::Snapshot { local: true }));

        let cli = Cli::try_parse_from(["claude-bar", "slot", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Slot { index: 3 }));

        assert!(Cli::try_parse_from(["claude-bar", "slot", "-1"]).is_err());
    }
}
