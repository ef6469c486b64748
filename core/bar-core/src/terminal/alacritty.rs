//! Alacritty has no scripting interface, so ownership is inferred from the
//! TTY devices its process tree holds open (`lsof -c alacritty`).

use super::{applescript_quote, spawn_osascript, FocusTarget, TerminalBackend};
use crate::error::Result;
use crate::process::command_stdout;
use claude_bar_protocol::TerminalKind;

#[derive(Debug, Clone, Default)]
pub struct AlacrittyBackend;

impl TerminalBackend for AlacrittyBackend {
    fn kind(&self) -> TerminalKind {
        TerminalKind::Alacritty
    }

    fn enumerate_ttys(&self) -> Vec<String> {
        command_stdout("lsof", &["-c", "alacritty"])
            .map(|output| parse_lsof_ttys(&output))
            .unwrap_or_default()
    }

    /// Raises the window whose title mentions the project directory; Alacritty
    /// titles do not expose the TTY.
    fn activate(&self, target: &FocusTarget) -> Result<()> {
        spawn_osascript(&activate_script(&target.cwd))
    }
}

/// Distinct `/dev/ttys*` and `/dev/pts/*` paths, sorted.
pub fn parse_lsof_ttys(output: &str) -> Vec<String> {
    let mut ttys: Vec<String> = Vec::new();
    for field in output.lines().flat_map(str::split_whitespace) {
        let is_tty = field.starts_with("/dev/ttys") || field.starts_with("/dev/pts/");
        if is_tty && !ttys.iter().any(|known| known == field) {
            ttys.push(field.to_string());
        }
    }
    ttys.sort();
    ttys
}

fn activate_script(cwd: &str) -> String {
    let dir_name = std::path::Path::new(cwd)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    format!(
        r#"tell application "Alacritty" to activate
tell application "System Events"
    tell process "Alacritty"
        set frontmost to true
        repeat with w in windows
            if name of w contains {dir_name} then
                perform action "AXRaise" of w
                return
            end if
        end repeat
    end tell
end tell"#,
        dir_name = applescript_quote(&dir_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_distinct_ttys() {
        let output = "alacri  1234 user    0u  CHR  16,3  0t0  /dev/ttys003\n\
                      alacri  1234 user    1u  CHR  16,5  0t0  /dev/ttys005\n\
                      alacri  1234 user    2u  CHR  16,3  0t0  /dev/ttys003\n\
                      alacri  1234 user  txt   REG  1,4   100  /Applications/Alacritty.app\n";
        assert_eq!(parse_lsof_ttys(output), vec!["/dev/ttys003", "/dev/ttys005"]);
    }

    #[test]
    fn empty_output_has_no_ttys() {
        assert!(parse_lsof_ttys("").is_empty());
    }

    #[test]
    fn activate_script_matches_directory_name() {
        let script = activate_script("/Users/test/my-project");
        assert!(script.contains(r#"if name of w contains "my-project" then"#));
    }
}
