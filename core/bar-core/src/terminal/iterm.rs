//! iTerm2: inventory and activation through AppleScript.

use super::{applescript_quote, spawn_osascript, FocusTarget, TerminalBackend};
use crate::error::Result;
use crate::process::command_stdout;
use claude_bar_protocol::TerminalKind;

const LIST_TTYS_SCRIPT: &str = r#"
tell application "System Events" to set running to (exists process "iTerm2")
if not running then return ""
tell application "iTerm2"
    set out to ""
    repeat with w in windows
        tell w
            repeat with t in tabs
                repeat with s in sessions of t
                    set out to out & (tty of s) & linefeed
                end repeat
            end repeat
        end tell
    end repeat
    return out
end tell
"#;

#[derive(Debug, Clone, Default)]
pub struct ITerm2Backend;

impl TerminalBackend for ITerm2Backend {
    fn kind(&self) -> TerminalKind {
        TerminalKind::ITerm2
    }

    fn enumerate_ttys(&self) -> Vec<String> {
        command_stdout("osascript", &["-e", LIST_TTYS_SCRIPT])
            .map(|output| parse_iterm2_output(&output))
            .unwrap_or_default()
    }

    fn activate(&self, target: &FocusTarget) -> Result<()> {
        spawn_osascript(&activate_script(target.terminal_tty()))
    }
}

/// One TTY per line; anything that is not a device path is dropped.
pub fn parse_iterm2_output(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("/dev/"))
        .map(str::to_string)
        .collect()
}

fn activate_script(tty: &str) -> String {
    format!(
        r#"tell application "iTerm2"
    activate
    repeat with w in windows
        tell w
            repeat with t in tabs
                repeat with s in sessions of t
                    if tty of s is {tty} then
                        select t
                        select s
                        set index of w to 1
                        return
                    end if
                end repeat
            end repeat
        end tell
    end repeat
end tell"#,
        tty = applescript_quote(tty)
    )
}
