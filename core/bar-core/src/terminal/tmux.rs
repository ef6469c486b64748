use super::MultiplexerSource;
use crate::process::command_stdout;
use std::collections::{BTreeMap, HashMap};

/// tmux pane → attached client lookup via `list-panes` / `list-clients`.
#[derive(Debug, Clone, Default)]
pub struct TmuxSource;

impl MultiplexerSource for TmuxSource {
    fn host_ttys(&self) -> HashMap<String, String> {
        let Some(panes) = command_stdout(
            "tmux",
            &["list-panes", "-a", "-F", "#{pane_tty}\t#{session_name}"],
        ) else {
            return HashMap::new();
        };
        let clients =
            command_stdout("tmux", &["list-clients", "-F", "#{client_tty}\t#{session_name}"])
                .unwrap_or_default();
        host_tty_map(&panes, &clients)
    }
}

/// Joins pane TTYs to the client TTY attached to the same tmux session.
/// When several clients share a session the lowest client TTY wins, so the
/// result is stable across polls.
pub fn host_tty_map(panes_output: &str, clients_output: &str) -> HashMap<String, String> {
    let mut client_by_session: BTreeMap<&str, &str> = BTreeMap::new();
    for (client_tty, session) in tab_pairs(clients_output) {
        client_by_session
            .entry(session)
            .and_modify(|current| {
                if client_tty < *current {
                    *current = client_tty;
                }
            })
            .or_insert(client_tty);
    }

    tab_pairs(panes_output)
        .filter_map(|(pane_tty, session)| {
            client_by_session
                .get(session)
                .map(|client| (pane_tty.to_string(), client.to_string()))
        })
        .collect()
}

fn tab_pairs(output: &str) -> impl Iterator<Item = (&str, &str)> {
    output.lines().filter_map(|line| {
        let mut parts = line.split('\t');
        let left = parts.next()?.trim();
        let right = parts.next()?.trim();
        if left.is_empty() || right.is_empty() {
            return None;
        }
        Some((left, right))
    })
}
