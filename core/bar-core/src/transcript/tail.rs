//! Bounded tail parsing of JSONL transcripts.
//!
//! Only the last window of the file is decoded. A tool call whose result lies
//! on the other side of the window boundary is not paired; on very verbose
//! turns the summary can therefore differ from a full-file parse.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

pub const DEFAULT_TAIL_WINDOW_BYTES: u64 = 64 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LastRole {
    #[default]
    None,
    User,
    Assistant,
}

/// What the end of a transcript says about the conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptTailSummary {
    pub last_role: LastRole,
    /// The latest assistant turn issued a tool call with no matching result yet.
    pub has_unanswered_tool_call: bool,
}

#[derive(Deserialize)]
struct Record {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: Value,
}

impl Message {
    fn blocks(&self) -> Option<impl Iterator<Item = &serde_json::Map<String, Value>>> {
        self.content
            .as_array()
            .map(|items| items.iter().filter_map(Value::as_object))
    }
}

fn block_type(block: &serde_json::Map<String, Value>) -> &str {
    block.get("type").and_then(Value::as_str).unwrap_or("")
}

/// Parses the last `window` bytes of the transcript at `path`.
/// An unreadable file yields the zero summary.
pub fn parse_tail(path: &Path, window: u64) -> TranscriptTailSummary {
    match read_tail(path, window) {
        Some(content) => parse_content(&content),
        None => TranscriptTailSummary::default(),
    }
}

fn read_tail(path: &Path, max_bytes: u64) -> Option<String> {
    let mut file = fs_err::File::open(path).ok()?;
    let size = file.metadata().ok()?.len();
    let chunk = size.min(max_bytes);
    if chunk == 0 {
        return Some(String::new());
    }
    file.seek(SeekFrom::Start(size - chunk)).ok()?;
    let mut buf = Vec::with_capacity(chunk as usize);
    file.take(chunk).read_to_end(&mut buf).ok()?;
    Some(String::from_utf8_lossy(&buf).into_owned())
}

/// Scans JSONL content forward. Lines that fail to decode (including a
/// partial first line cut by the window) are skipped.
pub fn parse_content(content: &str) -> TranscriptTailSummary {
    let mut last_role = LastRole::None;
    let mut outstanding: HashSet<String> = HashSet::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(record) = serde_json::from_str::<Record>(line) else {
            continue;
        };
        let Some(message) = record.message else {
            continue;
        };

        match (record.kind.as_str(), message.role.as_str()) {
            ("assistant", "assistant") => {
                last_role = LastRole::Assistant;
                let calls: Vec<String> = message
                    .blocks()
                    .into_iter()
                    .flatten()
                    .filter(|block| block_type(block) == "tool_use")
                    .map(|block| {
                        block
                            .get("id")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("line-{}", index))
                    })
                    .collect();
                if calls.is_empty() {
                    // The assistant kept talking, so nothing earlier is waiting.
                    outstanding.clear();
                } else {
                    outstanding.extend(calls);
                }
            }
            ("user", "user") => {
                last_role = LastRole::User;
                let Some(blocks) = message.blocks() else {
                    continue;
                };
                for block in blocks.filter(|block| block_type(block) == "tool_result") {
                    match block.get("tool_use_id").and_then(Value::as_str) {
                        Some(id) => {
                            outstanding.remove(id);
                        }
                        None => outstanding.clear(),
                    }
                }
            }
            _ => {}
        }
    }

    TranscriptTailSummary {
        last_role,
        has_unanswered_tool_call: !outstanding.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TOOL_USE_T1: &str = r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"tool_use","id":"t1","name":"Read","input":{}}]}}"#;
    const TOOL_RESULT_T1: &str = r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"t1","content":"ok"}]}}"#;
    const ASSISTANT_TEXT: &str = r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"text","text":"Done"}]}}"#;
    const USER_TEXT: &str = r#"{"type":"user","message":{"role":"user","content":[{"type":"text","text":"Hello"}]}}"#;

    fn summary(last_role: LastRole, pending: bool) -> TranscriptTailSummary {
        TranscriptTailSummary {
            last_role,
            has_unanswered_tool_call: pending,
        }
    }

    #[test]
    fn empty_content_is_zero_summary() {
        assert_eq!(parse_content(""), TranscriptTailSummary::default());
    }

    #[test]
    fn text_only_assistant() {
        assert_eq!(parse_content(ASSISTANT_TEXT), summary(LastRole::Assistant, false));
    }

    #[test]
    fn thinking_and_text() {
        let content = r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"thinking","thinking":"..."},{"type":"text","text":"Done"}]}}"#;
        assert_eq!(parse_content(content), summary(LastRole::Assistant, false));
    }

    #[test]
    fn unpaired_tool_use_is_pending() {
        assert_eq!(parse_content(TOOL_USE_T1), summary(LastRole::Assistant, true));
    }

    #[test]
    fn paired_tool_use_clears_pending() {
        let content = [TOOL_USE_T1, TOOL_RESULT_T1].join("\n");
        assert_eq!(parse_content(&content), summary(LastRole::User, false));
    }

    #[test]
    fn new_round_after_pairing_is_pending_again() {
        let t2 = r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"tool_use","id":"t2","name":"Bash","input":{}}]}}"#;
        let content = [TOOL_USE_T1, TOOL_RESULT_T1, t2].join("\n");
        assert_eq!(parse_content(&content), summary(LastRole::Assistant, true));
    }

    #[test]
    fn assistant_text_after_round_is_idle() {
        let content = [TOOL_USE_T1, TOOL_RESULT_T1, ASSISTANT_TEXT].join("\n");
        assert_eq!(parse_content(&content), summary(LastRole::Assistant, false));
    }

    #[test]
    fn result_for_other_call_keeps_pending() {
        let other = r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"zzz","content":"ok"}]}}"#;
        let content = [TOOL_USE_T1, other].join("\n");
        assert_eq!(parse_content(&content), summary(LastRole::User, true));
    }

    #[test]
    fn parallel_calls_need_every_result() {
        let t2 = r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"tool_use","id":"t2","name":"Grep","input":{}}]}}"#;
        let r2 = r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"t2","content":"ok"}]}}"#;
        let half = [TOOL_USE_T1, t2, TOOL_RESULT_T1].join("\n");
        assert!(parse_content(&half).has_unanswered_tool_call);
        let all = [TOOL_USE_T1, t2, TOOL_RESULT_T1, r2].join("\n");
        assert!(!parse_content(&all).has_unanswered_tool_call);
    }

    #[test]
    fn result_without_id_clears_everything() {
        let anonymous = r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","content":"ok"}]}}"#;
        let content = [TOOL_USE_T1, anonymous].join("\n");
        assert!(!parse_content(&content).has_unanswered_tool_call);
    }

    #[test]
    fn progress_lines_ignored() {
        let progress = r#"{"type":"progress","content":{"type":"status","text":"thinking..."}}"#;
        let content = [USER_TEXT, progress].join("\n");
        assert_eq!(parse_content(&content), summary(LastRole::User, false));
    }

    #[test]
    fn invalid_json_lines_skipped() {
        let content = ["NOT VALID JSON{{{", ASSISTANT_TEXT, "{\"type\":\"assist"].join("\n");
        assert_eq!(parse_content(&content), summary(LastRole::Assistant, false));
    }

    #[test]
    fn string_content_user_message() {
        let content = r#"{"type":"user","message":{"role":"user","content":"plain prompt"}}"#;
        assert_eq!(parse_content(content), summary(LastRole::User, false));
    }

    #[test]
    fn mismatched_type_and_role_ignored() {
        let content = r#"{"type":"summary","message":{"role":"assistant","content":[{"type":"tool_use","id":"t9"}]}}"#;
        assert_eq!(parse_content(content), TranscriptTailSummary::default());
    }

    #[test]
    fn reparsing_is_idempotent() {
        let content = [USER_TEXT, TOOL_USE_T1].join("\n");
        assert_eq!(parse_content(&content), parse_content(&content));
    }

    #[test]
    fn parse_tail_missing_file_is_zero_summary() {
        let temp = tempfile::tempdir().unwrap();
        assert_eq!(
            parse_tail(&temp.path().join("missing.jsonl"), DEFAULT_TAIL_WINDOW_BYTES),
            TranscriptTailSummary::default()
        );
    }

    #[test]
    fn parse_tail_reads_only_the_window() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("t.jsonl");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", TOOL_USE_T1).unwrap();
        for _ in 0..50 {
            writeln!(file, "{}", USER_TEXT).unwrap();
        }
        writeln!(file, "{}", ASSISTANT_TEXT).unwrap();
        drop(file);

        // Window covers only the final line plus a cut-off fragment.
        let window = ASSISTANT_TEXT.len() as u64 + 20;
        assert_eq!(parse_tail(&path, window), summary(LastRole::Assistant, false));

        let full = parse_tail(&path, DEFAULT_TAIL_WINDOW_BYTES);
        assert_eq!(full, summary(LastRole::Assistant, false));
    }

    #[test]
    fn parse_tail_misses_call_outside_window() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("t.jsonl");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", TOOL_USE_T1).unwrap();
        writeln!(file, "{}", USER_TEXT).unwrap();
        drop(file);

        let window = USER_TEXT.len() as u64 + 1;
        assert_eq!(parse_tail(&path, window), summary(LastRole::User, false));
        assert_eq!(
            parse_tail(&path, DEFAULT_TAIL_WINDOW_BYTES),
            summary(LastRole::User, true)
        );
    }
}
