//! Transcript access: locating a session's JSONL log and summarizing its tail.

mod locator;
mod tail;

pub use locator::{short_tty, SessionStartRecord, TranscriptLocator};
pub use tail::{
    parse_content, parse_tail, LastRole, TranscriptTailSummary, DEFAULT_TAIL_WINDOW_BYTES,
};

use crate::classify::{ClassificationContext, Observation};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Modification time of `path`, if it still exists.
pub fn transcript_mtime(path: &Path) -> Option<DateTime<Utc>> {
    let modified = fs_err::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

/// Stats and tail-parses a transcript into classifier input. A file that
/// vanished since it was located yields `None`, same as no transcript.
pub fn observe(
    path: &Path,
    previous_mtime: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window: u64,
) -> Option<Observation> {
    let mtime = transcript_mtime(path)?;
    Some(Observation {
        summary: parse_tail(path, window),
        context: ClassificationContext::new(mtime, previous_mtime, now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_missing_file_is_none() {
        let temp = tempfile::tempdir().unwrap();
        assert!(observe(&temp.path().join("gone.jsonl"), None, Utc::now(), 1024).is_none());
    }

    #[test]
    fn observe_reports_age_and_summary() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("t.jsonl");
        fs_err::write(
            &path,
            r#"{"type":"user","message":{"role":"user","content":"hi"}}"#,
        )
        .unwrap();
        let mtime = transcript_mtime(&path).unwrap();
        let observation = observe(&path, Some(mtime), mtime + chrono::Duration::seconds(7), 1024)
            .unwrap();
        assert_eq!(observation.summary.last_role, LastRole::User);
        assert_eq!(observation.context.age, std::time::Duration::from_secs(7));
        assert_eq!(observation.context.previous_mtime, Some(mtime));
    }
}
