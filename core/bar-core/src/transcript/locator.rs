//! Finds the transcript file belonging to a session.
//!
//! The session-start record written by the registration hook is authoritative.
//! Without one, the newest `*.jsonl` in the project's transcript directory is
//! used, skipping files that other live sessions have claimed. The fallback is
//! a guess when several sessions share a working directory.

use crate::error::{BarError, Result};
use crate::storage::{atomic_write, StorageConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const RECORD_PREFIX: &str = "session-";
const RECORD_SUFFIX: &str = ".json";

/// Written once per session start; maps a TTY to its transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStartRecord {
    pub session_id: String,
    pub transcript_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl SessionStartRecord {
    /// Usable only while the transcript it names still exists.
    fn live_transcript(&self) -> Option<PathBuf> {
        if self.transcript_path.is_empty() {
            return None;
        }
        let path = PathBuf::from(&self.transcript_path);
        path.is_file().then_some(path)
    }
}

/// `/dev/ttys003` → `ttys003`; also used as the record file name key.
pub fn short_tty(tty: &str) -> &str {
    tty.strip_prefix("/dev/").unwrap_or(tty)
}

#[derive(Debug, Clone)]
pub struct TranscriptLocator {
    storage: StorageConfig,
}

impl TranscriptLocator {
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }

    pub fn record_path(&self, cwd: &str, tty: &str) -> PathBuf {
        self.storage.state_dir_for_cwd(cwd).join(format!(
            "{}{}{}",
            RECORD_PREFIX,
            short_tty(tty).replace('/', "-"),
            RECORD_SUFFIX
        ))
    }

    /// Atomically writes (or overwrites) the record for `tty`.
    pub fn write_record(
        &self,
        cwd: &str,
        tty: &str,
        record: &SessionStartRecord,
    ) -> Result<PathBuf> {
        let path = self.record_path(cwd, tty);
        let json = serde_json::to_string_pretty(record).map_err(|source| BarError::Json {
            context: format!("serializing session record for {}", tty),
            source,
        })?;
        atomic_write(&path, &json)?;
        tracing::debug!(tty, path = %path.display(), "Wrote session-start record");
        Ok(path)
    }

    /// `active_ttys` holds the full TTY paths of every session discovered in
    /// the current pass; records of other TTYs not in it are ignored.
    pub fn locate(&self, tty: &str, cwd: &str, active_ttys: &HashSet<String>) -> Option<PathBuf> {
        let own_record = self.record_path(cwd, tty);
        if let Some(path) = read_record(&own_record).and_then(|record| record.live_transcript()) {
            return Some(path);
        }

        let claimed = self.claimed_by_others(tty, cwd, active_ttys);
        newest_transcripts(&self.storage.transcript_dir_for_cwd(cwd))
            .into_iter()
            .find(|path| !claimed.contains(path))
    }

    fn claimed_by_others(
        &self,
        tty: &str,
        cwd: &str,
        active_ttys: &HashSet<String>,
    ) -> HashSet<PathBuf> {
        let own_key = short_tty(tty).replace('/', "-");
        let active_keys: HashSet<String> = active_ttys
            .iter()
            .map(|tty| short_tty(tty).replace('/', "-"))
            .collect();

        let Ok(entries) = fs_err::read_dir(self.storage.state_dir_for_cwd(cwd)) else {
            return HashSet::new();
        };

        entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                let key = name
                    .strip_prefix(RECORD_PREFIX)?
                    .strip_suffix(RECORD_SUFFIX)?
                    .to_string();
                if key == own_key || !active_keys.contains(&key) {
                    return None;
                }
                read_record(&entry.path())?.live_transcript()
            })
            .collect()
    }
}

fn read_record(path: &Path) -> Option<SessionStartRecord> {
    let content = fs_err::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(record) => Some(record),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "Ignoring corrupt session record");
            None
        }
    }
}

/// `*.jsonl` files in `dir`, newest mtime first. Missing directory → empty.
fn newest_transcripts(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs_err::read_dir(dir) else {
        return Vec::new();
    };
    let mut transcripts: Vec<(PathBuf, SystemTime)> = entries
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
                return None;
            }
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((path, modified))
        })
        .collect();
    transcripts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    transcripts.into_iter().map(|(path, _)| path).collect()
}
