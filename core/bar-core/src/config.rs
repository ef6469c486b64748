//! Runtime configuration loaded from `~/.claude-bar/config.toml`.
//!
//! A missing file means defaults. Every field is optional in the file.

use crate::classify::{ClassifierPolicy, ContentAgePolicy};
use crate::error::{BarError, Result};
use crate::transcript::DEFAULT_TAIL_WINDOW_BYTES;
use claude_bar_protocol::TerminalKind;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PROGRAM: &str = "claude";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BarConfig {
    /// Exact command name of the monitored program.
    pub program: String,
    pub poll_interval_ms: u64,
    pub policy: PolicyName,
    pub tail_window_bytes: u64,
    /// Terminal backends to query, in match priority order.
    pub terminals: Vec<TerminalKind>,
    /// Whether the daemon also writes the slot hand-off file.
    pub write_handoff: bool,
    pub thresholds: ThresholdsConfig,
}

impl Default for BarConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            policy: PolicyName::ContentAge,
            tail_window_bytes: DEFAULT_TAIL_WINDOW_BYTES,
            terminals: vec![TerminalKind::ITerm2, TerminalKind::Alacritty],
            write_handoff: true,
            thresholds: ThresholdsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyName {
    ContentAge,
    MtimeDelta,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdsConfig {
    pub pending_grace_secs: f64,
    pub recent_activity_secs: f64,
    pub stale_after_secs: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        let policy = ContentAgePolicy::default();
        Self {
            pending_grace_secs: policy.pending_grace.as_secs_f64(),
            recent_activity_secs: policy.recent_activity.as_secs_f64(),
            stale_after_secs: policy.stale_after.as_secs_f64(),
        }
    }
}

impl BarConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn classifier(&self) -> ClassifierPolicy {
        match self.policy {
            PolicyName::ContentAge => ClassifierPolicy::ContentAge(ContentAgePolicy {
                pending_grace: secs(self.thresholds.pending_grace_secs),
                recent_activity: secs(self.thresholds.recent_activity_secs),
                stale_after: secs(self.thresholds.stale_after_secs),
            }),
            PolicyName::MtimeDelta => ClassifierPolicy::MtimeDelta,
        }
    }
}

/// Negative or NaN clamps to zero; anything past `Duration::MAX` saturates.
fn secs(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

impl ThresholdsConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        let fields = [
            ("pending_grace_secs", self.pending_grace_secs),
            ("recent_activity_secs", self.recent_activity_secs),
            ("stale_after_secs", self.stale_after_secs),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 || Duration::try_from_secs_f64(value).is_err() {
                return Err(format!("thresholds.{} is out of range: {}", name, value));
            }
        }
        Ok(())
    }
}

/// Loads the config file, returning defaults if it doesn't exist.
pub fn load_config(path: &Path) -> Result<BarConfig> {
    if !path.exists() {
        return Ok(BarConfig::default());
    }

    let content = fs_err::read_to_string(path).map_err(|err| {
        BarError::io(format!("reading config {}", path.display()), err)
    })?;
    let config: BarConfig = toml::from_str(&content).map_err(|err| BarError::ConfigMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })?;

    if config.program.trim().is_empty() {
        return Err(BarError::ConfigMalformed {
            path: path.to_path_buf(),
            details: "program must not be empty".to_string(),
        });
    }

    if let Err(details) = config.thresholds.validate() {
        return Err(BarError::ConfigMalformed {
            path: path.to_path_buf(),
            details,
        });
    }

    Ok(config)
}

/// Loads the config, logging and falling back to defaults on any error.
pub fn load_config_or_default(path: &Path) -> BarConfig {
    match load_config(path) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to load config; using defaults");
            BarConfig::default()
        }
    }
}
