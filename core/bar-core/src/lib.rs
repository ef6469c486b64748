//! # bar-core
//!
//! Session discovery and status classification for claude-bar. Shared by the
//! daemon and the CLI.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. OS queries are blocking subprocess calls.
//! - **Graceful degradation**: A failed `ps`, `lsof` or AppleScript query means
//!   fewer sessions or default fields, never an error at the display layer.
//! - **Injectable sources**: Processes, working directories, terminals and
//!   storage roots are traits or values passed in, so every pass can run
//!   against fakes in tests.
//! - **One pass per interval**: [`SnapshotCache`] shares a single discovery
//!   pass among every caller inside the polling window.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bar_core::{load_config_or_default, SnapshotCache, StorageConfig, SystemProbe};
//!
//! let storage = StorageConfig::from_home()?;
//! let config = load_config_or_default(&storage.config_file());
//! let cache = SnapshotCache::new(
//!     SystemProbe::from_config(&config, storage),
//!     config.poll_interval(),
//! );
//! let snapshot = cache.get_or_refresh(chrono::Utc::now());
//! ```

pub mod activation;
pub mod classify;
pub mod config;
pub mod error;
pub mod handoff;
pub mod process;
pub mod registration;
pub mod snapshot;
pub mod storage;
pub mod terminal;
pub mod transcript;

// Re-export commonly used items at crate root
pub use activation::activate;
pub use classify::{
    ClassificationContext, ClassifierPolicy, ContentAgePolicy, MtimeDeltaPolicy, Observation,
    StatusPolicy,
};
pub use config::{load_config, load_config_or_default, BarConfig, PolicyName, ThresholdsConfig};
pub use error::{BarError, Result};
pub use handoff::{classify_slot, Handoff, HandoffSlot, HandoffStore};
pub use registration::{register_session_start, HookInput, Registration};
pub use snapshot::{SessionProbe, SnapshotCache, SystemProbe};
pub use storage::StorageConfig;
pub use terminal::{FocusTarget, TerminalBackend, TerminalMatcher};
pub use transcript::{parse_tail, LastRole, TranscriptLocator, TranscriptTailSummary};

pub use claude_bar_protocol::{Session, SessionSnapshot, Status, TerminalKind};
