//! Typed error kinds a caller is expected to branch on.
//!
//! Everything else (I/O, SQLite, HTTP, TOML) flows through `anyhow::Error` with
//! `.context(...)` attached at the call site, the way the rest of this crate already does.

use std::path::PathBuf;

use thiserror::Error;

/// Which kind of background job a mutual-exclusion conflict applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Scan,
    Organize,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Scan => write!(f, "scan"),
            JobKind::Organize => write!(f, "organize"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("a {0} job is already running")]
    AlreadyRunning(JobKind),

    #[error("not configured: {0}")]
    NotConfigured(&'static str),

    #[error("source and destination paths are identical: {0}")]
    SourceEqualsDestination(PathBuf),

    #[error("destination {destination} lies inside the source directory {source_dir}")]
    DestinationInsideSource {
        source_dir: PathBuf,
        destination: PathBuf,
    },

    #[error("copy verification failed: expected {expected} bytes, found {actual}")]
    VerificationMismatch { expected: u64, actual: u64 },

    #[error("item has no movie or tv_show classification and cannot be organized")]
    UnknownDetectedType,

    #[error("no media item with id {0}")]
    ItemNotFound(i64),
}
