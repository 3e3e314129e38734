//! ---
//! gh_section: "03-persistence-logging"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Persistence abstractions and storage bindings."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! File-backed persistence primitives: typed JSON-lines record logs,
//! hash-verified snapshots and the Prometheus metrics that describe them.

use std::path::PathBuf;

/// Result alias used throughout the persistence crate.
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Error type for the persistence subsystem.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Wrapper for IO errors encountered while reading/writing persistence files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON serialization issues.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// Reported when a snapshot fails integrity verification.
    #[error("snapshot hash mismatch")]
    HashMismatch,
    /// The first line of a record log is not a valid header.
    #[error("record log {path} has a missing or corrupt header")]
    CorruptHeader {
        /// Offending log file.
        path: PathBuf,
    },
    /// A log or snapshot was written by an incompatible format version.
    #[error("unsupported persistence format version {0}")]
    UnsupportedVersion(u16),
    /// Wrapper for Prometheus metrics registration failures.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub mod metrics;
pub mod record_log;
pub mod snapshot;

pub use metrics::PersistenceMetrics;
pub use record_log::replay as replay_record_log;
pub use record_log::{LogEntry, RecordLog, RecordLogReader, LOG_FORMAT_VERSION};
pub use snapshot::{load_snapshot, save_snapshot, verify_snapshot, SNAPSHOT_VERSION};
