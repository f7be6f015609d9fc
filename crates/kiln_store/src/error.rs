//! Error types for store operations.

use std::path::PathBuf;

/// Errors that can occur while writing to or maintaining the store.
///
/// Read paths never surface these: `fetch` is fail-safe and reports
/// corruption or staleness as a miss. Write and maintenance operations
/// (commit, garbage collection, verification scans) propagate them.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An I/O error occurred while reading or writing store files.
    #[error("store I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A serialization or deserialization error occurred.
    #[error("store serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}
