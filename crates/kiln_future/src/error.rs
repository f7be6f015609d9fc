//! Error types for asset retrieval and construction.

use kiln_common::Blob;
use kiln_validation::ValidationToken;
use std::sync::Arc;

/// Why a completed result could not be retrieved from a future.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RetrievalError {
    /// The asset is still under construction. Transient: try again later.
    #[error("asset still pending: {initializer}")]
    Pending {
        /// Initializer of the pending asset.
        initializer: String,
    },

    /// Construction failed for this generation of the future. Recoverable
    /// only by invalidating and re-requesting (e.g. after fixing the source).
    #[error("invalid asset '{initializer}': {}", .log.as_ref().map(|b| b.as_text().into_owned()).unwrap_or_else(|| "no diagnostic log".to_string()))]
    Invalid {
        /// Initializer of the invalid asset.
        initializer: String,
        /// Diagnostic log captured at construction time, if any.
        log: Option<Blob>,
    },
}

/// A failure raised inside a construction routine.
///
/// Construction failures are caught at the routine boundary and converted
/// into an invalid future; they never propagate out of a worker thread.
#[derive(Debug, Clone, thiserror::Error)]
#[error("asset construction failed: {}", .log.as_text())]
pub struct ConstructionError {
    /// Diagnostic log describing the failure.
    pub log: Blob,

    /// Validation token accumulated before the failure, if any. Retained so
    /// the invalid asset still rebuilds when its inputs change.
    pub token: Option<Arc<ValidationToken>>,
}

impl ConstructionError {
    /// Creates a construction error from a plain message.
    pub fn msg(message: impl AsRef<str>) -> Self {
        Self {
            log: Blob::from_text(message.as_ref()),
            token: None,
        }
    }

    /// Attaches a validation token to the error.
    pub fn with_token(mut self, token: Arc<ValidationToken>) -> Self {
        self.token = Some(token);
        self
    }
}
