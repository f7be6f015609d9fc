//! Error types for compile dispatch.

use crate::compiler::TargetCode;

/// Errors surfaced when a compile request cannot even be queued.
///
/// Failures *inside* a compiler backend never appear here; they are caught
/// at the construction boundary and turn the returned future invalid.
#[derive(Debug, thiserror::Error)]
pub enum CompilerError {
    /// No registered compiler produces the requested target type.
    #[error("no compiler registered for target {target}")]
    NoCompiler {
        /// The unhandled target type.
        target: TargetCode,
    },

    /// The worker pool could not be constructed.
    #[error("failed to build compile worker pool: {reason}")]
    PoolBuild {
        /// Description of the pool construction failure.
        reason: String,
    },
}
