//! Error types for manager construction.

use kiln_compilers::CompilerError;
use kiln_store::StoreError;

/// Errors raised while bringing the pipeline up.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// An intermediate store could not be opened.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The compiler set could not be constructed.
    #[error(transparent)]
    Compiler(#[from] CompilerError),
}
