//! Source identity: what a compiled artifact was built *from*.

use kiln_common::{AssetKey, DependentFileState};
use std::fmt;
use std::path::Path;

/// The identity of a compilation input: its path plus the content state
/// observed when compilation started.
///
/// The path alone determines the store key, so recompiling the same source
/// overwrites its previous entry. The captured content state is recorded in
/// the entry's sidecar and re-checked on every fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIdentity {
    state: DependentFileState,
}

impl SourceIdentity {
    /// Captures the identity of the source file at `path` as it exists now.
    pub fn capture(path: &Path) -> Self {
        Self {
            state: DependentFileState::capture(path),
        }
    }

    /// The 64-bit store key for this source, derived from its path.
    pub fn key(&self) -> AssetKey {
        let canonical = self.state.path.to_string_lossy();
        AssetKey::from_raw(xxhash_rust::xxh3::xxh3_64(canonical.as_bytes()))
    }

    /// The source path.
    pub fn path(&self) -> &Path {
        &self.state.path
    }

    /// The source file state captured at construction time.
    pub fn state(&self) -> &DependentFileState {
        &self.state
    }
}

impl fmt::Display for SourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.state.path.display())
    }
}
