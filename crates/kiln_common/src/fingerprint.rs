//! Dependent-file fingerprinting.
//!
//! A compiled artifact records the state of every file it read. An entry is
//! only reusable while each recorded fingerprint still matches the live file
//! system; a missing file is itself a recordable state, so "compiled while
//! the override file was absent" invalidates correctly when the file appears.

use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The observed state of one file a compilation depended on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependentFileState {
    /// Path of the dependent file.
    pub path: PathBuf,

    /// Content fingerprint at observation time; `None` if the file was
    /// missing or unreadable.
    pub fingerprint: Option<ContentHash>,
}

impl DependentFileState {
    /// Records the current state of `path`.
    pub fn capture(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            fingerprint: fingerprint_file(path),
        }
    }

    /// Returns `true` if the live file system still matches this recorded
    /// state (including "still missing").
    pub fn is_current(&self) -> bool {
        fingerprint_file(&self.path) == self.fingerprint
    }
}

/// Fingerprints a file's current contents, or `None` if it cannot be read.
pub fn fingerprint_file(path: &Path) -> Option<ContentHash> {
    let contents = std::fs::read(path).ok()?;
    Some(ContentHash::from_bytes(&contents))
}
