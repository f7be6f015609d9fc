//! Shared immutable byte blobs.

use std::fmt;
use std::sync::Arc;

/// A cheaply-clonable, immutable byte blob.
///
/// Used for compiled artifact payloads and for diagnostic logs attached to
/// invalid assets. Holders share the underlying allocation, so a blob can be
/// attached to a future, a cache record, and an error at the same time.
#[derive(Clone, PartialEq, Eq)]
pub struct Blob(Arc<[u8]>);

impl Blob {
    /// Creates a blob from owned bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }

    /// Creates a blob from a UTF-8 message (for diagnostic logs).
    pub fn from_text(text: &str) -> Self {
        Self(text.as_bytes().into())
    }

    /// The blob contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of bytes in the blob.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the blob is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Best-effort textual rendering, for log display.
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected; diagnostic
    /// logs are frequently built from external tool output.
    pub fn as_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob({} bytes)", self.0.len())
    }
}
