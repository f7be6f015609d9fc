//! The on-disk store of compiled intermediate assets.
//!
//! Compiled byte blobs (shader bytecode, processed geometry, baked textures)
//! are persisted under `{root}/{version}/{config}/` so that switching tool
//! versions or build configurations never serves artifacts produced by an
//! incompatible compiler. Every entry carries a validated binary header plus
//! a JSON sidecar recording the fingerprint of each file the compilation
//! read; an entry is served only while all of those fingerprints still match
//! the live file system.
//!
//! Reads are fail-safe: a missing, truncated, corrupted, or out-of-date
//! entry is a cache miss, never an error.

#![warn(missing_docs)]

pub mod artifact;
pub mod error;
pub mod identity;
pub mod store;

pub use artifact::ArtifactHeader;
pub use error::StoreError;
pub use identity::SourceIdentity;
pub use store::{EntryStatus, FetchedEntry, IntermediateStore, StoreEntry};
