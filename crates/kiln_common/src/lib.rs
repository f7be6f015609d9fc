//! Shared foundational types for the Kiln asset pipeline.
//!
//! This crate provides content hashing, canonical asset keys, shared byte
//! blobs, and dependent-file fingerprinting used by every other Kiln crate.

#![warn(missing_docs)]

pub mod blob;
pub mod fingerprint;
pub mod hash;
pub mod key;

pub use blob::Blob;
pub use fingerprint::{fingerprint_file, DependentFileState};
pub use hash::ContentHash;
pub use key::{AssetInit, AssetKey};
