//! Asynchronous compiler backends and the shared compile queue.
//!
//! A [`CompilerSet`] holds the registered [`ArtifactCompiler`] backends and a
//! worker pool. Requesting a compile returns a future immediately; the
//! actual work runs on a pool thread, consulting the intermediate store
//! before invoking the backend and committing the product afterwards.
//! Concurrent requests for the same `(source, target)` pair share one
//! in-flight compile.

#![warn(missing_docs)]

pub mod compiler;
pub mod error;
pub mod set;

pub use compiler::{ArtifactCompiler, CompileProduct, TargetCode};
pub use error::CompilerError;
pub use set::CompilerSet;
