//! Asset futures: single-producer, multi-consumer construction handles.
//!
//! An [`AssetFuture`] tracks one asset's construction from `Pending` to
//! `Ready` or `Invalid`. The producer (a construction routine on a worker
//! thread) writes the *background* side; consumers read the *foreground*
//! side, which is promoted from the background at well-defined poll points.
//! Multi-stage pipelines chain through polling functions instead of blocking
//! worker threads.

#![warn(missing_docs)]

pub mod error;
pub mod future;

pub use error::{ConstructionError, RetrievalError};
pub use future::{AssetFuture, AssetState, PollStatus, Snapshot};
