//! The top-level manager that drives the asset pipeline forward.
//!
//! [`AsyncManager`] owns the durable and shadowing intermediate stores, the
//! compiler set, the file monitor, the per-type asset caches, and a list of
//! registered background processes. Calling [`tick`](AsyncManager::tick)
//! once per frame advances all of them; nothing else in the pipeline needs
//! a dedicated scheduling thread.

#![warn(missing_docs)]

pub mod error;
pub mod manager;
pub mod process;

pub use error::ManagerError;
pub use manager::AsyncManager;
pub use process::{PollingProcess, ThreadPump};
