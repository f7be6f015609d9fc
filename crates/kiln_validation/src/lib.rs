//! Freshness tracking for cached assets.
//!
//! Every completed asset carries a [`ValidationToken`]. When a source file
//! changes, or anything upstream of it changes, the token's validation
//! index is bumped, and the asset cache treats the entry as stale on its next
//! lookup. Staleness is detected lazily; nothing here pushes notifications.

#![warn(missing_docs)]

pub mod monitor;
pub mod token;

pub use monitor::FileMonitor;
pub use token::ValidationToken;
