//! Parsing and validation of `kiln.toml` pipeline configuration files.
//!
//! This crate reads the pipeline configuration file and produces a
//! strongly-typed [`PipelineConfig`] describing where the intermediate store
//! lives, which tool version and build configuration namespace it, and how
//! many compile workers to run.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str};
pub use types::{PipelineConfig, PipelineMeta, StoreConfig};
