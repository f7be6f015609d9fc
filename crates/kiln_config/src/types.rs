//! Configuration types deserialized from `kiln.toml`.

use serde::Deserialize;
use std::path::PathBuf;

/// The top-level pipeline configuration parsed from `kiln.toml`.
#[derive(Debug, Deserialize)]
pub struct PipelineConfig {
    /// Core pipeline settings (tool version, worker count).
    pub pipeline: PipelineMeta,
    /// Intermediate-store settings (root directory, namespace).
    pub store: StoreConfig,
}

/// Core pipeline settings required in every `kiln.toml`.
#[derive(Debug, Deserialize)]
pub struct PipelineMeta {
    /// Version string of the asset toolchain. Namespaces the intermediate
    /// store: bumping it orphans (rather than corrupts) old artifacts.
    pub tool_version: String,

    /// Number of compile worker threads. `0` selects one per hardware
    /// thread.
    #[serde(default)]
    pub workers: usize,
}

/// Intermediate-store settings.
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    /// Root directory of the on-disk store.
    pub root: PathBuf,

    /// Build-configuration namespace. Defaults to the compile profile, so
    /// debug and release artifacts never mix.
    #[serde(default = "default_config")]
    pub config: String,
}

fn default_config() -> String {
    if cfg!(debug_assertions) {
        "debug".to_string()
    } else {
        "release".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_profile() {
        let expected = if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        };
        assert_eq!(default_config(), expected);
    }
}
