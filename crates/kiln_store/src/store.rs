//! The versioned on-disk store itself.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use kiln_common::{AssetKey, Blob, DependentFileState};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::artifact::{decode_artifact, encode_artifact};
use crate::error::StoreError;
use crate::identity::SourceIdentity;

const ARTIFACT_EXT: &str = "bin";
const SIDECAR_SUFFIX: &str = ".deps.json";

/// Sidecar record written next to every artifact: the source-file state and
/// every dependent-file state observed during compilation. JSON so it stays
/// inspectable with ordinary tools.
#[derive(Debug, Serialize, Deserialize)]
struct SidecarRecord {
    source: DependentFileState,
    tool_version: String,
    dependencies: Vec<DependentFileState>,
}

impl SidecarRecord {
    fn is_current(&self) -> bool {
        self.source.is_current() && self.dependencies.iter().all(|d| d.is_current())
    }
}

/// Validation result for one stored entry, as reported by
/// [`IntermediateStore::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Every recorded fingerprint still matches the live file system.
    Current,
    /// The artifact decodes but at least one fingerprint has drifted.
    Stale,
    /// The artifact or its sidecar is missing, truncated, or corrupt.
    Corrupt,
}

/// A store hit with the dependency list recorded at commit time.
#[derive(Debug, Clone)]
pub struct FetchedEntry {
    /// The artifact payload.
    pub payload: Blob,
    /// Dependent-file states observed by the compilation that produced the
    /// payload. All verified current at fetch time.
    pub dependencies: Vec<DependentFileState>,
}

/// One stored entry, as reported by [`IntermediateStore::verify`].
#[derive(Debug, Clone)]
pub struct StoreEntry {
    /// Hex store key (the artifact file stem).
    pub key: String,
    /// Source path recorded in the sidecar, when readable.
    pub source: Option<PathBuf>,
    /// Artifact file size in bytes.
    pub size: u64,
    /// Validation result.
    pub status: EntryStatus,
}

/// An on-disk cache of compiled intermediate assets.
///
/// Entries live under `{root}/{tool_version}/{config}/` as
/// `{key}.bin` + `{key}.deps.json` pairs, keyed by the source path hash.
/// Distinct tool versions and build configurations never share a directory,
/// so a version bump simply stops seeing the old artifacts. A *shadowing*
/// store (see [`open_shadowing`](Self::open_shadowing)) uses the same
/// mechanism for edit-time output that must not outlive the session.
pub struct IntermediateStore {
    namespace_dir: PathBuf,
    tool_version: String,
}

impl IntermediateStore {
    /// Opens (creating if needed) the durable store for one
    /// `(tool_version, config)` namespace.
    pub fn open(root: &Path, tool_version: &str, config: &str) -> Result<Self, StoreError> {
        let namespace_dir = root.join(tool_version).join(config);
        std::fs::create_dir_all(&namespace_dir).map_err(|e| StoreError::Io {
            path: namespace_dir.clone(),
            source: e,
        })?;
        debug!(dir = %namespace_dir.display(), "opened intermediate store");
        Ok(Self {
            namespace_dir,
            tool_version: tool_version.to_string(),
        })
    }

    /// Opens the *shadowing* store for a namespace, wiping any previous
    /// contents.
    ///
    /// Live-edit compilations land here instead of the durable store, so an
    /// editing session never pollutes the cache shared with normal runs.
    /// Nothing in it is meant to survive the session, hence the wipe.
    pub fn open_shadowing(root: &Path, tool_version: &str, config: &str) -> Result<Self, StoreError> {
        let namespace_dir = root.join(tool_version).join(format!("{config}-shadow"));
        match std::fs::remove_dir_all(&namespace_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(StoreError::Io {
                    path: namespace_dir,
                    source: e,
                })
            }
        }
        std::fs::create_dir_all(&namespace_dir).map_err(|e| StoreError::Io {
            path: namespace_dir.clone(),
            source: e,
        })?;
        debug!(dir = %namespace_dir.display(), "opened shadowing store (wiped)");
        Ok(Self {
            namespace_dir,
            tool_version: tool_version.to_string(),
        })
    }

    /// The directory this store reads and writes.
    pub fn namespace_dir(&self) -> &Path {
        &self.namespace_dir
    }

    fn artifact_path(&self, key: AssetKey) -> PathBuf {
        self.namespace_dir.join(format!("{key}.{ARTIFACT_EXT}"))
    }

    fn sidecar_path(&self, key: AssetKey) -> PathBuf {
        self.namespace_dir.join(format!("{key}{SIDECAR_SUFFIX}"))
    }

    /// Persists a compiled payload for `source`, overwriting any previous
    /// entry for the same key.
    ///
    /// `dependencies` is every file the compilation read besides the source
    /// itself (includes, referenced textures); their recorded states gate
    /// every later [`fetch`](Self::fetch).
    pub fn commit(
        &self,
        source: &SourceIdentity,
        payload: &[u8],
        dependencies: Vec<DependentFileState>,
    ) -> Result<AssetKey, StoreError> {
        let key = source.key();

        let framed = encode_artifact(payload, &self.tool_version)?;
        let artifact_path = self.artifact_path(key);
        std::fs::write(&artifact_path, &framed).map_err(|e| StoreError::Io {
            path: artifact_path,
            source: e,
        })?;

        let record = SidecarRecord {
            source: source.state().clone(),
            tool_version: self.tool_version.clone(),
            dependencies,
        };
        let json = serde_json::to_string_pretty(&record).map_err(|e| StoreError::Serialization {
            reason: e.to_string(),
        })?;
        let sidecar_path = self.sidecar_path(key);
        std::fs::write(&sidecar_path, json).map_err(|e| StoreError::Io {
            path: sidecar_path,
            source: e,
        })?;

        trace!(%source, %key, bytes = payload.len(), "committed artifact");
        Ok(key)
    }

    /// Retrieves the payload previously committed for `source`, or `None`.
    ///
    /// A miss means: no entry, an unreadable or corrupt entry, or any
    /// recorded dependent-file fingerprint (the source included) no longer
    /// matching the live file system. The caller recompiles on a miss.
    pub fn fetch(&self, source: &SourceIdentity) -> Option<Blob> {
        self.fetch_entry(source).map(|entry| entry.payload)
    }

    /// Like [`fetch`](Self::fetch), but also returns the dependent-file
    /// states recorded at commit time, so the caller can re-register change
    /// watches for a payload it did not just compile.
    pub fn fetch_entry(&self, source: &SourceIdentity) -> Option<FetchedEntry> {
        let key = source.key();

        let sidecar = std::fs::read_to_string(self.sidecar_path(key)).ok()?;
        let record: SidecarRecord = serde_json::from_str(&sidecar).ok()?;
        if !record.is_current() {
            trace!(%source, %key, "store entry stale, dependent file changed");
            return None;
        }

        let raw = std::fs::read(self.artifact_path(key)).ok()?;
        let payload = decode_artifact(&raw)?;
        trace!(%source, %key, bytes = payload.len(), "store hit");
        Some(FetchedEntry {
            payload: Blob::new(payload),
            dependencies: record.dependencies,
        })
    }

    /// Scans every entry in the namespace, validating sidecars, framing, and
    /// fingerprints. Entries are checked in parallel; fingerprinting reads
    /// every dependent file.
    pub fn verify(&self) -> Result<Vec<StoreEntry>, StoreError> {
        let stems = self.artifact_stems()?;
        let mut entries: Vec<StoreEntry> = stems
            .par_iter()
            .map(|stem| self.verify_one(stem))
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    fn verify_one(&self, stem: &str) -> StoreEntry {
        let artifact_path = self.namespace_dir.join(format!("{stem}.{ARTIFACT_EXT}"));
        let size = std::fs::metadata(&artifact_path).map_or(0, |m| m.len());

        let sidecar_path = self.namespace_dir.join(format!("{stem}{SIDECAR_SUFFIX}"));
        let record: Option<SidecarRecord> = std::fs::read_to_string(&sidecar_path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok());

        let status = match &record {
            None => EntryStatus::Corrupt,
            Some(record) => {
                let decodes = std::fs::read(&artifact_path)
                    .ok()
                    .and_then(|raw| decode_artifact(&raw))
                    .is_some();
                if !decodes {
                    EntryStatus::Corrupt
                } else if record.is_current() {
                    EntryStatus::Current
                } else {
                    EntryStatus::Stale
                }
            }
        };

        StoreEntry {
            key: stem.to_string(),
            source: record.map(|r| r.source.path),
            size,
            status,
        }
    }

    /// Removes entries whose key is not in `live`, returning the number of
    /// entries removed. Sidecars go with their artifacts.
    pub fn gc(&self, live: &[AssetKey]) -> Result<usize, StoreError> {
        let live: HashSet<String> = live.iter().map(|k| k.to_string()).collect();
        let mut removed = 0;
        for stem in self.artifact_stems()? {
            if live.contains(&stem) {
                continue;
            }
            for path in [
                self.namespace_dir.join(format!("{stem}.{ARTIFACT_EXT}")),
                self.namespace_dir.join(format!("{stem}{SIDECAR_SUFFIX}")),
            ] {
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(StoreError::Io { path, source: e }),
                }
            }
            debug!(key = %stem, "collected store entry");
            removed += 1;
        }
        Ok(removed)
    }

    fn artifact_stems(&self) -> Result<Vec<String>, StoreError> {
        let read_dir = std::fs::read_dir(&self.namespace_dir).map_err(|e| StoreError::Io {
            path: self.namespace_dir.clone(),
            source: e,
        })?;

        let mut stems = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| StoreError::Io {
                path: self.namespace_dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(ARTIFACT_EXT) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    stems.push(stem.to_string());
                }
            }
        }
        Ok(stems)
    }
}
