//! The compiler backend contract.

use kiln_common::{Blob, DependentFileState};
use kiln_future::ConstructionError;
use kiln_store::SourceIdentity;
use std::fmt;

/// A 64-bit code identifying one artifact target type (shader bytecode,
/// processed geometry, baked texture data). Derived from a target name so
/// codes stay stable across runs and processes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetCode(u64);

impl TargetCode {
    /// Derives the code for a named target.
    pub fn from_name(name: &str) -> Self {
        Self(xxhash_rust::xxh3::xxh3_64(name.as_bytes()))
    }

    /// The raw 64-bit code.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TargetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for TargetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TargetCode({:016x})", self.0)
    }
}

/// The output of one successful compile: the artifact payload plus every
/// file the backend read to produce it (the source itself excluded).
pub struct CompileProduct {
    /// The compiled artifact bytes.
    pub payload: Blob,

    /// Files read during compilation (includes, referenced textures). Their
    /// recorded states gate store reuse and drive change watches.
    pub dependencies: Vec<DependentFileState>,
}

/// A synchronous compiler backend.
///
/// Backends are registered with a [`CompilerSet`](crate::CompilerSet) and
/// invoked on worker-pool threads; `compile` must be safe to call from any
/// thread and may be invoked again for the same source after its inputs
/// change. Failures are returned, not panicked, though a panic is still
/// contained at the construction boundary.
pub trait ArtifactCompiler: Send + Sync {
    /// Human-readable backend description, for diagnostics.
    fn description(&self) -> &str;

    /// The target types this backend produces.
    fn targets(&self) -> &[TargetCode];

    /// Compiles `source` into an artifact payload.
    fn compile(&self, source: &SourceIdentity) -> Result<CompileProduct, ConstructionError>;
}
