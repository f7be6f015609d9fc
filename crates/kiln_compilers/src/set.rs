//! The deduplicating compile queue.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use kiln_common::{AssetKey, Blob};
use kiln_future::{AssetFuture, AssetState};
use kiln_store::{IntermediateStore, SourceIdentity};
use kiln_validation::{FileMonitor, ValidationToken};
use tracing::{debug, trace, warn};

use crate::compiler::{ArtifactCompiler, TargetCode};
use crate::error::CompilerError;

/// The registry of compiler backends plus the worker pool that runs them.
///
/// One in-flight future exists per `(source, target)` pair; concurrent
/// requests share it. Each compile first consults the intermediate store
/// and commits its product back on success, so only the first request after
/// a source change actually pays for a backend invocation.
///
/// Dropping the set blocks until the worker pool has drained, so a set must
/// always be dropped *before* the store it writes to.
pub struct CompilerSet {
    compilers: Mutex<Vec<Arc<dyn ArtifactCompiler>>>,
    in_flight: Mutex<HashMap<(AssetKey, TargetCode), Arc<AssetFuture<Blob>>>>,
    pool: rayon::ThreadPool,
    store: Arc<IntermediateStore>,
    monitor: Arc<FileMonitor>,
}

impl CompilerSet {
    /// Creates a set backed by `store` with `workers` pool threads.
    ///
    /// Compiled artifacts register change watches for their source and
    /// dependent files with `monitor`; polling it drives re-invalidation.
    pub fn new(
        store: Arc<IntermediateStore>,
        monitor: Arc<FileMonitor>,
        workers: usize,
    ) -> Result<Self, CompilerError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("kiln-compile-{i}"))
            .build()
            .map_err(|e| CompilerError::PoolBuild {
                reason: e.to_string(),
            })?;
        Ok(Self {
            compilers: Mutex::new(Vec::new()),
            in_flight: Mutex::new(HashMap::new()),
            pool,
            store,
            monitor,
        })
    }

    /// Registers a compiler backend. Later registrations never displace
    /// earlier ones for targets both handle.
    pub fn register(&self, compiler: Arc<dyn ArtifactCompiler>) {
        debug!(compiler = compiler.description(), "registered compiler");
        self.compilers.lock().unwrap().push(compiler);
    }

    fn find_compiler(&self, target: TargetCode) -> Option<Arc<dyn ArtifactCompiler>> {
        self.compilers
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.targets().contains(&target))
            .map(Arc::clone)
    }

    /// Requests compilation of `source` into `target`, returning a future
    /// for the artifact payload.
    ///
    /// If a compile for the same `(source, target)` pair is still in flight
    /// its future is returned directly. Otherwise a new future is queued on
    /// the worker pool: the store is consulted first, and only on a miss is
    /// the backend invoked (and its product committed back).
    pub fn compile(
        &self,
        source: &SourceIdentity,
        target: TargetCode,
    ) -> Result<Arc<AssetFuture<Blob>>, CompilerError> {
        let compiler = self
            .find_compiler(target)
            .ok_or(CompilerError::NoCompiler { target })?;

        let slot = (source.key(), target);
        let future = {
            let mut in_flight = self.in_flight.lock().unwrap();
            if let Some(existing) = in_flight.get(&slot) {
                if existing.check_status_background().state == AssetState::Pending {
                    trace!(%source, %target, "joining in-flight compile");
                    return Ok(Arc::clone(existing));
                }
            }
            let future = AssetFuture::new(&format!("{source} [{}]", compiler.description()));
            in_flight.insert(slot, Arc::clone(&future));
            future
        };

        let task_future = Arc::clone(&future);
        let store = Arc::clone(&self.store);
        let monitor = Arc::clone(&self.monitor);
        let source = source.clone();
        self.pool.spawn(move || {
            task_future.fulfill_from(|| {
                let token = ValidationToken::new();
                // Watch the source before doing anything with it: an edit
                // racing the compile is then caught by the next poll.
                monitor.watch(source.path(), &token);

                if let Some(entry) = store.fetch_entry(&source) {
                    trace!(%source, "compile served from store");
                    for dep in &entry.dependencies {
                        monitor.watch(&dep.path, &token);
                    }
                    return Ok((entry.payload, Some(token)));
                }

                let product = compiler.compile(&source).map_err(|err| match err.token {
                    Some(_) => err,
                    None => err.with_token(Arc::clone(&token)),
                })?;
                for dep in &product.dependencies {
                    monitor.watch(&dep.path, &token);
                }
                if let Err(err) =
                    store.commit(&source, product.payload.as_bytes(), product.dependencies)
                {
                    // The compile itself succeeded; losing the cache entry
                    // only costs a recompile next run.
                    warn!(%source, %err, "failed to persist compiled artifact");
                }
                Ok((product.payload, Some(token)))
            });
        });

        Ok(future)
    }

    /// Drops completed entries from the in-flight table, returning how many
    /// were removed. Called once per orchestrator tick.
    pub fn remove_completed(&self) -> usize {
        let mut in_flight = self.in_flight.lock().unwrap();
        let before = in_flight.len();
        in_flight.retain(|_, f| f.check_status_background().state == AssetState::Pending);
        before - in_flight.len()
    }

    /// Number of compiles currently tracked (including completed entries not
    /// yet swept).
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileProduct;
    use kiln_common::DependentFileState;
    use kiln_future::{ConstructionError, RetrievalError};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const SPIRV: &str = "spirv";

    struct TestCompiler<F> {
        targets: [TargetCode; 1],
        invocations: AtomicUsize,
        body: F,
    }

    impl<F> TestCompiler<F>
    where
        F: Fn(&SourceIdentity) -> Result<CompileProduct, ConstructionError> + Send + Sync,
    {
        fn new(body: F) -> Arc<Self> {
            Arc::new(Self {
                targets: [TargetCode::from_name(SPIRV)],
                invocations: AtomicUsize::new(0),
                body,
            })
        }

        fn invocations(&self) -> usize {
            self.invocations.load(Ordering::SeqCst)
        }
    }

    impl<F> ArtifactCompiler for TestCompiler<F>
    where
        F: Fn(&SourceIdentity) -> Result<CompileProduct, ConstructionError> + Send + Sync,
    {
        fn description(&self) -> &str {
            "test shader compiler"
        }

        fn targets(&self) -> &[TargetCode] {
            &self.targets
        }

        fn compile(&self, source: &SourceIdentity) -> Result<CompileProduct, ConstructionError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            (self.body)(source)
        }
    }

    fn harness(dir: &Path) -> (Arc<IntermediateStore>, Arc<FileMonitor>) {
        let store = Arc::new(IntermediateStore::open(dir, "0.1.0", "debug").unwrap());
        (store, Arc::new(FileMonitor::new()))
    }

    fn write_source(dir: &Path, name: &str, contents: &str) -> SourceIdentity {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        SourceIdentity::capture(&path)
    }

    fn uppercasing(source: &SourceIdentity) -> Result<CompileProduct, ConstructionError> {
        let text = std::fs::read_to_string(source.path())
            .map_err(|e| ConstructionError::msg(e.to_string()))?;
        Ok(CompileProduct {
            payload: Blob::new(text.to_uppercase().into_bytes()),
            dependencies: Vec::new(),
        })
    }

    #[test]
    fn compile_runs_backend() {
        let dir = tempfile::tempdir().unwrap();
        let (store, monitor) = harness(dir.path());
        let set = CompilerSet::new(Arc::clone(&store), monitor, 2).unwrap();
        let compiler = TestCompiler::new(uppercasing);
        set.register(compiler.clone());

        let source = write_source(dir.path(), "sky.hlsl", "float4 main();");
        let future = set.compile(&source, TargetCode::from_name(SPIRV)).unwrap();

        assert_eq!(future.stall_while_pending(), AssetState::Ready);
        assert_eq!(future.actualize().unwrap().as_bytes(), b"FLOAT4 MAIN();");
        assert_eq!(compiler.invocations(), 1);

        // Product was committed to the store.
        assert!(store.fetch(&source).is_some());
    }

    #[test]
    fn concurrent_requests_share_one_compile() {
        let dir = tempfile::tempdir().unwrap();
        let (store, monitor) = harness(dir.path());
        let set = CompilerSet::new(store, monitor, 2).unwrap();
        let compiler = TestCompiler::new(|source: &SourceIdentity| {
            std::thread::sleep(Duration::from_millis(30));
            uppercasing(source)
        });
        set.register(compiler.clone());

        let source = write_source(dir.path(), "sky.hlsl", "x");
        let target = TargetCode::from_name(SPIRV);
        let first = set.compile(&source, target).unwrap();
        let second = set.compile(&source, target).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        first.stall_while_pending();
        assert_eq!(compiler.invocations(), 1);
    }

    #[test]
    fn completed_compile_refetches_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let (store, monitor) = harness(dir.path());
        let set = CompilerSet::new(store, monitor, 2).unwrap();
        let compiler = TestCompiler::new(uppercasing);
        set.register(compiler.clone());

        let source = write_source(dir.path(), "sky.hlsl", "abc");
        let target = TargetCode::from_name(SPIRV);
        let first = set.compile(&source, target).unwrap();
        first.stall_while_pending();

        let second = set.compile(&source, target).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.stall_while_pending(), AssetState::Ready);
        assert_eq!(second.actualize().unwrap().as_bytes(), b"ABC");
        // Served from the store, not recompiled.
        assert_eq!(compiler.invocations(), 1);
    }

    #[test]
    fn unknown_target_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (store, monitor) = harness(dir.path());
        let set = CompilerSet::new(store, monitor, 1).unwrap();

        let source = write_source(dir.path(), "sky.hlsl", "x");
        let result = set.compile(&source, TargetCode::from_name("dxbc"));
        assert!(matches!(result, Err(CompilerError::NoCompiler { .. })));
    }

    #[test]
    fn failing_backend_invalidates_future() {
        let dir = tempfile::tempdir().unwrap();
        let (store, monitor) = harness(dir.path());
        let set = CompilerSet::new(store, monitor, 1).unwrap();
        set.register(TestCompiler::new(|_: &SourceIdentity| {
            Err(ConstructionError::msg("syntax error at line 12"))
        }));

        let source = write_source(dir.path(), "broken.hlsl", "garbage");
        let future = set.compile(&source, TargetCode::from_name(SPIRV)).unwrap();

        assert_eq!(future.stall_while_pending(), AssetState::Invalid);
        match future.actualize() {
            Err(RetrievalError::Invalid { log, .. }) => {
                assert!(log.unwrap().as_text().contains("syntax error"));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn panicking_backend_is_contained() {
        let dir = tempfile::tempdir().unwrap();
        let (store, monitor) = harness(dir.path());
        let set = CompilerSet::new(store, monitor, 1).unwrap();
        set.register(TestCompiler::new(|source: &SourceIdentity| {
            if source.path().ends_with("bad.hlsl") {
                panic!("backend crashed");
            }
            uppercasing(source)
        }));

        let bad = write_source(dir.path(), "bad.hlsl", "x");
        let target = TargetCode::from_name(SPIRV);
        let future = set.compile(&bad, target).unwrap();
        assert_eq!(future.stall_while_pending(), AssetState::Invalid);

        // The pool thread survived; further compiles still work.
        let good = write_source(dir.path(), "good.hlsl", "ok");
        let future = set.compile(&good, target).unwrap();
        assert_eq!(future.stall_while_pending(), AssetState::Ready);
    }

    #[test]
    fn changed_dependency_bumps_token_on_poll() {
        let dir = tempfile::tempdir().unwrap();
        let (store, monitor) = harness(dir.path());
        let set = CompilerSet::new(store, Arc::clone(&monitor), 1).unwrap();

        let include = dir.path().join("common.h");
        std::fs::write(&include, "#define STEPS 4").unwrap();
        let include_for_compiler = include.clone();
        set.register(TestCompiler::new(move |_: &SourceIdentity| {
            Ok(CompileProduct {
                payload: Blob::from_text("compiled"),
                dependencies: vec![DependentFileState::capture(&include_for_compiler)],
            })
        }));

        let source = write_source(dir.path(), "terrain.hlsl", "#include \"common.h\"");
        let future = set.compile(&source, TargetCode::from_name(SPIRV)).unwrap();
        future.stall_while_pending();

        let token = future.check_status_background().token.unwrap();
        assert!(!token.is_stale(0));

        std::fs::write(&include, "#define STEPS 8").unwrap();
        assert_eq!(monitor.poll_changes(), 1);
        assert!(token.is_stale(0));
    }

    #[test]
    fn remove_completed_sweeps_table() {
        let dir = tempfile::tempdir().unwrap();
        let (store, monitor) = harness(dir.path());
        let set = CompilerSet::new(store, monitor, 1).unwrap();
        set.register(TestCompiler::new(uppercasing));

        let source = write_source(dir.path(), "sky.hlsl", "x");
        let future = set.compile(&source, TargetCode::from_name(SPIRV)).unwrap();
        future.stall_while_pending();

        assert_eq!(set.in_flight_count(), 1);
        assert_eq!(set.remove_completed(), 1);
        assert_eq!(set.in_flight_count(), 0);
    }
}
