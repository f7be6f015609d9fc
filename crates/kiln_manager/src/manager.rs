//! The manager itself.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, Mutex};

use kiln_cache::CacheSet;
use kiln_compilers::CompilerSet;
use kiln_future::PollStatus;
use kiln_store::IntermediateStore;
use kiln_validation::FileMonitor;
use tracing::{debug, warn};

use crate::error::ManagerError;
use crate::process::{PollingProcess, ThreadPump};

/// Owns every piece of the asset pipeline and advances them once per tick.
///
/// `tick()` is called from one designated thread (typically once per frame);
/// everything else runs on worker threads. Registered polling processes are
/// advanced only when their list lock is uncontended, so a tick never stalls
/// the frame.
pub struct AsyncManager {
    processes: Mutex<Vec<Box<dyn PollingProcess>>>,
    thread_pump: Mutex<Option<Box<dyn ThreadPump>>>,
    assets: CacheSet,
    // In-flight compiles may still write to the stores while draining, so
    // the compiler set must be declared (and therefore dropped) before them.
    compilers: CompilerSet,
    store: Arc<IntermediateStore>,
    shadowing_store: Arc<IntermediateStore>,
    monitor: Arc<FileMonitor>,
}

impl AsyncManager {
    /// Brings the pipeline up: opens the durable and shadowing stores under
    /// `store_root` for the given tool version and build configuration, and
    /// starts a compile pool with `workers` threads.
    pub fn open(
        store_root: &Path,
        tool_version: &str,
        config: &str,
        workers: usize,
    ) -> Result<Self, ManagerError> {
        let store = Arc::new(IntermediateStore::open(store_root, tool_version, config)?);
        let shadowing_store = Arc::new(IntermediateStore::open_shadowing(
            store_root,
            tool_version,
            config,
        )?);
        let monitor = Arc::new(FileMonitor::new());
        let compilers = CompilerSet::new(Arc::clone(&store), Arc::clone(&monitor), workers)?;
        debug!(root = %store_root.display(), tool_version, config, workers, "asset pipeline up");
        Ok(Self {
            processes: Mutex::new(Vec::new()),
            thread_pump: Mutex::new(None),
            assets: CacheSet::new(),
            compilers,
            store,
            shadowing_store,
            monitor,
        })
    }

    /// The per-type asset cache registry.
    pub fn assets(&self) -> &CacheSet {
        &self.assets
    }

    /// The compiler set.
    pub fn compilers(&self) -> &CompilerSet {
        &self.compilers
    }

    /// The durable intermediate store.
    pub fn store(&self) -> &Arc<IntermediateStore> {
        &self.store
    }

    /// The edit-time shadowing store (wiped at startup).
    pub fn shadowing_store(&self) -> &Arc<IntermediateStore> {
        &self.shadowing_store
    }

    /// The dependent-file monitor, polled once per tick.
    pub fn monitor(&self) -> &Arc<FileMonitor> {
        &self.monitor
    }

    /// Registers a background process to be advanced on every tick.
    pub fn add_process(&self, process: Box<dyn PollingProcess>) {
        self.processes.lock().unwrap().push(process);
    }

    /// Installs the platform thread pump. Single-assignment.
    ///
    /// # Panics
    ///
    /// Panics if a pump is already installed; replacing it is a programming
    /// error, not a runtime condition.
    pub fn set_thread_pump(&self, pump: Box<dyn ThreadPump>) {
        let mut slot = self.thread_pump.lock().unwrap();
        if slot.is_some() {
            panic!("thread pump already registered");
        }
        *slot = Some(pump);
    }

    /// Advances the whole pipeline one step.
    ///
    /// Order: the thread pump first (surfacing completions from foreign
    /// execution contexts), then a file-monitor poll, then a sweep of
    /// completed compiles, then every registered polling process. The
    /// process list is advanced only if its lock is uncontended; a contended
    /// tick skips it, and the work is simply picked up next tick.
    pub fn tick(&self) {
        if let Some(pump) = self.thread_pump.lock().unwrap().as_mut() {
            pump.pump();
        }

        self.monitor.poll_changes();
        self.compilers.remove_completed();

        if let Ok(mut processes) = self.processes.try_lock() {
            processes.retain_mut(|process| {
                match catch_unwind(AssertUnwindSafe(|| process.poll())) {
                    Ok(PollStatus::Continue) => true,
                    Ok(PollStatus::Finish) => false,
                    Err(payload) => {
                        warn!(
                            message = panic_message(payload.as_ref()),
                            "polling process panicked, dropping it"
                        );
                        false
                    }
                }
            });
        }
    }

    /// Number of registered polling processes still alive.
    pub fn process_count(&self) -> usize {
        self.processes.lock().unwrap().len()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<opaque panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::{AssetInit, Blob};
    use kiln_compilers::{ArtifactCompiler, CompileProduct, TargetCode};
    use kiln_future::{AssetState, ConstructionError};
    use kiln_store::SourceIdentity;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager_in(dir: &Path) -> AsyncManager {
        AsyncManager::open(&dir.join("store"), "0.1.0", "debug", 2).unwrap()
    }

    #[test]
    fn processes_advance_until_finish() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path());

        let polls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polls);
        manager.add_process(Box::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                PollStatus::Finish
            } else {
                PollStatus::Continue
            }
        }));

        for _ in 0..5 {
            manager.tick();
        }
        // Deregistered after the third poll; later ticks don't touch it.
        assert_eq!(polls.load(Ordering::SeqCst), 3);
        assert_eq!(manager.process_count(), 0);
    }

    #[test]
    fn panicking_process_is_dropped_others_continue() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path());

        manager.add_process(Box::new(|| -> PollStatus {
            panic!("process blew up");
        }));
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polls);
        manager.add_process(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            PollStatus::Continue
        }));

        manager.tick();
        manager.tick();

        assert_eq!(manager.process_count(), 1);
        assert_eq!(polls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reentrant_tick_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(manager_in(dir.path()));

        let polls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polls);
        let inner = Arc::clone(&manager);
        manager.add_process(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            // The process list lock is held right now; this must skip
            // process advancement rather than deadlock or recurse.
            inner.tick();
            PollStatus::Continue
        }));

        manager.tick();
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn thread_pump_runs_before_processes() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path());

        let pumps = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pumps);
        manager.set_thread_pump(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        manager.tick();
        manager.tick();
        assert_eq!(pumps.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[should_panic(expected = "thread pump already registered")]
    fn second_thread_pump_panics() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path());
        manager.set_thread_pump(Box::new(|| {}));
        manager.set_thread_pump(Box::new(|| {}));
    }

    struct UppercaseCompiler {
        targets: [TargetCode; 1],
    }

    impl ArtifactCompiler for UppercaseCompiler {
        fn description(&self) -> &str {
            "uppercase text compiler"
        }

        fn targets(&self) -> &[TargetCode] {
            &self.targets
        }

        fn compile(&self, source: &SourceIdentity) -> Result<CompileProduct, ConstructionError> {
            let text = std::fs::read_to_string(source.path())
                .map_err(|e| ConstructionError::msg(e.to_string()))?;
            Ok(CompileProduct {
                payload: Blob::new(text.to_uppercase().into_bytes()),
                dependencies: Vec::new(),
            })
        }
    }

    #[test]
    fn asset_reload_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path());
        let target = TargetCode::from_name("text");
        manager
            .compilers()
            .register(Arc::new(UppercaseCompiler { targets: [target] }));

        let src_path = dir.path().join("title.txt");
        std::fs::write(&src_path, "warm greys").unwrap();

        let cache = manager.assets().cache_for::<String>();
        let init = AssetInit::new(&src_path.to_string_lossy());

        // Construction routine: kick off a compile and chain a polling
        // function that forwards its result into the cache future.
        let build = |cache_future: &Arc<kiln_future::AssetFuture<String>>| {
            let source = SourceIdentity::capture(&src_path);
            match manager.compilers().compile(&source, target) {
                Ok(compiled) => cache_future.set_polling_function(move |f| {
                    let snapshot = compiled.check_status_foreground();
                    match snapshot.state {
                        AssetState::Pending => PollStatus::Continue,
                        AssetState::Ready => {
                            let bytes = snapshot.value.as_ref().unwrap().as_bytes();
                            f.set_asset(
                                String::from_utf8_lossy(bytes).into_owned(),
                                snapshot.token.clone(),
                            );
                            PollStatus::Finish
                        }
                        AssetState::Invalid => {
                            f.set_invalid(snapshot.token.clone(), snapshot.log.clone());
                            PollStatus::Finish
                        }
                    }
                }),
                Err(err) => {
                    cache_future.set_invalid(None, Some(Blob::from_text(&err.to_string())))
                }
            }
        };

        let future = cache.get(&init, build);
        assert_eq!(future.stall_while_pending(), AssetState::Ready);
        assert_eq!(*future.actualize().unwrap(), "WARM GREYS");

        // Edit the source; the next tick's monitor poll bumps the token.
        std::fs::write(&src_path, "cool blues").unwrap();
        manager.tick();

        let rebuilt = cache.get(&init, build);
        assert!(!Arc::ptr_eq(&future, &rebuilt));
        assert_eq!(rebuilt.stall_while_pending(), AssetState::Ready);
        assert_eq!(*rebuilt.actualize().unwrap(), "COOL BLUES");

        // The dropped generation keeps serving its old value to holders.
        assert_eq!(*future.actualize().unwrap(), "WARM GREYS");
    }
}
