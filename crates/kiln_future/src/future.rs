//! The asset future itself.

use crate::error::{ConstructionError, RetrievalError};
use kiln_common::Blob;
use kiln_validation::ValidationToken;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::Duration;
use tracing::warn;

/// Construction progress of one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    /// Construction has not completed.
    Pending,
    /// The asset was built successfully and a value is available.
    Ready,
    /// Construction failed; a diagnostic log may be available.
    Invalid,
}

/// Result of one polling-function invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// Re-invoke the function on the next poll.
    Continue,
    /// The pipeline stage completed (or replaced itself); stop invoking.
    Finish,
}

/// An immutable view of one side of a future: state, value, validation
/// token, and diagnostic log.
pub struct Snapshot<T> {
    /// Construction state.
    pub state: AssetState,
    /// The realized value, when `state` is [`AssetState::Ready`].
    pub value: Option<Arc<T>>,
    /// Freshness token for the realized (or failed) generation.
    pub token: Option<Arc<ValidationToken>>,
    /// Diagnostic log, normally populated when `state` is
    /// [`AssetState::Invalid`].
    pub log: Option<Blob>,
}

impl<T> Snapshot<T> {
    fn pending() -> Self {
        Self {
            state: AssetState::Pending,
            value: None,
            token: None,
            log: None,
        }
    }
}

// Manual impl: `T` itself need not be `Clone`, only the `Arc` handles are.
impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state,
            value: self.value.clone(),
            token: self.token.clone(),
            log: self.log.clone(),
        }
    }
}

type PollingFn<T> = Box<dyn FnMut(&AssetFuture<T>) -> PollStatus + Send>;

/// A single-producer, multi-consumer handle to one asset's construction.
///
/// The producer writes the *background* snapshot exactly once per generation
/// (via [`set_asset`](Self::set_asset) / [`set_invalid`](Self::set_invalid),
/// possibly through a chain of polling functions). Consumers read the
/// *foreground* snapshot, which is promoted from the background only at poll
/// points ([`check_status_foreground`](Self::check_status_foreground),
/// [`stall_while_pending`](Self::stall_while_pending)), never mid-write.
/// The two sides are synchronized independently so a slow construction never
/// blocks a consumer's status read.
pub struct AssetFuture<T> {
    initializer: String,
    background: Mutex<Snapshot<T>>,
    completed: Condvar,
    foreground: RwLock<Arc<Snapshot<T>>>,
    polling: Mutex<Option<PollingFn<T>>>,
    // A change was simulated while construction was still in flight; the
    // generation published by that construction must be born stale.
    change_while_pending: std::sync::atomic::AtomicBool,
}

impl<T> AssetFuture<T> {
    /// Allocates a `Pending` future. Does not block and does not start any
    /// construction; that is the caller's next move.
    pub fn new(initializer: &str) -> Arc<Self> {
        Arc::new(Self {
            initializer: initializer.to_string(),
            background: Mutex::new(Snapshot::pending()),
            completed: Condvar::new(),
            foreground: RwLock::new(Arc::new(Snapshot::pending())),
            polling: Mutex::new(None),
            change_while_pending: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// The human-readable initializer this future was requested with.
    /// Diagnostics only; never used as a key.
    pub fn initializer(&self) -> &str {
        &self.initializer
    }

    // ---- producer side -------------------------------------------------

    /// Publishes a successfully constructed value to the background side.
    pub fn set_asset(&self, value: T, token: Option<Arc<ValidationToken>>) {
        {
            let mut background = self.background.lock().unwrap();
            *background = Snapshot {
                state: AssetState::Ready,
                value: Some(Arc::new(value)),
                token,
                log: None,
            };
            self.apply_simulated_change(&mut background);
        }
        self.completed.notify_all();
    }

    /// Publishes a construction failure to the background side, retaining
    /// the diagnostic log and whatever validation token had been accumulated
    /// (so the invalid asset still rebuilds when its inputs change).
    pub fn set_invalid(&self, token: Option<Arc<ValidationToken>>, log: Option<Blob>) {
        {
            let mut background = self.background.lock().unwrap();
            *background = Snapshot {
                state: AssetState::Invalid,
                value: None,
                token,
                log,
            };
            self.apply_simulated_change(&mut background);
        }
        self.completed.notify_all();
    }

    /// Publishes a value to *both* sides immediately.
    ///
    /// Used by live-edit shadow entries, which carry editor-supplied values
    /// that never go through background construction.
    pub fn set_asset_foreground(&self, value: T, token: Option<Arc<ValidationToken>>) {
        let snapshot = Arc::new(Snapshot {
            state: AssetState::Ready,
            value: Some(Arc::new(value)),
            token,
            log: None,
        });
        *self.background.lock().unwrap() = (*snapshot).clone();
        *self.foreground.write().unwrap() = snapshot;
        self.completed.notify_all();
    }

    /// Registers a polling function, the mechanism multi-stage pipelines use
    /// to wait on sub-futures without blocking a thread.
    ///
    /// The function is invoked at each poll point. Returning
    /// [`PollStatus::Continue`] re-arms it for the next poll; returning
    /// [`PollStatus::Finish`] stops further invocation. A polling function
    /// may install its successor stage before finishing.
    pub fn set_polling_function<F>(&self, func: F)
    where
        F: FnMut(&AssetFuture<T>) -> PollStatus + Send + 'static,
    {
        *self.polling.lock().unwrap() = Some(Box::new(func));
    }

    /// Runs a one-shot construction routine, converting failures and panics
    /// into an invalid future. This is the required boundary: a construction
    /// failure must never propagate and kill a worker thread.
    pub fn fulfill_from<F>(&self, construct: F)
    where
        F: FnOnce() -> Result<(T, Option<Arc<ValidationToken>>), ConstructionError>,
    {
        match catch_unwind(AssertUnwindSafe(construct)) {
            Ok(Ok((value, token))) => self.set_asset(value, token),
            Ok(Err(err)) => self.set_invalid(err.token.clone(), Some(err.log)),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(initializer = %self.initializer, message, "asset construction panicked");
                self.set_invalid(
                    None,
                    Some(Blob::from_text(&format!(
                        "construction panicked: {message}"
                    ))),
                );
            }
        }
    }

    // ---- consumer side -------------------------------------------------

    /// Advances the foreground snapshot from the background if the
    /// background has left `Pending`, then returns the foreground snapshot.
    ///
    /// Idempotent, and side-effect-free beyond the one-time promotion (and
    /// driving any registered polling function).
    pub fn check_status_foreground(&self) -> Arc<Snapshot<T>> {
        self.drive_polling();

        {
            let foreground = self.foreground.read().unwrap();
            if foreground.state != AssetState::Pending {
                return Arc::clone(&*foreground);
            }
        }

        let promoted = {
            let background = self.background.lock().unwrap();
            if background.state == AssetState::Pending {
                None
            } else {
                Some(Arc::new(background.clone()))
            }
        };

        match promoted {
            Some(snapshot) => {
                let mut foreground = self.foreground.write().unwrap();
                // Another consumer may have promoted first; either snapshot
                // came from a completed background, so keep whichever won.
                if foreground.state == AssetState::Pending {
                    *foreground = snapshot;
                }
                Arc::clone(&*foreground)
            }
            None => Arc::clone(&*self.foreground.read().unwrap()),
        }
    }

    /// Observes the *background* snapshot directly, before any foreground
    /// promotion.
    ///
    /// Used by cache invalidation logic: a background rebuild can complete
    /// (and be invalidated again) before any consumer's next foreground
    /// poll, and staleness decisions must not wait for that promotion.
    pub fn check_status_background(&self) -> Snapshot<T> {
        self.background.lock().unwrap().clone()
    }

    /// Blocks the calling thread until the background state leaves
    /// `Pending`, then returns the (promoted) foreground state.
    ///
    /// Waits on the completion condition with a capped backoff rather than
    /// spinning; the timeout re-drives polling functions, which may be the
    /// very thing that completes this future.
    pub fn stall_while_pending(&self) -> AssetState {
        let mut wait = Duration::from_micros(100);
        loop {
            self.drive_polling();

            let background = self.background.lock().unwrap();
            if background.state != AssetState::Pending {
                drop(background);
                return self.check_status_foreground().state;
            }
            let _unused = self.completed.wait_timeout(background, wait).unwrap();
            wait = (wait * 2).min(Duration::from_millis(10));
        }
    }

    /// Returns the realized value, or a [`RetrievalError`] describing why it
    /// is unavailable.
    pub fn actualize(&self) -> Result<Arc<T>, RetrievalError> {
        let snapshot = self.check_status_foreground();
        match (snapshot.state, snapshot.value.clone()) {
            (AssetState::Ready, Some(value)) => Ok(value),
            (AssetState::Pending, _) => Err(RetrievalError::Pending {
                initializer: self.initializer.clone(),
            }),
            _ => Err(RetrievalError::Invalid {
                initializer: self.initializer.clone(),
                log: snapshot.log.clone(),
            }),
        }
    }

    /// Marks this future for re-evaluation without discarding the old value:
    /// the foreground keeps serving the previous generation, while the
    /// bumped background token makes the cache replace this entry on its
    /// next lookup. While still `Pending`, the change is deferred and
    /// applied the moment construction publishes; the in-flight generation
    /// observed pre-change inputs and must not be trusted as fresh.
    pub fn simulate_change(&self) {
        let mut background = self.background.lock().unwrap();
        if background.state == AssetState::Pending {
            self.change_while_pending
                .store(true, std::sync::atomic::Ordering::Release);
            return;
        }
        background
            .token
            .get_or_insert_with(ValidationToken::new)
            .invalidate();
    }

    fn apply_simulated_change(&self, background: &mut Snapshot<T>) {
        if self
            .change_while_pending
            .swap(false, std::sync::atomic::Ordering::AcqRel)
        {
            background
                .token
                .get_or_insert_with(ValidationToken::new)
                .invalidate();
        }
    }

    /// Drives the registered polling function once, if any.
    ///
    /// The function is taken out of its slot for the duration of the call:
    /// concurrent pollers never run it twice, and it never re-enters itself.
    fn drive_polling(&self) {
        let taken = self.polling.lock().unwrap().take();
        if let Some(mut func) = taken {
            let status = func(self);
            if status == PollStatus::Continue {
                let mut slot = self.polling.lock().unwrap();
                // The function may have installed its successor stage; never
                // clobber it with the spent stage.
                if slot.is_none() {
                    *slot = Some(func);
                }
            }
        }
    }
}

impl<T> std::fmt::Debug for AssetFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AssetFuture({:?}, {:?})",
            self.initializer,
            self.check_status_background().state
        )
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
