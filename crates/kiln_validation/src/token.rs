//! Validation tokens: monotonically-invalidatable freshness handles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Process-wide source of invalidation indices. Every bump draws a value
/// strictly greater than any index issued before it, so an observer holding
/// an old index can always detect that a later bump happened.
static INVALIDATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A freshness handle shared between an artifact and everything built from it.
///
/// A token starts at validation index 0, meaning "never invalidated". Each
/// [`invalidate`](Self::invalidate) raises the index to a fresh value above
/// every index issued so far. Tokens form a DAG mirroring the artifact
/// dependency graph: a token's effective index is the maximum over its own
/// index and all registered upstream tokens, so an upstream bump is visible
/// downstream without re-registration.
///
/// Tokens never report errors; they only report staleness.
#[derive(Debug, Default)]
pub struct ValidationToken {
    index: AtomicU64,
    upstreams: Mutex<Vec<Arc<ValidationToken>>>,
}

impl ValidationToken {
    /// Allocates a fresh token at validation index 0.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The current effective validation index: the maximum over this token's
    /// own index and every registered upstream's effective index.
    ///
    /// An index of 0 means the guarded artifact has never been invalidated.
    pub fn index(&self) -> u64 {
        let own = self.index.load(Ordering::Acquire);
        let upstreams = self.upstreams.lock().unwrap();
        upstreams.iter().map(|u| u.index()).fold(own, u64::max)
    }

    /// Bumps this token's index to a fresh value strictly greater than any
    /// index issued so far by any token in the process.
    ///
    /// Safe to call from any thread, concurrently with readers.
    pub fn invalidate(&self) {
        let fresh = INVALIDATION_COUNTER.fetch_add(1, Ordering::AcqRel) + 1;
        // fetch_max: a concurrent bump with a later counter value must win.
        self.index.fetch_max(fresh, Ordering::AcqRel);
    }

    /// Registers `upstream` so that its bumps are visible through this token.
    ///
    /// The reference is held directly rather than copying the index, so later
    /// bumps of `upstream` propagate without any further bookkeeping. If the
    /// upstream is already invalidated at registration time, this token
    /// becomes stale immediately; this covers the window where a source file
    /// changed between construction and dependency registration.
    ///
    /// Upstream chains must be acyclic; the artifact dependency graph is.
    pub fn register_upstream(&self, upstream: Arc<ValidationToken>) {
        let mut upstreams = self.upstreams.lock().unwrap();
        if upstreams.iter().any(|u| Arc::ptr_eq(u, &upstream)) {
            return;
        }
        upstreams.push(upstream);
    }

    /// Returns `true` if the token's index has advanced beyond
    /// `observed_index`. An observation of 0 on a never-bumped token is
    /// always fresh.
    pub fn is_stale(&self, observed_index: u64) -> bool {
        self.index() > observed_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fresh_token_has_zero_index() {
        let t = ValidationToken::new();
        assert_eq!(t.index(), 0);
        assert!(!t.is_stale(0));
    }

    #[test]
    fn invalidate_raises_above_observed() {
        let t = ValidationToken::new();
        let observed = t.index();
        t.invalidate();
        assert!(t.is_stale(observed));
        assert!(t.index() > 0);
    }

    #[test]
    fn successive_invalidations_monotone() {
        let t = ValidationToken::new();
        t.invalidate();
        let first = t.index();
        t.invalidate();
        assert!(t.index() > first);
    }

    #[test]
    fn counter_is_global() {
        let a = ValidationToken::new();
        let b = ValidationToken::new();
        a.invalidate();
        let a_index = a.index();
        b.invalidate();
        assert!(b.index() > a_index, "indices are drawn from one counter");
    }

    #[test]
    fn upstream_bump_propagates() {
        let upstream = ValidationToken::new();
        let downstream = ValidationToken::new();
        downstream.register_upstream(upstream.clone());

        let observed = downstream.index();
        upstream.invalidate();
        assert!(downstream.is_stale(observed));
    }

    #[test]
    fn transitive_propagation() {
        let a = ValidationToken::new();
        let b = ValidationToken::new();
        let c = ValidationToken::new();
        b.register_upstream(a.clone());
        c.register_upstream(b);

        a.invalidate();
        assert!(c.is_stale(0));
    }

    #[test]
    fn already_invalidated_upstream_is_immediately_visible() {
        let upstream = ValidationToken::new();
        upstream.invalidate();

        let downstream = ValidationToken::new();
        assert!(!downstream.is_stale(0));
        downstream.register_upstream(upstream);
        assert!(downstream.is_stale(0));
    }

    #[test]
    fn duplicate_registration_ignored() {
        let upstream = ValidationToken::new();
        let downstream = ValidationToken::new();
        downstream.register_upstream(upstream.clone());
        downstream.register_upstream(upstream.clone());
        assert_eq!(downstream.upstreams.lock().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_invalidation_with_readers() {
        let t = ValidationToken::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let t = t.clone();
                thread::spawn(move || {
                    if i % 2 == 0 {
                        t.invalidate();
                    } else {
                        let _ = t.index();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(t.is_stale(0));
    }
}
