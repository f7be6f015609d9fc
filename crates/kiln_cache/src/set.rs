//! The per-context registry of typed caches.

use crate::cache::AssetCache;
use crate::record::CacheRecord;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Type-erased operations a [`CacheSet`] can apply uniformly to every
/// registered cache.
trait CacheOps: Send + Sync {
    fn clear(&self);
    fn log_records(&self) -> Vec<CacheRecord>;
}

impl<T: Send + Sync + 'static> CacheOps for AssetCache<T> {
    fn clear(&self) {
        AssetCache::clear(self)
    }

    fn log_records(&self) -> Vec<CacheRecord> {
        AssetCache::log_records(self)
    }
}

// Two handles to the same cache allocation: one downcastable to the
// concrete AssetCache<T>, one usable without knowing T.
struct Slot {
    typed: Arc<dyn Any + Send + Sync>,
    ops: Arc<dyn CacheOps>,
}

/// The registry of typed asset caches for one engine context.
///
/// One `AssetCache<T>` exists per asset type `T`, created on first request.
/// The set is a value passed to whoever resolves assets; nothing here is
/// process-global, so tests and multi-context hosts each run their own.
#[derive(Default)]
pub struct CacheSet {
    caches: Mutex<HashMap<TypeId, Slot>>,
}

impl CacheSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cache for asset type `T`, creating it on first request.
    pub fn cache_for<T: Send + Sync + 'static>(&self) -> Arc<AssetCache<T>> {
        let mut caches = self.caches.lock().unwrap();
        let slot = caches.entry(TypeId::of::<T>()).or_insert_with(|| {
            debug!(asset_type = std::any::type_name::<T>(), "creating asset cache");
            let cache: Arc<AssetCache<T>> = Arc::new(AssetCache::new());
            Slot {
                typed: Arc::clone(&cache) as Arc<dyn Any + Send + Sync>,
                ops: cache,
            }
        });
        // The slot for TypeId::of::<T>() always holds an AssetCache<T>.
        Arc::downcast(Arc::clone(&slot.typed)).unwrap_or_else(|_| unreachable!())
    }

    /// Clears every registered cache. The registry itself survives, so
    /// existing `Arc<AssetCache<T>>` handles stay valid and refill.
    pub fn clear_all(&self) {
        let caches = self.caches.lock().unwrap();
        for slot in caches.values() {
            slot.ops.clear();
        }
    }

    /// Snapshots diagnostic records across every registered cache.
    pub fn log_records(&self) -> Vec<CacheRecord> {
        let caches = self.caches.lock().unwrap();
        caches
            .values()
            .flat_map(|slot| slot.ops.log_records())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::AssetInit;

    #[test]
    fn same_type_same_cache() {
        let set = CacheSet::new();
        let a = set.cache_for::<u32>();
        let b = set.cache_for::<u32>();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_types_distinct_caches() {
        let set = CacheSet::new();
        let ints = set.cache_for::<u32>();
        let strings = set.cache_for::<String>();

        ints.get(&AssetInit::new("foo"), |f| f.set_asset(1, None));
        strings.get(&AssetInit::new("foo"), |f| {
            f.set_asset("one".to_string(), None)
        });

        // Same initializer, different tables.
        assert_eq!(ints.len(), 1);
        assert_eq!(strings.len(), 1);
    }

    #[test]
    fn clear_all_reaches_every_cache() {
        let set = CacheSet::new();
        let ints = set.cache_for::<u32>();
        let strings = set.cache_for::<String>();
        ints.get(&AssetInit::new("foo"), |f| f.set_asset(1, None));
        strings.get(&AssetInit::new("bar"), |f| {
            f.set_asset("two".to_string(), None)
        });

        set.clear_all();
        assert!(ints.is_empty());
        assert!(strings.is_empty());

        // Handles remain usable after the reset.
        ints.get(&AssetInit::new("foo"), |f| f.set_asset(3, None));
        assert_eq!(ints.len(), 1);
    }

    #[test]
    fn log_records_aggregate_across_types() {
        let set = CacheSet::new();
        set.cache_for::<u32>()
            .get(&AssetInit::new("foo"), |f| f.set_asset(1, None));
        set.cache_for::<String>()
            .get(&AssetInit::new("bar"), |f| f.set_asset("x".to_string(), None));

        let records = set.log_records();
        assert_eq!(records.len(), 2);
        let codes: std::collections::HashSet<_> = records.iter().map(|r| r.type_code).collect();
        assert_eq!(codes.len(), 2);
    }
}
