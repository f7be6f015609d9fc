//! The keyed future heap with shadow overlay.

use crate::record::{type_code_of, CacheRecord};
use kiln_common::{AssetInit, AssetKey};
use kiln_future::{AssetFuture, AssetState};
use std::sync::{Arc, Mutex};
use tracing::trace;

struct Entry<T> {
    key: AssetKey,
    future: Arc<AssetFuture<T>>,
    initialization_count: u32,
}

struct Tables<T> {
    // Both tables are kept sorted by key; lookups are binary searches.
    assets: Vec<Entry<T>>,
    shadowing: Vec<Entry<T>>,
}

/// A concurrent cache mapping 64-bit asset keys to futures.
///
/// At most one future exists per key per table. The shadow table holds
/// live-edit overrides and always takes precedence. The table lock covers
/// only lookup/insert/erase; construction always runs outside it, and each
/// future synchronizes its own state independently.
pub struct AssetCache<T> {
    tables: Mutex<Tables<T>>,
}

impl<T> Default for AssetCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AssetCache<T> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables {
                assets: Vec::new(),
                shadowing: Vec::new(),
            }),
        }
    }
}

/// A primary entry is invalidated when its *background* side has completed
/// and carries a token that has been bumped at least once. The background
/// side matters: a rebuild can complete and be invalidated again before any
/// consumer's next foreground poll. Index 0 is the never-bumped initial
/// value and is never stale on its own.
fn is_invalidated<T>(future: &AssetFuture<T>) -> bool {
    let snapshot = future.check_status_background();
    if snapshot.state == AssetState::Pending {
        return false;
    }
    match &snapshot.token {
        Some(token) => token.index() > 0,
        None => false,
    }
}

impl<T: 'static> AssetCache<T> {
    /// Looks up or creates the future for `init`, starting construction via
    /// `construct` when a new future is inserted.
    ///
    /// Resolution order: shadow table first (overrides always win), then the
    /// primary table if the entry is not invalidated, otherwise a fresh
    /// future is inserted (replacing any stale entry) *while holding the
    /// table lock*, and `construct` is invoked after the lock is released.
    /// A concurrent caller for the same key therefore observes the new
    /// future immediately and never waits out the construction itself.
    pub fn get<F>(&self, init: &AssetInit, construct: F) -> Arc<AssetFuture<T>>
    where
        F: FnOnce(&Arc<AssetFuture<T>>),
    {
        let key = init.key();
        let new_future;
        {
            let mut tables = self.tables.lock().unwrap();

            if let Ok(idx) = tables.shadowing.binary_search_by_key(&key, |e| e.key) {
                return Arc::clone(&tables.shadowing[idx].future);
            }

            match tables.assets.binary_search_by_key(&key, |e| e.key) {
                Ok(idx) => {
                    let entry = &mut tables.assets[idx];
                    if !is_invalidated(&entry.future) {
                        return Arc::clone(&entry.future);
                    }
                    trace!(initializer = %init, %key, "replacing stale cache entry");
                    new_future = AssetFuture::new(init.initializer());
                    entry.future = Arc::clone(&new_future);
                    entry.initialization_count += 1;
                }
                Err(idx) => {
                    trace!(initializer = %init, %key, "inserting cache entry");
                    new_future = AssetFuture::new(init.initializer());
                    tables.assets.insert(
                        idx,
                        Entry {
                            key,
                            future: Arc::clone(&new_future),
                            initialization_count: 1,
                        },
                    );
                }
            }
        }

        // Construction can be expensive; it happens-after the insertion
        // above and independently of any further table mutation. Until the
        // routine publishes, the future is simply Pending.
        construct(&new_future);
        new_future
    }

    /// Inserts (`Some`) or removes (`None`) a live-edit shadow entry,
    /// returning the affected key.
    ///
    /// An existing shadow entry is updated in place through
    /// `simulate_change` + a foreground publish, so live consumers see the
    /// new value without swapping futures. A colliding primary entry is
    /// told `simulate_change` so that, once the shadow is gone, resolution
    /// re-validates instead of serving the pre-override object.
    pub fn set_shadowing_asset(&self, value: Option<T>, init: &AssetInit) -> AssetKey {
        let key = init.key();
        let mut tables = self.tables.lock().unwrap();

        match tables.shadowing.binary_search_by_key(&key, |e| e.key) {
            Ok(idx) => {
                tables.shadowing[idx].future.simulate_change();
                match value {
                    Some(value) => {
                        let entry = &mut tables.shadowing[idx];
                        entry.future.set_asset_foreground(value, None);
                        entry.initialization_count += 1;
                    }
                    None => {
                        tables.shadowing.remove(idx);
                        trace!(initializer = %init, %key, "removed shadow entry");
                    }
                }
            }
            Err(idx) => {
                if let Some(value) = value {
                    let future = AssetFuture::new(init.initializer());
                    future.set_asset_foreground(value, None);
                    tables.shadowing.insert(
                        idx,
                        Entry {
                            key,
                            future,
                            initialization_count: 1,
                        },
                    );
                    trace!(initializer = %init, %key, "inserted shadow entry");
                }
            }
        }

        if let Ok(idx) = tables.assets.binary_search_by_key(&key, |e| e.key) {
            tables.assets[idx].future.simulate_change();
        }

        key
    }

    /// Drops every primary and shadow entry. Used on global resets such as
    /// device loss. Futures still held elsewhere keep serving their old
    /// values until their holders re-request.
    pub fn clear(&self) {
        let mut tables = self.tables.lock().unwrap();
        tables.assets.clear();
        tables.shadowing.clear();
    }

    /// Snapshots every tracked entry for diagnostics.
    ///
    /// States are taken from the background side: this never drives polling
    /// functions or foreground promotion, so it is safe to call from
    /// overlay/tooling threads at any time.
    pub fn log_records(&self) -> Vec<CacheRecord> {
        let tables = self.tables.lock().unwrap();
        let type_code = type_code_of::<T>();
        let record = |entry: &Entry<T>| {
            let snapshot = entry.future.check_status_background();
            CacheRecord {
                initializer: entry.future.initializer().to_string(),
                state: snapshot.state,
                validation_index: snapshot.token.as_ref().map_or(0, |t| t.index()),
                log: snapshot.log.clone(),
                type_code,
                key: entry.key,
                initialization_count: entry.initialization_count,
            }
        };
        tables
            .assets
            .iter()
            .chain(tables.shadowing.iter())
            .map(record)
            .collect()
    }

    /// Number of primary entries currently tracked.
    pub fn len(&self) -> usize {
        self.tables.lock().unwrap().assets.len()
    }

    /// Returns `true` if neither table has entries.
    pub fn is_empty(&self) -> bool {
        let tables = self.tables.lock().unwrap();
        tables.assets.is_empty() && tables.shadowing.is_empty()
    }
}
