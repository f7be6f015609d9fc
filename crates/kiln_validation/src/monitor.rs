//! Lazy file-change monitoring.
//!
//! The monitor keeps a list of (file, fingerprint, token) registrations and
//! re-fingerprints the files on demand, typically once per orchestrator
//! tick. A changed file bumps its token; downstream tokens see the bump
//! through their upstream references. There is no push notification channel.

use crate::token::ValidationToken;
use kiln_common::{fingerprint_file, ContentHash};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Weak};
use tracing::debug;

struct Watch {
    path: PathBuf,
    fingerprint: Option<ContentHash>,
    token: Weak<ValidationToken>,
}

/// Re-fingerprints watched files and bumps the tokens of those that changed.
///
/// Registrations hold the token weakly: once every holder of an asset drops
/// it, its watches are discarded on the next poll.
#[derive(Default)]
pub struct FileMonitor {
    watches: Mutex<Vec<Watch>>,
}

impl FileMonitor {
    /// Creates an empty monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Watches `path` on behalf of `token`, recording the file's current
    /// fingerprint as the baseline.
    pub fn watch(&self, path: &Path, token: &std::sync::Arc<ValidationToken>) {
        let watch = Watch {
            path: path.to_path_buf(),
            fingerprint: fingerprint_file(path),
            token: std::sync::Arc::downgrade(token),
        };
        self.watches.lock().unwrap().push(watch);
    }

    /// Re-fingerprints every watched file, invalidating the token of each
    /// one that changed. Returns the number of changed files. Registrations
    /// whose token has been dropped are removed.
    pub fn poll_changes(&self) -> usize {
        let mut watches = self.watches.lock().unwrap();
        let mut changed = 0;

        watches.retain_mut(|watch| {
            let token = match watch.token.upgrade() {
                Some(token) => token,
                None => return false,
            };

            let current = fingerprint_file(&watch.path);
            if current != watch.fingerprint {
                debug!(path = %watch.path.display(), "dependent file changed");
                watch.fingerprint = current;
                token.invalidate();
                changed += 1;
            }
            true
        });

        changed
    }

    /// Number of live watch registrations.
    pub fn watch_count(&self) -> usize {
        self.watches.lock().unwrap().len()
    }
}
