//! Per-session duplicate suppression.
//!
//! Native watchers commonly report one logical change several times (an
//! editor's write-rename-chmod sequence, or a create followed by a write).
//! [`DebounceCache`] remembers when each path was last admitted and drops any
//! event that arrives within the debounce window of that instant.
//!
//! The check and the update happen under one lock, so two events for the
//! same path racing through the gate can never both pass.

use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use dw_core::{TtlCache, WatchConfig};
use parking_lot::Mutex;

/// Last-admitted timestamps keyed by absolute path.
#[derive(Debug)]
pub struct DebounceCache {
    last_seen: Mutex<TtlCache<Utf8PathBuf, Instant>>,
    window: Duration,
}

impl DebounceCache {
    /// Creates a cache that suppresses repeats within `window` and forgets a
    /// path `ttl` after it was last admitted.
    #[must_use]
    pub fn new(window: Duration, ttl: Duration) -> Self {
        Self {
            last_seen: Mutex::new(TtlCache::new(ttl)),
            window,
        }
    }

    /// Creates a cache from the watcher configuration.
    #[must_use]
    pub fn from_config(config: &WatchConfig) -> Self {
        Self::new(config.debounce(), config.debounce_ttl())
    }

    /// The suppression window.
    #[inline]
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Returns `true` and records `now` if `path` may pass the gate.
    ///
    /// Returns `false` if the path was admitted less than one window ago.
    /// A suppressed event does not refresh the stored timestamp.
    pub fn admit(&self, path: &Utf8Path, now: Instant) -> bool {
        let mut last_seen = self.last_seen.lock();
        let key = path.to_path_buf();

        if let Some(last) = last_seen.get_at(&key, now) {
            if now.saturating_duration_since(last) < self.window {
                return false;
            }
        }

        last_seen.set_at(key, now, None, now);
        true
    }

    /// Number of remembered paths, including ones past their TTL that have
    /// not been swept yet.
    #[must_use]
    pub fn len(&self) -> usize {
        self.last_seen.lock().len()
    }

    /// Returns `true` if no path is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last_seen.lock().is_empty()
    }
}
