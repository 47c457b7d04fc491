//! A map whose entries expire after a time-to-live.
//!
//! [`TtlCache`] is not synchronized; owners that share it across
//! tasks wrap it in their own lock so that a read followed by a write can be
//! made atomic.
//!
//! Expired entries are never returned. They are physically removed by
//! [`TtlCache::purge_expired`] and by an amortized sweep that runs inside
//! [`TtlCache::set`] whenever the map has doubled since the last sweep.
//!
//! # Examples
//!
//! ```
//! use dw_core::TtlCache;
//! use std::time::Duration;
//!
//! let mut cache = TtlCache::new(Duration::from_secs(10));
//! cache.set("a", 1, None);
//! assert_eq!(cache.get(&"a"), Some(1));
//! assert_eq!(cache.get(&"b"), None);
//! ```

use std::hash::Hash;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

/// Entries below this count never trigger the sweep in `set`.
const MIN_SWEEP_LEN: usize = 64;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A hash map with per-entry expiry.
#[derive(Debug, Clone)]
pub struct TtlCache<K, V> {
    entries: FxHashMap<K, Entry<V>>,
    default_ttl: Duration,
    sweep_at: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Creates an empty cache whose entries live for `default_ttl` unless
    /// [`set`](Self::set) is given an explicit TTL.
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: FxHashMap::default(),
            default_ttl,
            sweep_at: MIN_SWEEP_LEN,
        }
    }

    /// The TTL applied when `set` is called without one.
    #[inline]
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns a clone of the live value for `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Like [`get`](Self::get), evaluated at `now`.
    #[must_use]
    pub fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone())
    }

    /// Inserts or replaces `key`, expiring after `ttl` (or the default TTL).
    pub fn set(&mut self, key: K, value: V, ttl: Option<Duration>) {
        self.set_at(key, value, ttl, Instant::now());
    }

    /// Like [`set`](Self::set), with the entry's lifetime starting at `now`.
    pub fn set_at(&mut self, key: K, value: V, ttl: Option<Duration>, now: Instant) {
        let expires_at = now + ttl.unwrap_or(self.default_ttl);
        self.entries.insert(key, Entry { value, expires_at });

        if self.entries.len() >= self.sweep_at {
            self.purge_expired_at(now);
            self.sweep_at = (self.entries.len() * 2).max(MIN_SWEEP_LEN);
        }
    }

    /// Removes `key`, returning its value if it was still live.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.entries
            .remove(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value)
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    /// Like [`purge_expired`](Self::purge_expired), evaluated at `now`.
    pub fn purge_expired_at(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.sweep_at = MIN_SWEEP_LEN;
    }
}
