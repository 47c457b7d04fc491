//! Root-keyed table of live sessions.
//!
//! The live count is published on a `tokio::sync::watch` channel from inside
//! the same critical section that mutates the map, so an observer can never
//! see a count that disagrees with the table. [`WatchRegistry::wait_empty`]
//! awaits that channel instead of polling.
//!
//! The registry only tracks sessions; it never closes them or touches their
//! native handles. Callers close what they evict.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tokio::sync::watch;

use crate::session::WatchSession;

/// Thread-safe mapping from canonical root to its [`WatchSession`].
#[derive(Debug)]
pub struct WatchRegistry {
    sessions: Mutex<FxHashMap<Utf8PathBuf, Arc<WatchSession>>>,
    live: watch::Sender<usize>,
}

impl Default for WatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        let (live, _) = watch::channel(0);
        Self {
            sessions: Mutex::new(FxHashMap::default()),
            live,
        }
    }

    /// Inserts `session` under its root.
    ///
    /// # Errors
    ///
    /// Hands `session` back if a session is already registered for that root;
    /// the existing entry is left untouched.
    pub fn register(&self, session: Arc<WatchSession>) -> Result<(), Arc<WatchSession>> {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(session.root()) {
            return Err(session);
        }
        sessions.insert(session.root().to_path_buf(), session);
        self.live.send_replace(sessions.len());
        Ok(())
    }

    /// Removes and returns the session for `root`, if any.
    pub fn unregister(&self, root: &Utf8Path) -> Option<Arc<WatchSession>> {
        let mut sessions = self.sessions.lock();
        let removed = sessions.remove(root);
        if removed.is_some() {
            self.live.send_replace(sessions.len());
        }
        removed
    }

    /// Removes and returns every session.
    pub fn unregister_all(&self) -> SmallVec<[Arc<WatchSession>; 4]> {
        let mut sessions = self.sessions.lock();
        let removed: SmallVec<_> = sessions.drain().map(|(_, session)| session).collect();
        self.live.send_replace(0);
        removed
    }

    /// The session registered for `root`, if any.
    #[must_use]
    pub fn get(&self, root: &Utf8Path) -> Option<Arc<WatchSession>> {
        self.sessions.lock().get(root).cloned()
    }

    /// Returns `true` if a session is registered for `root`.
    #[must_use]
    pub fn contains(&self, root: &Utf8Path) -> bool {
        self.sessions.lock().contains_key(root)
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Returns `true` if no session is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered roots, sorted.
    #[must_use]
    pub fn roots(&self) -> Vec<Utf8PathBuf> {
        let mut roots: Vec<_> = self.sessions.lock().keys().cloned().collect();
        roots.sort();
        roots
    }

    /// Resolves once the registry holds no sessions.
    ///
    /// Returns immediately if it is already empty. There is no timeout; wrap
    /// the future in `tokio::time::timeout` for a bounded wait.
    pub async fn wait_empty(&self) {
        let mut live = self.live.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = live.wait_for(|count| *count == 0).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dw_core::{WatchConfig, resolve_root};
    use std::time::Duration;
    use tempfile::TempDir;

    fn session(dir: &TempDir) -> Arc<WatchSession> {
        let root = resolve_root(dir.path()).unwrap();
        WatchSession::open(root, &WatchConfig::default()).unwrap().0
    }

    #[test]
    fn test_register_and_unregister() {
        let dir = TempDir::new().unwrap();
        let registry = WatchRegistry::new();
        let session = session(&dir);
        let root = session.root().to_path_buf();

        assert!(registry.register(Arc::clone(&session)).is_ok());
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&root));
        assert_eq!(*registry.live.borrow(), 1);

        let removed = registry.unregister(&root).unwrap();
        assert!(Arc::ptr_eq(&removed, &session));
        assert!(registry.is_empty());
        assert_eq!(*registry.live.borrow(), 0);
        assert!(registry.unregister(&root).is_none());
    }

    #[test]
    fn test_register_duplicate_root_rejected() {
        let dir = TempDir::new().unwrap();
        let registry = WatchRegistry::new();
        let first = session(&dir);
        let second = session(&dir);

        assert!(registry.register(Arc::clone(&first)).is_ok());
        let rejected = registry.register(Arc::clone(&second)).unwrap_err();

        assert!(Arc::ptr_eq(&rejected, &second));
        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(&registry.get(first.root()).unwrap(), &first));
    }

    #[test]
    fn test_unregister_all() {
        let dirs: Vec<_> = (0..5).map(|_| TempDir::new().unwrap()).collect();
        let registry = WatchRegistry::new();
        for dir in &dirs {
            registry.register(session(dir)).unwrap();
        }
        assert_eq!(registry.len(), 5);
        assert_eq!(registry.roots().len(), 5);

        let removed = registry.unregister_all();
        assert_eq!(removed.len(), 5);
        assert!(registry.is_empty());
        assert_eq!(*registry.live.borrow(), 0);
    }

    #[tokio::test]
    async fn test_wait_empty_returns_immediately_when_empty() {
        let registry = WatchRegistry::new();
        tokio::time::timeout(Duration::from_millis(100), registry.wait_empty())
            .await
            .expect("empty registry should not block");
    }

    #[tokio::test]
    async fn test_wait_empty_resolves_after_unregister() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(WatchRegistry::new());
        let session = session(&dir);
        let root = session.root().to_path_buf();
        registry.register(session).unwrap();

        let waiter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.wait_empty().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        registry.unregister(&root);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait_empty should resolve")
            .expect("waiter task should not panic");
    }
}
