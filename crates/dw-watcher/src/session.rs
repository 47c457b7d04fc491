//! Live state for one watched root.
//!
//! A [`WatchSession`] owns the native `notify` watcher for its root and the
//! set of directories that watcher is subscribed to. Every directory is
//! subscribed individually in non-recursive mode, so the session decides
//! exactly which subtrees are watched; this is what lets a handler veto a
//! new directory or keep watching a path that disappeared.
//!
//! # Lifecycle
//!
//! 1. [`WatchSession::open`] creates the native watcher, subscribes the root
//!    and hands back the receiving end of the raw event queue.
//! 2. The owner seeds subdirectories with [`WatchSession::subscribe_tree`]
//!    and starts a consumer on the queue.
//! 3. [`WatchSession::close`] sets the close flag. The consumer notices it,
//!    stops dispatching and calls [`WatchSession::release_handle`], which
//!    drops the native watcher.
//!
//! Once the handle is released, subscribe and unsubscribe become no-ops.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use dw_core::{WatchConfig, join_path};
use ignore::WalkBuilder;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::debounce::DebounceCache;
use crate::error::WatchError;
use crate::events::{RawEvent, raw_events};

/// The native watcher and the paths it is subscribed to.
///
/// Kept under one lock so the set never disagrees with what was actually
/// passed to `watch`/`unwatch`.
struct NativeHandle {
    watcher: Option<RecommendedWatcher>,
    subscribed: FxHashSet<Utf8PathBuf>,
}

/// One watched root: native handle, close flag, debounce state and the
/// in-flight limit for its settle tasks.
pub struct WatchSession {
    root: Utf8PathBuf,
    native: Mutex<NativeHandle>,
    closed: CancellationToken,
    debounce: DebounceCache,
    in_flight: Arc<Semaphore>,
}

impl std::fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let native = self.native.lock();
        f.debug_struct("WatchSession")
            .field("root", &self.root)
            .field("closed", &self.is_closed())
            .field("has_handle", &native.watcher.is_some())
            .field("subscribed", &native.subscribed.len())
            .finish_non_exhaustive()
    }
}

impl WatchSession {
    /// Creates the native watcher for `root` and subscribes the root itself.
    ///
    /// `root` must already be in canonical form; it becomes the registry key.
    /// Raw events start flowing into the returned receiver immediately.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::WatcherCreation`] if the native watcher cannot
    /// be allocated and [`WatchError::Subscribe`] if the root cannot be
    /// watched (it does not exist, or is not readable).
    pub fn open(
        root: Utf8PathBuf,
        config: &WatchConfig,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<RawEvent>), WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    let (accepted, rejected) = raw_events(event);
                    for error in rejected {
                        warn!(error = %error, "Skipping non-UTF-8 path in file event");
                    }
                    for raw in accepted {
                        if tx.send(raw).is_err() {
                            // Consumer has exited; the handle is about to be dropped.
                            break;
                        }
                    }
                }
                Err(error) => warn!(error = %error, "Native watcher error"),
            }
        })
        .map_err(WatchError::WatcherCreation)?;

        watcher
            .watch(root.as_std_path(), RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::subscribe(root.clone(), source))?;

        let mut subscribed = FxHashSet::default();
        subscribed.insert(root.clone());

        let session = Self {
            root,
            native: Mutex::new(NativeHandle {
                watcher: Some(watcher),
                subscribed,
            }),
            closed: CancellationToken::new(),
            debounce: DebounceCache::from_config(config),
            in_flight: Arc::new(Semaphore::new(config.max_in_flight)),
        };

        Ok((Arc::new(session), rx))
    }

    /// The canonical root this session watches.
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// The session's duplicate-suppression gate.
    #[inline]
    #[must_use]
    pub fn debounce(&self) -> &DebounceCache {
        &self.debounce
    }

    /// Permits bounding how many settle tasks run at once.
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> &Arc<Semaphore> {
        &self.in_flight
    }

    /// Sets the close flag. Idempotent; the flag is never cleared.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// A token that completes when the session is closed.
    #[must_use]
    pub fn close_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Returns `true` while the native watcher is still held.
    #[must_use]
    pub fn has_handle(&self) -> bool {
        self.native.lock().watcher.is_some()
    }

    /// Drops the native watcher and forgets every subscription.
    pub fn release_handle(&self) {
        let released = {
            let mut native = self.native.lock();
            native.subscribed.clear();
            native.watcher.take()
        };
        // Dropped outside the lock; tearing down the backend can block briefly.
        drop(released);
    }

    /// Adds `path` to the native watch set.
    ///
    /// Returns `true` if the path is subscribed afterwards. Native failures
    /// are logged and reported as `false`; they are never retried.
    pub fn subscribe(&self, path: &Utf8Path) -> bool {
        let mut guard = self.native.lock();
        let NativeHandle {
            watcher,
            subscribed,
        } = &mut *guard;

        let Some(watcher) = watcher.as_mut() else {
            return false;
        };
        if subscribed.contains(path) {
            return true;
        }

        match watcher.watch(path.as_std_path(), RecursiveMode::NonRecursive) {
            Ok(()) => {
                subscribed.insert(path.to_path_buf());
                true
            }
            Err(error) => {
                trace!(path = %path, error = %error, "Ignoring failed subscribe");
                false
            }
        }
    }

    /// Removes `path` from the native watch set.
    ///
    /// Returns `true` if the path was subscribed. The native `unwatch` may
    /// fail when the backend already dropped the watch (the directory is
    /// gone); that failure is ignored.
    pub fn unsubscribe(&self, path: &Utf8Path) -> bool {
        let mut guard = self.native.lock();
        let NativeHandle {
            watcher,
            subscribed,
        } = &mut *guard;

        if !subscribed.remove(path) {
            return false;
        }
        if let Some(watcher) = watcher.as_mut() {
            if let Err(error) = watcher.unwatch(path.as_std_path()) {
                trace!(path = %path, error = %error, "Ignoring failed unsubscribe");
            }
        }
        true
    }

    /// Returns `true` if `path` is in the native watch set.
    #[must_use]
    pub fn is_subscribed(&self, path: &Utf8Path) -> bool {
        self.native.lock().subscribed.contains(path)
    }

    /// The subscribed paths, sorted.
    #[must_use]
    pub fn subscribed_paths(&self) -> Vec<Utf8PathBuf> {
        let mut paths: Vec<_> = self.native.lock().subscribed.iter().cloned().collect();
        paths.sort();
        paths
    }

    /// Subscribes `dir` and every directory beneath it that exists right now.
    ///
    /// Walks depth-first without following symlinks and without any ignore
    /// rules, so hidden directories are watched too. Unreadable directories
    /// are skipped along with their contents; the walk continues with their
    /// siblings. Returns the number of directories newly subscribed.
    ///
    /// Performs blocking I/O; call it from a blocking context.
    pub fn subscribe_tree(&self, dir: &Utf8Path) -> usize {
        let mut added = usize::from(!self.is_subscribed(dir) && self.subscribe(dir));

        let walker = WalkBuilder::new(dir)
            .standard_filters(false)
            .follow_links(false)
            .build();

        for entry in walker {
            if self.is_closed() {
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    debug!(root = %self.root, error = %error, "Skipping unreadable entry");
                    continue;
                }
            };
            if entry.depth() == 0 || !entry.file_type().is_some_and(|t| t.is_dir()) {
                continue;
            }

            let (Some(parent), Some(name)) = (entry.path().parent(), entry.file_name().to_str())
            else {
                warn!(path = %entry.path().display(), "Skipping non-UTF-8 directory");
                continue;
            };
            let path = match join_path(parent, &[name]) {
                Ok(path) => path,
                Err(error) => {
                    debug!(error = %error, "Skipping directory outside its parent");
                    continue;
                }
            };

            if !self.is_subscribed(&path) && self.subscribe(&path) {
                added += 1;
            }
        }

        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn utf8_root(dir: &TempDir) -> Utf8PathBuf {
        dw_core::resolve_root(dir.path()).expect("temp dir should resolve")
    }

    #[test]
    fn test_open_subscribes_root() {
        let dir = TempDir::new().unwrap();
        let root = utf8_root(&dir);

        let (session, _rx) = WatchSession::open(root.clone(), &WatchConfig::default()).unwrap();
        assert_eq!(session.root(), root.as_path());
        assert!(session.is_subscribed(&root));
        assert!(session.has_handle());
        assert!(!session.is_closed());
    }

    #[test]
    fn test_open_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        let root = utf8_root(&dir).join("missing");

        let err = WatchSession::open(root, &WatchConfig::default()).unwrap_err();
        assert!(matches!(err, WatchError::Subscribe { .. }));
    }

    #[test]
    fn test_subscribe_tree_walks_nested_dirs() {
        let dir = TempDir::new().unwrap();
        let root = utf8_root(&dir);
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir_all(root.join(".hidden")).unwrap();
        fs::write(root.join("a/file.txt"), "x").unwrap();

        let (session, _rx) = WatchSession::open(root.clone(), &WatchConfig::default()).unwrap();
        let added = session.subscribe_tree(&root);

        assert_eq!(added, 4);
        assert_eq!(
            session.subscribed_paths(),
            vec![
                root.clone(),
                root.join(".hidden"),
                root.join("a"),
                root.join("a/b"),
                root.join("a/b/c"),
            ]
        );
        assert!(!session.is_subscribed(&root.join("a/file.txt")));
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let root = utf8_root(&dir);
        fs::create_dir(root.join("sub")).unwrap();

        let (session, _rx) = WatchSession::open(root.clone(), &WatchConfig::default()).unwrap();
        assert!(session.subscribe(&root.join("sub")));
        assert!(session.subscribe(&root.join("sub")));
        assert_eq!(session.subscribed_paths().len(), 2);
    }

    #[test]
    fn test_subscribe_missing_path_is_ignored() {
        let dir = TempDir::new().unwrap();
        let root = utf8_root(&dir);

        let (session, _rx) = WatchSession::open(root.clone(), &WatchConfig::default()).unwrap();
        assert!(!session.subscribe(&root.join("nope")));
        assert!(!session.is_subscribed(&root.join("nope")));
    }

    #[test]
    fn test_unsubscribe() {
        let dir = TempDir::new().unwrap();
        let root = utf8_root(&dir);
        fs::create_dir(root.join("sub")).unwrap();

        let (session, _rx) = WatchSession::open(root.clone(), &WatchConfig::default()).unwrap();
        session.subscribe(&root.join("sub"));

        assert!(session.unsubscribe(&root.join("sub")));
        assert!(!session.unsubscribe(&root.join("sub")));
        assert!(!session.is_subscribed(&root.join("sub")));
    }

    #[test]
    fn test_close_and_release() {
        let dir = TempDir::new().unwrap();
        let root = utf8_root(&dir);
        fs::create_dir(root.join("sub")).unwrap();

        let (session, _rx) = WatchSession::open(root.clone(), &WatchConfig::default()).unwrap();
        session.close();
        session.close();
        assert!(session.is_closed());
        assert!(session.close_token().is_cancelled());

        session.release_handle();
        assert!(!session.has_handle());
        assert!(session.subscribed_paths().is_empty());
        assert!(!session.subscribe(&root.join("sub")));
    }
}
