//! The public entry point: a set of watched roots sharing one handler.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                 notify backend thread (per session)              │
//! │  ┌────────────────────┐    ┌──────────────────────────────────┐  │
//! │  │ RecommendedWatcher │ -> │ callback: raw_events() -> send() │  │
//! │  └────────────────────┘    └────────────────┬─────────────────┘  │
//! └─────────────────────────────────────────────│────────────────────┘
//!                                               │ unbounded mpsc
//!                                               ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        tokio runtime                             │
//! │  ┌────────────────────┐    ┌──────────────┐    ┌──────────────┐  │
//! │  │ EventClassifier    │ -> │ settle tasks │ -> │ WatchHandler │  │
//! │  │ (debounce, permit) │    │ (≤ in-flight)│    │ hooks        │  │
//! │  └────────────────────┘    └──────────────┘    └──────────────┘  │
//! │                                                                  │
//! │  FileWatcher ── WatchRegistry { root -> WatchSession } ── wait() │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use dw_watcher::{Callbacks, FileWatcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), dw_watcher::WatchError> {
//!     let watcher = FileWatcher::new();
//!     watcher.set_handler(Callbacks::new().with_any(|event| println!("{event}")));
//!
//!     let root = watcher.watch_dir("/srv/data", true).await?;
//!     tokio::signal::ctrl_c().await.ok();
//!
//!     watcher.close_watcher(&root)?;
//!     watcher.wait().await;
//!     Ok(())
//! }
//! ```

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use dw_core::{WatchConfig, resolve_root};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::classifier::EventClassifier;
use crate::error::WatchError;
use crate::handler::{NoopHandler, SharedHandler, WatchHandler};
use crate::registry::WatchRegistry;
use crate::session::WatchSession;

/// Watches any number of directory roots and dispatches classified events to
/// a single [`WatchHandler`].
///
/// # Lifecycle
///
/// 1. **Creation**: [`FileWatcher::new`] or [`FileWatcher::with_config`]
///    creates an empty registry. Nothing is watched yet.
///
/// 2. **Watching**: [`FileWatcher::watch_dir`] opens a session per root and
///    starts its consumer task. Each root can be watched once at a time.
///
/// 3. **Shutdown**: [`FileWatcher::close_watcher`] closes one root (or every
///    root with `"*"`); [`FileWatcher::wait`] resolves once none are left.
///    Dropping the watcher closes every root.
///
/// # Thread Safety
///
/// All methods take `&self`; share the watcher behind an [`Arc`] to drive it
/// from several tasks. Methods that start sessions must run inside a tokio
/// runtime.
pub struct FileWatcher {
    registry: WatchRegistry,
    handler: SharedHandler,
    config: WatchConfig,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("roots", &self.roots())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for FileWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FileWatcher {
    /// Creates a watcher with the default configuration and a
    /// [`NoopHandler`].
    #[must_use]
    pub fn new() -> Self {
        Self::from_valid_config(WatchConfig::default())
    }

    /// Creates a watcher with `config`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Config`] if the configuration fails validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use dw_core::{ReactiveAdd, WatchConfig};
    /// use dw_watcher::FileWatcher;
    ///
    /// let config = WatchConfig {
    ///     reactive_add: ReactiveAdd::Shallow,
    ///     ..WatchConfig::default()
    /// };
    /// let watcher = FileWatcher::with_config(config)?;
    /// assert!(watcher.is_empty());
    /// # Ok::<(), dw_watcher::WatchError>(())
    /// ```
    pub fn with_config(config: WatchConfig) -> Result<Self, WatchError> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: WatchConfig) -> Self {
        let handler: Arc<dyn WatchHandler> = Arc::new(NoopHandler);
        Self {
            registry: WatchRegistry::new(),
            handler: Arc::new(RwLock::new(handler)),
            config,
        }
    }

    /// The configuration every new session is opened with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Replaces the handler.
    ///
    /// Takes effect for every event dispatched afterwards, including events
    /// from roots that are already being watched.
    pub fn set_handler(&self, handler: impl WatchHandler) {
        *self.handler.write() = Arc::new(handler);
    }

    /// Starts watching `root`.
    ///
    /// The root is resolved to an absolute, lexically clean path (symlinks
    /// are not resolved); that path is returned and identifies the root in
    /// later calls. With `recursive`, every directory that already exists
    /// under the root is subscribed before this returns. Directories that
    /// appear later are subscribed as their events arrive, subject to the
    /// handler's [`on_dir_add`](WatchHandler::on_dir_add) decision.
    ///
    /// # Errors
    ///
    /// - [`WatchError::PathResolution`] if `root` cannot be made absolute
    /// - [`WatchError::AlreadyWatched`] if the root is already being watched
    /// - [`WatchError::WatcherCreation`] if the native watcher cannot be
    ///   allocated
    /// - [`WatchError::Subscribe`] if the root itself cannot be watched
    ///
    /// Nothing is registered when an error is returned.
    pub async fn watch_dir(
        &self,
        root: impl AsRef<Path>,
        recursive: bool,
    ) -> Result<Utf8PathBuf, WatchError> {
        let root = resolve_root(root)?;
        if self.registry.contains(&root) {
            return Err(WatchError::AlreadyWatched(root));
        }

        let (session, events) = WatchSession::open(root.clone(), &self.config)?;
        if let Err(rejected) = self.registry.register(Arc::clone(&session)) {
            // Lost a race with a concurrent watch_dir for the same root.
            rejected.release_handle();
            return Err(WatchError::AlreadyWatched(root));
        }

        let classifier =
            EventClassifier::new(Arc::clone(&session), Arc::clone(&self.handler), &self.config);
        tokio::spawn(classifier.run(events));
        info!(root = %root, recursive, "Watching directory");

        if recursive {
            let walker = Arc::clone(&session);
            let walk_root = root.clone();
            match tokio::task::spawn_blocking(move || walker.subscribe_tree(&walk_root)).await {
                Ok(added) => debug!(root = %root, added, "Subscribed existing subdirectories"),
                Err(error) => debug!(root = %root, error = %error, "Subdirectory walk failed"),
            }
        }

        Ok(root)
    }

    /// Starts watching `root`, walking existing subdirectories when the
    /// configuration's `recursive` flag is set (the default).
    ///
    /// # Errors
    ///
    /// As for [`watch_dir`](Self::watch_dir).
    pub async fn watch_dir_with_defaults(
        &self,
        root: impl AsRef<Path>,
    ) -> Result<Utf8PathBuf, WatchError> {
        self.watch_dir(root, self.config.recursive).await
    }

    /// Stops watching `root`.
    ///
    /// `""` and `"*"` close every root. Closing a root that is not being
    /// watched is not an error. Events already handed to a settle task still
    /// finish, hooks included, after this returns; events the consumer has
    /// not yet taken from the queue are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::PathResolution`] if `root` cannot be resolved.
    pub fn close_watcher(&self, root: impl AsRef<Path>) -> Result<(), WatchError> {
        let root = root.as_ref();
        let raw = root.as_os_str();
        if raw.is_empty() || raw == OsStr::new("*") {
            self.close_all();
            return Ok(());
        }

        let root = resolve_root(root)?;
        match self.registry.unregister(&root) {
            Some(session) => {
                session.close();
                info!(root = %root, "Closed watcher");
            }
            None => debug!(root = %root, "Close requested for a root that is not watched"),
        }
        Ok(())
    }

    /// Stops watching every root.
    pub fn close_all(&self) {
        let sessions = self.registry.unregister_all();
        for session in &sessions {
            session.close();
        }
        if !sessions.is_empty() {
            info!(count = sessions.len(), "Closed all watchers");
        }
    }

    /// Resolves once no root is being watched.
    ///
    /// Returns immediately if nothing is watched. There is no timeout.
    pub async fn wait(&self) {
        self.registry.wait_empty().await;
    }

    /// Number of roots being watched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Returns `true` if no root is being watched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// The watched roots, sorted.
    #[must_use]
    pub fn roots(&self) -> Vec<Utf8PathBuf> {
        self.registry.roots()
    }

    /// Returns `true` if `root` resolves to a watched root.
    #[must_use]
    pub fn is_watching(&self, root: impl AsRef<Path>) -> bool {
        resolve_root(root).is_ok_and(|root| self.registry.contains(&root))
    }

    /// The directories currently subscribed under `root`, sorted.
    ///
    /// Empty if `root` is not being watched.
    #[must_use]
    pub fn subscribed_paths(&self, root: &Utf8Path) -> Vec<Utf8PathBuf> {
        resolve_root(root)
            .ok()
            .and_then(|root| self.registry.get(&root))
            .map(|session| session.subscribed_paths())
            .unwrap_or_default()
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        resolve_root(dir.path()).unwrap()
    }

    #[test]
    fn test_with_config_rejects_invalid() {
        let config = WatchConfig {
            max_in_flight: 0,
            ..WatchConfig::default()
        };
        let err = FileWatcher::with_config(config).unwrap_err();
        assert!(matches!(err, WatchError::Config(_)));
    }

    #[tokio::test]
    async fn test_watch_dir_registers_canonical_root() {
        let dir = TempDir::new().unwrap();
        let root = utf8(&dir);
        fs::create_dir(root.join("sub")).unwrap();
        let watcher = FileWatcher::new();

        let key = watcher.watch_dir(root.join("sub/.."), true).await.unwrap();

        assert_eq!(key, root);
        assert_eq!(watcher.len(), 1);
        assert!(watcher.is_watching(&root));
        assert_eq!(watcher.subscribed_paths(&root), vec![root.clone(), root.join("sub")]);
    }

    #[tokio::test]
    async fn test_watch_dir_non_recursive_skips_children() {
        let dir = TempDir::new().unwrap();
        let root = utf8(&dir);
        fs::create_dir(root.join("sub")).unwrap();
        let watcher = FileWatcher::new();

        watcher.watch_dir(&root, false).await.unwrap();
        assert_eq!(watcher.subscribed_paths(&root), vec![root.clone()]);
    }

    #[tokio::test]
    async fn test_watch_dir_with_defaults_follows_config() {
        let dir = TempDir::new().unwrap();
        let root = utf8(&dir);
        fs::create_dir(root.join("sub")).unwrap();
        let watcher = FileWatcher::with_config(WatchConfig {
            recursive: false,
            ..WatchConfig::default()
        })
        .unwrap();

        watcher.watch_dir_with_defaults(&root).await.unwrap();
        assert_eq!(watcher.subscribed_paths(&root), vec![root.clone()]);
    }

    #[tokio::test]
    async fn test_watch_dir_twice_fails() {
        let dir = TempDir::new().unwrap();
        let watcher = FileWatcher::new();

        watcher.watch_dir(dir.path(), true).await.unwrap();
        let err = watcher.watch_dir(dir.path(), true).await.unwrap_err();

        assert!(matches!(err, WatchError::AlreadyWatched(_)));
        assert_eq!(watcher.len(), 1);
    }

    #[tokio::test]
    async fn test_watch_missing_root_registers_nothing() {
        let dir = TempDir::new().unwrap();
        let watcher = FileWatcher::new();

        let err = watcher
            .watch_dir(dir.path().join("missing"), true)
            .await
            .unwrap_err();

        assert!(matches!(err, WatchError::Subscribe { .. }));
        assert!(watcher.is_empty());
    }

    #[tokio::test]
    async fn test_close_unknown_root_is_ok() {
        let dir = TempDir::new().unwrap();
        let watcher = FileWatcher::new();
        assert!(watcher.close_watcher(dir.path()).is_ok());
    }

    #[tokio::test]
    async fn test_close_empty_path_closes_all() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let watcher = FileWatcher::new();
        watcher.watch_dir(first.path(), false).await.unwrap();
        watcher.watch_dir(second.path(), false).await.unwrap();

        watcher.close_watcher("").unwrap();
        assert!(watcher.is_empty());
        tokio::time::timeout(Duration::from_secs(1), watcher.wait())
            .await
            .expect("wait should resolve once empty");
    }

    #[tokio::test]
    async fn test_rewatch_after_close() {
        let dir = TempDir::new().unwrap();
        let watcher = FileWatcher::new();

        let root = watcher.watch_dir(dir.path(), true).await.unwrap();
        watcher.close_watcher(&root).unwrap();
        watcher.wait().await;

        assert!(watcher.watch_dir(dir.path(), true).await.is_ok());
        assert_eq!(watcher.roots(), vec![root]);
    }

    #[tokio::test]
    async fn test_subscribed_paths_unknown_root() {
        let dir = TempDir::new().unwrap();
        let watcher = FileWatcher::new();
        assert!(watcher.subscribed_paths(&utf8(&dir)).is_empty());
    }
}
