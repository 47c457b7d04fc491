//! Hooks invoked for classified events.
//!
//! A [`WatchHandler`] receives every [`WatchEvent`] a session classifies. The
//! directory-add and remove hooks return a [`WatchDecision`] that controls
//! whether the session changes its native watch set:
//!
//! | Kind          | Hook              | Default          | Effect of the decision            |
//! |---------------|-------------------|------------------|-----------------------------------|
//! | `FileChanged` | `on_file_change`  | -                | none                              |
//! | `DirAdded`    | `on_dir_add`      | `KeepWatching`   | `KeepWatching` subscribes the dir |
//! | `Removed`     | `on_remove`       | `StopWatching`   | `StopWatching` unsubscribes it    |
//!
//! `on_any` runs after the specific hook for every event, whatever it decided.
//!
//! # Examples
//!
//! ```
//! use dw_watcher::{Callbacks, WatchDecision};
//!
//! let callbacks = Callbacks::new()
//!     .with_file_change(|event| println!("changed: {}", event.path))
//!     .with_dir_add(|event| {
//!         if event.file_name() == Some("node_modules") {
//!             WatchDecision::StopWatching
//!         } else {
//!             WatchDecision::KeepWatching
//!         }
//!     });
//! # let _ = callbacks;
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::events::WatchEvent;

/// Whether a session should keep a path in its native watch set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchDecision {
    /// Keep (or start) watching the path.
    KeepWatching,
    /// Stop (or never start) watching the path.
    StopWatching,
}

/// Receives classified events from a [`FileWatcher`](crate::FileWatcher).
///
/// Hooks run on tokio worker threads, possibly concurrently for different
/// paths, so implementations must be [`Send`] + [`Sync`]. They should return
/// quickly; a slow hook holds one of the session's in-flight permits.
pub trait WatchHandler: Send + Sync + 'static {
    /// A regular file was created or modified.
    fn on_file_change(&self, _event: &WatchEvent) {}

    /// A directory appeared. Returning [`WatchDecision::StopWatching`] keeps
    /// it out of the watch set.
    fn on_dir_add(&self, _event: &WatchEvent) -> WatchDecision {
        WatchDecision::KeepWatching
    }

    /// A path disappeared. Returning [`WatchDecision::KeepWatching`] leaves
    /// its watch in place.
    fn on_remove(&self, _event: &WatchEvent) -> WatchDecision {
        WatchDecision::StopWatching
    }

    /// Called after the specific hook for every event.
    fn on_any(&self, _event: &WatchEvent) {}
}

/// The handler a watcher shares with its sessions' consumers.
///
/// Consumers read the slot once per event, so replacing the handler affects
/// events dispatched after the swap, including those of running sessions.
pub(crate) type SharedHandler = Arc<RwLock<Arc<dyn WatchHandler>>>;

/// A handler that ignores everything and applies the default decisions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl WatchHandler for NoopHandler {}

type EventFn = Box<dyn Fn(&WatchEvent) + Send + Sync>;
type DecisionFn = Box<dyn Fn(&WatchEvent) -> WatchDecision + Send + Sync>;

/// A [`WatchHandler`] assembled from optional closures.
///
/// Unset hooks behave like the trait defaults.
#[derive(Default)]
pub struct Callbacks {
    file_change: Option<EventFn>,
    dir_add: Option<DecisionFn>,
    remove: Option<DecisionFn>,
    any: Option<EventFn>,
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("file_change", &self.file_change.is_some())
            .field("dir_add", &self.dir_add.is_some())
            .field("remove", &self.remove.is_some())
            .field("any", &self.any.is_some())
            .finish()
    }
}

impl Callbacks {
    /// Creates a set of callbacks with every hook unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hook for changed files.
    #[must_use]
    pub fn with_file_change(mut self, f: impl Fn(&WatchEvent) + Send + Sync + 'static) -> Self {
        self.file_change = Some(Box::new(f));
        self
    }

    /// Sets the hook for new directories.
    #[must_use]
    pub fn with_dir_add(
        mut self,
        f: impl Fn(&WatchEvent) -> WatchDecision + Send + Sync + 'static,
    ) -> Self {
        self.dir_add = Some(Box::new(f));
        self
    }

    /// Sets the hook for removed paths.
    #[must_use]
    pub fn with_remove(
        mut self,
        f: impl Fn(&WatchEvent) -> WatchDecision + Send + Sync + 'static,
    ) -> Self {
        self.remove = Some(Box::new(f));
        self
    }

    /// Sets the hook that runs after every event.
    #[must_use]
    pub fn with_any(mut self, f: impl Fn(&WatchEvent) + Send + Sync + 'static) -> Self {
        self.any = Some(Box::new(f));
        self
    }
}

impl WatchHandler for Callbacks {
    fn on_file_change(&self, event: &WatchEvent) {
        if let Some(f) = &self.file_change {
            f(event);
        }
    }

    fn on_dir_add(&self, event: &WatchEvent) -> WatchDecision {
        self.dir_add
            .as_ref()
            .map_or(WatchDecision::KeepWatching, |f| f(event))
    }

    fn on_remove(&self, event: &WatchEvent) -> WatchDecision {
        self.remove
            .as_ref()
            .map_or(WatchDecision::StopWatching, |f| f(event))
    }

    fn on_any(&self, event: &WatchEvent) {
        if let Some(f) = &self.any {
            f(event);
        }
    }
}
