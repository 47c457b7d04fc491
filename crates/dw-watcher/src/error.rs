//! Error types for the dw-watcher crate.
//!
//! This module provides the [`WatchError`] type for errors returned by
//! [`FileWatcher`](crate::FileWatcher) operations.

use camino::Utf8PathBuf;
use dw_core::{ConfigError, PathError};

/// Errors that can occur during file watching operations.
///
/// # Error Recovery Strategy
///
/// - **Path resolution** ([`WatchError::PathResolution`]): Fatal - nothing is registered
/// - **Watcher creation** ([`WatchError::WatcherCreation`]): Fatal - nothing is registered
/// - **Root subscription** ([`WatchError::Subscribe`]): Fatal - nothing is registered
/// - **Already watched** ([`WatchError::AlreadyWatched`]): Fatal for the call, the
///   existing session is untouched
/// - **Invalid configuration** ([`WatchError::Config`]): Fatal - fix the configuration
/// - **Non-UTF-8 path** ([`WatchError::NonUtf8Path`]): Recoverable - skip and continue
///
/// Failures that happen after a session is running (status queries, adding
/// or removing individual subdirectory watches) are never surfaced; see the
/// crate documentation.
///
/// # Examples
///
/// ```
/// use dw_watcher::WatchError;
///
/// fn handle_error(err: WatchError) {
///     match err {
///         WatchError::PathResolution(e) => eprintln!("Bad root: {e}"),
///         WatchError::WatcherCreation(e) => eprintln!("No watcher: {e}"),
///         WatchError::Subscribe { path, .. } => eprintln!("Cannot watch {path}"),
///         WatchError::AlreadyWatched(p) => eprintln!("Already watching {p}"),
///         WatchError::Config(e) => eprintln!("Config: {e}"),
///         WatchError::NonUtf8Path(p) => eprintln!("Invalid path: {}", p.display()),
///     }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The root could not be resolved to an absolute path.
    #[error("cannot resolve watch root: {0}")]
    PathResolution(#[from] PathError),

    /// The native watcher could not be allocated.
    #[error("failed to create native watcher: {0}")]
    WatcherCreation(#[source] notify::Error),

    /// The root directory could not be subscribed.
    #[error("failed to watch {path}: {source}")]
    Subscribe {
        /// The path that could not be watched.
        path: Utf8PathBuf,
        /// The underlying notify error.
        #[source]
        source: notify::Error,
    },

    /// A live session already exists for this root.
    #[error("already watching {0}")]
    AlreadyWatched(Utf8PathBuf),

    /// The watcher configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A path is not valid UTF-8.
    ///
    /// Native events for such paths are logged and skipped.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),
}

impl WatchError {
    /// Creates a new [`WatchError::Subscribe`] error.
    #[inline]
    pub fn subscribe(path: impl Into<Utf8PathBuf>, source: notify::Error) -> Self {
        Self::Subscribe {
            path: path.into(),
            source,
        }
    }

    /// Creates a new [`WatchError::NonUtf8Path`] error.
    #[inline]
    pub fn non_utf8_path(path: impl Into<std::path::PathBuf>) -> Self {
        Self::NonUtf8Path(path.into())
    }

    /// Returns `true` if this error is recoverable (watching can continue).
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NonUtf8Path(_))
    }

    /// Returns `true` if this error is fatal to the operation that returned it.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns the watch path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::Subscribe { path, .. } | Self::AlreadyWatched(path) => Some(path),
            Self::PathResolution(PathError::Escapes { root, .. }) => Some(root),
            Self::PathResolution(_)
            | Self::WatcherCreation(_)
            | Self::Config(_)
            | Self::NonUtf8Path(_) => None,
        }
    }
}
