//! Event types for filesystem change notifications.
//!
//! # Event Flow
//!
//! ```text
//! notify::Event (one or more paths)
//!        │  raw_events()
//!        ▼
//!   RawEvent per path ──► debounce gate ──► settle delay
//!                                               │ fs::metadata
//!                                               ▼
//!                                  WatchEvent { kind: Removed | DirAdded | FileChanged }
//!                                               │
//!                                               ▼
//!                                        WatchHandler hooks
//! ```

use std::fmt;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use notify::EventKind;
use notify::event::ModifyKind;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::WatchError;

/// The low-level operation reported by the native watcher.
///
/// Labels use the classic inotify vocabulary so they read the same on every
/// platform.
///
/// # Examples
///
/// ```
/// use dw_watcher::Op;
///
/// assert_eq!(Op::Create.to_string(), "CREATE");
/// assert_eq!(Op::Remove.as_str(), "REMOVE");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Op {
    /// A file or directory was created.
    Create,
    /// File contents were written.
    Write,
    /// A file or directory was removed.
    Remove,
    /// A file or directory was renamed (reported for both old and new name).
    Rename,
    /// Permissions or other metadata changed.
    Chmod,
}

impl Op {
    /// Maps a notify event kind to an operation.
    ///
    /// Access notifications and `Other` carry no change and map to `None`.
    #[must_use]
    pub const fn from_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Create),
            EventKind::Modify(ModifyKind::Name(_)) => Some(Self::Rename),
            EventKind::Modify(ModifyKind::Metadata(_)) => Some(Self::Chmod),
            EventKind::Modify(_) | EventKind::Any => Some(Self::Write),
            EventKind::Remove(_) => Some(Self::Remove),
            EventKind::Access(_) | EventKind::Other => None,
        }
    }

    /// The upper-case label for this operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Write => "WRITE",
            Self::Remove => "REMOVE",
            Self::Rename => "RENAME",
            Self::Chmod => "CHMOD",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single undebounced notification for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Absolute path the notification refers to.
    pub path: Utf8PathBuf,
    /// The reported operation.
    pub op: Op,
    /// When the notification was received.
    pub received_at: Instant,
}

impl RawEvent {
    /// Creates a raw event stamped with the current instant.
    #[inline]
    #[must_use]
    pub fn new(path: Utf8PathBuf, op: Op) -> Self {
        Self {
            path,
            op,
            received_at: Instant::now(),
        }
    }
}

/// Splits a notify event into one [`RawEvent`] per UTF-8 path.
///
/// Non-UTF-8 paths are returned separately so the caller can log them.
#[must_use]
pub fn raw_events(event: notify::Event) -> (SmallVec<[RawEvent; 2]>, SmallVec<[WatchError; 1]>) {
    let mut accepted = SmallVec::new();
    let mut rejected = SmallVec::new();

    let Some(op) = Op::from_kind(&event.kind) else {
        return (accepted, rejected);
    };

    for path in event.paths {
        match Utf8PathBuf::try_from(path) {
            Ok(path) => accepted.push(RawEvent::new(path, op)),
            Err(e) => rejected.push(WatchError::non_utf8_path(e.into_path_buf())),
        }
    }

    (accepted, rejected)
}

/// What the filesystem showed once the settle delay had passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// The path no longer exists.
    Removed,
    /// The path is a directory.
    DirAdded,
    /// The path is a file (or anything else that is not a directory).
    FileChanged,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Removed => "removed",
            Self::DirAdded => "dir added",
            Self::FileChanged => "file changed",
        })
    }
}

/// A classified change, as delivered to a [`WatchHandler`](crate::WatchHandler).
///
/// # Examples
///
/// ```
/// use dw_watcher::{ChangeKind, Op, WatchEvent};
/// use camino::Utf8PathBuf;
///
/// let event = WatchEvent::new(
///     Utf8PathBuf::from("/srv/data/report.csv"),
///     Op::Write,
///     ChangeKind::FileChanged,
/// );
/// assert_eq!(event.file_name(), Some("report.csv"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEvent {
    /// Absolute path of the changed entry.
    pub path: Utf8PathBuf,
    /// The operation reported by the native watcher.
    pub op: Op,
    /// The classification made after the settle delay.
    pub kind: ChangeKind,
}

impl WatchEvent {
    /// Creates a classified event.
    #[inline]
    #[must_use]
    pub const fn new(path: Utf8PathBuf, op: Op, kind: ChangeKind) -> Self {
        Self { path, op, kind }
    }

    /// The path of the changed entry.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the file name without the directory path.
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()
    }
}

impl fmt::Display for WatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.op, self.path, self.kind)
    }
}
