//! Recursive, debounced directory watching with veto callbacks.
//!
//! This crate watches directory trees through the `notify` crate and turns
//! its raw events into three classified changes (file changed, directory
//! added, path removed) delivered to a [`WatchHandler`].
//!
//! # Overview
//!
//! The dw-watcher crate is designed to:
//!
//! - Watch any number of roots from one [`FileWatcher`], one session per root
//! - Subscribe every existing subdirectory up front and new ones as they
//!   appear, unless the handler vetoes them
//! - Drop repeated events for the same path inside a 100ms window
//! - Wait out a short settle delay, then classify each change by reading the
//!   filesystem rather than trusting the native event kind
//! - Shut down one root or all of them and await the drain
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ FileWatcher                                                     │
//! │   handler ─────────────────────────────────────────────┐        │
//! │   WatchRegistry { root -> WatchSession }               │        │
//! └──────────────────────┬─────────────────────────────────│────────┘
//!                        │ one per root                    │
//!                        ▼                                 ▼
//! ┌──────────────────────────────────┐    ┌────────────────────────┐
//! │ WatchSession                     │    │ EventClassifier        │
//! │   notify watcher ── raw events ──┼──► │   DebounceCache        │
//! │   subscribed dirs                │    │   settle + classify    │
//! │   close flag, in-flight permits  │ ◄──┼── subscribe/unsubscribe│
//! └──────────────────────────────────┘    └────────────────────────┘
//! ```
//!
//! # Crate Dependencies
//!
//! ```text
//! dw-cli ──► dw-watcher ──► dw-core
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use dw_watcher::{Callbacks, FileWatcher, WatchDecision};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let watcher = FileWatcher::new();
//!     watcher.set_handler(
//!         Callbacks::new()
//!             .with_file_change(|event| println!("changed {}", event.path))
//!             .with_dir_add(|event| {
//!                 // Never descend into dependency folders.
//!                 if event.file_name() == Some("node_modules") {
//!                     WatchDecision::StopWatching
//!                 } else {
//!                     WatchDecision::KeepWatching
//!                 }
//!             }),
//!     );
//!
//!     watcher.watch_dir("./project", true).await?;
//!     tokio::signal::ctrl_c().await?;
//!
//!     watcher.close_watcher("*")?;
//!     watcher.wait().await;
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! Only starting and stopping a root can fail; see [`WatchError`]. Once a
//! session is running nothing is surfaced to the caller: a path that cannot
//! be stat'ed is reported as removed, and subdirectory subscribe failures are
//! logged and skipped.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod classifier;
pub mod debounce;
pub mod error;
pub mod events;
pub mod handler;
pub mod registry;
pub mod session;
pub mod watcher;

pub use dw_core::{ReactiveAdd, WatchConfig};

// Re-export error types
pub use error::WatchError;

// Re-export event types
pub use events::{ChangeKind, Op, RawEvent, WatchEvent};

// Re-export handler types
pub use handler::{Callbacks, NoopHandler, WatchDecision, WatchHandler};

// Re-export the building blocks
pub use classifier::classify;
pub use debounce::DebounceCache;
pub use registry::WatchRegistry;
pub use session::WatchSession;

// Re-export watcher types
pub use watcher::FileWatcher;
