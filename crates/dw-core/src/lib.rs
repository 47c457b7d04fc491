//! Core types and utilities for the dirwatch workspace.
//!
//! This crate provides the pieces the watcher builds on but that carry no
//! coordination logic of their own:
//!
//! - [`WatchConfig`] and [`Config`] - tunables for debouncing, settling and
//!   concurrency, loadable from JSON
//! - [`resolve_root`] and [`join_path`] - absolute path resolution and a
//!   join that refuses to leave its root
//! - [`TtlCache`] - a small map whose entries expire after a time-to-live
//! - Error types for the above

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod path;
pub mod ttl_cache;

pub use config::{Config, ReactiveAdd, WatchConfig};
pub use error::{ConfigError, PathError};
pub use path::{join_path, resolve_root};
pub use ttl_cache::TtlCache;
