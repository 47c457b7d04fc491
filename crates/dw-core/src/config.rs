//! Configuration structures for dirwatch.
//!
//! - [`WatchConfig`] - debounce, settle and concurrency settings for the watcher
//! - [`ReactiveAdd`] - what to do with directories that appear while watching
//! - [`Config`] - root configuration, loadable from a JSON file
//!
//! All configuration types implement [`Default`]; the defaults reproduce the
//! timings the watcher was designed around (100ms debounce, 100ms settle,
//! 10s debounce bookkeeping).

use std::time::Duration;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How a directory created after the initial walk is subscribed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactiveAdd {
    /// Subscribe only the reported directory.
    ///
    /// Children that already exist when the event is handled (for example
    /// after `mkdir -p a/b/c` or moving a tree into place) stay unwatched.
    Shallow,
    /// Subscribe the reported directory and walk its existing children.
    #[default]
    Recursive,
}

/// Configuration for the file watcher.
///
/// # Examples
///
/// ```
/// use dw_core::{ReactiveAdd, WatchConfig};
///
/// let config = WatchConfig::default();
/// assert_eq!(config.debounce_ms, 100);
/// assert_eq!(config.settle_ms, 100);
/// assert!(config.recursive);
/// assert_eq!(config.reactive_add, ReactiveAdd::Recursive);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Window in milliseconds under which a repeated event for the same path
    /// is dropped as a duplicate.
    pub debounce_ms: u64,

    /// Delay in milliseconds between accepting an event and re-reading the
    /// filesystem to classify it.
    pub settle_ms: u64,

    /// How long a path's last-seen timestamp is remembered, in milliseconds.
    ///
    /// Must not be shorter than `debounce_ms`.
    pub debounce_ttl_ms: u64,

    /// Whether `watch_dir` walks existing subdirectories by default.
    pub recursive: bool,

    /// Policy for directories discovered while running.
    pub reactive_add: ReactiveAdd,

    /// Maximum number of settle tasks a single session runs at once.
    ///
    /// Events beyond this wait in the session's queue, in arrival order.
    pub max_in_flight: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            settle_ms: 100,
            debounce_ttl_ms: 10_000,
            recursive: true,
            reactive_add: ReactiveAdd::Recursive,
            max_in_flight: 64,
        }
    }
}

impl WatchConfig {
    /// The debounce window as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// The settle delay as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// The debounce bookkeeping TTL as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn debounce_ttl(&self) -> Duration {
        Duration::from_millis(self.debounce_ttl_ms)
    }

    /// Checks that the values can drive a watcher.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] when `max_in_flight` is zero or
    /// the TTL is shorter than the debounce window.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_in_flight == 0 {
            return Err(ConfigError::invalid_option(
                "max_in_flight",
                "must be at least 1",
            ));
        }
        if self.debounce_ttl_ms < self.debounce_ms {
            return Err(ConfigError::invalid_option(
                "debounce_ttl_ms",
                format!(
                    "{} is shorter than the debounce window of {}ms",
                    self.debounce_ttl_ms, self.debounce_ms
                ),
            ));
        }
        Ok(())
    }
}

/// Root configuration for dirwatch.
///
/// # Examples
///
/// ```
/// use dw_core::Config;
///
/// let config: Config = serde_json::from_str(r#"{"watch": {"settle_ms": 250}}"#).unwrap();
/// assert_eq!(config.watch.settle_ms, 250);
/// assert_eq!(config.watch.debounce_ms, 100);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File watcher configuration.
    pub watch: WatchConfig,
}

impl Config {
    /// Reads and validates a configuration file.
    ///
    /// Missing fields fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Parse`] if it is not valid JSON for this structure, and
    /// [`ConfigError::InvalidOption`] if validation fails.
    pub fn from_json_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.watch.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn test_watch_config_defaults() {
        let config = WatchConfig::default();
        assert_eq!(config.debounce(), Duration::from_millis(100));
        assert_eq!(config.settle(), Duration::from_millis(100));
        assert_eq!(config.debounce_ttl(), Duration::from_secs(10));
        assert_eq!(config.max_in_flight, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_watch_config_serialization() {
        insta::assert_json_snapshot!(WatchConfig::default(), @r#"
        {
          "debounce_ms": 100,
          "settle_ms": 100,
          "debounce_ttl_ms": 10000,
          "recursive": true,
          "reactive_add": "recursive",
          "max_in_flight": 64
        }
        "#);
    }

    #[test]
    fn test_reactive_add_parses_snake_case() {
        let config: WatchConfig =
            serde_json::from_str(r#"{"reactive_add": "shallow"}"#).unwrap();
        assert_eq!(config.reactive_add, ReactiveAdd::Shallow);
        assert_eq!(config.debounce_ms, 100);
    }

    #[test]
    fn test_validate_rejects_zero_in_flight() {
        let config = WatchConfig {
            max_in_flight: 0,
            ..WatchConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_in_flight"));
    }

    #[test]
    fn test_validate_rejects_short_ttl() {
        let config = WatchConfig {
            debounce_ms: 500,
            debounce_ttl_ms: 100,
            ..WatchConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("debounce_ttl_ms"));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("dirwatch.json")).unwrap();
        std::fs::write(&path, r#"{"watch": {"debounce_ms": 50, "recursive": false}}"#).unwrap();

        let config = Config::from_json_file(&path).unwrap();
        assert_eq!(config.watch.debounce_ms, 50);
        assert!(!config.watch.recursive);
        assert_eq!(config.watch.settle_ms, 100);
    }

    #[test]
    fn test_from_json_file_missing() {
        let err = Config::from_json_file(Utf8Path::new("/nonexistent/dirwatch.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_from_json_file_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("dirwatch.json")).unwrap();
        std::fs::write(&path, r#"{"watch": {"max_in_flight": 0}}"#).unwrap();

        let err = Config::from_json_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOption { .. }));
    }
}
