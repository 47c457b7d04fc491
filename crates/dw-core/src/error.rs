//! Error types for the dw-core crate.
//!
//! - [`PathError`] covers root resolution and guarded joins.
//! - [`ConfigError`] covers loading and validating a [`Config`](crate::Config).

use std::path::PathBuf;

use camino::Utf8PathBuf;

/// Errors produced while resolving or joining paths.
///
/// # Examples
///
/// ```
/// use dw_core::PathError;
/// use camino::Utf8PathBuf;
///
/// let err = PathError::Escapes {
///     root: Utf8PathBuf::from("/srv/data"),
///     segment: "../etc".to_owned(),
/// };
/// assert!(err.to_string().contains("../etc"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// No path was given.
    #[error("path is empty")]
    Empty,

    /// The path could not be made absolute (usually the working directory
    /// is gone or unreadable).
    #[error("cannot make '{}' absolute: {source}", path.display())]
    Absolute {
        /// The path as given.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The resolved path is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8(PathBuf),

    /// A segment resolved to the root itself or to somewhere outside it.
    #[error("segment '{segment}' leaves root {root}")]
    Escapes {
        /// The root the segment was joined onto.
        root: Utf8PathBuf,
        /// The offending segment.
        segment: String,
    },
}

/// Errors that can occur during configuration loading and validation.
///
/// # Examples
///
/// ```
/// use dw_core::ConfigError;
///
/// let error = ConfigError::InvalidOption {
///     option: "max_in_flight".to_owned(),
///     reason: "must be at least 1".to_owned(),
/// };
/// assert!(error.to_string().contains("max_in_flight"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: String,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// An I/O error occurred while reading configuration.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates a new [`ConfigError::InvalidOption`] error.
    pub fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }
}
