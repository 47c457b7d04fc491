//! Root resolution and guarded path joins.
//!
//! Watch roots are keyed by their absolute, lexically cleaned form. Cleaning
//! is purely textual: `.` components are dropped and `..` removes the
//! preceding component. Symlinks are not resolved, so the key of a root stays
//! computable after the directory itself has been deleted.
//!
//! # Examples
//!
//! ```
//! use dw_core::{join_path, resolve_root};
//!
//! let root = resolve_root("/srv/data/./logs/..").unwrap();
//! assert_eq!(root.as_str(), "/srv/data");
//!
//! let child = join_path(&root, &["logs", "today"]).unwrap();
//! assert_eq!(child.as_str(), "/srv/data/logs/today");
//!
//! assert!(join_path(&root, &["../etc"]).is_err());
//! ```

use std::path::{Component, Path, PathBuf};

use camino::Utf8PathBuf;

use crate::error::PathError;

/// Resolves `path` to an absolute, lexically cleaned UTF-8 path.
///
/// Relative paths are resolved against the current working directory. The
/// path does not have to exist.
///
/// # Errors
///
/// Returns [`PathError::Empty`] for an empty path, [`PathError::Absolute`]
/// if the working directory cannot be read, and [`PathError::NonUtf8`] if
/// the result is not valid UTF-8.
pub fn resolve_root(path: impl AsRef<Path>) -> Result<Utf8PathBuf, PathError> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(PathError::Empty);
    }

    let absolute = std::path::absolute(path).map_err(|source| PathError::Absolute {
        path: path.to_path_buf(),
        source,
    })?;

    Utf8PathBuf::from_path_buf(clean(&absolute)).map_err(PathError::NonUtf8)
}

/// Joins `segments` onto `root`, one at a time, refusing to leave the root.
///
/// `root` is resolved with [`resolve_root`] first. After each segment the
/// cleaned result must be a strict descendant of the path built so far; a
/// segment that resolves back to it (`""`, `"."`) or above it (`".."`, an
/// absolute path) is rejected.
///
/// # Errors
///
/// Returns [`PathError::Escapes`] for an offending segment, or any error
/// from [`resolve_root`].
pub fn join_path(root: impl AsRef<Path>, segments: &[&str]) -> Result<Utf8PathBuf, PathError> {
    let mut current = resolve_root(root)?;

    for segment in segments {
        let joined = clean(current.join(segment).as_std_path());
        let escapes = joined == current.as_std_path() || !joined.starts_with(&current);
        if escapes {
            return Err(PathError::Escapes {
                root: current,
                segment: (*segment).to_owned(),
            });
        }
        current = Utf8PathBuf::from_path_buf(joined).map_err(PathError::NonUtf8)?;
    }

    Ok(current)
}

fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_root_cleans_dots() {
        let root = resolve_root("/a/b/./c/../d").unwrap();
        assert_eq!(root.as_str(), "/a/b/d");
    }

    #[test]
    fn test_resolve_root_parent_of_root_is_root() {
        let root = resolve_root("/../..").unwrap();
        assert_eq!(root.as_str(), "/");
    }

    #[test]
    fn test_resolve_root_relative_is_absolute() {
        let root = resolve_root("some/relative/dir").unwrap();
        assert!(root.is_absolute());
        assert!(root.ends_with("some/relative/dir"));
    }

    #[test]
    fn test_resolve_root_empty() {
        assert!(matches!(resolve_root(""), Err(PathError::Empty)));
    }

    #[test]
    fn test_resolve_root_does_not_require_existence() {
        let root = resolve_root("/definitely/not/here").unwrap();
        assert_eq!(root.as_str(), "/definitely/not/here");
    }

    #[test]
    fn test_join_path_nested() {
        let path = join_path("/srv", &["a", "b/c"]).unwrap();
        assert_eq!(path.as_str(), "/srv/a/b/c");
    }

    #[test]
    fn test_join_path_rejects_parent() {
        let err = join_path("/srv/data", &["logs", "../../etc"]).unwrap_err();
        match err {
            PathError::Escapes { root, segment } => {
                assert_eq!(root.as_str(), "/srv/data/logs");
                assert_eq!(segment, "../../etc");
            }
            other => panic!("expected Escapes, got {other:?}"),
        }
    }

    #[test]
    fn test_join_path_rejects_same_dir() {
        assert!(join_path("/srv", &["."]).is_err());
        assert!(join_path("/srv", &[""]).is_err());
    }

    #[test]
    fn test_join_path_rejects_absolute_segment() {
        assert!(join_path("/srv", &["/etc"]).is_err());
    }

    #[test]
    fn test_join_path_sibling_prefix_is_not_inside() {
        // "/srv/data2" shares a string prefix with "/srv/data" but is a sibling.
        assert!(join_path("/srv/data", &["../data2"]).is_err());
    }

    #[test]
    fn test_join_path_inner_dotdot_allowed() {
        let path = join_path("/srv", &["a/../b"]).unwrap();
        assert_eq!(path.as_str(), "/srv/b");
    }
}
