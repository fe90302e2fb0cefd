//! Save-path derivation and containment.
//!
//! Received files are named `<YYYY-MM-DD><ext>` and stored under
//! `<save root>/<client sub-path>/`. The sub-path comes straight off the
//! wire, so it is checked before anything touches the filesystem.

use crate::error::{Result, SyncError};
use chrono::{Local, NaiveDate};
use std::path::{is_separator, Component, Path, PathBuf};

/// Today's date in local time.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Extension of the last path element, including the dot.
///
/// `"a.tar.gz"` gives `".gz"`, `"README"` gives `""`, and a dotfile such as
/// `".bashrc"` is all extension.
pub fn file_extension(file_name: &str) -> &str {
    for (i, c) in file_name.char_indices().rev() {
        if is_separator(c) {
            break;
        }
        if c == '.' {
            return &file_name[i..];
        }
    }
    ""
}

/// Server-side file name: the date followed by the client file's extension.
pub fn derived_name(file_name: &str, date: NaiveDate) -> String {
    format!("{}{}", date.format("%Y-%m-%d"), file_extension(file_name))
}

/// Normalize a path without requiring it to exist (unlike canonicalize)
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            c => normalized.push(c),
        }
    }
    normalized
}

/// Join `root`, the client sub-path, and the derived name, rejecting any
/// sub-path that could land outside `root`.
///
/// An empty sub-path saves directly under the root.
pub fn join_contained(root: &Path, file_path: &str, name: &str) -> Result<PathBuf> {
    let rel_path = Path::new(file_path);
    if rel_path.is_absolute() {
        return Err(SyncError::validation(file_path, "absolute paths not allowed"));
    }

    for component in rel_path.components() {
        match component {
            Component::ParentDir => {
                return Err(SyncError::validation(file_path, "path traversal not allowed"));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(SyncError::validation(file_path, "absolute paths not allowed"));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    let full = normalize_path(&root.join(rel_path).join(name));
    let root_normalized = normalize_path(root);
    if !full.starts_with(&root_normalized) || full == root_normalized {
        return Err(SyncError::validation(file_path, "path escapes save root"));
    }

    Ok(full)
}

/// [`join_contained`], plus a symlink-aware check: when the target
/// directory exists, its canonical form must still sit under the canonical
/// save root.
pub async fn resolve_save_path(root: &Path, file_path: &str, name: &str) -> Result<PathBuf> {
    let full = join_contained(root, file_path, name)?;

    let Some(parent) = full.parent() else {
        return Ok(full);
    };
    // Missing directories are left for the open to report
    let (Ok(canonical_root), Ok(canonical_parent)) = (
        tokio::fs::canonicalize(root).await,
        tokio::fs::canonicalize(parent).await,
    ) else {
        return Ok(full);
    };

    if !canonical_parent.starts_with(&canonical_root) {
        return Err(SyncError::validation(
            file_path,
            format!("resolves outside save root via {}", canonical_parent.display()),
        ));
    }

    Ok(full)
}
