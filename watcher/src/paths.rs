//! Root-relative POSIX path handling.
//!
//! All paths reported to the ingestion endpoint are relative to the watch
//! root and use `/` separators regardless of host conventions.

use std::path::{Component, Path};

use crate::error::{Result, WatchError};

/// Convert `path` to its root-relative POSIX form.
///
/// Returns `None` when `path` is not under `root`, equals the root itself,
/// or contains components that cannot be expressed relative to it.
pub fn relative_posix(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;

    let mut segments = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Validate that `root` exists and is a directory.
pub(crate) fn ensure_dir(root: &Path) -> Result<()> {
    let metadata = std::fs::metadata(root).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => WatchError::RootNotFound(root.display().to_string()),
        _ => WatchError::Io(err),
    })?;

    if !metadata.is_dir() {
        return Err(WatchError::NotADirectory(root.display().to_string()));
    }

    Ok(())
}
