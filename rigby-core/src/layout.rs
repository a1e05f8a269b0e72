use crate::error::{Result, RigbyError};
use crate::manifest::FileEntry;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// How many file entries to probe on disk when deciding whether a manifest
/// prefix is already part of the output layout.
const PREFIX_SAMPLE_LIMIT: usize = 256;

#[cfg(windows)]
const CASE_INSENSITIVE: bool = true;
#[cfg(not(windows))]
const CASE_INSENSITIVE: bool = false;

/// Trim surrounding whitespace and slashes; blank becomes empty.
pub fn normalize_prefix(prefix: Option<&str>) -> String {
    prefix
        .unwrap_or("")
        .trim()
        .trim_matches(|c| c == '/' || c == '\\')
        .to_string()
}

/// Key for path identity comparisons, case-folded on case-insensitive
/// filesystems.
pub fn path_key(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    if CASE_INSENSITIVE {
        s.to_lowercase()
    } else {
        s
    }
}

fn root_ends_with_prefix(out_root: &Path, prefix: &str) -> bool {
    let mut root = out_root.to_string_lossy().replace('\\', "/");
    root.truncate(root.trim_end_matches('/').len());
    let prefix = prefix.replace('\\', "/");
    let prefix = prefix.trim_matches('/');
    if CASE_INSENSITIVE {
        let root = root.to_lowercase();
        let prefix = prefix.to_lowercase();
        root == prefix || root.ends_with(&format!("/{prefix}"))
    } else {
        root == prefix || root.ends_with(&format!("/{prefix}"))
    }
}

/// Decide whether the manifest prefix should be applied under `out_root`.
///
/// If the root already ends in the prefix the prefix is never reapplied
/// (avoids `Build/Build` nesting). Otherwise up to 256 file entries are
/// probed at both candidate locations and the prefix is applied only when
/// strictly more files already exist at the prefixed one; ties stay
/// unprefixed.
pub fn resolve_effective_prefix(out_root: &Path, prefix: &str, files: &[FileEntry]) -> String {
    if prefix.is_empty() || root_ends_with_prefix(out_root, prefix) {
        return String::new();
    }

    let mut unprefixed_existing = 0usize;
    let mut prefixed_existing = 0usize;
    for fe in files.iter().take(PREFIX_SAMPLE_LIMIT) {
        if out_root.join(&fe.path).is_file() {
            unprefixed_existing += 1;
        }
        if out_root.join(prefix).join(&fe.path).is_file() {
            prefixed_existing += 1;
        }
    }

    if prefixed_existing > unprefixed_existing {
        prefix.to_string()
    } else {
        String::new()
    }
}

/// True when `candidate` stays under `root`: its path relative to the root
/// is neither absolute nor led by a parent-escape segment.
pub fn is_path_within_root(root: &Path, candidate: &Path) -> bool {
    match pathdiff::diff_paths(candidate, root) {
        Some(rel) => !matches!(rel.components().next(), Some(Component::ParentDir))
            && !rel.is_absolute(),
        None => false,
    }
}

/// Join a manifest-relative path onto the output root, rejecting entries
/// that would land outside it.
pub fn resolve_output_path(out_root: &Path, rel: &str) -> Result<PathBuf> {
    let rel_path = Path::new(rel);
    let candidate = out_root.join(rel_path);
    let escapes = rel_path.is_absolute()
        || rel_path.components().any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        || !is_path_within_root(out_root, &candidate);
    if escapes {
        return Err(RigbyError::PathSafety { path: rel.to_string() });
    }
    Ok(candidate)
}

pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        // Safe under concurrent creation by sibling tasks.
        std::fs::create_dir_all(parent).map_err(|e| RigbyError::io(parent, e))?;
    }
    Ok(())
}

/// Delete every file under `out_root` not in `expected` (keys produced by
/// [`path_key`]), then remove directories left empty, bottom-up. Returns
/// the number of deleted files.
pub fn reconcile_tree(out_root: &Path, expected: &HashSet<String>) -> Result<u64> {
    if !out_root.is_dir() {
        return Ok(0);
    }

    let mut deleted = 0u64;
    for entry in WalkDir::new(out_root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if expected.contains(&path_key(entry.path())) {
            continue;
        }
        std::fs::remove_file(entry.path()).map_err(|e| RigbyError::io(entry.path(), e))?;
        deleted += 1;
    }

    // contents_first yields children before parents, so a directory whose
    // subtree was just emptied gets removed too.
    for entry in WalkDir::new(out_root).contents_first(true).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_dir() || entry.path() == out_root {
            continue;
        }
        let is_empty = std::fs::read_dir(entry.path())
            .map(|mut it| it.next().is_none())
            .unwrap_or(false);
        if is_empty {
            std::fs::remove_dir(entry.path()).map_err(|e| RigbyError::io(entry.path(), e))?;
        }
    }

    Ok(deleted)
}
