// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Database-relative path handling.
//!
//! Every path stored in the baseline is relative to the sync root, uses
//! forward slashes, has each segment NFC-normalised, and never carries a
//! leading slash. The empty string is the drive root.

use std::path::Path;
use unicode_normalization::UnicodeNormalization;

/// Normalise a single path segment to NFC.
pub fn nfc_segment(segment: &str) -> String {
    segment.nfc().collect()
}

/// Build a db-relative path from a filesystem path relative to the sync root.
///
/// Backslashes never appear in relative paths on the platforms we support,
/// so conversion is segment NFC normalisation plus forward-slash joining.
pub fn db_rel_path(rel: &Path) -> String {
    let mut out = String::new();
    for component in rel.components() {
        let segment = component.as_os_str().to_string_lossy();
        if segment == "." || segment.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(&nfc_segment(&segment));
    }
    out
}

/// Join a parent db path and a child name. The empty parent is the root.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        nfc_segment(name)
    } else {
        format!("{}/{}", parent, nfc_segment(name))
    }
}

/// Parent of a db path, or `""` for top-level entries.
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

/// Final segment of a db path.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Number of segments. The root is depth 0.
pub fn depth(path: &str) -> usize {
    if path.is_empty() {
        0
    } else {
        path.split('/').count()
    }
}

/// True when `ancestor` is a strict path prefix of `path` (`a` of `a/b/c`,
/// never of `ab/c`, never of itself).
pub fn is_strict_ancestor(ancestor: &str, path: &str) -> bool {
    if ancestor.is_empty() {
        return !path.is_empty();
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

/// True when `path` equals `other` or is a descendant of it.
pub fn is_self_or_descendant(path: &str, other: &str) -> bool {
    path == other || is_strict_ancestor(other, path)
}

/// Rewrite `path` after its ancestor `from` moved to `to`.
/// Returns `None` when `path` is not `from` or a descendant of it.
pub fn rebase(path: &str, from: &str, to: &str) -> Option<String> {
    if path == from {
        return Some(to.to_string());
    }
    if is_strict_ancestor(from, path) {
        return Some(format!("{}{}", to, &path[from.len()..]));
    }
    None
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
