// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Three-layer path admissibility.
//!
//! Layer 1 is service name validity (always evaluated first), layer 2 the
//! optional sync-path allowlist, layer 3 the configured skip patterns, and
//! layer 4 per-directory ignore files. The first rejecting layer wins.

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tandem_core::{path as dbpath, FilterConfig};

/// Longest admissible path, in Unicode scalar values.
const MAX_PATH_CHARS: usize = 400;
/// Longest admissible segment, in bytes.
const MAX_SEGMENT_BYTES: usize = 255;

/// Characters the service refuses in item names.
const INVALID_CHARS: &[char] = &['"', '*', ':', '<', '>', '?', '\\', '|'];

/// Suffixes of in-progress or lock-style files that must never sync.
const EXCLUDED_SUFFIXES: &[&str] = &[
    ".partial",
    ".tmp",
    ".swp",
    ".crdownload",
    ".db",
    ".db-wal",
    ".db-shm",
];

/// Prefixes of editor scratch files that must never sync.
const EXCLUDED_PREFIXES: &[&str] = &["~", ".~"];

const RESERVED_NAMES: &[&str] = &["CON", "PRN", "AUX", "NUL"];

/// Outcome of a filter evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Admit,
    Reject { reason: String },
}

impl Verdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Verdict::Admit)
    }

    fn reject(reason: impl Into<String>) -> Self {
        Verdict::Reject {
            reason: reason.into(),
        }
    }
}

/// Compiled filter. Construction never fails: malformed globs are logged
/// and dropped.
pub struct Filter {
    sync_root: PathBuf,
    sync_paths: Vec<String>,
    skip_files: GlobSet,
    skip_dirs: GlobSet,
    skip_dotfiles: bool,
    max_file_size: Option<u64>,
    ignore_file: String,
    ignore_cache: RwLock<HashMap<PathBuf, Option<Arc<Gitignore>>>>,
}

impl Filter {
    pub fn new(sync_root: impl Into<PathBuf>, config: &FilterConfig) -> Self {
        Self {
            sync_root: sync_root.into(),
            sync_paths: config
                .sync_paths
                .iter()
                .map(|p| p.trim_matches('/').to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            skip_files: build_globset(&config.skip_files, true),
            skip_dirs: build_globset(&config.skip_dirs, false),
            skip_dotfiles: config.skip_dotfiles,
            max_file_size: config.max_file_size,
            ignore_file: config.ignore_file.clone(),
            ignore_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Evaluate all layers for a db-relative path.
    pub fn evaluate(&self, path: &str, is_dir: bool, size: Option<u64>) -> Verdict {
        if path.is_empty() {
            return Verdict::Admit;
        }
        if let Some(reason) = validate_name(path) {
            return Verdict::reject(reason);
        }
        if let Some(reason) = self.check_allowlist(path, is_dir) {
            return Verdict::reject(reason);
        }
        if let Some(reason) = self.check_patterns(path, is_dir, size) {
            return Verdict::reject(reason);
        }
        if let Some(reason) = self.check_ignore_file(path) {
            return Verdict::reject(reason);
        }
        Verdict::Admit
    }

    pub fn is_admitted(&self, path: &str, is_dir: bool, size: Option<u64>) -> bool {
        self.evaluate(path, is_dir, size).is_admitted()
    }

    /// The ignore-file name itself never syncs.
    pub fn is_ignore_file(&self, name: &str) -> bool {
        name == self.ignore_file
    }

    fn check_allowlist(&self, path: &str, is_dir: bool) -> Option<String> {
        if self.sync_paths.is_empty() {
            return None;
        }
        for sp in &self.sync_paths {
            if dbpath::is_self_or_descendant(path, sp) {
                return None;
            }
            // Ancestor directories stay traversable so their matching
            // descendants can be reached.
            if is_dir && dbpath::is_strict_ancestor(path, sp) {
                return None;
            }
        }
        Some(format!("outside sync_paths: {path}"))
    }

    fn check_patterns(&self, path: &str, is_dir: bool, size: Option<u64>) -> Option<String> {
        let name = dbpath::file_name(path);
        if !is_dir {
            let lower = name.to_lowercase();
            for suffix in EXCLUDED_SUFFIXES {
                if lower.ends_with(suffix) {
                    return Some(format!("temporary file suffix {suffix}"));
                }
            }
            for prefix in EXCLUDED_PREFIXES {
                if name.starts_with(prefix) {
                    return Some(format!("temporary file prefix {prefix}"));
                }
            }
        }
        if self.skip_dotfiles && name.starts_with('.') {
            return Some("dotfile".to_string());
        }
        if is_dir {
            if self.skip_dirs.is_match(name) {
                return Some(format!("skip_dirs matches {name}"));
            }
        } else {
            if self.skip_files.is_match(&name.to_lowercase()) {
                return Some(format!("skip_files matches {name}"));
            }
            if let (Some(max), Some(size)) = (self.max_file_size, size) {
                if size > max {
                    return Some(format!("file size {size} exceeds max_file_size {max}"));
                }
            }
        }
        None
    }

    /// Per-directory ignore semantics: only the ignore file in the path's
    /// immediate parent applies.
    fn check_ignore_file(&self, path: &str) -> Option<String> {
        let parent = dbpath::parent(path);
        let dir = if parent.is_empty() {
            self.sync_root.clone()
        } else {
            self.sync_root.join(parent)
        };
        let gitignore = self.ignore_for_dir(&dir)?;
        let name = dbpath::file_name(path);
        let matched = gitignore.matched(Path::new(name), false);
        if matched.is_ignore() {
            return Some(format!("{} in {}", self.ignore_file, parent));
        }
        None
    }

    fn ignore_for_dir(&self, dir: &Path) -> Option<Arc<Gitignore>> {
        {
            let cache = self.ignore_cache.read();
            if let Some(cached) = cache.get(dir) {
                return cached.clone();
            }
        }
        let mut cache = self.ignore_cache.write();
        // Double-check: another thread may have populated while we waited.
        if let Some(cached) = cache.get(dir) {
            return cached.clone();
        }
        let ignore_path = dir.join(&self.ignore_file);
        let loaded = if ignore_path.is_file() {
            let mut builder = GitignoreBuilder::new(dir);
            if let Some(err) = builder.add(&ignore_path) {
                tracing::warn!(path = %ignore_path.display(), error = %err, "skipping malformed ignore file");
                None
            } else {
                match builder.build() {
                    Ok(gitignore) => Some(Arc::new(gitignore)),
                    Err(err) => {
                        tracing::warn!(path = %ignore_path.display(), error = %err, "skipping malformed ignore file");
                        None
                    }
                }
            }
        } else {
            None
        };
        cache.insert(dir.to_path_buf(), loaded.clone());
        loaded
    }
}

fn build_globset(patterns: &[String], lowercase: bool) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = if lowercase {
            pattern.to_lowercase()
        } else {
            pattern.clone()
        };
        match Glob::new(&pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(err) => {
                tracing::warn!(pattern = %pattern, error = %err, "skipping malformed glob");
            }
        }
    }
    builder.build().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "glob set failed to compile; skipping all patterns");
        GlobSet::empty()
    })
}

/// Layer 1: names the service will refuse.
pub(crate) fn validate_name(path: &str) -> Option<String> {
    if path.chars().count() > MAX_PATH_CHARS {
        return Some(format!("path longer than {MAX_PATH_CHARS} characters"));
    }
    for segment in path.split('/') {
        if segment.len() > MAX_SEGMENT_BYTES {
            return Some(format!("segment longer than {MAX_SEGMENT_BYTES} bytes"));
        }
        if let Some(c) = segment.chars().find(|c| INVALID_CHARS.contains(c)) {
            return Some(format!("invalid character {c:?} in {segment:?}"));
        }
        if segment.ends_with('.') || segment.ends_with(' ') {
            return Some(format!("trailing dot or space in {segment:?}"));
        }
        if segment.starts_with(' ') {
            return Some(format!("leading space in {segment:?}"));
        }
        if segment.starts_with("~$") {
            return Some(format!("office lock prefix in {segment:?}"));
        }
        if segment.contains("_vti_") {
            return Some(format!("_vti_ in {segment:?}"));
        }
        if is_reserved_name(segment) {
            return Some(format!("reserved device name {segment:?}"));
        }
        if segment.to_lowercase().ends_with(".lock") {
            return Some(format!(".lock suffix in {segment:?}"));
        }
        if segment.eq_ignore_ascii_case("desktop.ini") {
            return Some("desktop.ini".to_string());
        }
    }
    None
}

fn is_reserved_name(segment: &str) -> bool {
    let stem = segment.split('.').next().unwrap_or(segment);
    let upper = stem.to_ascii_uppercase();
    if RESERVED_NAMES.contains(&upper.as_str()) {
        return true;
    }
    if let Some(digit) = upper.strip_prefix("COM").or_else(|| upper.strip_prefix("LPT")) {
        return digit.len() == 1 && digit.chars().all(|c| c.is_ascii_digit());
    }
    false
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
