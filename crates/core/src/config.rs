// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration and unit parsing.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Direction of synchronisation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    Bidirectional,
    DownloadOnly,
    UploadOnly,
}

/// Thresholds for big-delete protection.
///
/// Protection triggers when the baseline holds at least `min_items`
/// entries AND the plan's delete-like count exceeds `max_count` or
/// `max_percent` of the baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BigDeleteLimits {
    pub min_items: usize,
    pub max_count: usize,
    pub max_percent: u32,
}

impl Default for BigDeleteLimits {
    fn default() -> Self {
        Self {
            min_items: 10,
            max_count: 1000,
            max_percent: 50,
        }
    }
}

/// Safety-gate configuration (the S5/S6 knobs plus run modifiers).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafetyConfig {
    pub big_delete: BigDeleteLimits,
    /// Minimum free bytes that must remain after downloads; 0 disables S6.
    pub min_free_space: u64,
    /// Log-and-pass S5 violations.
    pub force: bool,
    /// Plan without executing; warnings instead of hard failures.
    pub dry_run: bool,
}

/// Path admissibility configuration (layers 2 and 3 of the filter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Allowlist of db-relative paths; empty admits everything.
    #[serde(default)]
    pub sync_paths: Vec<String>,
    /// Case-insensitive globs matched against file basenames.
    #[serde(default)]
    pub skip_files: Vec<String>,
    /// Globs matched against directory basenames.
    #[serde(default)]
    pub skip_dirs: Vec<String>,
    #[serde(default)]
    pub skip_dotfiles: bool,
    /// Files larger than this are skipped; None means no bound.
    #[serde(default)]
    pub max_file_size: Option<u64>,
    /// Per-directory ignore-file name.
    #[serde(default = "default_ignore_file")]
    pub ignore_file: String,
}

fn default_ignore_file() -> String {
    ".tdignore".to_string()
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            sync_paths: Vec::new(),
            skip_files: Vec::new(),
            skip_dirs: Vec::new(),
            skip_dotfiles: false,
            max_file_size: None,
            ignore_file: default_ignore_file(),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub sync_root: PathBuf,
    pub database: PathBuf,
    #[serde(default)]
    pub mode: SyncMode,
    /// Desired worker concurrency; floored to 4 by the pool.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Remote poll interval, watch mode. Floored to 30 s.
    #[serde(default = "default_poll_secs")]
    pub poll_interval_secs: u64,
    /// Buffer debounce, watch mode.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Shared bandwidth budget, bytes per second. None means unlimited.
    #[serde(default)]
    pub bandwidth: Option<u64>,
    /// Transfers at least this large route to the bulk lane.
    #[serde(default = "default_small_file_threshold")]
    pub small_file_threshold: u64,
    /// Uploads at least this large use resumable sessions.
    #[serde(default = "default_small_file_threshold")]
    pub resumable_threshold: u64,
    /// Stale ledger claims older than this are reclaimed at startup.
    #[serde(default = "default_reclaim_secs")]
    pub reclaim_secs: u64,
    /// Planner-tier big-delete limits.
    #[serde(default)]
    pub planner_big_delete: BigDeleteLimits,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub filter: FilterConfig,
}

pub const SMALL_FILE_THRESHOLD: u64 = 10 * 1024 * 1024;

fn default_workers() -> usize {
    8
}

fn default_poll_secs() -> u64 {
    30
}

fn default_debounce_ms() -> u64 {
    2_000
}

fn default_small_file_threshold() -> u64 {
    SMALL_FILE_THRESHOLD
}

fn default_reclaim_secs() -> u64 {
    300
}

impl EngineConfig {
    pub fn new(sync_root: impl Into<PathBuf>, database: impl Into<PathBuf>) -> Self {
        Self {
            sync_root: sync_root.into(),
            database: database.into(),
            mode: SyncMode::default(),
            workers: default_workers(),
            poll_interval_secs: default_poll_secs(),
            debounce_ms: default_debounce_ms(),
            bandwidth: None,
            small_file_threshold: default_small_file_threshold(),
            resumable_threshold: default_small_file_threshold(),
            reclaim_secs: default_reclaim_secs(),
            planner_big_delete: BigDeleteLimits::default(),
            safety: SafetyConfig::default(),
            filter: FilterConfig::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseUnitError {
    #[error("empty size string")]
    Empty,
    #[error("invalid size: {0:?}")]
    Invalid(String),
    #[error("unknown unit in {0:?}")]
    UnknownUnit(String),
}

/// Parse "512", "100KB", "50GB", "1.5MB" into bytes (binary multiples).
pub fn parse_size(s: &str) -> Result<u64, ParseUnitError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ParseUnitError::Empty);
    }
    let split = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (num, unit) = s.split_at(split);
    let value: f64 = num
        .parse()
        .map_err(|_| ParseUnitError::Invalid(s.to_string()))?;
    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "KB" | "K" | "KIB" => 1 << 10,
        "MB" | "M" | "MIB" => 1 << 20,
        "GB" | "G" | "GIB" => 1 << 30,
        "TB" | "T" | "TIB" => 1 << 40,
        _ => return Err(ParseUnitError::UnknownUnit(s.to_string())),
    };
    Ok((value * multiplier as f64) as u64)
}

/// Parse a bandwidth rate like "5MB/s" into bytes per second.
pub fn parse_rate(s: &str) -> Result<u64, ParseUnitError> {
    let s = s.trim();
    let base = s
        .strip_suffix("/s")
        .or_else(|| s.strip_suffix("/S"))
        .unwrap_or(s);
    parse_size(base)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
