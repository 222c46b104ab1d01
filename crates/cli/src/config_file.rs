// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration file loading.
//!
//! `tandem.toml` keeps human-friendly unit strings ("5MB/s", "50GB");
//! this module parses them into the engine's numeric config.

use crate::exit_error::ExitError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tandem_core::{parse_rate, parse_size, BigDeleteLimits, DriveId, EngineConfig, SyncMode};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub sync_root: Option<PathBuf>,
    pub database: Option<PathBuf>,
    /// Directory served through the drive contracts (mirror target).
    pub remote_root: Option<PathBuf>,
    pub drive_id: Option<String>,
    pub mode: Option<SyncMode>,
    pub workers: Option<usize>,
    pub poll_interval_secs: Option<u64>,
    pub debounce_ms: Option<u64>,
    /// e.g. "5MB/s"
    pub bandwidth: Option<String>,
    /// e.g. "50GB"
    pub max_file_size: Option<String>,
    /// e.g. "1GB"
    pub min_free_space: Option<String>,
    #[serde(default)]
    pub sync_paths: Vec<String>,
    #[serde(default)]
    pub skip_files: Vec<String>,
    #[serde(default)]
    pub skip_dirs: Vec<String>,
    #[serde(default)]
    pub skip_dotfiles: bool,
    pub big_delete: Option<BigDeleteLimits>,
}

/// Fully-resolved runtime configuration.
pub struct Loaded {
    pub engine: EngineConfig,
    pub remote_root: PathBuf,
    pub drive_id: DriveId,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tandem").join("config.toml"))
}

pub fn load(explicit: Option<&Path>) -> Result<Loaded, ExitError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => default_config_path()
            .ok_or_else(|| ExitError::new(1, "no config directory on this platform"))?,
    };
    let text = std::fs::read_to_string(&path)
        .map_err(|e| ExitError::new(1, format!("reading {}: {e}", path.display())))?;
    let file: FileConfig = toml::from_str(&text)
        .map_err(|e| ExitError::new(1, format!("parsing {}: {e}", path.display())))?;
    resolve(file)
}

pub fn resolve(file: FileConfig) -> Result<Loaded, ExitError> {
    let sync_root = file
        .sync_root
        .ok_or_else(|| ExitError::new(1, "config is missing sync_root"))?;
    let remote_root = file
        .remote_root
        .ok_or_else(|| ExitError::new(1, "config is missing remote_root"))?;
    let database = match file.database {
        Some(database) => database,
        None => dirs::data_dir()
            .ok_or_else(|| ExitError::new(1, "no data directory on this platform"))?
            .join("tandem")
            .join("tandem.db"),
    };
    if let Some(parent) = database.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ExitError::new(1, format!("creating {}: {e}", parent.display())))?;
    }

    let mut engine = EngineConfig::new(sync_root, database);
    if let Some(mode) = file.mode {
        engine.mode = mode;
    }
    if let Some(workers) = file.workers {
        engine.workers = workers;
    }
    if let Some(secs) = file.poll_interval_secs {
        engine.poll_interval_secs = secs;
    }
    if let Some(ms) = file.debounce_ms {
        engine.debounce_ms = ms;
    }
    if let Some(bandwidth) = &file.bandwidth {
        engine.bandwidth = Some(
            parse_rate(bandwidth).map_err(|e| ExitError::new(1, format!("bandwidth: {e}")))?,
        );
    }
    if let Some(size) = &file.max_file_size {
        engine.filter.max_file_size = Some(
            parse_size(size).map_err(|e| ExitError::new(1, format!("max_file_size: {e}")))?,
        );
    }
    if let Some(size) = &file.min_free_space {
        engine.safety.min_free_space =
            parse_size(size).map_err(|e| ExitError::new(1, format!("min_free_space: {e}")))?;
    }
    engine.filter.sync_paths = file.sync_paths;
    engine.filter.skip_files = file.skip_files;
    engine.filter.skip_dirs = file.skip_dirs;
    engine.filter.skip_dotfiles = file.skip_dotfiles;
    if let Some(limits) = file.big_delete {
        engine.planner_big_delete = limits.clone();
        engine.safety.big_delete = limits;
    }

    let drive_id = DriveId::new(file.drive_id.as_deref().unwrap_or("local"));
    Ok(Loaded {
        engine,
        remote_root,
        drive_id,
    })
}

#[cfg(test)]
#[path = "config_file_tests.rs"]
mod tests;
