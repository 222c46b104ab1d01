// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tandem_core::SyncMode;

#[test]
fn minimal_config_resolves_with_defaults() {
    let file: FileConfig = toml::from_str(
        r#"
sync_root = "/data/sync"
remote_root = "/data/mirror"
database = "/tmp/tandem-test/tandem.db"
"#,
    )
    .unwrap();
    let loaded = resolve(file).unwrap();
    assert_eq!(loaded.engine.sync_root, PathBuf::from("/data/sync"));
    assert_eq!(loaded.engine.mode, SyncMode::Bidirectional);
    assert_eq!(loaded.drive_id, tandem_core::DriveId::new("local"));
}

#[test]
fn unit_strings_are_parsed() {
    let file: FileConfig = toml::from_str(
        r#"
sync_root = "/s"
remote_root = "/r"
database = "/tmp/tandem-test/tandem.db"
bandwidth = "5MB/s"
max_file_size = "50GB"
min_free_space = "1GB"
mode = "download_only"
"#,
    )
    .unwrap();
    let loaded = resolve(file).unwrap();
    assert_eq!(loaded.engine.bandwidth, Some(5 * 1024 * 1024));
    assert_eq!(
        loaded.engine.filter.max_file_size,
        Some(50 * 1024 * 1024 * 1024)
    );
    assert_eq!(loaded.engine.safety.min_free_space, 1024 * 1024 * 1024);
    assert_eq!(loaded.engine.mode, SyncMode::DownloadOnly);
}

#[test]
fn missing_required_fields_error() {
    let file: FileConfig = toml::from_str(r#"remote_root = "/r""#).unwrap();
    assert!(resolve(file).is_err());
}

#[test]
fn bad_unit_string_errors() {
    let file: FileConfig = toml::from_str(
        r#"
sync_root = "/s"
remote_root = "/r"
database = "/tmp/tandem-test/tandem.db"
bandwidth = "fast"
"#,
    )
    .unwrap();
    assert!(resolve(file).is_err());
}

#[test]
fn unknown_keys_are_rejected() {
    let parsed: Result<FileConfig, _> = toml::from_str(
        r#"
sync_root = "/s"
remote_root = "/r"
sync_rooot = "/typo"
"#,
    );
    assert!(parsed.is_err());
}

#[test]
fn big_delete_table_feeds_both_tiers() {
    let file: FileConfig = toml::from_str(
        r#"
sync_root = "/s"
remote_root = "/r"
database = "/tmp/tandem-test/tandem.db"

[big_delete]
min_items = 5
max_count = 100
max_percent = 25
"#,
    )
    .unwrap();
    let loaded = resolve(file).unwrap();
    assert_eq!(loaded.engine.planner_big_delete.max_percent, 25);
    assert_eq!(loaded.engine.safety.big_delete.min_items, 5);
}
