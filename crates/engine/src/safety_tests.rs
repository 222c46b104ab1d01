// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tandem_core::test_support::{file_entry, remote_state, test_drive, FakeDiskSpace};
use tandem_core::{Action, ActionKind, BigDeleteLimits, PathView, SafetyConfig};

fn action_with_baseline(kind: ActionKind, path: &str, local_hash: &str) -> Action {
    let mut view = PathView::new(path);
    view.baseline = Some(file_entry(path, "I1", local_hash));
    if let Some(entry) = view.baseline.as_mut() {
        entry.local_hash = local_hash.to_string();
    }
    Action::new(kind, view)
}

fn download_of_size(path: &str, size: i64) -> Action {
    let mut view = PathView::new(path);
    let mut remote = remote_state("I1", "H");
    remote.size = Some(size);
    view.remote = Some(remote);
    Action::new(ActionKind::Download, view)
}

fn plan_of(actions: Vec<Action>) -> ActionPlan {
    let depends_on = vec![Vec::new(); actions.len()];
    ActionPlan {
        actions,
        depends_on,
    }
}

fn checker<'a>(
    config: &'a SafetyConfig,
    disk: &'a FakeDiskSpace,
    delta_complete: &'a HashMap<DriveId, bool>,
) -> SafetyChecker<'a> {
    SafetyChecker {
        config,
        disk,
        sync_root: Path::new("/sync"),
        baseline_len: 100,
        delta_complete,
    }
}

#[test]
fn s1_removes_unproven_remote_deletes() {
    let config = SafetyConfig::default();
    let disk = FakeDiskSpace::new(u64::MAX);
    let delta = HashMap::new();
    let mut plan = plan_of(vec![
        action_with_baseline(ActionKind::RemoteDelete, "no-proof.txt", ""),
        action_with_baseline(ActionKind::RemoteDelete, "proven.txt", "H"),
    ]);

    let report = checker(&config, &disk, &delta).check(&mut plan).unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan.actions[0].path, "proven.txt");
    assert_eq!(report.removed[0].0, "S1");
}

#[test]
fn s2_drops_local_deletes_on_incomplete_delta() {
    let config = SafetyConfig::default();
    let disk = FakeDiskSpace::new(u64::MAX);
    let mut delta = HashMap::new();
    delta.insert(test_drive(), false);

    let mut plan = plan_of(vec![
        action_with_baseline(ActionKind::LocalDelete, "risky.txt", "H"),
        action_with_baseline(ActionKind::RemoteDelete, "fine.txt", "H"),
    ]);

    let report = checker(&config, &disk, &delta).check(&mut plan).unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan.actions[0].kind, ActionKind::RemoteDelete);
    assert_eq!(report.removed[0].0, "S2");
}

#[test]
fn s3_warns_on_partial_download_target() {
    let config = SafetyConfig::default();
    let disk = FakeDiskSpace::new(u64::MAX);
    let delta = HashMap::new();
    let mut plan = plan_of(vec![download_of_size("oops.partial", 10)]);

    let report = checker(&config, &disk, &delta).check(&mut plan).unwrap();
    assert_eq!(plan.len(), 1, "S3 warns, it does not remove");
    assert!(report.warnings.iter().any(|w| w.contains("oops.partial")));
}

#[test]
fn s4_removes_local_deletes_without_synced_hash() {
    let config = SafetyConfig::default();
    let disk = FakeDiskSpace::new(u64::MAX);
    let delta = HashMap::new();
    let mut plan = plan_of(vec![
        action_with_baseline(ActionKind::LocalDelete, "unproven.txt", ""),
        action_with_baseline(ActionKind::LocalDelete, "proven.txt", "H"),
    ]);

    let report = checker(&config, &disk, &delta).check(&mut plan).unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan.actions[0].path, "proven.txt");
    assert_eq!(report.removed[0].0, "S4");
}

#[test]
fn s5_blocks_big_delete_without_force() {
    let config = SafetyConfig {
        big_delete: BigDeleteLimits {
            min_items: 10,
            max_count: 2,
            max_percent: 100,
        },
        ..Default::default()
    };
    let disk = FakeDiskSpace::new(u64::MAX);
    let delta = HashMap::new();
    let mut plan = plan_of(
        (0..3)
            .map(|i| action_with_baseline(ActionKind::LocalDelete, &format!("d{i}.txt"), "H"))
            .collect(),
    );

    match checker(&config, &disk, &delta).check(&mut plan) {
        Err(SafetyError::BigDeleteBlocked { deletes, baseline }) => {
            assert_eq!(deletes, 3);
            assert_eq!(baseline, 100);
        }
        other => panic!("expected BigDeleteBlocked, got {other:?}"),
    }
}

#[test]
fn s5_force_logs_and_passes() {
    let config = SafetyConfig {
        big_delete: BigDeleteLimits {
            min_items: 10,
            max_count: 2,
            max_percent: 100,
        },
        force: true,
        ..Default::default()
    };
    let disk = FakeDiskSpace::new(u64::MAX);
    let delta = HashMap::new();
    let mut plan = plan_of(
        (0..3)
            .map(|i| action_with_baseline(ActionKind::LocalDelete, &format!("d{i}.txt"), "H"))
            .collect(),
    );
    assert!(checker(&config, &disk, &delta).check(&mut plan).is_ok());
    assert_eq!(plan.len(), 3);
}

#[test]
fn s5_dry_run_warns_and_passes() {
    let config = SafetyConfig {
        big_delete: BigDeleteLimits {
            min_items: 10,
            max_count: 2,
            max_percent: 100,
        },
        dry_run: true,
        ..Default::default()
    };
    let disk = FakeDiskSpace::new(u64::MAX);
    let delta = HashMap::new();
    let mut plan = plan_of(
        (0..3)
            .map(|i| action_with_baseline(ActionKind::LocalDelete, &format!("d{i}.txt"), "H"))
            .collect(),
    );
    let report = checker(&config, &disk, &delta).check(&mut plan).unwrap();
    assert!(report.warnings.iter().any(|w| w.contains("big delete")));
}

#[test]
fn s6_blocks_when_downloads_exhaust_free_space() {
    let config = SafetyConfig {
        min_free_space: 1_000,
        ..Default::default()
    };
    let disk = FakeDiskSpace::new(5_000);
    let delta = HashMap::new();
    let mut plan = plan_of(vec![
        download_of_size("a.bin", 3_000),
        download_of_size("b.bin", 1_500),
    ]);

    match checker(&config, &disk, &delta).check(&mut plan) {
        Err(SafetyError::InsufficientDiskSpace {
            needed, available, ..
        }) => {
            assert_eq!(needed, 4_500);
            assert_eq!(available, 5_000);
        }
        other => panic!("expected InsufficientDiskSpace, got {other:?}"),
    }
}

#[test]
fn s6_passes_with_enough_space_or_disabled() {
    let disk = FakeDiskSpace::new(5_000);
    let delta = HashMap::new();

    let config = SafetyConfig {
        min_free_space: 1_000,
        ..Default::default()
    };
    let mut plan = plan_of(vec![download_of_size("a.bin", 3_000)]);
    assert!(checker(&config, &disk, &delta).check(&mut plan).is_ok());

    // min_free_space 0 disables the invariant entirely.
    let disabled = SafetyConfig::default();
    let mut plan = plan_of(vec![download_of_size("huge.bin", i64::MAX)]);
    assert!(checker(&disabled, &disk, &delta).check(&mut plan).is_ok());
}

#[test]
fn s7_drops_temporary_uploads() {
    let config = SafetyConfig::default();
    let disk = FakeDiskSpace::new(u64::MAX);
    let delta = HashMap::new();
    let mut plan = plan_of(vec![
        Action::new(ActionKind::Upload, PathView::new("notes/~scratch")),
        Action::new(ActionKind::Upload, PathView::new("a/file.tmp")),
        Action::new(ActionKind::Upload, PathView::new("a/file.partial")),
        Action::new(ActionKind::Upload, PathView::new("a/real.txt")),
    ]);

    let report = checker(&config, &disk, &delta).check(&mut plan).unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan.actions[0].path, "a/real.txt");
    assert_eq!(report.removed.len(), 3);
    assert!(report.removed.iter().all(|(inv, _, _)| *inv == "S7"));
}

#[test]
fn removal_remaps_dependency_indices() {
    let mut plan = plan_of(vec![
        action_with_baseline(ActionKind::RemoteDelete, "removed.txt", ""),
        action_with_baseline(ActionKind::RemoteDelete, "kept.txt", "H"),
        download_of_size("dependent.bin", 1),
    ]);
    // dependent depends on both earlier actions
    plan.depends_on[2] = vec![0, 1];

    let config = SafetyConfig::default();
    let disk = FakeDiskSpace::new(u64::MAX);
    let delta = HashMap::new();
    checker(&config, &disk, &delta).check(&mut plan).unwrap();

    assert_eq!(plan.len(), 2);
    // Dep on the removed action vanished; dep on the kept one re-indexed.
    assert_eq!(plan.depends_on[1], vec![0]);
}
