// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The safety gate: seven invariants applied to a plan immediately
//! before it is written to the ledger.

use std::collections::HashMap;
use std::path::Path;
use tandem_core::{path as dbpath, ActionKind, ActionPlan, DiskSpace, DriveId, SafetyConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SafetyError {
    #[error(
        "big delete blocked: {deletes} deletes over {baseline} baseline entries; \
         re-run with force to proceed"
    )]
    BigDeleteBlocked { deletes: usize, baseline: usize },
    #[error("insufficient disk space: downloads need {needed} bytes but only {available} \
             are available with min_free_space {min_free_space}")]
    InsufficientDiskSpace {
        needed: u64,
        available: u64,
        min_free_space: u64,
    },
}

/// What the gate did to the plan.
#[derive(Debug, Default)]
pub struct SafetyReport {
    /// (invariant, path, reason) per removed action.
    pub removed: Vec<(&'static str, String, String)>,
    pub warnings: Vec<String>,
}

pub struct SafetyChecker<'a> {
    pub config: &'a SafetyConfig,
    pub disk: &'a dyn DiskSpace,
    pub sync_root: &'a Path,
    pub baseline_len: usize,
    /// Drives whose last delta enumeration reached a terminal link.
    pub delta_complete: &'a HashMap<DriveId, bool>,
}

impl SafetyChecker<'_> {
    /// Apply S1..S7 in order. Violations either prune the offending
    /// action (recorded in the report) or fail the whole plan.
    pub fn check(&self, plan: &mut ActionPlan) -> Result<SafetyReport, SafetyError> {
        let mut report = SafetyReport::default();

        self.s1_remote_delete_proof(plan, &mut report);
        self.s2_incomplete_delta(plan, &mut report);
        self.s3_partial_destinations(plan, &mut report);
        self.s4_hash_before_delete(plan, &mut report);
        self.s5_big_delete(plan, &mut report)?;
        self.s6_disk_space(plan, &mut report)?;
        self.s7_temp_uploads(plan, &mut report);

        for (invariant, path, reason) in &report.removed {
            tracing::warn!(invariant, path = %path, reason = %reason, "safety gate removed action");
        }
        for warning in &report.warnings {
            tracing::warn!("{warning}");
        }
        Ok(report)
    }

    /// S1: a remote delete must be provable from a recorded local hash;
    /// an empty synced hash means we never held the content.
    fn s1_remote_delete_proof(&self, plan: &mut ActionPlan, report: &mut SafetyReport) {
        retain(plan, report, "S1", |action| {
            if action.kind != ActionKind::RemoteDelete {
                return None;
            }
            let entry = action.view.baseline.as_ref()?;
            if entry.is_file() && entry.local_hash.is_empty() {
                return Some("baseline has no synced hash".to_string());
            }
            None
        });
    }

    /// S2: local deletes are unsafe when that drive's delta enumeration
    /// never reached a terminal link (the delete may be a gap, not a
    /// deletion).
    fn s2_incomplete_delta(&self, plan: &mut ActionPlan, report: &mut SafetyReport) {
        retain(plan, report, "S2", |action| {
            if action.kind != ActionKind::LocalDelete {
                return None;
            }
            let complete = self
                .delta_complete
                .get(&action.drive_id)
                .copied()
                .unwrap_or(true);
            if !complete {
                return Some("delta enumeration incomplete for drive".to_string());
            }
            None
        });
    }

    /// S3: the executor owns `.partial` staging names; a planned download
    /// targeting one is a planner bug worth shouting about.
    fn s3_partial_destinations(&self, plan: &ActionPlan, report: &mut SafetyReport) {
        for action in plan.of_kind(ActionKind::Download) {
            if action.path.ends_with(".partial") {
                report
                    .warnings
                    .push(format!("download targets a .partial path: {}", action.path));
            }
        }
    }

    /// S4 (plan-time half): refuse to delete a local file whose synced
    /// hash was never recorded. The executor re-verifies the live hash
    /// before unlinking.
    fn s4_hash_before_delete(&self, plan: &mut ActionPlan, report: &mut SafetyReport) {
        retain(plan, report, "S4", |action| {
            if action.kind != ActionKind::LocalDelete {
                return None;
            }
            let Some(entry) = action.view.baseline.as_ref() else {
                return Some("no baseline entry".to_string());
            };
            if entry.is_file() && entry.local_hash.is_empty() {
                return Some("baseline has no synced hash".to_string());
            }
            None
        });
    }

    /// S5: big-delete, reapplied at the gate with its own thresholds.
    fn s5_big_delete(&self, plan: &ActionPlan, report: &mut SafetyReport) -> Result<(), SafetyError> {
        let limits = &self.config.big_delete;
        let deletes = plan.total_deletes();
        if self.baseline_len < limits.min_items || deletes == 0 {
            return Ok(());
        }
        let percent = deletes * 100 / self.baseline_len;
        if deletes <= limits.max_count && percent <= limits.max_percent as usize {
            return Ok(());
        }
        if self.config.force {
            tracing::warn!(deletes, baseline = self.baseline_len, "big delete forced through");
            return Ok(());
        }
        if self.config.dry_run {
            report.warnings.push(format!(
                "big delete would be blocked: {deletes} deletes over {} entries",
                self.baseline_len
            ));
            return Ok(());
        }
        Err(SafetyError::BigDeleteBlocked {
            deletes,
            baseline: self.baseline_len,
        })
    }

    /// S6: downloads must leave min_free_space on the target filesystem.
    fn s6_disk_space(&self, plan: &ActionPlan, report: &mut SafetyReport) -> Result<(), SafetyError> {
        if self.config.min_free_space == 0 {
            return Ok(());
        }
        let needed: u64 = plan
            .of_kind(ActionKind::Download)
            .map(|a| a.transfer_size().max(0) as u64)
            .sum();
        if needed == 0 {
            return Ok(());
        }
        let available = match self.disk.available(self.sync_root) {
            Ok(bytes) => bytes,
            Err(err) => {
                report
                    .warnings
                    .push(format!("disk space probe failed, skipping S6: {err}"));
                return Ok(());
            }
        };
        if available.saturating_sub(needed) >= self.config.min_free_space {
            return Ok(());
        }
        if self.config.dry_run {
            report.warnings.push(format!(
                "downloads of {needed} bytes would drop free space below {}",
                self.config.min_free_space
            ));
            return Ok(());
        }
        Err(SafetyError::InsufficientDiskSpace {
            needed,
            available,
            min_free_space: self.config.min_free_space,
        })
    }

    /// S7: never upload editor scratch or staging files.
    fn s7_temp_uploads(&self, plan: &mut ActionPlan, report: &mut SafetyReport) {
        retain(plan, report, "S7", |action| {
            if action.kind != ActionKind::Upload {
                return None;
            }
            let name = dbpath::file_name(&action.path);
            if name.ends_with(".partial") || name.ends_with(".tmp") || name.starts_with('~') {
                return Some("temporary file name".to_string());
            }
            None
        });
    }
}

/// Remove every action for which `violation` returns a reason, keeping
/// dependency indices consistent.
fn retain(
    plan: &mut ActionPlan,
    report: &mut SafetyReport,
    invariant: &'static str,
    violation: impl Fn(&tandem_core::Action) -> Option<String>,
) {
    let mut index = 0;
    while index < plan.actions.len() {
        if let Some(reason) = violation(&plan.actions[index]) {
            let path = plan.actions[index].path.clone();
            plan.remove(index);
            report.removed.push((invariant, path, reason));
        } else {
            index += 1;
        }
    }
}

#[cfg(test)]
#[path = "safety_tests.rs"]
mod tests;
