// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory dependency DAG dispatching ready actions to worker lanes.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tandem_core::{Action, ActionKind};
use tokio_util::sync::CancellationToken;

/// One action registered with the tracker.
pub struct TrackedAction {
    pub action: Action,
    pub ledger_id: i64,
    pub cycle_id: i64,
    /// Cancelling this token cancels exactly this action.
    pub cancel: CancellationToken,
    deps_left: AtomicUsize,
    dependents: Mutex<Vec<i64>>,
}

struct CycleProgress {
    total: usize,
    completed: usize,
    done: CancellationToken,
}

#[derive(Default)]
struct TrackerState {
    actions: HashMap<i64, Arc<TrackedAction>>,
    by_path: HashMap<String, i64>,
    cycles: HashMap<i64, CycleProgress>,
}

/// Dispatches actions whose dependencies have completed into the
/// interactive or bulk lane, and signals per-cycle / global completion.
pub struct DependencyTracker {
    state: Mutex<TrackerState>,
    interactive_tx: async_channel::Sender<Arc<TrackedAction>>,
    interactive_rx: async_channel::Receiver<Arc<TrackedAction>>,
    bulk_tx: async_channel::Sender<Arc<TrackedAction>>,
    bulk_rx: async_channel::Receiver<Arc<TrackedAction>>,
    small_file_threshold: u64,
    /// One-shot mode: `done` fires when this many actions have completed.
    one_shot_total: Option<usize>,
    completed: AtomicUsize,
    done: CancellationToken,
    root_cancel: CancellationToken,
}

impl DependencyTracker {
    /// One-shot tracker: `done()` fires after `total` completions.
    pub fn one_shot(total: usize, small_file_threshold: u64, root_cancel: CancellationToken) -> Self {
        let tracker = Self::build(small_file_threshold, root_cancel, Some(total));
        if total == 0 {
            tracker.done.cancel();
        }
        tracker
    }

    /// Persistent tracker for watch mode: `done()` never fires; cycles
    /// complete individually via `cycle_done`.
    pub fn persistent(small_file_threshold: u64, root_cancel: CancellationToken) -> Self {
        Self::build(small_file_threshold, root_cancel, None)
    }

    fn build(
        small_file_threshold: u64,
        root_cancel: CancellationToken,
        one_shot_total: Option<usize>,
    ) -> Self {
        let (interactive_tx, interactive_rx) = async_channel::unbounded();
        let (bulk_tx, bulk_rx) = async_channel::unbounded();
        Self {
            state: Mutex::new(TrackerState::default()),
            interactive_tx,
            interactive_rx,
            bulk_tx,
            bulk_rx,
            small_file_threshold,
            one_shot_total,
            completed: AtomicUsize::new(0),
            done: CancellationToken::new(),
            root_cancel,
        }
    }

    /// Worker lane receivers; cloning is how multiple workers share them.
    pub fn lanes(
        &self,
    ) -> (
        async_channel::Receiver<Arc<TrackedAction>>,
        async_channel::Receiver<Arc<TrackedAction>>,
    ) {
        (self.interactive_rx.clone(), self.bulk_rx.clone())
    }

    /// Fires when all of a one-shot tracker's actions are complete.
    pub fn done(&self) -> &CancellationToken {
        &self.done
    }

    /// Register a cycle before adding its actions; the returned token
    /// fires when `total` of them have completed.
    pub fn register_cycle(&self, cycle_id: i64, total: usize) -> CancellationToken {
        let token = CancellationToken::new();
        if total == 0 {
            token.cancel();
        }
        self.state.lock().cycles.insert(
            cycle_id,
            CycleProgress {
                total,
                completed: 0,
                done: token.clone(),
            },
        );
        token
    }

    pub fn cycle_done(&self, cycle_id: i64) -> Option<CancellationToken> {
        self.state
            .lock()
            .cycles
            .get(&cycle_id)
            .map(|c| c.done.clone())
    }

    /// Release a finished cycle's bookkeeping.
    pub fn cleanup_cycle(&self, cycle_id: i64) {
        self.state.lock().cycles.remove(&cycle_id);
    }

    /// Register an action. Dependencies on ids the tracker does not know
    /// (other cycles, already-completed rows) are treated as satisfied.
    pub fn add(&self, action: Action, ledger_id: i64, dep_ids: &[i64], cycle_id: i64) {
        let tracked = Arc::new(TrackedAction {
            action,
            ledger_id,
            cycle_id,
            cancel: self.root_cancel.child_token(),
            deps_left: AtomicUsize::new(0),
            dependents: Mutex::new(Vec::new()),
        });

        let ready = {
            let mut state = self.state.lock();
            let mut deps = 0;
            for dep_id in dep_ids {
                if let Some(dep) = state.actions.get(dep_id) {
                    dep.dependents.lock().push(ledger_id);
                    deps += 1;
                }
            }
            tracked.deps_left.store(deps, Ordering::SeqCst);
            state.actions.insert(ledger_id, tracked.clone());
            state.by_path.insert(tracked.action.path.clone(), ledger_id);
            deps == 0
        };

        if ready {
            self.dispatch(tracked);
        }
    }

    /// Mark an action complete: release dependents, advance counters,
    /// fire cycle/global done tokens.
    pub fn complete(&self, ledger_id: i64) {
        let mut ready = Vec::new();
        {
            let mut state = self.state.lock();
            match state.actions.remove(&ledger_id) {
                Some(tracked) => {
                    if state
                        .by_path
                        .get(&tracked.action.path)
                        .is_some_and(|&id| id == ledger_id)
                    {
                        state.by_path.remove(&tracked.action.path);
                    }
                    let dependents = tracked.dependents.lock().clone();
                    for dep_id in dependents {
                        if let Some(dependent) = state.actions.get(&dep_id) {
                            if dependent.deps_left.fetch_sub(1, Ordering::SeqCst) == 1 {
                                ready.push(dependent.clone());
                            }
                        }
                    }
                    if let Some(progress) = state.cycles.get_mut(&tracked.cycle_id) {
                        progress.completed += 1;
                        if progress.completed >= progress.total {
                            progress.done.cancel();
                        }
                    }
                }
                None => {
                    // Still advance the global counter: a lost completion
                    // must not deadlock a one-shot run.
                    tracing::warn!(ledger_id, "complete() for unknown action");
                }
            }
        }
        for tracked in ready {
            self.dispatch(tracked);
        }

        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(total) = self.one_shot_total {
            if completed >= total {
                self.done.cancel();
            }
        }
    }

    /// Watch-mode deduplication: is some action already scheduled for
    /// this path?
    pub fn has_in_flight(&self, path: &str) -> bool {
        self.state.lock().by_path.contains_key(path)
    }

    /// Cancel exactly the action scheduled for `path`, if any.
    pub fn cancel_by_path(&self, path: &str) -> bool {
        let state = self.state.lock();
        let Some(id) = state.by_path.get(path) else {
            return false;
        };
        if let Some(tracked) = state.actions.get(id) {
            tracked.cancel.cancel();
            return true;
        }
        false
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().actions.len()
    }

    /// Route by size: large transfers go to the bulk lane so interactive
    /// work is never stuck behind them.
    fn dispatch(&self, tracked: Arc<TrackedAction>) {
        let bulk = matches!(
            tracked.action.kind,
            ActionKind::Download | ActionKind::Upload
        ) && tracked.action.transfer_size().max(0) as u64 >= self.small_file_threshold;
        let lane = if bulk {
            &self.bulk_tx
        } else {
            &self.interactive_tx
        };
        if let Err(err) = lane.try_send(tracked) {
            tracing::error!(error = %err, "dispatch lane closed");
        }
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
