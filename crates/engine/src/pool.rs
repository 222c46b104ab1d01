// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker pool: reserved interactive and bulk workers plus shared
//! workers that drain whichever lane has work.

use crate::exec::Executor;
use crate::tracker::{DependencyTracker, TrackedAction};
use parking_lot::Mutex;
use std::sync::Arc;
use tandem_core::Clock;
use tandem_storage::{BaselineManager, Ledger, StorageError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Minimum pool size; below this the lane reservations stop making sense.
const MIN_WORKERS: usize = 4;

#[derive(Clone, Copy, Debug)]
enum Role {
    Interactive,
    Bulk,
    Shared,
}

/// Handle to the spawned workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    errors: Arc<Mutex<Vec<String>>>,
}

struct WorkerCtx<C: Clock> {
    tracker: Arc<DependencyTracker>,
    executor: Arc<Executor<C>>,
    baseline: BaselineManager,
    ledger: Ledger,
    errors: Arc<Mutex<Vec<String>>>,
    cancel: CancellationToken,
}

impl<C: Clock> Clone for WorkerCtx<C> {
    fn clone(&self) -> Self {
        Self {
            tracker: self.tracker.clone(),
            executor: self.executor.clone(),
            baseline: self.baseline.clone(),
            ledger: self.ledger.clone(),
            errors: self.errors.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl WorkerPool {
    /// Spawn `concurrency` workers (floored to 4): ⌈n/8⌉ interactive-only,
    /// ⌈n/8⌉ bulk-only, the rest shared.
    pub fn spawn<C: Clock>(
        concurrency: usize,
        tracker: Arc<DependencyTracker>,
        executor: Arc<Executor<C>>,
        baseline: BaselineManager,
        ledger: Ledger,
        cancel: CancellationToken,
    ) -> Self {
        let n = concurrency.max(MIN_WORKERS);
        let reserved = n.div_ceil(8);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let ctx = WorkerCtx {
            tracker,
            executor,
            baseline,
            ledger,
            errors: errors.clone(),
            cancel,
        };

        let mut handles = Vec::with_capacity(n);
        for i in 0..n {
            let role = if i < reserved {
                Role::Interactive
            } else if i < reserved * 2 {
                Role::Bulk
            } else {
                Role::Shared
            };
            let ctx = ctx.clone();
            handles.push(tokio::spawn(worker_loop(role, ctx)));
        }
        WorkerPool { handles, errors }
    }

    /// Errors recorded by workers so far (per failed action).
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    /// Wait for every worker to exit. Callers cancel the token (or let a
    /// one-shot tracker finish) first.
    pub async fn stop(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "worker panicked");
            }
        }
    }
}

async fn worker_loop<C: Clock>(role: Role, ctx: WorkerCtx<C>) {
    let (interactive, bulk) = ctx.tracker.lanes();
    loop {
        let tracked = tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = ctx.tracker.done().cancelled() => break,
            received = interactive.recv(), if matches!(role, Role::Interactive | Role::Shared) => {
                match received {
                    Ok(tracked) => tracked,
                    Err(_) => break,
                }
            }
            received = bulk.recv(), if matches!(role, Role::Bulk | Role::Shared) => {
                match received {
                    Ok(tracked) => tracked,
                    Err(_) => break,
                }
            }
        };
        process(&ctx, tracked).await;
    }
}

/// Claim, execute, commit, complete. Every path out of here signals
/// `tracker.complete` so dependents and counters always advance.
async fn process<C: Clock>(ctx: &WorkerCtx<C>, tracked: Arc<TrackedAction>) {
    let id = tracked.ledger_id;

    if tracked.cancel.is_cancelled() {
        let _ = ctx.ledger.cancel(id);
        ctx.tracker.complete(id);
        return;
    }

    match ctx.ledger.claim(id) {
        Ok(()) => {}
        Err(StorageError::IllegalStatus { .. }) => {
            // Canceled or reclaimed by someone else; not ours to run.
            tracing::debug!(ledger_id = id, "claim lost; skipping");
            ctx.tracker.complete(id);
            return;
        }
        Err(err) => {
            record_error(ctx, id, &tracked, &err.to_string());
            ctx.tracker.complete(id);
            return;
        }
    }

    let outcome = ctx.executor.execute(&tracked.action, id, &tracked.cancel).await;
    let failed = !outcome.success;
    if failed {
        if let Some(message) = &outcome.error {
            record_error(ctx, id, &tracked, message);
        }
    }

    if let Err(err) = ctx.baseline.commit_outcome(&outcome, id) {
        record_error(ctx, id, &tracked, &err.to_string());
        let _ = ctx.ledger.fail(id, &err.to_string());
    }

    ctx.tracker.complete(id);
}

fn record_error<C: Clock>(ctx: &WorkerCtx<C>, id: i64, tracked: &TrackedAction, message: &str) {
    tracing::warn!(
        ledger_id = id,
        kind = %tracked.action.kind,
        path = %tracked.action.path,
        error = %message,
        "action error"
    );
    ctx.errors
        .lock()
        .push(format!("{} {}: {}", tracked.action.kind, tracked.action.path, message));
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
