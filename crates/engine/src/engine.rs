// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The cycle orchestrator: one-shot and watch modes.

use crate::error::EngineError;
use crate::exec::Executor;
use crate::planner::Planner;
use crate::pool::WorkerPool;
use crate::rate::RateLimiter;
use crate::safety::SafetyChecker;
use crate::tracker::DependencyTracker;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tandem_core::{
    Action, ActionKind, BaselineEntry, Clock, CreateSide, DriveId, EngineConfig, ItemId, ItemKey,
    LocalState, PathView, RemoteState,
};
use tandem_core::{DeltaFetcher, DiskSpace, DriveVerifier, Trasher};
use tandem_observe::{
    BaselineView, DeltaOutcome, EventBuffer, Filter, LocalObserver, LocalWatcher, RemoteObserveError,
    RemoteObserver, WatchOptions,
};
use tandem_storage::{BaselineManager, Ledger, LedgerRow, Store};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Minimum enforced remote poll interval in watch mode.
const MIN_POLL_SECS: u64 = 30;
/// Initial backoff after a failed remote poll.
const POLL_BACKOFF_START: Duration = Duration::from_secs(5);

/// External collaborators the engine drives.
pub struct EngineDeps {
    pub fetcher: Arc<dyn DeltaFetcher>,
    pub items: Arc<dyn tandem_core::ItemClient>,
    pub downloader: Arc<dyn tandem_core::Downloader>,
    pub uploader: Arc<dyn tandem_core::Uploader>,
    pub verifier: Arc<dyn DriveVerifier>,
    pub disk: Arc<dyn DiskSpace>,
    pub trasher: Option<Arc<dyn Trasher>>,
}

/// Summary of one completed cycle.
#[derive(Debug, Default, Clone)]
pub struct CycleStats {
    pub cycle_id: i64,
    pub local_events: usize,
    pub remote_events: usize,
    pub actions: usize,
    pub failed: usize,
    pub removed_by_safety: usize,
    pub folder_creates: usize,
    pub moves: usize,
    pub downloads: usize,
    pub uploads: usize,
    pub local_deletes: usize,
    pub remote_deletes: usize,
    pub conflicts: usize,
    pub synced_updates: usize,
    pub cleanups: usize,
    pub duration: Duration,
    pub dry_run: bool,
}

impl CycleStats {
    fn tally(&mut self, actions: &[Action]) {
        self.actions = actions.len();
        for action in actions {
            match action.kind {
                ActionKind::FolderCreate => self.folder_creates += 1,
                ActionKind::LocalMove | ActionKind::RemoteMove => self.moves += 1,
                ActionKind::Download => self.downloads += 1,
                ActionKind::Upload => self.uploads += 1,
                ActionKind::LocalDelete => self.local_deletes += 1,
                ActionKind::RemoteDelete => self.remote_deletes += 1,
                ActionKind::Conflict => self.conflicts += 1,
                ActionKind::UpdateSynced => self.synced_updates += 1,
                ActionKind::Cleanup => self.cleanups += 1,
            }
        }
    }

    fn log(&self) {
        tracing::info!(
            cycle = self.cycle_id,
            actions = self.actions,
            failed = self.failed,
            downloads = self.downloads,
            uploads = self.uploads,
            moves = self.moves,
            conflicts = self.conflicts,
            deletes = self.local_deletes + self.remote_deletes + self.cleanups,
            elapsed_ms = self.duration.as_millis() as u64,
            dry_run = self.dry_run,
            "cycle complete"
        );
    }
}

/// Live-baseline adapter for the observers in watch mode.
struct LiveBaseline(BaselineManager);

impl BaselineView for LiveBaseline {
    fn get(&self, path: &str) -> Option<BaselineEntry> {
        self.0.get_by_path(path)
    }

    fn get_by_key(&self, key: &ItemKey) -> Option<BaselineEntry> {
        self.0.get_by_id(key)
    }

    fn for_each(&self, f: &mut dyn FnMut(&BaselineEntry)) {
        self.0.for_each_path(|entry| f(entry));
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

pub struct Engine<C: Clock> {
    config: EngineConfig,
    drive_id: DriveId,
    store: Store,
    baseline: BaselineManager,
    ledger: Ledger,
    local: LocalObserver<C>,
    remote: RemoteObserver<Arc<dyn DeltaFetcher>>,
    executor: Arc<Executor<C>>,
    verifier: Arc<dyn DriveVerifier>,
    disk: Arc<dyn DiskSpace>,
    clock: C,
    cancel: CancellationToken,
}

impl<C: Clock> Engine<C> {
    pub fn new(config: EngineConfig, store: Store, deps: EngineDeps, drive_id: DriveId, clock: C) -> Self {
        let filter = Arc::new(Filter::new(&config.sync_root, &config.filter));
        let local = LocalObserver::new(&config.sync_root, filter, clock.clone());
        let remote = RemoteObserver::new(deps.fetcher, drive_id.clone());
        let rate = config.bandwidth.map(|bytes| Arc::new(RateLimiter::new(bytes)));
        let executor = Arc::new(Executor::new(
            &config.sync_root,
            deps.items,
            deps.downloader,
            deps.uploader,
            deps.trasher,
            rate,
            store.baseline(),
            store.ledger(),
            config.resumable_threshold,
            clock.clone(),
        ));
        Self {
            baseline: store.baseline(),
            ledger: store.ledger(),
            store,
            drive_id,
            local,
            remote,
            executor,
            verifier: deps.verifier,
            disk: deps.disk,
            clock,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancelling this token shuts the engine down at the next safe point.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn baseline(&self) -> &BaselineManager {
        &self.baseline
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    async fn startup(&self) -> Result<(), EngineError> {
        self.baseline.load()?;
        let info = self
            .verifier
            .drive(&self.drive_id)
            .await
            .map_err(|e| EngineError::DriveVerification(e.to_string()))?;
        tracing::debug!(drive = %info.id, drive_type = %info.drive_type, "drive verified");

        let reclaimed = self
            .ledger
            .reclaim_stale(Duration::from_secs(self.config.reclaim_secs))?;
        if reclaimed > 0 {
            tracing::info!(reclaimed, "stale claims reset to pending");
        }
        self.recover_pending().await
    }

    /// Re-run actions a previous process left pending in the ledger.
    /// Views are rebuilt from the rows' denormalised fields; dependencies
    /// on ids from other cycles resolve as already satisfied.
    async fn recover_pending(&self) -> Result<(), EngineError> {
        let rows = self.ledger.load_all_pending()?;
        if rows.is_empty() {
            return Ok(());
        }
        tracing::info!(rows = rows.len(), "recovering pending actions from ledger");

        let tracker = Arc::new(DependencyTracker::one_shot(
            rows.len(),
            self.config.small_file_threshold,
            self.cancel.clone(),
        ));
        let pool = WorkerPool::spawn(
            self.config.workers,
            tracker.clone(),
            self.executor.clone(),
            self.baseline.clone(),
            self.ledger.clone(),
            self.cancel.clone(),
        );
        for row in rows {
            let deps = row.depends_on.clone();
            let cycle_id = row.cycle_id;
            let id = row.id;
            tracker.add(self.action_from_row(row), id, &deps, cycle_id);
        }
        tokio::select! {
            _ = tracker.done().cancelled() => {}
            _ = self.cancel.cancelled() => {}
        }
        pool.stop().await;
        Ok(())
    }

    fn action_from_row(&self, row: LedgerRow) -> Action {
        let mut view = PathView::new(row.path.clone());
        view.baseline = self.baseline.get_by_path(&row.path);
        match row.kind {
            ActionKind::Download => {
                view.remote = Some(RemoteState {
                    item_id: ItemId::new(row.item_id.clone().unwrap_or_default()),
                    drive_id: row.drive_id.clone(),
                    parent_id: ItemId::new(row.parent_id.clone().unwrap_or_default()),
                    item_type: tandem_core::ItemType::File,
                    size: row.size,
                    hash: row.hash.clone(),
                    mtime: row.mtime,
                    is_deleted: false,
                });
            }
            ActionKind::Upload => {
                view.local = Some(LocalState {
                    name: tandem_core::path::file_name(&row.path).to_string(),
                    item_type: tandem_core::ItemType::File,
                    size: row.size,
                    hash: row.hash.clone(),
                    mtime: row.mtime,
                });
            }
            _ => {}
        }
        let mut action = Action::new(row.kind, view);
        action.old_path = row.old_path;
        action.drive_id = row.drive_id;
        if let Some(item_id) = row.item_id {
            action.item_id = Some(ItemId::new(item_id));
        }
        if let Some(parent_id) = row.parent_id {
            action.parent_id = Some(ItemId::new(parent_id));
        }
        if action.kind == ActionKind::FolderCreate {
            // A recovered create's side is recoverable from its identity:
            // only remote folders carry an item id.
            action.create_side = Some(if action.item_id.is_some() {
                CreateSide::Local
            } else {
                CreateSide::Remote
            });
        }
        action
    }

    /// Run one full cycle: observe, plan, gate, execute, commit cursor.
    pub async fn run_once(&self) -> Result<CycleStats, EngineError> {
        let started = Instant::now();
        self.startup().await?;

        let snapshot = self.baseline.snapshot();
        let local_events = self.local.full_scan(&snapshot)?;
        let delta = self.enumerate_with_reset(&snapshot).await?;
        if let Some(root) = &delta.root_item_id {
            self.baseline.ensure_root(&self.drive_id, root)?;
        }

        let mut stats = CycleStats {
            local_events: local_events.len(),
            remote_events: delta.events.len(),
            dry_run: self.config.safety.dry_run,
            ..Default::default()
        };

        let buffer = EventBuffer::new();
        buffer.add_all(local_events);
        buffer.add_all(delta.events.clone());
        let changes = buffer.flush_immediate();

        let planner = Planner::new(self.config.mode, self.config.planner_big_delete.clone());
        let mut plan = planner.plan(&changes, &snapshot)?;

        let mut delta_complete = HashMap::new();
        delta_complete.insert(self.drive_id.clone(), delta.reached_delta_link);
        let checker = SafetyChecker {
            config: &self.config.safety,
            disk: self.disk.as_ref(),
            sync_root: &self.config.sync_root,
            baseline_len: snapshot.len(),
            delta_complete: &delta_complete,
        };
        let report = checker.check(&mut plan)?;
        stats.removed_by_safety = report.removed.len();
        stats.tally(&plan.actions);

        if self.config.safety.dry_run {
            for action in &plan.actions {
                tracing::info!(kind = %action.kind, path = %action.path, "dry run: would execute");
            }
            stats.duration = started.elapsed();
            stats.log();
            return Ok(stats);
        }

        let cycle_id = self.ledger.last_cycle_id()? + 1;
        stats.cycle_id = cycle_id;
        if !plan.is_empty() {
            let ids = self
                .ledger
                .write_actions(&plan.actions, &plan.depends_on, cycle_id)?;
            let tracker = Arc::new(DependencyTracker::one_shot(
                ids.len(),
                self.config.small_file_threshold,
                self.cancel.clone(),
            ));
            let pool = WorkerPool::spawn(
                self.config.workers,
                tracker.clone(),
                self.executor.clone(),
                self.baseline.clone(),
                self.ledger.clone(),
                self.cancel.clone(),
            );
            let depends_on = std::mem::take(&mut plan.depends_on);
            for (i, action) in plan.actions.into_iter().enumerate() {
                let deps: Vec<i64> = depends_on[i].iter().map(|&d| ids[d]).collect();
                tracker.add(action, ids[i], &deps, cycle_id);
            }
            tokio::select! {
                _ = tracker.done().cancelled() => {}
                _ = self.cancel.cancelled() => {}
            }
            pool.stop().await;
        }

        stats.failed = self.ledger.count_failed_for_cycle(cycle_id)?;
        // The cursor only advances when the whole cycle committed: a
        // failed action means the next cycle must re-observe this window.
        if stats.failed == 0 && delta.reached_delta_link {
            self.baseline.commit_delta_token(&delta.cursor, &self.drive_id)?;
        }

        stats.duration = started.elapsed();
        stats.log();
        Ok(stats)
    }

    /// One-shot enumeration that transparently recovers from an expired
    /// cursor by re-enumerating from scratch.
    async fn enumerate_with_reset(
        &self,
        snapshot: &HashMap<String, BaselineEntry>,
    ) -> Result<DeltaOutcome, EngineError> {
        let token = self.baseline.delta_token(&self.drive_id)?;
        match self.remote.enumerate(&token, snapshot).await {
            Ok(outcome) => Ok(outcome),
            Err(RemoteObserveError::DeltaExpired) => {
                tracing::warn!("delta cursor expired; starting full re-enumeration");
                self.remote
                    .enumerate("", snapshot)
                    .await
                    .map_err(EngineError::from)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Watch mode: run until the cancel token fires.
    pub async fn watch(&self) -> Result<(), EngineError> {
        self.startup().await?;

        let live: Arc<dyn BaselineView> = Arc::new(LiveBaseline(self.baseline.clone()));
        let (event_tx, event_rx) = mpsc::channel(4096);
        let (flush_tx, mut flush_rx) = mpsc::channel(8);
        let buffer = Arc::new(EventBuffer::new());

        // Local watcher: best-effort sends, safety scan backstop.
        let watcher = LocalWatcher::new(
            LocalObserver::new(
                self.local.root(),
                Arc::new(Filter::new(&self.config.sync_root, &self.config.filter)),
                self.clock.clone(),
            ),
            WatchOptions::default(),
        );
        let watcher_cancel = self.cancel.child_token();
        let watcher_baseline = live.clone();
        let watcher_tx = event_tx.clone();
        let watcher_task = tokio::spawn(async move {
            watcher.run(watcher_baseline, watcher_tx, watcher_cancel).await
        });

        // Debounced grouping.
        let debounce_task = tokio::spawn(buffer.clone().flush_debounced(
            Duration::from_millis(self.config.debounce_ms),
            event_rx,
            flush_tx,
            self.cancel.child_token(),
        ));

        // Remote polling with back-pressure into the same event channel.
        let pending_cursor: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let delta_complete: Arc<Mutex<bool>> = Arc::new(Mutex::new(true));
        let poll_task = {
            let cancel = self.cancel.child_token();
            let baseline = self.baseline.clone();
            let drive_id = self.drive_id.clone();
            let live = live.clone();
            let event_tx = event_tx.clone();
            let pending_cursor = pending_cursor.clone();
            let delta_complete = delta_complete.clone();
            let poll_interval =
                Duration::from_secs(self.config.poll_interval_secs.max(MIN_POLL_SECS));
            let remote = RemoteObserver::new(self.remote.fetcher().clone(), drive_id.clone());
            tokio::spawn(async move {
                let mut backoff = POLL_BACKOFF_START;
                let mut reset_cursor = false;
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let token = if reset_cursor {
                        String::new()
                    } else {
                        baseline.delta_token(&drive_id).unwrap_or_default()
                    };
                    match remote.enumerate(&token, live.as_ref()).await {
                        Ok(outcome) => {
                            reset_cursor = false;
                            backoff = POLL_BACKOFF_START;
                            *delta_complete.lock() = outcome.reached_delta_link;
                            if let Some(root) = &outcome.root_item_id {
                                let _ = baseline.ensure_root(&drive_id, root);
                            }
                            if outcome.reached_delta_link {
                                *pending_cursor.lock() = Some(outcome.cursor.clone());
                            }
                            for event in outcome.events {
                                // Blocking send: a dropped remote event
                                // after cursor advance is silent data loss.
                                if event_tx.send(event).await.is_err() {
                                    return;
                                }
                            }
                            tokio::select! {
                                _ = cancel.cancelled() => break,
                                _ = tokio::time::sleep(poll_interval) => {}
                            }
                        }
                        Err(RemoteObserveError::DeltaExpired) => {
                            tracing::warn!("delta cursor expired; will re-enumerate");
                            reset_cursor = true;
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, backoff_secs = backoff.as_secs(), "remote poll failed");
                            tokio::select! {
                                _ = cancel.cancelled() => break,
                                _ = tokio::time::sleep(backoff) => {}
                            }
                            backoff = (backoff * 2).min(poll_interval);
                        }
                    }
                }
            })
        };

        // Plan/execute loop over debounced flushes.
        let tracker = Arc::new(DependencyTracker::persistent(
            self.config.small_file_threshold,
            self.cancel.clone(),
        ));
        let pool = WorkerPool::spawn(
            self.config.workers,
            tracker.clone(),
            self.executor.clone(),
            self.baseline.clone(),
            self.ledger.clone(),
            self.cancel.clone(),
        );

        let result = loop {
            let changes = tokio::select! {
                _ = self.cancel.cancelled() => break Ok(()),
                received = flush_rx.recv() => match received {
                    Some(changes) => changes,
                    None => break Ok(()),
                },
            };
            match self
                .run_watch_cycle(&tracker, changes, &pending_cursor, &delta_complete)
                .await
            {
                Ok(Some(stats)) => stats.log(),
                Ok(None) => {}
                Err(err @ EngineError::Scan(_)) => break Err(err),
                Err(err) => {
                    // Plan-level refusals (big delete, disk space) leave
                    // the baseline untouched; keep watching.
                    tracing::warn!(error = %err, "cycle skipped");
                }
            }
        };

        self.cancel.cancel();
        pool.stop().await;
        let _ = debounce_task.await;
        let _ = poll_task.await;
        match watcher_task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err.into()),
            Err(err) => tracing::error!(error = %err, "watcher task panicked"),
        }
        result
    }

    async fn run_watch_cycle(
        &self,
        tracker: &Arc<DependencyTracker>,
        changes: Vec<tandem_core::PathChanges>,
        pending_cursor: &Arc<Mutex<Option<String>>>,
        delta_complete: &Arc<Mutex<bool>>,
    ) -> Result<Option<CycleStats>, EngineError> {
        let started = Instant::now();
        let snapshot = self.baseline.snapshot();
        let planner = Planner::new(self.config.mode, self.config.planner_big_delete.clone());
        let mut plan = match planner.plan(&changes, &snapshot) {
            Ok(plan) => plan,
            Err(err) => {
                // The blocked window was never applied; drop any cursor
                // staged for it so a later clean cycle cannot commit past
                // the unapplied observations.
                pending_cursor.lock().take();
                return Err(err.into());
            }
        };

        let mut complete_map = HashMap::new();
        complete_map.insert(self.drive_id.clone(), *delta_complete.lock());
        let checker = SafetyChecker {
            config: &self.config.safety,
            disk: self.disk.as_ref(),
            sync_root: &self.config.sync_root,
            baseline_len: snapshot.len(),
            delta_complete: &complete_map,
        };
        let report = match checker.check(&mut plan) {
            Ok(report) => report,
            Err(err) => {
                pending_cursor.lock().take();
                return Err(err.into());
            }
        };
        if plan.is_empty() {
            return Ok(None);
        }

        // Per-path dedup: replace any in-flight action for these paths.
        for action in &plan.actions {
            if tracker.has_in_flight(&action.path) {
                tracing::debug!(path = %action.path, "cancelling superseded in-flight action");
                tracker.cancel_by_path(&action.path);
            }
        }

        let cycle_id = self.ledger.last_cycle_id()? + 1;
        let ids = self
            .ledger
            .write_actions(&plan.actions, &plan.depends_on, cycle_id)?;
        let cycle_done = tracker.register_cycle(cycle_id, ids.len());
        let depends_on = std::mem::take(&mut plan.depends_on);
        let mut stats = CycleStats {
            cycle_id,
            removed_by_safety: report.removed.len(),
            ..Default::default()
        };
        stats.tally(&plan.actions);
        for (i, action) in plan.actions.into_iter().enumerate() {
            let deps: Vec<i64> = depends_on[i].iter().map(|&d| ids[d]).collect();
            tracker.add(action, ids[i], &deps, cycle_id);
        }

        tokio::select! {
            _ = cycle_done.cancelled() => {}
            _ = self.cancel.cancelled() => return Ok(None),
        }
        tracker.cleanup_cycle(cycle_id);

        stats.failed = self.ledger.count_failed_for_cycle(cycle_id)?;
        // The staged cursor is consumed either way: committed after a
        // clean cycle, dropped after failures so the next poll
        // re-enumerates from the last committed token and re-observes
        // this window.
        let staged = pending_cursor.lock().take();
        if stats.failed == 0 {
            if let Some(cursor) = staged {
                self.baseline.commit_delta_token(&cursor, &self.drive_id)?;
            }
        }
        stats.duration = started.elapsed();
        Ok(Some(stats))
    }

}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
