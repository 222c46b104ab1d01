// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command implementations.

use crate::config_file::Loaded;
use crate::exit_error::ExitError;
use crate::localdrive::{DirDrive, FsDiskSpace, HomeTrasher};
use std::sync::Arc;
use tandem_core::{Resolution, ResolvedBy, SystemClock, Trasher};
use tandem_engine::{Engine, EngineDeps};
use tandem_storage::Store;

fn build_engine(loaded: Loaded) -> Result<Engine<SystemClock>, ExitError> {
    let store = Store::open(&loaded.engine.database)?;
    let drive = Arc::new(DirDrive::new(loaded.drive_id.clone(), &loaded.remote_root));
    let trasher: Option<Arc<dyn Trasher>> = HomeTrasher::detect()
        .map(|trasher| Arc::new(trasher) as Arc<dyn Trasher>);
    let deps = EngineDeps {
        fetcher: drive.clone(),
        items: drive.clone(),
        downloader: drive.clone(),
        uploader: drive,
        verifier: Arc::new(DirDrive::new(
            loaded.drive_id.clone(),
            &loaded.remote_root,
        )),
        disk: Arc::new(FsDiskSpace),
        trasher,
    };
    Ok(Engine::new(
        loaded.engine,
        store,
        deps,
        loaded.drive_id,
        SystemClock,
    ))
}

fn install_ctrl_c(engine: &Engine<SystemClock>) {
    let cancel = engine.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received; shutting down");
            cancel.cancel();
        }
    });
}

pub async fn sync(mut loaded: Loaded, dry_run: bool, force: bool) -> Result<(), ExitError> {
    loaded.engine.safety.dry_run = dry_run;
    loaded.engine.safety.force = force;
    let engine = build_engine(loaded)?;
    install_ctrl_c(&engine);
    let stats = engine.run_once().await?;
    println!(
        "cycle {}: {} actions ({} downloads, {} uploads, {} moves, {} deletes, {} conflicts), {} failed{}",
        stats.cycle_id,
        stats.actions,
        stats.downloads,
        stats.uploads,
        stats.moves,
        stats.local_deletes + stats.remote_deletes + stats.cleanups,
        stats.conflicts,
        stats.failed,
        if stats.dry_run { " [dry run]" } else { "" },
    );
    if stats.failed > 0 {
        return Err(ExitError::new(1, format!("{} actions failed", stats.failed)));
    }
    Ok(())
}

pub async fn watch(loaded: Loaded) -> Result<(), ExitError> {
    let engine = build_engine(loaded)?;
    install_ctrl_c(&engine);
    engine.watch().await?;
    Ok(())
}

pub fn status(loaded: Loaded) -> Result<(), ExitError> {
    let store = Store::open(&loaded.engine.database)?;
    let baseline = store.baseline();
    baseline.load()?;
    let ledger = store.ledger();

    let pending = ledger.load_all_pending()?.len();
    let last_cycle = ledger.last_cycle_id()?;
    let conflicts = baseline.list_conflicts()?.len();

    println!("baseline entries:    {}", baseline.len());
    println!("pending actions:     {pending}");
    println!("last cycle:          {last_cycle}");
    println!("open conflicts:      {conflicts}");
    Ok(())
}

pub fn conflicts_list(loaded: Loaded, all: bool) -> Result<(), ExitError> {
    let store = Store::open(&loaded.engine.database)?;
    let baseline = store.baseline();
    let records = if all {
        baseline.list_all_conflicts()?
    } else {
        baseline.list_conflicts()?
    };
    if records.is_empty() {
        println!("no conflicts");
        return Ok(());
    }
    for record in records {
        println!(
            "{}  {:14} {:12} {}",
            record.id,
            record.conflict_type.as_str(),
            record.resolution.as_str(),
            record.path,
        );
    }
    Ok(())
}

pub fn conflicts_resolve(loaded: Loaded, id_or_path: &str, resolution: Resolution) -> Result<(), ExitError> {
    let store = Store::open(&loaded.engine.database)?;
    let record = store
        .baseline()
        .resolve_conflict(id_or_path, resolution, ResolvedBy::User)?;
    println!(
        "resolved {} at {} as {}",
        record.id,
        record.path,
        record.resolution.as_str(),
    );
    println!("the next sync cycle applies the chosen side");
    Ok(())
}
