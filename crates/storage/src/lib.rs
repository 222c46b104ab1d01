// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tandem-storage: sole-writer persistent state for the sync engine.
//!
//! One embedded SQLite database holds the baseline, delta cursors,
//! conflict records, and the action ledger. Exactly one connection is
//! ever opened; everything that writes goes through it, so the database
//! and the in-memory baseline cache can never diverge.

mod db;
mod ledger;
mod store;

pub use ledger::{Ledger, LedgerRow, LedgerStatus};
pub use store::{BaselineManager, Store};

use thiserror::Error;

/// Storage failure kinds.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("opening database: {0}")]
    DatabaseOpen(#[source] rusqlite::Error),
    #[error("migration to version {version}: {source}")]
    Migration {
        version: i64,
        #[source]
        source: rusqlite::Error,
    },
    #[error("schema version {found} is newer than supported {supported}")]
    Integrity { found: i64, supported: i64 },
    #[error("transaction: {0}")]
    Transaction(#[from] rusqlite::Error),
    #[error("conflict not found: {0}")]
    NotFound(String),
    #[error("ledger row {id}: illegal transition, expected status {expected}")]
    IllegalStatus { id: i64, expected: &'static str },
}

pub type Result<T> = std::result::Result<T, StorageError>;
