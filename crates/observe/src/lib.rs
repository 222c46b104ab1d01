// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tandem-observe: change detection on both sides of the sync.
//!
//! The local observer scans (and optionally watches) the sync root; the
//! remote observer consumes the service's delta enumeration. Both emit
//! [`tandem_core::ChangeEvent`]s that the buffer groups by path for the
//! planner.

mod buffer;
mod filter;
mod local;
mod remote;
mod watch;

pub use buffer::EventBuffer;
pub use filter::{Filter, Verdict};
pub use local::{LocalObserver, LocalScanError, ScanStats};
pub use remote::{DeltaOutcome, RemoteObserveError, RemoteObserver};
pub use watch::{LocalWatcher, WatchOptions};

use std::collections::HashMap;
use tandem_core::BaselineEntry;

/// Read-only view of the baseline the observers classify against.
///
/// Implemented for the per-cycle snapshot map here; the engine adapts its
/// live baseline manager to it for watch mode.
pub trait BaselineView: Send + Sync {
    fn get(&self, path: &str) -> Option<BaselineEntry>;
    fn get_by_key(&self, key: &tandem_core::ItemKey) -> Option<BaselineEntry>;
    fn for_each(&self, f: &mut dyn FnMut(&BaselineEntry));
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BaselineView for HashMap<String, BaselineEntry> {
    fn get(&self, path: &str) -> Option<BaselineEntry> {
        HashMap::get(self, path).cloned()
    }

    fn get_by_key(&self, key: &tandem_core::ItemKey) -> Option<BaselineEntry> {
        self.values().find(|e| &e.key() == key).cloned()
    }

    fn for_each(&self, f: &mut dyn FnMut(&BaselineEntry)) {
        for entry in self.values() {
            f(entry);
        }
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }
}
