// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote observer: paginated delta consumption with path
//! materialisation.

use crate::BaselineView;
use std::collections::HashMap;
use tandem_core::{
    path as dbpath, ChangeEvent, ChangeKind, DeltaPage, DriveId, DriveItem, EventSource, ItemId,
    ItemKey, ItemType, RemoteError,
};
use thiserror::Error;

/// Bound on pages per enumeration; a service bug that never returns a
/// delta link must not spin forever.
const MAX_PAGES: usize = 10_000;

/// Bound on parent-chain walks; defends against malformed parent data.
const MAX_PATH_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum RemoteObserveError {
    /// The saved cursor expired; the caller resets it and re-enumerates.
    #[error("delta cursor expired; full re-enumeration required")]
    DeltaExpired,
    #[error(transparent)]
    Remote(RemoteError),
    #[error("delta enumeration exceeded {MAX_PAGES} pages")]
    PageBound,
}

/// Result of one full delta enumeration.
#[derive(Debug, Default)]
pub struct DeltaOutcome {
    pub events: Vec<ChangeEvent>,
    /// Cursor to persist once the cycle commits cleanly.
    pub cursor: String,
    /// Whether enumeration reached a terminal delta link. Deletes are
    /// unsafe to act on when it did not (safety invariant S2).
    pub reached_delta_link: bool,
    /// The drive root's item id, when the enumeration included it.
    pub root_item_id: Option<ItemId>,
}

/// Per-page record of an item, registered before classification so later
/// items in the same page can materialise their paths through it.
#[derive(Debug, Clone)]
struct InflightItem {
    name: String,
    parent: Option<ItemKey>,
    is_root: bool,
    is_vault: bool,
}

/// Consumes delta pages for one drive.
pub struct RemoteObserver<F: tandem_core::ports::DeltaFetcher> {
    fetcher: F,
    drive_id: DriveId,
}

impl<F: tandem_core::ports::DeltaFetcher> RemoteObserver<F> {
    pub fn new(fetcher: F, drive_id: DriveId) -> Self {
        Self { fetcher, drive_id }
    }

    pub fn drive_id(&self) -> &DriveId {
        &self.drive_id
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Enumerate all changes since `cursor` (empty = from scratch).
    pub async fn enumerate(
        &self,
        cursor: &str,
        baseline: &dyn BaselineView,
    ) -> Result<DeltaOutcome, RemoteObserveError> {
        let mut inflight: HashMap<ItemKey, InflightItem> = HashMap::new();
        let mut outcome = DeltaOutcome::default();
        let mut cursor = cursor.to_string();

        for _ in 0..MAX_PAGES {
            let page = match self.fetcher.delta(&self.drive_id, &cursor).await {
                Ok(page) => page,
                Err(RemoteError::Gone) => return Err(RemoteObserveError::DeltaExpired),
                Err(err) => return Err(RemoteObserveError::Remote(err)),
            };
            self.consume_page(&page, &mut inflight, baseline, &mut outcome);

            if let Some(delta_link) = page.delta_link {
                outcome.cursor = delta_link;
                outcome.reached_delta_link = true;
                return Ok(outcome);
            }
            match page.next_link {
                Some(next) => cursor = next,
                None => {
                    // Neither link: treat as complete but do not advance.
                    tracing::warn!(drive = %self.drive_id, "delta page had no next or delta link");
                    outcome.cursor = cursor;
                    return Ok(outcome);
                }
            }
        }
        Err(RemoteObserveError::PageBound)
    }

    fn consume_page(
        &self,
        page: &DeltaPage,
        inflight: &mut HashMap<ItemKey, InflightItem>,
        baseline: &dyn BaselineView,
        outcome: &mut DeltaOutcome,
    ) {
        for item in &page.items {
            let key = self.key_of(item);
            // Register before classification so this page's later items
            // can resolve their parent chain through this one.
            inflight.insert(
                key.clone(),
                InflightItem {
                    name: item.name.clone(),
                    parent: self.parent_key(item),
                    is_root: item.is_root,
                    is_vault: item.is_vault(),
                },
            );

            if item.is_root {
                outcome.root_item_id = Some(ItemId::new(&item.id));
                continue;
            }
            if item.is_vault() {
                continue;
            }
            if let Some(event) = self.classify(item, &key, inflight, baseline) {
                outcome.events.push(event);
            }
        }
    }

    fn classify(
        &self,
        item: &DriveItem,
        key: &ItemKey,
        inflight: &HashMap<ItemKey, InflightItem>,
        baseline: &dyn BaselineView,
    ) -> Option<ChangeEvent> {
        let prior = baseline.get_by_key(key);

        if item.is_deleted {
            // Deletions often arrive without a name; the baseline knows
            // where the item lived.
            let path = prior
                .as_ref()
                .map(|b| b.path.clone())
                .or_else(|| self.materialise(item, inflight, baseline).map(|m| m.path))?;
            return Some(self.event_for(item, ChangeKind::Delete, path, None));
        }

        let materialised = self.materialise(item, inflight, baseline)?;
        if materialised.in_vault {
            return None;
        }
        let path = materialised.path;

        match prior {
            Some(prior) if prior.path != path => {
                Some(self.event_for(item, ChangeKind::Move, path, Some(prior.path)))
            }
            Some(_) => Some(self.event_for(item, ChangeKind::Modify, path, None)),
            None => Some(self.event_for(item, ChangeKind::Create, path, None)),
        }
    }

    fn event_for(
        &self,
        item: &DriveItem,
        kind: ChangeKind,
        path: String,
        old_path: Option<String>,
    ) -> ChangeEvent {
        ChangeEvent {
            source: EventSource::Remote,
            kind,
            path,
            old_path,
            item_id: Some(ItemId::new(&item.id)),
            parent_id: (!item.parent_id.is_empty()).then(|| ItemId::new(&item.parent_id)),
            drive_id: Some(self.drive_of(item)),
            item_type: if item.is_folder {
                ItemType::Folder
            } else {
                ItemType::File
            },
            name: item.name.clone(),
            size: item.size,
            hash: item.best_hash().to_string(),
            mtime: item.modified_at,
            etag: item.etag.clone(),
            ctag: item.ctag.clone(),
            is_deleted: item.is_deleted,
        }
    }

    /// Walk the parent chain: the current page's inflight map first, then
    /// the baseline as a shortcut. An orphan stops the walk; the event
    /// still carries the segments collected so far.
    fn materialise(
        &self,
        item: &DriveItem,
        inflight: &HashMap<ItemKey, InflightItem>,
        baseline: &dyn BaselineView,
    ) -> Option<Materialised> {
        let mut segments = vec![dbpath::nfc_segment(&item.name)];
        let mut in_vault = false;
        let mut parent = self.parent_key(item);

        for _ in 0..MAX_PATH_DEPTH {
            let Some(key) = parent else {
                break; // reached the top without a root marker
            };
            if let Some(entry) = inflight.get(&key) {
                if entry.is_vault {
                    in_vault = true;
                }
                if entry.is_root {
                    return Some(Materialised {
                        path: join_segments("", &segments),
                        in_vault,
                    });
                }
                segments.push(dbpath::nfc_segment(&entry.name));
                parent = entry.parent.clone();
                continue;
            }
            if let Some(entry) = baseline.get_by_key(&key) {
                return Some(Materialised {
                    path: join_segments(&entry.path, &segments),
                    in_vault,
                });
            }
            tracing::warn!(
                item = %key,
                "orphaned item: parent missing from page and baseline"
            );
            break;
        }
        Some(Materialised {
            path: join_segments("", &segments),
            in_vault,
        })
    }

    fn key_of(&self, item: &DriveItem) -> ItemKey {
        self.drive_of(item).key(&ItemId::new(&item.id))
    }

    fn drive_of(&self, item: &DriveItem) -> DriveId {
        if item.drive_id.is_empty() {
            self.drive_id.clone()
        } else {
            DriveId::new(&item.drive_id)
        }
    }

    fn parent_key(&self, item: &DriveItem) -> Option<ItemKey> {
        if item.parent_id.is_empty() {
            return None;
        }
        let drive = if item.parent_drive_id.is_empty() {
            self.drive_id.clone()
        } else {
            DriveId::new(&item.parent_drive_id)
        };
        Some(drive.key(&ItemId::new(&item.parent_id)))
    }
}

struct Materialised {
    path: String,
    in_vault: bool,
}

/// Segments are collected leaf-first.
fn join_segments(prefix: &str, segments: &[String]) -> String {
    let mut path = prefix.to_string();
    for segment in segments.iter().rev() {
        path = dbpath::join(&path, segment);
    }
    path
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
