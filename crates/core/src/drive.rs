// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote drive and item identifiers.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Canonical length of a normalised drive identifier.
///
/// The service is inconsistent about zero-padding drive ids across
/// endpoints; `DriveId::new` pads every id to this length so that ids
/// from different endpoints compare equal.
pub const DRIVE_ID_LEN: usize = 16;

/// Opaque normalised identifier of a remote drive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriveId(String);

impl DriveId {
    /// Normalise a raw drive id: lowercase, left-padded with zeros to the
    /// canonical length. Empty input stays empty.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref().trim().to_ascii_lowercase();
        if raw.is_empty() || raw.len() >= DRIVE_ID_LEN {
            return Self(raw);
        }
        let mut id = String::with_capacity(DRIVE_ID_LEN);
        for _ in 0..DRIVE_ID_LEN - raw.len() {
            id.push('0');
        }
        id.push_str(&raw);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compose with an item id into the cross-drive primary key.
    pub fn key(&self, item: &ItemId) -> ItemKey {
        ItemKey {
            drive: self.clone(),
            item: item.clone(),
        }
    }
}

impl fmt::Display for DriveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DriveId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DriveId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl Borrow<str> for DriveId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for DriveId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for DriveId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Opaque per-drive identifier of a remote item. Not normalised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for ItemId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ItemId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ItemId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// (DriveId, ItemId) — primary key for remote items across drives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    pub drive: DriveId,
    pub item: ItemId,
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.drive, self.item)
    }
}

#[cfg(test)]
#[path = "drive_tests.rs"]
mod tests;
