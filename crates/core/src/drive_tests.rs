// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    short_hex       = { "ab13", "000000000000ab13" },
    already_full    = { "0123456789abcdef", "0123456789abcdef" },
    uppercase       = { "AB13", "000000000000ab13" },
    longer_than_pad = { "0123456789abcdef01", "0123456789abcdef01" },
    whitespace      = { " ab13 ", "000000000000ab13" },
)]
fn drive_id_normalises(raw: &str, expected: &str) {
    assert_eq!(DriveId::new(raw).as_str(), expected);
}

#[test]
fn drive_id_empty_stays_empty() {
    let id = DriveId::new("");
    assert!(id.is_empty());
    assert_eq!(id.as_str(), "");
}

#[test]
fn drive_ids_from_different_endpoints_compare_equal() {
    assert_eq!(DriveId::new("AB13"), DriveId::new("000000000000ab13"));
}

#[test]
fn item_key_composition() {
    let drive = DriveId::new("ab13");
    let key = drive.key(&ItemId::new("item1"));
    assert_eq!(key.drive, drive);
    assert_eq!(key.item, "item1");
    assert_eq!(key.to_string(), "000000000000ab13/item1");
}

#[test]
fn item_id_is_not_normalised() {
    assert_eq!(ItemId::new("AbC").as_str(), "AbC");
}
