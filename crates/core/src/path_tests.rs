// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::PathBuf;

#[test]
fn db_rel_path_uses_forward_slashes() {
    let rel = PathBuf::from("docs").join("work").join("a.txt");
    assert_eq!(db_rel_path(&rel), "docs/work/a.txt");
}

#[test]
fn db_rel_path_normalises_nfd_to_nfc() {
    // "é" as 'e' + combining acute accent
    let rel = PathBuf::from("caf\u{0065}\u{0301}");
    assert_eq!(db_rel_path(&rel), "caf\u{00e9}");
}

#[test]
fn db_rel_path_empty_is_root() {
    assert_eq!(db_rel_path(&PathBuf::new()), "");
}

#[yare::parameterized(
    root_child = { "", "a.txt", "a.txt" },
    nested     = { "docs", "a.txt", "docs/a.txt" },
)]
fn join_paths(parent: &str, name: &str, expected: &str) {
    assert_eq!(join(parent, name), expected);
}

#[yare::parameterized(
    top_level = { "a.txt", "" },
    nested    = { "docs/work/a.txt", "docs/work" },
)]
fn parent_of(path: &str, expected: &str) {
    assert_eq!(parent(path), expected);
}

#[yare::parameterized(
    top_level = { "a.txt", "a.txt" },
    nested    = { "docs/a.txt", "a.txt" },
)]
fn file_name_of(path: &str, expected: &str) {
    assert_eq!(file_name(path), expected);
}

#[yare::parameterized(
    root   = { "", 0 },
    one    = { "a", 1 },
    three  = { "a/b/c", 3 },
)]
fn depth_of(path: &str, expected: usize) {
    assert_eq!(depth(path), expected);
}

#[yare::parameterized(
    direct_child     = { "a", "a/b", true },
    deep_descendant  = { "a", "a/b/c", true },
    sibling_prefix   = { "a", "ab/c", false },
    self_is_not      = { "a/b", "a/b", false },
    root_of_any      = { "", "a", true },
    root_of_root     = { "", "", false },
)]
fn strict_ancestor(ancestor: &str, path: &str, expected: bool) {
    assert_eq!(is_strict_ancestor(ancestor, path), expected);
}

#[test]
fn rebase_moves_descendants() {
    assert_eq!(rebase("a/b/c.txt", "a/b", "x/y"), Some("x/y/c.txt".into()));
    assert_eq!(rebase("a/b", "a/b", "x"), Some("x".into()));
    assert_eq!(rebase("other/c.txt", "a/b", "x"), None);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // Invariant: db paths round NFC-stable — normalising twice is a no-op.
        #[test]
        fn nfc_is_idempotent(s in "\\PC{0,40}") {
            let once = nfc_segment(&s);
            let twice = nfc_segment(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn join_then_split_round_trips(
            parent in "[a-z]{1,8}(/[a-z]{1,8}){0,3}",
            name in "[a-z]{1,8}",
        ) {
            let joined = join(&parent, &name);
            prop_assert_eq!(super::parent(&joined), parent.as_str());
            prop_assert_eq!(file_name(&joined), name.as_str());
        }
    }
}
