// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write;

#[test]
fn empty_input_digest() {
    let hasher = QuickXorHasher::new();
    assert_eq!(hasher.base64(), "AAAAAAAAAAAAAAAAAAAAAAAAAAA=");
}

#[test]
fn single_byte_digest() {
    // 0x01 lands at bit 0 of cell 0; length 1 is XORed at byte 12.
    let mut hasher = QuickXorHasher::new();
    hasher.update(&[0x01]);
    let digest = hasher.finalize();
    assert_eq!(digest[0], 0x01);
    assert_eq!(digest[12], 0x01);
    assert!(digest[1..12].iter().all(|&b| b == 0));
    assert!(digest[13..].iter().all(|&b| b == 0));
    assert_eq!(hasher.base64(), "AQAAAAAAAAAAAAAAAQAAAAAAAAA=");
}

#[test]
fn chunked_update_equals_one_shot() {
    let data: Vec<u8> = (0u32..100_000).map(|i| (i % 251) as u8).collect();

    let mut whole = QuickXorHasher::new();
    whole.update(&data);

    let mut chunked = QuickXorHasher::new();
    for chunk in data.chunks(977) {
        chunked.update(chunk);
    }

    assert_eq!(whole.base64(), chunked.base64());
}

#[test]
fn length_distinguishes_zero_padding() {
    let mut a = QuickXorHasher::new();
    a.update(&[0u8; 10]);
    let mut b = QuickXorHasher::new();
    b.update(&[0u8; 11]);
    assert_ne!(a.base64(), b.base64());
}

#[test]
fn different_content_different_digest() {
    let mut a = QuickXorHasher::new();
    a.update(b"hello world");
    let mut b = QuickXorHasher::new();
    b.update(b"hello worle");
    assert_ne!(a.base64(), b.base64());
}

#[test]
fn hash_file_matches_hash_reader() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.bin");
    let data: Vec<u8> = (0u32..70_000).map(|i| (i % 241) as u8).collect();
    std::fs::File::create(&path)
        .unwrap()
        .write_all(&data)
        .unwrap();

    let from_file = hash_file(&path).unwrap();
    let from_reader = hash_reader(&data[..]).unwrap();
    assert_eq!(from_file, from_reader);

    let mut direct = QuickXorHasher::new();
    direct.update(&data);
    assert_eq!(from_file, direct.base64());
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // Invariant: streaming split point never changes the digest.
        #[test]
        fn split_invariant(data in proptest::collection::vec(any::<u8>(), 0..2048), split in 0usize..2048) {
            let split = split.min(data.len());
            let mut whole = QuickXorHasher::new();
            whole.update(&data);
            let mut parts = QuickXorHasher::new();
            parts.update(&data[..split]);
            parts.update(&data[split..]);
            prop_assert_eq!(whole.base64(), parts.base64());
        }
    }
}
