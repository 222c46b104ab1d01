// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Streaming QuickXor content hashing.
//!
//! QuickXor is the service's preferred content digest: a 160-bit vector
//! into which every input byte is XORed at a position that advances by 11
//! bits per byte, with the total length folded into the low 64 bits at the
//! end. The digest is exchanged as base64.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::io::{self, Read};

const WIDTH_IN_BITS: usize = 160;
const SHIFT: usize = 11;
const CELL_COUNT: usize = 3;
const BITS_IN_LAST_CELL: usize = 32;
const DIGEST_LEN: usize = 20;

const READ_BUF_LEN: usize = 64 * 1024;

/// Incremental QuickXor state. Constant memory regardless of input size.
#[derive(Debug, Clone)]
pub struct QuickXorHasher {
    cells: [u64; CELL_COUNT],
    shift_so_far: usize,
    length_so_far: u64,
}

impl Default for QuickXorHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl QuickXorHasher {
    pub fn new() -> Self {
        Self {
            cells: [0; CELL_COUNT],
            shift_so_far: 0,
            length_so_far: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        let mut vector_array_index = self.shift_so_far / 64;
        let mut vector_offset = self.shift_so_far % 64;
        let iterations = data.len().min(WIDTH_IN_BITS);

        for i in 0..iterations {
            let is_last_cell = vector_array_index == CELL_COUNT - 1;
            let bits_in_vector_cell = if is_last_cell { BITS_IN_LAST_CELL } else { 64 };

            if vector_offset <= bits_in_vector_cell - 8 {
                let mut j = i;
                while j < data.len() {
                    self.cells[vector_array_index] ^= u64::from(data[j]) << vector_offset;
                    j += WIDTH_IN_BITS;
                }
            } else {
                // The byte straddles two cells (or wraps into cell 0).
                let index1 = vector_array_index;
                let index2 = if is_last_cell { 0 } else { vector_array_index + 1 };
                let low = bits_in_vector_cell - vector_offset;

                let mut xored_byte = 0u8;
                let mut j = i;
                while j < data.len() {
                    xored_byte ^= data[j];
                    j += WIDTH_IN_BITS;
                }
                self.cells[index1] ^= u64::from(xored_byte) << vector_offset;
                self.cells[index2] ^= u64::from(xored_byte) >> low;
            }

            vector_offset += SHIFT;
            while vector_offset >= bits_in_vector_cell {
                vector_array_index = if is_last_cell { 0 } else { vector_array_index + 1 };
                vector_offset -= bits_in_vector_cell;
            }
        }

        self.shift_so_far = (self.shift_so_far + SHIFT * (data.len() % WIDTH_IN_BITS)) % WIDTH_IN_BITS;
        self.length_so_far += data.len() as u64;
    }

    /// Final 20-byte digest: cells little-endian, total length XORed into
    /// the trailing 8 bytes.
    pub fn finalize(&self) -> [u8; DIGEST_LEN] {
        let mut digest = [0u8; DIGEST_LEN];
        digest[0..8].copy_from_slice(&self.cells[0].to_le_bytes());
        digest[8..16].copy_from_slice(&self.cells[1].to_le_bytes());
        digest[16..20].copy_from_slice(&self.cells[2].to_le_bytes()[..4]);

        let length_bytes = self.length_so_far.to_le_bytes();
        for (i, b) in length_bytes.iter().enumerate() {
            digest[DIGEST_LEN - length_bytes.len() + i] ^= b;
        }
        digest
    }

    pub fn base64(&self) -> String {
        BASE64.encode(self.finalize())
    }
}

/// Hash everything a reader yields, streaming.
pub fn hash_reader(mut reader: impl Read) -> io::Result<String> {
    let mut hasher = QuickXorHasher::new();
    let mut buf = vec![0u8; READ_BUF_LEN];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.base64())
}

/// Hash a file's contents.
pub fn hash_file(path: &std::path::Path) -> io::Result<String> {
    hash_reader(std::fs::File::open(path)?)
}

#[cfg(test)]
#[path = "hash_tests.rs"]
mod tests;
