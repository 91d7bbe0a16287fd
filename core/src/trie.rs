//! This module defines the value schema of the binary merkle trie,
//! generalized over a 64 bit hash function. All lookup paths in the trie are
//! 64 bits.
//!
//! Node values come in three shapes:
//!   1. Interior values, which are 9 bytes: the 8-byte hash of the node's
//!      children followed by a flag byte of 0.
//!   2. Shortcut values, which are 9 bytes: the 8-byte hash of the stored
//!      (key digest, value) pair followed by a flag byte of 1. A shortcut
//!      stands in for an entire sub-trie containing exactly one live entry.
//!   3. Raw values: the key digest and value bytes hanging off a shortcut,
//!      and the value bytes stored at a true height-0 leaf.
//!
//! An empty sub-trie has no stored value at all; hashing substitutes the
//! precomputed default hash for the sub-trie's height.

use bitvec::prelude::*;

use crate::hasher::LedgerHasher;

/// The height of the trie: the number of bits in a key digest.
pub const TRIE_HEIGHT: u8 = 64;

/// The width of a digest in bytes.
pub const DIGEST_LEN: usize = 8;

/// A fixed-width hash digest. Used both as the lookup path of every key and
/// as the label of every interior node.
pub type Digest = [u8; DIGEST_LEN];

/// Whether bit `i` of the byte string is set, counting MSB-first: bit 0 is
/// the most significant bit of byte 0.
///
/// At height `h`, a key descends right iff bit `TRIE_HEIGHT - h` is set.
pub fn bit_is_set(bytes: &[u8], i: usize) -> bool {
    bytes.view_bits::<Msb0>()[i]
}

/// Set bit `i` of the byte string, counting MSB-first.
pub fn set_bit(bytes: &mut [u8], i: usize) {
    bytes.view_bits_mut::<Msb0>().set(i, true);
}

/// Whether a stored node value carries the shortcut flag.
///
/// Only meaningful for 9-byte interior/shortcut values; raw leaf values and
/// shortcut children never reach this check.
pub fn is_shortcut_value(value: &[u8]) -> bool {
    value.len() > DIGEST_LEN && value[DIGEST_LEN] == 1
}

/// The digest portion of a node value, with the flag byte stripped.
pub fn digest_part(value: &[u8]) -> &[u8] {
    &value[..value.len().min(DIGEST_LEN)]
}

/// Copy a byte string into a fixed-width digest, truncating or zero-padding.
pub fn to_digest(bytes: &[u8]) -> Digest {
    let mut digest = [0u8; DIGEST_LEN];
    let n = bytes.len().min(DIGEST_LEN);
    digest[..n].copy_from_slice(&bytes[..n]);
    digest
}

/// Append the flag byte to a freshly computed node hash.
pub fn tagged_value(hash: Digest, shortcut: bool) -> Vec<u8> {
    let mut value = hash.to_vec();
    value.push(shortcut as u8);
    value
}

/// The default hashes of empty sub-tries, one per height.
///
/// `at(0)` is the hash of the single byte `0x00`; `at(h)` is the hash of two
/// copies of `at(h - 1)`. Computed once per trie and never changed.
pub struct DefaultHashes {
    table: Vec<Digest>,
}

impl DefaultHashes {
    /// Precompute the table for the given hasher.
    pub fn new<H: LedgerHasher>() -> Self {
        let mut table = Vec::with_capacity(TRIE_HEIGHT as usize + 1);
        table.push(H::hash(&[&[0x00]]));
        for h in 1..=TRIE_HEIGHT as usize {
            let below = table[h - 1];
            table.push(H::hash(&[&below, &below]));
        }
        DefaultHashes { table }
    }

    /// The default hash of an empty sub-trie rooted at `height`.
    pub fn at(&self, height: u8) -> &Digest {
        &self.table[height as usize]
    }
}
