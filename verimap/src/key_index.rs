//! The reverse key index: digest -> original key bytes.
//!
//! The trie stores digests only; this bounded LRU lets scans hand back the
//! human-readable keys. Evicted entries are tolerated, scans report the
//! digests they could not resolve alongside the entries they could.

use std::num::NonZeroUsize;

use fxhash::FxBuildHasher;
use lru::LruCache;
use parking_lot::Mutex;
use verimap_core::trie::Digest;

pub(crate) struct KeyIndex {
    entries: Mutex<LruCache<Digest, Vec<u8>, FxBuildHasher>>,
}

impl KeyIndex {
    /// Create an index bounded to `capacity` entries, clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        KeyIndex {
            entries: Mutex::new(LruCache::with_hasher(capacity, FxBuildHasher::default())),
        }
    }

    /// Record the original bytes behind a digest.
    pub fn record(&self, digest: Digest, key: &[u8]) {
        self.entries.lock().put(digest, key.to_vec());
    }

    /// The original bytes behind a digest, if still retained.
    pub fn lookup(&self, digest: &Digest) -> Option<Vec<u8>> {
        self.entries.lock().get(digest).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_lookup() {
        let index = KeyIndex::new(8);
        index.record([1u8; 8], b"virtual-service/frontend/default");
        assert_eq!(
            index.lookup(&[1u8; 8]).as_deref(),
            Some(&b"virtual-service/frontend/default"[..])
        );
        assert!(index.lookup(&[2u8; 8]).is_none());
    }

    #[test]
    fn evicts_least_recently_used() {
        let index = KeyIndex::new(2);
        index.record([1u8; 8], b"one");
        index.record([2u8; 8], b"two");
        index.record([3u8; 8], b"three");
        assert!(index.lookup(&[1u8; 8]).is_none());
        assert!(index.lookup(&[2u8; 8]).is_some());
        assert!(index.lookup(&[3u8; 8]).is_some());
    }
}
