//! The page store: a bounded, sharded LRU map from page id to page contents.
//!
//! Pages are immutable once written under a given id, so `get` hands out
//! copies that callers may mutate freely. Eviction is per shard: a write that
//! pushes a shard past its bound pops least-recently-used pages until it
//! fits. Evicting a page silently makes the versions that reference it
//! unreadable, which readers observe as [`crate::LedgerError::PageMissing`].

use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::sync::atomic::{AtomicU64, Ordering};

use fxhash::FxBuildHasher;
use lru::LruCache;
use parking_lot::{Mutex, MutexGuard};
use verimap_core::page::PageData;
use verimap_core::trie::Digest;

/// Basic storage counters of the page store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Lookups that found a resident page.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Pages written.
    pub writes: u64,
    /// Pages dropped by the LRU bound.
    pub evictions: u64,
}

pub(crate) struct PageStore {
    shards: Vec<Mutex<Shard>>,
    shard_assigner: RandomState,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    evictions: AtomicU64,
}

struct Shard {
    pages: LruCache<Digest, PageData, FxBuildHasher>,
    max_items: usize,
}

impl PageStore {
    /// Create a store with the given number of shards and total page bound.
    /// `shards` must be non-zero.
    pub fn new(shards: usize, capacity: usize) -> Self {
        let max_items = std::cmp::max(1, capacity / shards);
        PageStore {
            shards: (0..shards)
                .map(|_| Shard {
                    pages: LruCache::unbounded_with_hasher(FxBuildHasher::default()),
                    max_items,
                })
                .map(Mutex::new)
                .collect(),
            shard_assigner: RandomState::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Fetch a copy of the page stored under `id`, updating the LRU state.
    pub fn get(&self, id: &Digest) -> Option<PageData> {
        let page = self.shard_for(id).pages.get(id).cloned();
        match page {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        page
    }

    /// Install a page under `id`, evicting past the shard bound.
    pub fn set(&self, id: Digest, page: PageData) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let mut shard = self.shard_for(&id);
        shard.pages.put(id, page);
        while shard.pages.len() > shard.max_items {
            let Some((evicted, _)) = shard.pages.pop_lru() else {
                break;
            };
            self.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("evicted page {}", hex::encode(evicted));
        }
    }

    /// Drop the page stored under `id`, if any.
    pub fn delete(&self, id: &Digest) {
        self.shard_for(id).pages.pop(id);
    }

    /// A snapshot of the storage counters.
    pub fn stats(&self) -> Stats {
        Stats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn shard_for(&self, id: &Digest) -> MutexGuard<'_, Shard> {
        let index = (self.shard_assigner.hash_one(id) as usize) % self.shards.len();
        self.shards[index].lock()
    }
}
