#![warn(missing_docs)]

//! A versioned key-value ledger on a paged sparse merkle trie.
//!
//! The ledger is a string map with three characteristics:
//!
//! 1. Every observed state carries a short, deterministic, content-addressed
//!    fingerprint: the root hash. Two states with the same keys and values
//!    have the same root hash, regardless of how they were reached.
//! 2. Prior states are retained until explicitly erased, bounded by the page
//!    store's capacity.
//! 3. Any retained state can be read back by its root hash, so callers can
//!    answer "did version X hold value V for key K?" without keeping a
//!    snapshot.
//!
//! Keys are hashed to 64-bit digests and stored in a sparse merkle trie
//! whose nodes are packed into content-addressed 31-slot pages. A mutation
//! rewrites only the pages along the touched path; everything else is shared
//! structurally between versions. [`Ledger::erase_root_hash`] walks a
//! version against its neighbors in history and reclaims the pages nothing
//! else references.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use parking_lot::RwLock;

pub use verimap_core::hasher::{self, LedgerHasher, Murmur3Hasher};
pub use verimap_core::page;
pub use verimap_core::trie::{self, Digest};

pub use error::LedgerError;
pub use gc::GcLedger;
pub use options::Options;
pub use store::Stats;

mod cursor;
mod error;
mod gc;
mod history;
mod key_index;
mod options;
mod smt;
mod store;

use history::History;
use key_index::KeyIndex;
use smt::Smt;
use store::PageStore;

/// The full contents of one ledger version.
#[derive(Debug, Default)]
pub struct Contents {
    /// Original key to value, for every digest the key index could resolve.
    pub entries: HashMap<String, String>,
    /// Digests whose original keys were evicted from the key index. Their
    /// values are part of the version but cannot be labeled.
    pub unknown: Vec<Digest>,
}

/// A versioned map addressed by root hash. See the crate docs.
///
/// All operations are safe to call concurrently: mutations serialize behind
/// a write lock, readers share a read lock, and a version read through
/// [`Ledger::get_previous`] never races with mutations because its root
/// names an immutable set of pages.
pub struct Ledger<H: LedgerHasher = Murmur3Hasher> {
    shared: RwLock<Shared>,
    tree: Smt<H>,
    store: Arc<PageStore>,
    keys: KeyIndex,
}

struct Shared {
    root: Option<Vec<u8>>,
    history: History,
}

impl Ledger<Murmur3Hasher> {
    /// Create a ledger with the default options and hasher.
    pub fn new() -> Self {
        Self::with_options(Options::new())
    }
}

impl Default for Ledger<Murmur3Hasher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: LedgerHasher> Ledger<H> {
    /// Create a ledger with the given options.
    pub fn with_options(options: Options) -> Self {
        let store = Arc::new(PageStore::new(options.store_shards, options.page_capacity));
        Ledger {
            shared: RwLock::new(Shared {
                root: None,
                history: History::new(),
            }),
            tree: Smt::new(store.clone()),
            store,
            keys: KeyIndex::new(options.key_capacity),
        }
    }

    /// Add or overwrite a key, returning the new root hash.
    ///
    /// An empty value is the legacy spelling of [`Ledger::delete`].
    pub fn put(&self, key: &str, value: &str) -> Result<String, LedgerError> {
        if value.is_empty() {
            return self.delete(key);
        }
        let digest = self.key_digest(key);
        let mut shared = self.shared.write();
        let root = self
            .tree
            .update(shared.root.as_deref(), vec![(digest, value.as_bytes().to_vec())])?;
        Ok(self.commit(&mut shared, root))
    }

    /// Remove a key, returning the new root hash. The removed value stays
    /// readable through [`Ledger::get_previous`] until the versions holding
    /// it are erased or evicted.
    pub fn delete(&self, key: &str) -> Result<String, LedgerError> {
        let digest = self.key_digest(key);
        let mut shared = self.shared.write();
        let root = self.tree.delete(shared.root.as_deref(), &digest)?;
        Ok(self.commit(&mut shared, root))
    }

    /// The current value of a key, or the empty string when absent.
    pub fn get(&self, key: &str) -> Result<String, LedgerError> {
        let digest = self.key_digest(key);
        let shared = self.shared.read();
        let value = self.tree.get(shared.root.as_deref(), &digest)?;
        Ok(stringify(value))
    }

    /// The value of a key as of the version named by `root`.
    ///
    /// Fails with [`LedgerError::PageMissing`] when the version's pages have
    /// been erased or evicted, and [`LedgerError::KeyEncoding`] when `root`
    /// is not valid base64.
    pub fn get_previous(&self, root: &str, key: &str) -> Result<String, LedgerError> {
        let digest = self.key_digest(key);
        let bytes = BASE64.decode(root)?;
        let _shared = self.shared.read();
        let value = self.tree.get(Some(&bytes), &digest)?;
        Ok(stringify(value))
    }

    /// The root hash of the current state: the empty string for an empty
    /// ledger, standard base64 otherwise.
    pub fn root_hash(&self) -> String {
        encode_root(self.shared.read().root.as_deref())
    }

    /// Reclaim the memory unique to the version(s) carrying `root`,
    /// preserving every page shared with the neighboring versions in
    /// history.
    ///
    /// Fails with [`LedgerError::RootHashNotPresent`] when no retained
    /// version carries the hash; the ledger is left unchanged.
    pub fn erase_root_hash(&self, root: &str) -> Result<(), LedgerError> {
        let mut shared = self.shared.write();
        let occurrences = shared.history.occurrences(root);
        if occurrences.is_empty() {
            return Err(LedgerError::RootHashNotPresent(root.to_string()));
        }
        tracing::debug!("erasing root {}, {} occurrences in history", root, occurrences.len());
        let target = shared.history.root(occurrences[0]).to_vec();
        let mut adjacents = Vec::with_capacity(occurrences.len() * 2);
        for &cell in &occurrences {
            let (prev, next) = shared.history.neighbors(cell);
            adjacents.push(prev);
            adjacents.push(next);
        }
        if !target.is_empty() {
            self.tree.erase(&target, &adjacents)?;
        }
        for cell in occurrences {
            shared.history.remove(cell, root);
        }
        Ok(())
    }

    /// The entire current state, see [`Ledger::get_all_previous`].
    pub fn get_all(&self) -> Result<Contents, LedgerError> {
        let shared = self.shared.read();
        let root = shared.root.clone();
        self.contents_at(root.as_deref())
    }

    /// The entire state of the version named by `root`.
    ///
    /// The result is partial when the key index evicted some originals:
    /// their digests are reported in [`Contents::unknown`] while every
    /// resolvable entry is still returned.
    pub fn get_all_previous(&self, root: &str) -> Result<Contents, LedgerError> {
        let bytes = BASE64.decode(root)?;
        let _shared = self.shared.read();
        self.contents_at(Some(&bytes))
    }

    /// Basic storage counters of the underlying page store.
    pub fn stats(&self) -> Stats {
        self.store.stats()
    }

    fn contents_at(&self, root: Option<&[u8]>) -> Result<Contents, LedgerError> {
        let mut contents = Contents::default();
        for (digest, value) in self.tree.get_all(root)? {
            match self.keys.lookup(&digest) {
                Some(original) => {
                    let key = String::from_utf8_lossy(&original).into_owned();
                    contents.entries.insert(key, stringify(Some(value)));
                }
                None => contents.unknown.push(digest),
            }
        }
        Ok(contents)
    }

    fn commit(&self, shared: &mut Shared, root: Option<Vec<u8>>) -> String {
        let encoded = encode_root(root.as_deref());
        shared.history.append(root.as_deref().unwrap_or_default(), &encoded);
        shared.root = root;
        tracing::trace!("committed root {}", encoded);
        encoded
    }

    fn key_digest(&self, key: &str) -> Digest {
        let digest = H::hash(&[key.as_bytes()]);
        self.keys.record(digest, key.as_bytes());
        digest
    }
}

fn encode_root(root: Option<&[u8]>) -> String {
    match root {
        Some(bytes) if !bytes.is_empty() => BASE64.encode(bytes),
        _ => String::new(),
    }
}

fn stringify(value: Option<Vec<u8>>) -> String {
    match value {
        Some(bytes) => String::from_utf8_lossy(trim_leading_zeros(&bytes)).into_owned(),
        None => String::new(),
    }
}

// values were historically padded to digest width; stored bytes are raw, the
// trim happens only at this boundary
fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}
