//! The sparse merkle trie engine.
//!
//! The engine is stateless apart from the page store and the precomputed
//! default-hash table: every operation names the version it works on by its
//! root value and returns the new root where applicable. Pages are never
//! mutated in place. An update fetches copies of the pages along the touched
//! path, rewrites them, and installs them under their new content-derived
//! ids; untouched sub-tries keep their ids and are shared between versions.
//!
//! Recursion is unified over slots: slot 0 stands for a page's implicit
//! root, whose own value lives in the parent page's fringe slot and whose
//! shortcut flag is the page's slot-0 byte. Crossing a fringe slot at
//! height > 0 re-enters the recursion at slot 0 of the page one level down.

use std::marker::PhantomData;
use std::sync::Arc;

use verimap_core::hasher::LedgerHasher;
use verimap_core::page::{is_fringe, left_slot, page_id, right_slot, PageData};
use verimap_core::trie::{
    bit_is_set, digest_part, is_shortcut_value, set_bit, tagged_value, to_digest, DefaultHashes,
    Digest, TRIE_HEIGHT,
};

use crate::cursor::Cursor;
use crate::error::LedgerError;
use crate::store::PageStore;

/// A sorted write batch: (key digest, value) pairs, ascending by digest.
pub(crate) type Batch = Vec<(Digest, Vec<u8>)>;

/// An entry displaced during deletion, looking for a node to become a
/// shortcut at.
type Relocation = Option<(Digest, Vec<u8>)>;

pub(crate) struct Smt<H> {
    store: Arc<PageStore>,
    defaults: DefaultHashes,
    _hasher: PhantomData<H>,
}

impl<H: LedgerHasher> Smt<H> {
    pub fn new(store: Arc<PageStore>) -> Self {
        Smt {
            store,
            defaults: DefaultHashes::new::<H>(),
            _hasher: PhantomData,
        }
    }

    /// Apply a write batch to the version rooted at `root`, returning the
    /// new root value. Keys must be sorted ascending and distinct; values
    /// must be non-empty.
    pub fn update(&self, root: Option<&[u8]>, batch: Batch) -> Result<Option<Vec<u8>>, LedgerError> {
        debug_assert!(batch.windows(2).all(|pair| pair[0].0 < pair[1].0));
        debug_assert!(batch.iter().all(|(_, value)| !value.is_empty()));
        if batch.is_empty() {
            return Ok(root.filter(|r| !r.is_empty()).map(<[u8]>::to_vec));
        }
        let writes = batch.len();
        let mut page = self.root_page(root)?;
        let value = self.update_rec(&mut page, 0, TRIE_HEIGHT, batch)?;
        if let Some(v) = &value {
            self.store.set(page_id(v), page);
            tracing::trace!("applied {} writes, new root {}", writes, hex::encode(page_id(v)));
        }
        Ok(value)
    }

    /// Remove a single key from the version rooted at `root`, returning the
    /// new root value (`None` when the trie empties).
    pub fn delete(&self, root: Option<&[u8]>, key: &Digest) -> Result<Option<Vec<u8>>, LedgerError> {
        let mut page = self.root_page(root)?;
        let current = root.filter(|r| !r.is_empty()).map(<[u8]>::to_vec);
        let (mut value, relocation) = self.delete_rec(&mut page, 0, TRIE_HEIGHT, key, current)?;
        if let Some((relo_key, relo_value)) = relocation {
            // the last remaining entry condenses to a shortcut at the trie root
            value = Some(self.make_shortcut(&mut page, 0, relo_key, relo_value));
        }
        if let Some(v) = &value {
            self.store.set(page_id(v), page);
        }
        tracing::trace!(
            "deleted key {}, trie is now {}",
            hex::encode(key),
            if value.is_some() { "non-empty" } else { "empty" },
        );
        Ok(value)
    }

    /// The value stored under `key` in the version rooted at `root`.
    pub fn get(&self, root: Option<&[u8]>, key: &Digest) -> Result<Option<Vec<u8>>, LedgerError> {
        let Some(mut cursor) = Cursor::at_root(&self.store, root.unwrap_or_default())? else {
            return Ok(None);
        };
        loop {
            if cursor.height() == 0 {
                return Ok(Some(cursor.value().to_vec()));
            }
            if cursor.is_shortcut() {
                return Ok(cursor
                    .shortcut_entry()
                    .filter(|(stored, _)| stored == key)
                    .map(|(_, value)| value));
            }
            let right = bit_is_set(key, (TRIE_HEIGHT - cursor.height()) as usize);
            match cursor.child(&self.store, right)? {
                Some(child) => cursor = child,
                None => return Ok(None),
            }
        }
    }

    /// Every (key digest, value) pair in the version rooted at `root`, in
    /// ascending digest order.
    pub fn get_all(&self, root: Option<&[u8]>) -> Result<Vec<(Digest, Vec<u8>)>, LedgerError> {
        let Some(cursor) = Cursor::at_root(&self.store, root.unwrap_or_default())? else {
            return Ok(Vec::new());
        };
        let mut entries = Vec::new();
        self.collect_rec(&cursor, [0u8; 8], &mut entries)?;
        Ok(entries)
    }

    /// Drop from the page store every page reachable from `root` that is not
    /// shared, position for position, with one of the `adjacents` versions.
    pub fn erase(&self, root: &[u8], adjacents: &[Vec<u8>]) -> Result<(), LedgerError> {
        let Some(target) = Cursor::at_root(&self.store, root)? else {
            return Ok(());
        };
        let adjacent: Vec<Cursor> = adjacents
            .iter()
            .filter_map(|a| Cursor::at_root_lenient(&self.store, a))
            .collect();
        let dropped = self.erase_rec(target, adjacent);
        tracing::debug!(
            "dropped {} pages unique to root {}",
            dropped,
            hex::encode(page_id(root)),
        );
        Ok(())
    }

    fn root_page(&self, root: Option<&[u8]>) -> Result<PageData, LedgerError> {
        match root {
            Some(r) if !r.is_empty() => self.load_page(r),
            _ => Ok(PageData::empty()),
        }
    }

    fn load_page(&self, value: &[u8]) -> Result<PageData, LedgerError> {
        let id = page_id(value);
        self.store.get(&id).ok_or(LedgerError::PageMissing(id))
    }

    fn update_rec(
        &self,
        page: &mut PageData,
        slot: usize,
        height: u8,
        mut batch: Batch,
    ) -> Result<Option<Vec<u8>>, LedgerError> {
        if height == 0 {
            debug_assert_eq!(batch.len(), 1);
            let (_, value) = batch.swap_remove(0);
            page.set_slot(slot, Some(value.clone()));
            return Ok(Some(value));
        }
        if is_fringe(slot) {
            let mut child = match page.slot(slot) {
                Some(value) => self.load_page(value)?,
                None => PageData::empty(),
            };
            let value = self.update_rec(&mut child, 0, height, batch)?;
            if let Some(v) = &value {
                self.store.set(page_id(v), child);
            }
            page.set_slot(slot, value.clone());
            return Ok(value);
        }

        if node_is_shortcut(page, slot) {
            // the resident entry sinks back into the batch and settles lower
            if let Some((key, value)) = shortcut_kv(page, slot) {
                merge_entry(&mut batch, key, value);
            }
            clear_shortcut(page, slot);
        }

        let (lslot, rslot) = (left_slot(slot), right_slot(slot));
        if page.slot(lslot).is_none() && page.slot(rslot).is_none() && batch.len() == 1 {
            let (key, value) = batch.swap_remove(0);
            return Ok(Some(self.make_shortcut(page, slot, key, value)));
        }

        let pivot = batch.partition_point(|(key, _)| !bit_is_set(key, (TRIE_HEIGHT - height) as usize));
        let right_batch = batch.split_off(pivot);
        let left_batch = batch;
        if !left_batch.is_empty() {
            self.update_rec(page, lslot, height - 1, left_batch)?;
        }
        if !right_batch.is_empty() {
            self.update_rec(page, rslot, height - 1, right_batch)?;
        }

        let value = self.rehash(page, slot, height);
        if slot != 0 {
            page.set_slot(slot, value.clone());
        }
        Ok(value)
    }

    fn delete_rec(
        &self,
        page: &mut PageData,
        slot: usize,
        height: u8,
        key: &Digest,
        current: Option<Vec<u8>>,
    ) -> Result<(Option<Vec<u8>>, Relocation), LedgerError> {
        if height == 0 {
            page.set_slot(slot, None);
            return Ok((None, None));
        }
        if is_fringe(slot) {
            let Some(value) = page.slot(slot).map(<[u8]>::to_vec) else {
                return Ok((None, None));
            };
            let mut child = self.load_page(&value)?;
            let (new_value, relocation) = self.delete_rec(&mut child, 0, height, key, Some(value))?;
            if let Some(v) = &new_value {
                self.store.set(page_id(v), child);
            }
            page.set_slot(slot, new_value.clone());
            return Ok((new_value, relocation));
        }

        if node_is_shortcut(page, slot) {
            if shortcut_kv(page, slot).is_some_and(|(stored, _)| stored == *key) {
                clear_shortcut(page, slot);
                if slot != 0 {
                    page.set_slot(slot, None);
                }
                return Ok((None, None));
            }
            return Ok((current, None));
        }

        let descend_right = bit_is_set(key, (TRIE_HEIGHT - height) as usize);
        let (kslot, aslot) = if descend_right {
            (right_slot(slot), left_slot(slot))
        } else {
            (left_slot(slot), right_slot(slot))
        };

        let mut child_value = None;
        let mut relocation = None;
        if page.slot(kslot).is_some() {
            let current_child = page.slot(kslot).map(<[u8]>::to_vec);
            let (value, relo) = self.delete_rec(page, kslot, height - 1, key, current_child)?;
            child_value = value;
            relocation = relo;
        }

        if let Some((relo_key, relo_value)) = relocation.take() {
            if page.slot(aslot).is_some() {
                // the displaced entry settles beside the live sibling
                child_value = Some(self.install_shortcut(page, kslot, height - 1, relo_key, relo_value));
            } else {
                relocation = Some((relo_key, relo_value));
            }
        }

        if child_value.is_none() && self.sibling_is_shortcut(page, aslot, height - 1)? {
            // the sibling's lone entry must bubble up toward a branching node
            relocation = self.take_shortcut(page, aslot, height - 1)?;
        }

        let new_value = if child_value.is_none() && page.slot(aslot).is_none() {
            None
        } else {
            self.rehash(page, slot, height)
        };
        if slot != 0 {
            page.set_slot(slot, new_value.clone());
        }
        Ok((new_value, relocation))
    }

    fn collect_rec(
        &self,
        cursor: &Cursor,
        path: Digest,
        entries: &mut Vec<(Digest, Vec<u8>)>,
    ) -> Result<(), LedgerError> {
        if cursor.height() == 0 {
            entries.push((path, cursor.value().to_vec()));
            return Ok(());
        }
        if cursor.is_shortcut() {
            if let Some(entry) = cursor.shortcut_entry() {
                entries.push(entry);
            }
            return Ok(());
        }
        if let Some(left) = cursor.child(&self.store, false)? {
            self.collect_rec(&left, path, entries)?;
        }
        if let Some(right) = cursor.child(&self.store, true)? {
            let mut path = path;
            set_bit(&mut path, (TRIE_HEIGHT - cursor.height()) as usize);
            self.collect_rec(&right, path, entries)?;
        }
        Ok(())
    }

    /// Returns the number of pages dropped from the store.
    fn erase_rec(&self, cursor: Cursor, adjacent: Vec<Cursor>) -> usize {
        if adjacent.iter().any(|a| a.value() == cursor.value()) {
            // everything below is shared with a neighboring version
            return 0;
        }
        let mut dropped = 0;
        if cursor.owns_page() {
            self.store.delete(&page_id(cursor.value()));
            dropped += 1;
        }
        if cursor.height() == 0 || cursor.is_shortcut() {
            return dropped;
        }
        for right in [false, true] {
            let Some(child) = cursor.child_lenient(&self.store, right) else {
                continue;
            };
            let adjacent_children: Vec<Cursor> = adjacent
                .iter()
                .filter(|a| a.height() > 0 && !a.is_shortcut())
                .filter_map(|a| a.child_lenient(&self.store, right))
                .collect();
            dropped += self.erase_rec(child, adjacent_children);
        }
        dropped
    }

    /// Turn the node at `slot` into a shortcut carrying `(key, value)` and
    /// return its new node value. Callers guarantee both child slots are
    /// empty. Only valid for slots 0..=14; fringe installs go through
    /// [`Smt::install_shortcut`].
    fn make_shortcut(&self, page: &mut PageData, slot: usize, key: Digest, value: Vec<u8>) -> Vec<u8> {
        let hash = H::hash(&[&key, &value]);
        page.set_slot(left_slot(slot), Some(key.to_vec()));
        page.set_slot(right_slot(slot), Some(value));
        let tagged = tagged_value(hash, true);
        if slot == 0 {
            page.set_shortcut_flag(true);
        } else {
            page.set_slot(slot, Some(tagged.clone()));
        }
        tagged
    }

    /// Install a relocated entry as a shortcut at `slot`, allocating the
    /// child page when `slot` is on the fringe.
    fn install_shortcut(
        &self,
        page: &mut PageData,
        slot: usize,
        height: u8,
        key: Digest,
        value: Vec<u8>,
    ) -> Vec<u8> {
        debug_assert!(height > 0);
        if is_fringe(slot) {
            let mut child = PageData::empty();
            let tagged = self.make_shortcut(&mut child, 0, key, value);
            self.store.set(page_id(&tagged), child);
            page.set_slot(slot, Some(tagged.clone()));
            tagged
        } else {
            self.make_shortcut(page, slot, key, value)
        }
    }

    /// Whether the node in `slot` is a shortcut, resolving fringe slots
    /// through their child page. Height-0 slots hold raw values and are
    /// never shortcuts.
    fn sibling_is_shortcut(&self, page: &PageData, slot: usize, height: u8) -> Result<bool, LedgerError> {
        if height == 0 {
            return Ok(false);
        }
        match page.slot(slot) {
            None => Ok(false),
            Some(value) if is_fringe(slot) => Ok(self.load_page(value)?.shortcut_flag()),
            Some(value) => Ok(is_shortcut_value(value)),
        }
    }

    /// Extract the (key, value) pair of the shortcut in `slot` and clear the
    /// slot. The child page of a fringe shortcut stays in the store; prior
    /// versions still reference it.
    fn take_shortcut(
        &self,
        page: &mut PageData,
        slot: usize,
        height: u8,
    ) -> Result<Relocation, LedgerError> {
        if is_fringe(slot) && height > 0 {
            let entry = match page.slot(slot) {
                Some(value) => shortcut_kv(&self.load_page(value)?, 0),
                None => None,
            };
            page.set_slot(slot, None);
            Ok(entry)
        } else {
            let entry = shortcut_kv(page, slot);
            clear_shortcut(page, slot);
            page.set_slot(slot, None);
            Ok(entry)
        }
    }

    /// Recompute the node value in `slot` from its children, substituting
    /// the default hash for an empty child. `None` when both children are
    /// empty.
    fn rehash(&self, page: &PageData, slot: usize, height: u8) -> Option<Vec<u8>> {
        let left = page.slot(left_slot(slot));
        let right = page.slot(right_slot(slot));
        let below = self.defaults.at(height - 1);
        let hash = match (left, right) {
            (None, None) => return None,
            (Some(left), None) => H::hash(&[digest_part(left), below]),
            (None, Some(right)) => H::hash(&[below, right]),
            (Some(left), Some(right)) => H::hash(&[digest_part(left), right]),
        };
        Some(tagged_value(hash, false))
    }
}

fn node_is_shortcut(page: &PageData, slot: usize) -> bool {
    if slot == 0 {
        page.shortcut_flag()
    } else {
        page.slot(slot).is_some_and(is_shortcut_value)
    }
}

fn shortcut_kv(page: &PageData, slot: usize) -> Option<(Digest, Vec<u8>)> {
    let key = to_digest(page.slot(left_slot(slot))?);
    let value = page.slot(right_slot(slot))?.to_vec();
    Some((key, value))
}

fn clear_shortcut(page: &mut PageData, slot: usize) {
    page.set_slot(left_slot(slot), None);
    page.set_slot(right_slot(slot), None);
    if slot == 0 {
        page.set_shortcut_flag(false);
    }
}

/// Merge a displaced shortcut entry into a sorted batch. If the batch
/// already rewrites the entry's key, the old pair is dropped.
fn merge_entry(batch: &mut Batch, key: Digest, value: Vec<u8>) {
    match batch.binary_search_by(|(k, _)| k.cmp(&key)) {
        Ok(_) => {}
        Err(position) => batch.insert(position, (key, value)),
    }
}
