//! Read-only navigation over the page graph of one trie version.
//!
//! Slots 15..=30 of a page behave differently from slots 0..=14: their
//! children live in the next page down, and their shortcut flag lives in
//! that page's slot 0. The cursor models this as a tagged position: crossing
//! a fringe slot at height > 0 immediately resolves the child page, so a
//! position is either the implicit root of a page it owns, or a plain slot
//! inside one.

use std::sync::Arc;

use verimap_core::page::{is_fringe, left_slot, page_id, right_slot, PageData};
use verimap_core::trie::{is_shortcut_value, to_digest, Digest, TRIE_HEIGHT};

use crate::error::LedgerError;
use crate::store::PageStore;

#[derive(Clone)]
pub(crate) struct Cursor {
    loc: Loc,
    height: u8,
    value: Vec<u8>,
}

#[derive(Clone)]
enum Loc {
    /// The implicit root of `page`: the flag is slot 0, the children are
    /// slots 1 and 2, and the node's own value names the page in the store.
    PageRoot(Arc<PageData>),
    /// A slot inside a page.
    InPage(Arc<PageData>, usize),
}

impl Cursor {
    /// The cursor over the root of the version named by `root`, or
    /// `Ok(None)` for the empty root.
    pub fn at_root(store: &PageStore, root: &[u8]) -> Result<Option<Cursor>, LedgerError> {
        if root.is_empty() {
            return Ok(None);
        }
        let id = page_id(root);
        let page = store.get(&id).ok_or(LedgerError::PageMissing(id))?;
        Ok(Some(Cursor {
            loc: Loc::PageRoot(Arc::new(page)),
            height: TRIE_HEIGHT,
            value: root.to_vec(),
        }))
    }

    /// Like [`Cursor::at_root`], treating a missing page as an absent
    /// version.
    pub fn at_root_lenient(store: &PageStore, root: &[u8]) -> Option<Cursor> {
        if root.is_empty() {
            return None;
        }
        let page = store.get(&page_id(root))?;
        Some(Cursor {
            loc: Loc::PageRoot(Arc::new(page)),
            height: TRIE_HEIGHT,
            value: root.to_vec(),
        })
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Whether this position names a page in the store (and erasing the
    /// position therefore drops a page).
    pub fn owns_page(&self) -> bool {
        matches!(self.loc, Loc::PageRoot(_))
    }

    /// Whether the node is a shortcut. Never true at height 0, where slots
    /// hold raw values.
    pub fn is_shortcut(&self) -> bool {
        if self.height == 0 {
            return false;
        }
        match &self.loc {
            Loc::PageRoot(page) => page.shortcut_flag(),
            Loc::InPage(_, _) => is_shortcut_value(&self.value),
        }
    }

    /// The (key digest, value) pair carried by a shortcut node. The pair
    /// lives in the node's child slots, read raw.
    pub fn shortcut_entry(&self) -> Option<(Digest, Vec<u8>)> {
        let (page, left, right) = self.child_slots();
        let key = to_digest(page.slot(left)?);
        let value = page.slot(right)?.to_vec();
        Some((key, value))
    }

    /// Move to a child. `Ok(None)` for an empty child sub-trie; an error if
    /// the child's page is no longer in the store.
    pub fn child(&self, store: &PageStore, right: bool) -> Result<Option<Cursor>, LedgerError> {
        let (page, left_child, right_child) = self.child_slots();
        let slot = if right { right_child } else { left_child };
        let Some(value) = page.slot(slot) else {
            return Ok(None);
        };
        let height = self.height - 1;
        if is_fringe(slot) && height > 0 {
            let id = page_id(value);
            let child = store.get(&id).ok_or(LedgerError::PageMissing(id))?;
            Ok(Some(Cursor {
                loc: Loc::PageRoot(Arc::new(child)),
                height,
                value: value.to_vec(),
            }))
        } else {
            Ok(Some(Cursor {
                loc: Loc::InPage(page.clone(), slot),
                height,
                value: value.to_vec(),
            }))
        }
    }

    /// Like [`Cursor::child`], treating a missing page as an empty child.
    pub fn child_lenient(&self, store: &PageStore, right: bool) -> Option<Cursor> {
        self.child(store, right).ok().flatten()
    }

    fn child_slots(&self) -> (&Arc<PageData>, usize, usize) {
        match &self.loc {
            Loc::PageRoot(page) => (page, 1, 2),
            Loc::InPage(page, slot) => (page, left_slot(*slot), right_slot(*slot)),
        }
    }
}
