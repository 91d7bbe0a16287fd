//! The history index: an append-only list of every emitted root hash.
//!
//! Cells form a doubly linked list in emission order, slab-backed so that a
//! cell anywhere in the list can be detached in constant time when its
//! version is erased. A multimap from the encoded root to every cell holding
//! it serves two needs: erase-by-hash, and the adjacency query that tells
//! the trie which neighboring versions to preserve. The same hash may recur
//! when a sequence of mutations returns the map to an earlier state, so a
//! hash maps to a list of cells, not one.

use fxhash::FxHashMap;
use slab::Slab;

/// The slab key of a history cell.
pub(crate) type CellId = usize;

struct Cell {
    root: Vec<u8>,
    prev: Option<CellId>,
    next: Option<CellId>,
}

pub(crate) struct History {
    cells: Slab<Cell>,
    tail: Option<CellId>,
    index: FxHashMap<String, Vec<CellId>>,
}

impl History {
    pub fn new() -> Self {
        History {
            cells: Slab::new(),
            tail: None,
            index: FxHashMap::default(),
        }
    }

    /// Append an emitted root, indexed under its encoded form. Always
    /// appends, even when the hash has been seen before.
    pub fn append(&mut self, root: &[u8], encoded: &str) -> CellId {
        let cell = self.cells.insert(Cell {
            root: root.to_vec(),
            prev: self.tail,
            next: None,
        });
        if let Some(tail) = self.tail {
            self.cells[tail].next = Some(cell);
        }
        self.tail = Some(cell);
        self.index.entry(encoded.to_string()).or_default().push(cell);
        cell
    }

    /// Every cell currently holding the encoded root. Empty when the hash
    /// was never emitted or all its cells were removed.
    pub fn occurrences(&self, encoded: &str) -> Vec<CellId> {
        self.index.get(encoded).cloned().unwrap_or_default()
    }

    /// The raw root bytes held by a cell.
    pub fn root(&self, cell: CellId) -> &[u8] {
        &self.cells[cell].root
    }

    /// The roots held by the cells adjacent to `cell`. A missing side is the
    /// empty-trie root.
    pub fn neighbors(&self, cell: CellId) -> (Vec<u8>, Vec<u8>) {
        let c = &self.cells[cell];
        let prev = c.prev.map(|p| self.cells[p].root.clone()).unwrap_or_default();
        let next = c.next.map(|n| self.cells[n].root.clone()).unwrap_or_default();
        (prev, next)
    }

    /// Detach a cell from the list and from the index entry of `encoded`.
    /// Drops the index key once its last cell is gone.
    pub fn remove(&mut self, cell: CellId, encoded: &str) {
        let Cell { prev, next, .. } = self.cells.remove(cell);
        if let Some(p) = prev {
            self.cells[p].next = next;
        }
        match next {
            Some(n) => self.cells[n].prev = prev,
            None => self.tail = prev,
        }
        if let Some(cells) = self.index.get_mut(encoded) {
            cells.retain(|&c| c != cell);
            if cells.is_empty() {
                self.index.remove(encoded);
            }
        }
    }
}
