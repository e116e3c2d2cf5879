//! # Tree Cursors
//!
//! A cursor tracks one position inside a B-tree and supports ordered
//! traversal: first/last, next/prev, and key seeks. The position is a stack
//! of `(page, position)` frames from the root down to the current entry.
//!
//! ## Frame Semantics
//!
//! For a leaf frame, `pos` is the current cell. For an internal frame, `pos`
//! is the branch taken downward: branch `i < n_cells` is the child of cell
//! `i`, branch `n_cells` is `right_page`. When `on_internal_entry` is set,
//! the top frame is an internal node and `pos` names the cell that *is* the
//! current entry.
//!
//! ## Table vs. Index Trees
//!
//! Table trees store every entry in a leaf; internal cells only route, so
//! the walk skips them. Index trees store real `(key_idx, key_pk)` entries
//! in internal cells too, and an in-order walk visits each internal cell
//! between its child and its right neighbor. Both shapes are handled by the
//! same climb logic, which consults the node type when it surfaces from a
//! subtree.
//!
//! ## Seeks
//!
//! [`Cursor::seek`] descends by the routing rule (`key <= cell.key` goes
//! left) and then refines at the leaf: exact match, first entry `>= key`, or
//! first entry `> key` depending on [`SeekMode`]. When the leaf holds no
//! qualifying entry the successor is found by the same climb used for
//! [`Cursor::next`].

use smallvec::SmallVec;

use crate::btree::{Btree, Cell, Node};
use crate::errors::{DbError, Result};

#[derive(Debug, Clone, Copy)]
struct Frame {
    page: u32,
    pos: u16,
}

/// How a seek treats the target key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// Position exactly on the key, fail otherwise.
    Exact,
    /// Position on the first entry with key >= target.
    Ge,
    /// Position on the first entry with key > target.
    Gt,
}

/// The entry a cursor is positioned on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Table { key: u32, payload: Vec<u8> },
    Index { key_idx: u32, key_pk: u32 },
}

/// A position within one B-tree, plus the open-time parameters.
#[derive(Debug)]
pub struct Cursor {
    root_page: u32,
    n_cols: usize,
    writable: bool,
    stack: SmallVec<[Frame; 8]>,
    on_internal_entry: bool,
}

impl Cursor {
    pub fn new(root_page: u32, n_cols: usize, writable: bool) -> Self {
        Self {
            root_page,
            n_cols,
            writable,
            stack: SmallVec::new(),
            on_internal_entry: false,
        }
    }

    pub fn root_page(&self) -> u32 {
        self.root_page
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn writable(&self) -> bool {
        self.writable
    }

    pub fn is_valid(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn invalidate(&mut self) {
        self.stack.clear();
        self.on_internal_entry = false;
    }

    /// Positions on the smallest entry. Returns false when the tree is
    /// empty.
    pub fn move_to_first(&mut self, bt: &Btree) -> Result<bool> {
        self.invalidate();
        self.descend_leftmost(bt, self.root_page)
    }

    /// Positions on the largest entry. Returns false when the tree is
    /// empty.
    pub fn move_to_last(&mut self, bt: &Btree) -> Result<bool> {
        self.invalidate();
        self.descend_rightmost(bt, self.root_page)
    }

    /// Advances to the in-order successor. Returns false (and invalidates)
    /// when no entry remains.
    pub fn next(&mut self, bt: &Btree) -> Result<bool> {
        if self.stack.is_empty() {
            return Ok(false);
        }
        if self.on_internal_entry {
            // Successor of an internal entry: leftmost of the branch to its
            // right.
            let top = *self.stack.last().expect("stack checked non-empty");
            let node = bt.get_node_by_page(top.page)?;
            let next_branch = top.pos + 1;
            let child = branch_child(&node, next_branch)?;
            drop(node);
            self.stack.last_mut().expect("non-empty").pos = next_branch;
            self.on_internal_entry = false;
            return self.descend_leftmost(bt, child);
        }

        let top = *self.stack.last().expect("stack checked non-empty");
        let node = bt.get_node_by_page(top.page)?;
        if top.pos + 1 < node.n_cells() {
            self.stack.last_mut().expect("non-empty").pos += 1;
            return Ok(true);
        }
        drop(node);
        self.stack.pop();
        self.climb_forward(bt)
    }

    /// Retreats to the in-order predecessor. Returns false (and
    /// invalidates) when no entry remains.
    pub fn prev(&mut self, bt: &Btree) -> Result<bool> {
        if self.stack.is_empty() {
            return Ok(false);
        }
        if self.on_internal_entry {
            // Predecessor of an internal entry: rightmost of its own branch.
            let top = *self.stack.last().expect("stack checked non-empty");
            let node = bt.get_node_by_page(top.page)?;
            let child = branch_child(&node, top.pos)?;
            drop(node);
            self.on_internal_entry = false;
            return self.descend_rightmost(bt, child);
        }

        let top = *self.stack.last().expect("stack checked non-empty");
        if top.pos > 0 {
            self.stack.last_mut().expect("non-empty").pos -= 1;
            return Ok(true);
        }
        self.stack.pop();
        self.climb_backward(bt)
    }

    /// Positions relative to `key` per the seek mode. Returns false (and
    /// invalidates) on a miss.
    pub fn seek(&mut self, bt: &Btree, key: u32, mode: SeekMode) -> Result<bool> {
        self.invalidate();
        let mut npage = self.root_page;

        loop {
            let node = bt.get_node_by_page(npage)?;

            if node.kind().is_leaf() {
                let n_cells = node.n_cells();
                let mut pos = n_cells;
                for i in 0..n_cells {
                    if node.get_cell(i)?.key() >= key {
                        pos = i;
                        break;
                    }
                }
                if pos < n_cells {
                    let found_key = node.get_cell(pos)?.key();
                    drop(node);
                    self.stack.push(Frame { page: npage, pos });
                    self.on_internal_entry = false;
                    return match mode {
                        SeekMode::Exact => {
                            if found_key == key {
                                Ok(true)
                            } else {
                                self.invalidate();
                                Ok(false)
                            }
                        }
                        SeekMode::Ge => Ok(true),
                        SeekMode::Gt => {
                            if found_key > key {
                                Ok(true)
                            } else {
                                self.advance_or_invalidate(bt)
                            }
                        }
                    };
                }
                drop(node);
                // Nothing in this leaf reaches the key; any successor sits
                // above us. Keys strictly above the routing key cannot be
                // equal, so an exact seek is already a miss.
                let moved = self.climb_forward(bt)?;
                if !moved || mode == SeekMode::Exact {
                    self.invalidate();
                    return Ok(false);
                }
                return Ok(true);
            }

            let n_cells = node.n_cells();
            let mut branch = n_cells;
            for i in 0..n_cells {
                let cell_key = node.get_cell(i)?.key();
                if key <= cell_key {
                    if node.kind().is_index() && cell_key == key {
                        // Index internal cells are entries; this one is the
                        // unique match.
                        drop(node);
                        self.stack.push(Frame { page: npage, pos: i });
                        self.on_internal_entry = true;
                        return match mode {
                            SeekMode::Exact | SeekMode::Ge => Ok(true),
                            SeekMode::Gt => self.advance_or_invalidate(bt),
                        };
                    }
                    branch = i;
                    break;
                }
            }
            let child = branch_child(&node, branch)?;
            drop(node);
            self.stack.push(Frame { page: npage, pos: branch });
            npage = child;
        }
    }

    /// The entry under the cursor.
    pub fn entry(&self, bt: &Btree) -> Result<Entry> {
        let top = self
            .stack
            .last()
            .ok_or(DbError::Misuse("cursor is not positioned on an entry"))?;
        let node = bt.get_node_by_page(top.page)?;
        match node.get_cell(top.pos)? {
            Cell::TableLeaf { key, data } => Ok(Entry::Table { key, payload: data }),
            Cell::IndexLeaf { key_idx, key_pk }
            | Cell::IndexInternal {
                key_idx, key_pk, ..
            } => Ok(Entry::Index { key_idx, key_pk }),
            Cell::TableInternal { .. } => {
                Err(DbError::Misuse("cursor is not positioned on an entry"))
            }
        }
    }

    /// The ordering key of the current entry.
    pub fn current_key(&self, bt: &Btree) -> Result<u32> {
        Ok(match self.entry(bt)? {
            Entry::Table { key, .. } => key,
            Entry::Index { key_idx, .. } => key_idx,
        })
    }

    fn advance_or_invalidate(&mut self, bt: &Btree) -> Result<bool> {
        let moved = self.next(bt)?;
        if !moved {
            self.invalidate();
        }
        Ok(moved)
    }

    fn descend_leftmost(&mut self, bt: &Btree, mut npage: u32) -> Result<bool> {
        loop {
            let node = bt.get_node_by_page(npage)?;
            if node.kind().is_leaf() {
                if node.n_cells() == 0 {
                    if self.stack.is_empty() {
                        return Ok(false);
                    }
                    return Err(DbError::CorruptHeader("empty non-root node"));
                }
                self.stack.push(Frame { page: npage, pos: 0 });
                self.on_internal_entry = false;
                return Ok(true);
            }
            let child = branch_child(&node, 0)?;
            drop(node);
            self.stack.push(Frame { page: npage, pos: 0 });
            npage = child;
        }
    }

    fn descend_rightmost(&mut self, bt: &Btree, mut npage: u32) -> Result<bool> {
        loop {
            let node = bt.get_node_by_page(npage)?;
            if node.kind().is_leaf() {
                if node.n_cells() == 0 {
                    if self.stack.is_empty() {
                        return Ok(false);
                    }
                    return Err(DbError::CorruptHeader("empty non-root node"));
                }
                let pos = node.n_cells() - 1;
                self.stack.push(Frame { page: npage, pos });
                self.on_internal_entry = false;
                return Ok(true);
            }
            let branch = node.n_cells();
            let child = node.right_page();
            drop(node);
            self.stack.push(Frame { page: npage, pos: branch });
            npage = child;
        }
    }

    /// Surfaces from an exhausted subtree and lands on the next in-order
    /// entry, descending into the following branch for table trees or
    /// stopping on the internal cell itself for index trees.
    fn climb_forward(&mut self, bt: &Btree) -> Result<bool> {
        while let Some(top) = self.stack.last().copied() {
            let node = bt.get_node_by_page(top.page)?;
            if top.pos < node.n_cells() {
                if node.kind().is_index() {
                    self.on_internal_entry = true;
                    return Ok(true);
                }
                let next_branch = top.pos + 1;
                let child = branch_child(&node, next_branch)?;
                drop(node);
                self.stack.last_mut().expect("non-empty").pos = next_branch;
                return self.descend_leftmost(bt, child);
            }
            drop(node);
            self.stack.pop();
        }
        self.on_internal_entry = false;
        Ok(false)
    }

    fn climb_backward(&mut self, bt: &Btree) -> Result<bool> {
        while let Some(top) = self.stack.last().copied() {
            if top.pos > 0 {
                let node = bt.get_node_by_page(top.page)?;
                if node.kind().is_index() {
                    self.stack.last_mut().expect("non-empty").pos = top.pos - 1;
                    self.on_internal_entry = true;
                    return Ok(true);
                }
                let prev_branch = top.pos - 1;
                let child = branch_child(&node, prev_branch)?;
                drop(node);
                self.stack.last_mut().expect("non-empty").pos = prev_branch;
                return self.descend_rightmost(bt, child);
            }
            self.stack.pop();
        }
        self.on_internal_entry = false;
        Ok(false)
    }
}

fn branch_child(node: &Node, branch: u16) -> Result<u32> {
    if branch < node.n_cells() {
        node.get_cell(branch)?
            .child_page()
            .ok_or(DbError::CorruptHeader("leaf cell in internal node"))
    } else {
        Ok(node.right_page())
    }
}
