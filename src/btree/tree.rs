//! # B-Tree Operations
//!
//! Opening a database file, node lifecycle, lookup, and insertion with node
//! splitting. The algorithms are classical B-tree descent with one twist:
//! the root page number is part of a tree's identity, so a full root is
//! never replaced: its contents are evacuated into a new child and the root
//! is rebuilt in place as an internal node over that child.
//!
//! ## Insert Shape
//!
//! ```text
//! insert(root, cell)
//!   root full?  -> evacuate root into new child C
//!                  reinit root as internal, right_page = C
//!                  split(root, C, 0)
//!   insert_non_full(root, cell)
//!
//! insert_non_full(page, cell)
//!   leaf     -> place cell at its sorted position (duplicate keys rejected)
//!   internal -> pick descent child; if full, split it first and re-aim
//!               at whichever side of the promoted median owns the key
//! ```
//!
//! A split never cascades upward: any node that could receive a promoted
//! cell was itself split on the way down if it was full.
//!
//! ## Node Release Discipline
//!
//! Every node acquired through [`Btree::get_node_by_page`] owns its page
//! and releases it on drop, so each descent step holds at most one node
//! while deciding where to go and none while recursing.

use std::path::Path;

use crate::errors::{DbError, Result};
use crate::storage::{FileHeader, Pager, DEFAULT_PAGE_SIZE, FILE_HEADER_SIZE};

use super::cell::Cell;
use super::node::{Node, NodeType};

/// A file of B-trees. Owns the pager; trees are addressed by root page.
#[derive(Debug)]
pub struct Btree {
    pager: Pager,
}

impl Btree {
    /// Opens a database file, creating and initializing it when empty.
    ///
    /// A fresh file gets the default page size and an empty table-leaf root
    /// on page 1. An existing file must carry a valid header, whose stored
    /// page size is adopted.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let pager = Pager::open(path)?;
        let mut bt = Btree { pager };

        if bt.pager.is_empty() {
            bt.pager.set_page_size(DEFAULT_PAGE_SIZE)?;
            let npage = bt.new_node(NodeType::TableLeaf)?;
            debug_assert_eq!(npage, 1);
        } else {
            let mut raw = [0u8; FILE_HEADER_SIZE];
            bt.pager.read_header(&mut raw)?;
            let header = FileHeader::from_bytes(&raw)?;
            header.validate()?;
            bt.pager.set_page_size(header.page_size() as u32)?;
        }

        Ok(bt)
    }

    /// Flushes and releases the underlying file.
    pub fn close(self) -> Result<()> {
        self.pager.close()
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    /// Allocates a fresh page and initializes it as an empty node.
    pub fn new_node(&mut self, kind: NodeType) -> Result<u32> {
        let npage = self.pager.allocate_page()?;
        self.init_empty_node(npage, kind)?;
        Ok(npage)
    }

    /// Initializes an already-allocated page as an empty node. On page 1 the
    /// file header is written first.
    pub fn init_empty_node(&mut self, npage: u32, kind: NodeType) -> Result<()> {
        let mut page = self.pager.read_page(npage)?;
        if npage == 1 {
            FileHeader::new(self.pager.page_size() as u16).write_to(page.data_mut());
        }
        let mut node = Node::format(page, kind);
        self.write_node(&mut node)
    }

    /// Loads the node stored on page `npage`.
    pub fn get_node_by_page(&self, npage: u32) -> Result<Node> {
        let page = self.pager.read_page(npage)?;
        Node::parse(page)
    }

    /// Persists a node: header fields are serialized into the page buffer
    /// (cells were mutated there directly) and the page is written back.
    pub fn write_node(&mut self, node: &mut Node) -> Result<()> {
        node.write_header();
        self.pager.write_page(node.page())
    }

    /// Finds the payload stored under `key` in the table B-tree rooted at
    /// `nroot`.
    pub fn find(&self, nroot: u32, key: u32) -> Result<Vec<u8>> {
        let node = self.get_node_by_page(nroot)?;
        match node.kind() {
            NodeType::TableLeaf => {
                for i in 0..node.n_cells() {
                    let cell = node.get_cell(i)?;
                    let cell_key = cell.key();
                    if cell_key == key {
                        match cell {
                            Cell::TableLeaf { data, .. } => return Ok(data),
                            _ => unreachable!("table leaf holds table-leaf cells"),
                        }
                    }
                    if key < cell_key {
                        return Err(DbError::NotFound);
                    }
                }
                Err(DbError::NotFound)
            }
            NodeType::TableInternal => {
                for i in 0..node.n_cells() {
                    let cell = node.get_cell(i)?;
                    if key <= cell.key() {
                        let child = cell
                            .child_page()
                            .ok_or(DbError::CorruptHeader("leaf cell in internal node"))?;
                        drop(node);
                        return self.find(child, key);
                    }
                }
                let right = node.right_page();
                drop(node);
                self.find(right, key)
            }
            _ => Err(DbError::Misuse("find requires a table b-tree")),
        }
    }

    /// Inserts a `(key, payload)` entry into the table B-tree at `nroot`.
    pub fn insert_in_table(&mut self, nroot: u32, key: u32, data: &[u8]) -> Result<()> {
        self.insert(
            nroot,
            Cell::TableLeaf {
                key,
                data: data.to_vec(),
            },
        )
    }

    /// Inserts a `(key_idx, key_pk)` entry into the index B-tree at `nroot`.
    pub fn insert_in_index(&mut self, nroot: u32, key_idx: u32, key_pk: u32) -> Result<()> {
        self.insert(nroot, Cell::IndexLeaf { key_idx, key_pk })
    }

    /// Inserts a leaf cell into the tree rooted at `nroot`, splitting the
    /// root first when it has no room. The root's page number is preserved.
    ///
    /// Duplicates are decided on the cell key alone: a table key or an index
    /// `key_idx` that is already present yields [`DbError::Duplicate`].
    pub fn insert(&mut self, nroot: u32, cell: Cell) -> Result<()> {
        let root = self.get_node_by_page(nroot)?;
        if root.has_room(&cell) {
            drop(root);
            return self.insert_non_full(nroot, cell);
        }

        // Evacuate the root into a fresh child so nroot keeps identifying
        // this tree, then split that child.
        let root_kind = root.kind();
        let n_cells = root.n_cells();

        let npage_child = self.new_node(root_kind)?;
        let mut child = self.get_node_by_page(npage_child)?;
        for i in 0..n_cells {
            let c = root.get_cell(i)?;
            child.insert_cell(i, &c)?;
        }
        if root_kind.is_internal() {
            child.set_right_page(root.right_page());
        }
        self.write_node(&mut child)?;
        drop(child);
        drop(root);

        self.init_empty_node(nroot, root_kind.internal_variant())?;
        let mut root = self.get_node_by_page(nroot)?;
        root.set_right_page(npage_child);
        self.write_node(&mut root)?;
        drop(root);

        self.split(nroot, npage_child, 0)?;
        self.insert_non_full(nroot, cell)
    }

    /// Inserts into a node known to have room, recursing through internal
    /// nodes and splitting any full child before descending into it.
    fn insert_non_full(&mut self, npage: u32, cell: Cell) -> Result<()> {
        let mut node = self.get_node_by_page(npage)?;

        if node.kind().is_leaf() {
            if node.kind() != cell.node_type() {
                return Err(DbError::Misuse("cell variant does not match the tree"));
            }
            let mut pos = node.n_cells();
            for i in 0..node.n_cells() {
                let existing = node.get_cell(i)?;
                if existing.key() == cell.key() {
                    return Err(DbError::Duplicate);
                }
                if existing.key() > cell.key() {
                    pos = i;
                    break;
                }
            }
            node.insert_cell(pos, &cell)?;
            return self.write_node(&mut node);
        }

        // Internal node: pick the descent slot. Index internal cells are
        // entries in their own right, so an equal key is a duplicate here.
        let mut parent_ncell = node.n_cells();
        let mut child_page = node.right_page();
        for i in 0..node.n_cells() {
            let existing = node.get_cell(i)?;
            if node.kind().is_index() && existing.key() == cell.key() {
                return Err(DbError::Duplicate);
            }
            if cell.key() <= existing.key() {
                parent_ncell = i;
                child_page = existing
                    .child_page()
                    .ok_or(DbError::CorruptHeader("leaf cell in internal node"))?;
                break;
            }
        }
        drop(node);

        let child = self.get_node_by_page(child_page)?;
        let child_full = !child.has_room(&cell);
        drop(child);

        let target = if child_full {
            let (npage_lower, median_key) = self.split(npage, child_page, parent_ncell)?;
            // The median was promoted into this node after the duplicate
            // scan above; an equal index key must be caught here.
            if cell.node_type().is_index() && cell.key() == median_key {
                return Err(DbError::Duplicate);
            }
            if cell.key() <= median_key {
                npage_lower
            } else {
                child_page
            }
        } else {
            child_page
        };

        self.insert_non_full(target, cell)
    }

    /// Splits the child at `npage_child`, inserting the promoted median into
    /// the parent at `parent_ncell`. Returns the new lower sibling's page
    /// and the median key.
    ///
    /// Cells below the median move to the new sibling; the median itself is
    /// promoted, except in table leaves where it also stays in the sibling
    /// so its payload remains reachable from a leaf.
    fn split(
        &mut self,
        npage_parent: u32,
        npage_child: u32,
        parent_ncell: u16,
    ) -> Result<(u32, u32)> {
        let child = self.get_node_by_page(npage_child)?;
        let kind = child.kind();
        let n_cells = child.n_cells();
        let median_ncell = n_cells / 2;
        let median = child.get_cell(median_ncell)?;
        let median_key = median.key();

        let lower_end = if kind == NodeType::TableLeaf {
            median_ncell + 1
        } else {
            median_ncell
        };
        let mut lower_cells = Vec::with_capacity(lower_end as usize);
        for i in 0..lower_end {
            lower_cells.push(child.get_cell(i)?);
        }
        let mut upper_cells = Vec::with_capacity((n_cells - median_ncell) as usize);
        for i in median_ncell + 1..n_cells {
            upper_cells.push(child.get_cell(i)?);
        }
        let child_right = child.right_page();
        drop(child);

        let npage_lower = self.new_node(kind)?;
        let mut lower = self.get_node_by_page(npage_lower)?;
        for (i, c) in lower_cells.iter().enumerate() {
            lower.insert_cell(i as u16, c)?;
        }
        if kind.is_internal() {
            let median_child = median
                .child_page()
                .ok_or(DbError::CorruptHeader("leaf cell in internal node"))?;
            lower.set_right_page(median_child);
        }
        self.write_node(&mut lower)?;
        drop(lower);

        // Compact the child: rebuild it from scratch with the upper cells.
        self.init_empty_node(npage_child, kind)?;
        let mut upper = self.get_node_by_page(npage_child)?;
        for (i, c) in upper_cells.iter().enumerate() {
            upper.insert_cell(i as u16, c)?;
        }
        if kind.is_internal() {
            upper.set_right_page(child_right);
        }
        self.write_node(&mut upper)?;
        drop(upper);

        let promoted = match &median {
            Cell::TableLeaf { key, .. } | Cell::TableInternal { key, .. } => Cell::TableInternal {
                child_page: npage_lower,
                key: *key,
            },
            Cell::IndexLeaf { key_idx, key_pk }
            | Cell::IndexInternal {
                key_idx, key_pk, ..
            } => Cell::IndexInternal {
                child_page: npage_lower,
                key_idx: *key_idx,
                key_pk: *key_pk,
            },
        };
        let mut parent = self.get_node_by_page(npage_parent)?;
        parent.insert_cell(parent_ncell, &promoted)?;
        self.write_node(&mut parent)?;

        Ok((npage_lower, median_key))
    }
}
