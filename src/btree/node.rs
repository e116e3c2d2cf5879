//! # Node Layout
//!
//! A node is one B-tree vertex stored in exactly one page. Four variants
//! share a common header; internal variants append a right-child pointer.
//!
//! ## Page Layout
//!
//! ```text
//! +------------------------+
//! | file header (page 1)   |  100 bytes, page 1 only
//! +------------------------+
//! | node header            |  8 bytes (+4 right_page on internal nodes)
//! +------------------------+
//! | cell offset array      |  n_cells big-endian u16 entries
//! +------------------------+
//! | free space             |  [free_offset, cells_offset)
//! +------------------------+
//! | cells                  |  grow downward from the page end
//! +------------------------+
//! ```
//!
//! ## Node Header (8 bytes)
//!
//! ```text
//! Offset  Size  Field         Description
//! ------  ----  ------------  -----------------------------------------
//! 0       1     type          0x05/0x0D table, 0x02/0x0A index
//! 1       2     free_offset   first free byte after the offset array
//! 3       2     n_cells       number of cells stored
//! 5       2     cells_offset  lowest byte occupied by a cell
//! 7       1     padding       0
//! 8       4     right_page    internal nodes only
//! ```
//!
//! All offsets are page-relative, including on page 1 where the node region
//! itself starts at byte 100.
//!
//! ## Ownership
//!
//! A [`Node`] owns the [`MemPage`] it was parsed from; dropping the node
//! releases the page. The header fields are parsed into plain integers and
//! written back by [`Node::write_header`]; cells and the offset array are
//! mutated directly on the page buffer.

use zerocopy::big_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::errors::{DbError, Result};
use crate::storage::{MemPage, FILE_HEADER_SIZE};

use super::cell::Cell;

/// Fixed part of the node header; internal nodes add a 4-byte right pointer.
pub const NODE_HEADER_SIZE: usize = 8;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    IndexInternal = 0x02,
    TableInternal = 0x05,
    IndexLeaf = 0x0A,
    TableLeaf = 0x0D,
}

impl NodeType {
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0x02 => Ok(NodeType::IndexInternal),
            0x05 => Ok(NodeType::TableInternal),
            0x0A => Ok(NodeType::IndexLeaf),
            0x0D => Ok(NodeType::TableLeaf),
            _ => Err(DbError::CorruptHeader("unknown node type byte")),
        }
    }

    pub fn is_leaf(self) -> bool {
        matches!(self, NodeType::TableLeaf | NodeType::IndexLeaf)
    }

    pub fn is_internal(self) -> bool {
        !self.is_leaf()
    }

    pub fn is_table(self) -> bool {
        matches!(self, NodeType::TableInternal | NodeType::TableLeaf)
    }

    pub fn is_index(self) -> bool {
        !self.is_table()
    }

    /// The internal node type of the same family. Root splits re-initialize
    /// the root with this type.
    pub fn internal_variant(self) -> Self {
        if self.is_table() {
            NodeType::TableInternal
        } else {
            NodeType::IndexInternal
        }
    }

    /// Header bytes consumed before the cell offset array begins.
    pub fn header_size(self) -> usize {
        if self.is_internal() {
            NODE_HEADER_SIZE + 4
        } else {
            NODE_HEADER_SIZE
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct NodeHeader {
    page_type: u8,
    free_offset: U16,
    n_cells: U16,
    cells_offset: U16,
    padding: u8,
}

const _: () = assert!(std::mem::size_of::<NodeHeader>() == NODE_HEADER_SIZE);

/// A parsed view over one node. Owns the underlying page.
#[derive(Debug)]
pub struct Node {
    page: MemPage,
    kind: NodeType,
    free_offset: u16,
    n_cells: u16,
    cells_offset: u16,
    right_page: u32,
}

impl Node {
    /// Parses the node header out of a page buffer.
    pub(crate) fn parse(page: MemPage) -> Result<Node> {
        let base = header_offset_for(page.npage());
        let data = page.data();
        if data.len() < base + NODE_HEADER_SIZE + 4 {
            return Err(DbError::CorruptHeader("page too small for a node"));
        }

        let header = NodeHeader::ref_from_bytes(&data[base..base + NODE_HEADER_SIZE])
            .map_err(|_| DbError::CorruptHeader("unreadable node header"))?;
        let kind = NodeType::from_byte(header.page_type)?;
        let right_page = if kind.is_internal() {
            u32::from_be_bytes(data[base + 8..base + 12].try_into().expect("4 bytes"))
        } else {
            0
        };

        let node = Node {
            kind,
            free_offset: header.free_offset.get(),
            n_cells: header.n_cells.get(),
            cells_offset: header.cells_offset.get(),
            right_page,
            page,
        };
        node.validate()?;
        Ok(node)
    }

    /// Stamps an empty node of the given type into a page and returns the
    /// parsed view. Existing cell bytes beyond the header are left in place;
    /// they are unreachable once the offsets are reset.
    pub(crate) fn format(page: MemPage, kind: NodeType) -> Node {
        let base = header_offset_for(page.npage());
        let page_len = page.data().len();
        let mut node = Node {
            kind,
            free_offset: (base + kind.header_size()) as u16,
            n_cells: 0,
            cells_offset: page_len as u16,
            right_page: 0,
            page,
        };
        node.write_header();
        node
    }

    pub fn npage(&self) -> u32 {
        self.page.npage()
    }

    pub fn kind(&self) -> NodeType {
        self.kind
    }

    pub fn n_cells(&self) -> u16 {
        self.n_cells
    }

    pub fn free_offset(&self) -> u16 {
        self.free_offset
    }

    pub fn cells_offset(&self) -> u16 {
        self.cells_offset
    }

    pub fn right_page(&self) -> u32 {
        self.right_page
    }

    pub fn set_right_page(&mut self, npage: u32) {
        debug_assert!(self.kind.is_internal());
        self.right_page = npage;
    }

    pub(crate) fn page(&self) -> &MemPage {
        &self.page
    }

    fn header_offset(&self) -> usize {
        header_offset_for(self.page.npage())
    }

    fn header_end(&self) -> usize {
        self.header_offset() + self.kind.header_size()
    }

    fn offset_array_pos(&self, ncell: u16) -> usize {
        self.header_end() + 2 * ncell as usize
    }

    /// Byte offset of cell `ncell` within the page.
    pub fn cell_offset(&self, ncell: u16) -> Result<u16> {
        if ncell >= self.n_cells {
            return Err(DbError::CellOutOfBounds {
                ncell,
                n_cells: self.n_cells,
            });
        }
        let pos = self.offset_array_pos(ncell);
        let bytes = &self.page.data()[pos..pos + 2];
        Ok(u16::from_be_bytes(bytes.try_into().expect("2 bytes")))
    }

    /// Parses cell `ncell` out of the page.
    pub fn get_cell(&self, ncell: u16) -> Result<Cell> {
        let offset = self.cell_offset(ncell)? as usize;
        if offset >= self.page.data().len() {
            return Err(DbError::CorruptHeader("cell offset beyond page end"));
        }
        Cell::parse(self.kind, &self.page.data()[offset..])
    }

    /// True when the free region can absorb the cell plus its offset entry.
    pub fn has_room(&self, cell: &Cell) -> bool {
        (self.cells_offset as usize).saturating_sub(self.free_offset as usize) >= cell.size() + 2
    }

    /// Inserts a cell at position `ncell`, shifting later offset-array
    /// entries right. The caller must have verified space with
    /// [`has_room`](Node::has_room).
    pub fn insert_cell(&mut self, ncell: u16, cell: &Cell) -> Result<()> {
        if cell.node_type() != self.kind {
            return Err(DbError::Misuse("cell variant does not match node type"));
        }
        if ncell > self.n_cells {
            return Err(DbError::CellOutOfBounds {
                ncell,
                n_cells: self.n_cells,
            });
        }
        debug_assert!(self.has_room(cell), "insert_cell without a space check");

        let size = cell.size();
        let new_cells_offset = self.cells_offset as usize - size;
        cell.write(&mut self.page.data_mut()[new_cells_offset..new_cells_offset + size]);

        let start = self.offset_array_pos(ncell);
        let end = self.offset_array_pos(self.n_cells);
        self.page.data_mut().copy_within(start..end, start + 2);
        self.page.data_mut()[start..start + 2]
            .copy_from_slice(&(new_cells_offset as u16).to_be_bytes());

        self.cells_offset = new_cells_offset as u16;
        self.n_cells += 1;
        self.free_offset += 2;
        Ok(())
    }

    /// Serializes the parsed header fields back into the page buffer. Cells
    /// and the offset array are already mutated in place.
    pub(crate) fn write_header(&mut self) {
        let base = self.header_offset();
        let header = NodeHeader {
            page_type: self.kind as u8,
            free_offset: U16::new(self.free_offset),
            n_cells: U16::new(self.n_cells),
            cells_offset: U16::new(self.cells_offset),
            padding: 0,
        };
        self.page.data_mut()[base..base + NODE_HEADER_SIZE].copy_from_slice(header.as_bytes());
        if self.kind.is_internal() {
            self.page.data_mut()[base + 8..base + 12]
                .copy_from_slice(&self.right_page.to_be_bytes());
        }
    }

    fn validate(&self) -> Result<()> {
        let header_end = self.header_end();
        let free_offset = self.free_offset as usize;
        let cells_offset = self.cells_offset as usize;

        if free_offset < header_end || free_offset > cells_offset {
            return Err(DbError::CorruptHeader("node offsets out of order"));
        }
        if cells_offset > self.page.data().len() {
            return Err(DbError::CorruptHeader("cells offset beyond page end"));
        }
        if free_offset != header_end + 2 * self.n_cells as usize {
            return Err(DbError::CorruptHeader(
                "free offset disagrees with cell count",
            ));
        }
        Ok(())
    }
}

fn header_offset_for(npage: u32) -> usize {
    if npage == 1 {
        FILE_HEADER_SIZE
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::Btree;
    use tempfile::tempdir;

    fn scratch_tree(name: &str) -> (tempfile::TempDir, Btree) {
        let dir = tempdir().unwrap();
        let bt = Btree::open(dir.path().join(name)).unwrap();
        (dir, bt)
    }

    #[test]
    fn node_type_from_byte() {
        assert_eq!(NodeType::from_byte(0x05).unwrap(), NodeType::TableInternal);
        assert_eq!(NodeType::from_byte(0x0D).unwrap(), NodeType::TableLeaf);
        assert_eq!(NodeType::from_byte(0x02).unwrap(), NodeType::IndexInternal);
        assert_eq!(NodeType::from_byte(0x0A).unwrap(), NodeType::IndexLeaf);
        assert!(NodeType::from_byte(0x00).is_err());
        assert!(NodeType::from_byte(0xFF).is_err());
    }

    #[test]
    fn header_sizes_per_variant() {
        assert_eq!(NodeType::TableInternal.header_size(), 12);
        assert_eq!(NodeType::IndexInternal.header_size(), 12);
        assert_eq!(NodeType::TableLeaf.header_size(), 8);
        assert_eq!(NodeType::IndexLeaf.header_size(), 8);
    }

    #[test]
    fn fresh_root_parses_as_empty_table_leaf() {
        let (_dir, bt) = scratch_tree("node.db");
        let node = bt.get_node_by_page(1).unwrap();

        assert_eq!(node.kind(), NodeType::TableLeaf);
        assert_eq!(node.n_cells(), 0);
        assert_eq!(node.free_offset(), 108);
        assert_eq!(node.cells_offset(), 1024);
    }

    #[test]
    fn insert_cell_maintains_offsets() {
        let (_dir, mut bt) = scratch_tree("cells.db");
        let npage = bt.new_node(NodeType::TableLeaf).unwrap();
        let mut node = bt.get_node_by_page(npage).unwrap();

        let first = Cell::TableLeaf {
            key: 10,
            data: vec![0xAA; 4],
        };
        let second = Cell::TableLeaf {
            key: 5,
            data: vec![0xBB; 4],
        };
        node.insert_cell(0, &first).unwrap();
        node.insert_cell(0, &second).unwrap();

        assert_eq!(node.n_cells(), 2);
        assert_eq!(node.free_offset(), 8 + 4);
        assert_eq!(node.cells_offset(), 1024 - 24);

        assert_eq!(node.get_cell(0).unwrap(), second);
        assert_eq!(node.get_cell(1).unwrap(), first);
    }

    #[test]
    fn insert_cell_survives_write_and_reload() {
        let (_dir, mut bt) = scratch_tree("reload.db");
        let npage = bt.new_node(NodeType::IndexLeaf).unwrap();
        let mut node = bt.get_node_by_page(npage).unwrap();

        for (i, key_idx) in [4u32, 8, 15].iter().enumerate() {
            let cell = Cell::IndexLeaf {
                key_idx: *key_idx,
                key_pk: key_idx * 100,
            };
            node.insert_cell(i as u16, &cell).unwrap();
        }
        bt.write_node(&mut node).unwrap();
        drop(node);

        let node = bt.get_node_by_page(npage).unwrap();
        assert_eq!(node.n_cells(), 3);
        assert_eq!(
            node.get_cell(1).unwrap(),
            Cell::IndexLeaf {
                key_idx: 8,
                key_pk: 800
            }
        );
    }

    #[test]
    fn get_cell_out_of_bounds() {
        let (_dir, bt) = scratch_tree("bounds.db");
        let node = bt.get_node_by_page(1).unwrap();

        assert!(matches!(
            node.get_cell(0),
            Err(DbError::CellOutOfBounds { ncell: 0, .. })
        ));
    }

    #[test]
    fn insert_cell_rejects_wrong_variant() {
        let (_dir, mut bt) = scratch_tree("variant.db");
        let npage = bt.new_node(NodeType::TableLeaf).unwrap();
        let mut node = bt.get_node_by_page(npage).unwrap();

        let cell = Cell::IndexLeaf {
            key_idx: 1,
            key_pk: 2,
        };
        assert!(matches!(
            node.insert_cell(0, &cell),
            Err(DbError::Misuse(_))
        ));
    }

    #[test]
    fn parse_rejects_corrupt_offsets() {
        let (_dir, mut bt) = scratch_tree("corrupt.db");
        let npage = bt.new_node(NodeType::TableLeaf).unwrap();

        let mut node = bt.get_node_by_page(npage).unwrap();
        node.free_offset = 700;
        node.cells_offset = 600;
        bt.write_node(&mut node).unwrap();
        drop(node);

        assert!(matches!(
            bt.get_node_by_page(npage),
            Err(DbError::CorruptHeader(_))
        ));
    }
}
