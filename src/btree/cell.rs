//! # Cell Codec
//!
//! A cell is one keyed entry inside a node. There are four on-disk shapes,
//! one per node type, sharing a u32 key:
//!
//! ```text
//! table internal:  child_page u32 | key varint32
//! table leaf:      data_size varint32 | key varint32 | payload[data_size]
//! index internal:  child_page u32 | 0B 03 04 04 | key_idx u32 | key_pk u32
//! index leaf:      0B 03 04 04 | key_idx u32 | key_pk u32
//! ```
//!
//! Varints occupy fixed 4-byte slots (see `encoding::varint`), so every cell
//! except the table leaf has a fixed size. Parsed cells own their payload
//! bytes; they are copied out of the page so the node can be released while
//! the cell travels through a split or an insert.

use crate::encoding::varint::{get_varint32, put_varint32};
use crate::errors::{DbError, Result};

use super::node::NodeType;

/// Literal marker that opens every index cell's key area.
pub const INDEX_CELL_MAGIC: [u8; 4] = [0x0B, 0x03, 0x04, 0x04];

pub const TABLE_INTERNAL_CELL_SIZE: usize = 8;
pub const TABLE_LEAF_CELL_HEADER_SIZE: usize = 8;
pub const INDEX_INTERNAL_CELL_SIZE: usize = 16;
pub const INDEX_LEAF_CELL_SIZE: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    TableInternal {
        child_page: u32,
        key: u32,
    },
    TableLeaf {
        key: u32,
        data: Vec<u8>,
    },
    IndexInternal {
        child_page: u32,
        key_idx: u32,
        key_pk: u32,
    },
    IndexLeaf {
        key_idx: u32,
        key_pk: u32,
    },
}

impl Cell {
    /// The ordering key: the table key or the indexed column value.
    pub fn key(&self) -> u32 {
        match self {
            Cell::TableInternal { key, .. } | Cell::TableLeaf { key, .. } => *key,
            Cell::IndexInternal { key_idx, .. } | Cell::IndexLeaf { key_idx, .. } => *key_idx,
        }
    }

    /// The child pointer, for the two internal shapes.
    pub fn child_page(&self) -> Option<u32> {
        match self {
            Cell::TableInternal { child_page, .. } | Cell::IndexInternal { child_page, .. } => {
                Some(*child_page)
            }
            _ => None,
        }
    }

    /// The node type this cell shape belongs to.
    pub fn node_type(&self) -> NodeType {
        match self {
            Cell::TableInternal { .. } => NodeType::TableInternal,
            Cell::TableLeaf { .. } => NodeType::TableLeaf,
            Cell::IndexInternal { .. } => NodeType::IndexInternal,
            Cell::IndexLeaf { .. } => NodeType::IndexLeaf,
        }
    }

    /// Encoded size in bytes, excluding the 2-byte offset-array entry.
    pub fn size(&self) -> usize {
        match self {
            Cell::TableInternal { .. } => TABLE_INTERNAL_CELL_SIZE,
            Cell::TableLeaf { data, .. } => TABLE_LEAF_CELL_HEADER_SIZE + data.len(),
            Cell::IndexInternal { .. } => INDEX_INTERNAL_CELL_SIZE,
            Cell::IndexLeaf { .. } => INDEX_LEAF_CELL_SIZE,
        }
    }

    /// Parses a cell of the given node type from the start of `data`.
    pub fn parse(kind: NodeType, data: &[u8]) -> Result<Cell> {
        let fixed = match kind {
            NodeType::TableInternal => TABLE_INTERNAL_CELL_SIZE,
            NodeType::TableLeaf => TABLE_LEAF_CELL_HEADER_SIZE,
            NodeType::IndexInternal => INDEX_INTERNAL_CELL_SIZE,
            NodeType::IndexLeaf => INDEX_LEAF_CELL_SIZE,
        };
        if data.len() < fixed {
            return Err(DbError::CorruptHeader("truncated cell"));
        }

        match kind {
            NodeType::TableInternal => Ok(Cell::TableInternal {
                child_page: be_u32(&data[0..4]),
                key: get_varint32(&data[4..8]),
            }),
            NodeType::TableLeaf => {
                let data_size = get_varint32(&data[0..4]) as usize;
                let key = get_varint32(&data[4..8]);
                let end = TABLE_LEAF_CELL_HEADER_SIZE + data_size;
                if data.len() < end {
                    return Err(DbError::CorruptHeader("truncated cell payload"));
                }
                Ok(Cell::TableLeaf {
                    key,
                    data: data[TABLE_LEAF_CELL_HEADER_SIZE..end].to_vec(),
                })
            }
            NodeType::IndexInternal => Ok(Cell::IndexInternal {
                child_page: be_u32(&data[0..4]),
                key_idx: be_u32(&data[8..12]),
                key_pk: be_u32(&data[12..16]),
            }),
            NodeType::IndexLeaf => Ok(Cell::IndexLeaf {
                key_idx: be_u32(&data[4..8]),
                key_pk: be_u32(&data[8..12]),
            }),
        }
    }

    /// Writes the cell into `out`, which must be exactly [`size`](Cell::size)
    /// bytes long.
    pub fn write(&self, out: &mut [u8]) {
        debug_assert_eq!(out.len(), self.size());
        match self {
            Cell::TableInternal { child_page, key } => {
                out[0..4].copy_from_slice(&child_page.to_be_bytes());
                put_varint32(&mut out[4..8], *key);
            }
            Cell::TableLeaf { key, data } => {
                put_varint32(&mut out[0..4], data.len() as u32);
                put_varint32(&mut out[4..8], *key);
                out[TABLE_LEAF_CELL_HEADER_SIZE..].copy_from_slice(data);
            }
            Cell::IndexInternal {
                child_page,
                key_idx,
                key_pk,
            } => {
                out[0..4].copy_from_slice(&child_page.to_be_bytes());
                out[4..8].copy_from_slice(&INDEX_CELL_MAGIC);
                out[8..12].copy_from_slice(&key_idx.to_be_bytes());
                out[12..16].copy_from_slice(&key_pk.to_be_bytes());
            }
            Cell::IndexLeaf { key_idx, key_pk } => {
                out[0..4].copy_from_slice(&INDEX_CELL_MAGIC);
                out[4..8].copy_from_slice(&key_idx.to_be_bytes());
                out[8..12].copy_from_slice(&key_pk.to_be_bytes());
            }
        }
    }
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes(bytes.try_into().expect("slice is 4 bytes"))
}
