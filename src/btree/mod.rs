//! # B-Tree Engine
//!
//! A file of B-trees: every page past the file header is a node of some
//! table or index tree, and trees are identified solely by their root page
//! number. The engine interprets pages as typed nodes, searches them, and
//! mutates them; all I/O goes through the pager.
//!
//! ## Node Types
//!
//! | Byte | Variant        | Entries                                 |
//! |------|----------------|-----------------------------------------|
//! | 0x05 | table internal | routing keys + child pointers           |
//! | 0x0D | table leaf     | key + record payload                    |
//! | 0x02 | index internal | (key_idx, key_pk) entries + children    |
//! | 0x0A | index leaf     | (key_idx, key_pk) entries               |
//!
//! Table trees keep every payload in a leaf; internal table cells only
//! route. Index trees store real entries in internal nodes too, so an
//! in-order walk must visit internal cells between their children.
//!
//! ## Key Ordering
//!
//! Keys within a node are non-decreasing. The subtree hanging off cell `i`
//! holds keys `<= cells[i].key`; the subtree behind `right_page` holds keys
//! strictly greater than every cell key. Equal keys descend left.
//!
//! ## Root Identity
//!
//! A tree's root page number never changes. When the root fills up, its
//! contents move to a freshly allocated child, the root is re-initialized as
//! an internal node pointing at that child, and the child is split. External
//! references to trees by root page stay valid forever.
//!
//! ## Module Organization
//!
//! - `cell`: the four on-disk cell shapes and their codec
//! - `node`: node headers, the cell offset array, in-page cell surgery
//! - `tree`: open/create, lookup, insertion, node splitting

mod cell;
mod node;
mod tree;

pub use cell::{
    Cell, INDEX_CELL_MAGIC, INDEX_INTERNAL_CELL_SIZE, INDEX_LEAF_CELL_SIZE,
    TABLE_INTERNAL_CELL_SIZE, TABLE_LEAF_CELL_HEADER_SIZE,
};
pub use node::{Node, NodeType, NODE_HEADER_SIZE};
pub use tree::Btree;
