//! # minnowdb - A Single-File B-Tree Storage Engine
//!
//! minnowdb is the storage core of a small relational database: one file,
//! partitioned into fixed-size pages, holding any number of table and index
//! B-trees, driven by a register-based virtual machine that executes
//! compiled query plans.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Database Machine (registers,      │
//! │   cursors, opcode dispatch)         │
//! ├─────────────────────────────────────┤
//! │   Record Codec (typed tuples)       │
//! ├─────────────────────────────────────┤
//! │   B-Tree Engine (nodes, cells,      │
//! │   find / insert / split)            │
//! ├─────────────────────────────────────┤
//! │   Pager (page I/O, allocation,      │
//! │   file header)                      │
//! └─────────────────────────────────────┘
//! ```
//!
//! Each layer only speaks to the one below it: the machine resolves every
//! cursor step through the B-tree engine, which fetches pages through the
//! pager. All persistent state lives in pages.
//!
//! ## Quick Start
//!
//! ```ignore
//! use minnowdb::btree::Btree;
//!
//! let mut bt = Btree::open("./my.db")?;
//! bt.insert_in_table(1, 42, &[0xDE, 0xAD, 0xBE, 0xEF])?;
//! let payload = bt.find(1, 42)?;
//! ```
//!
//! ## On-Disk Format
//!
//! The file begins with a 100-byte header whose magic marks the SQLite page
//! framing this engine speaks. Page 1 carries that header plus the first
//! tree root; every other page is one B-tree node. Multi-byte integers are
//! big-endian throughout.
//!
//! ## Scope
//!
//! Single-threaded, synchronous, and journal-free: there is no WAL, no
//! transaction layer, and no cross-process locking. The SQL front end that
//! compiles programs for the machine lives elsewhere.
//!
//! ## Module Overview
//!
//! - [`storage`]: pager, page buffers, file header
//! - [`btree`]: node/cell codecs and the tree engine
//! - [`records`]: typed-tuple serialization
//! - [`dbm`]: the database machine
//! - [`encoding`]: varint codecs
//! - [`errors`]: the shared error taxonomy

#[macro_use]
mod macros;

pub mod btree;
pub mod dbm;
pub mod encoding;
pub mod errors;
pub mod records;
pub mod storage;

pub use btree::Btree;
pub use dbm::{Instruction, Machine, Opcode, Register, StepResult};
pub use errors::{DbError, Result};
pub use records::{build_record, RecordView, Value};
