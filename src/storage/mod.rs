//! # Storage Module
//!
//! The foundation of the engine: a pager that treats a single database file
//! as an ordered sequence of fixed-size pages, plus the 100-byte file header
//! that frames page 1.
//!
//! ## File Layout
//!
//! ```text
//! Offset 0:              Page 1 (begins with the 100-byte file header)
//! Offset page_size:      Page 2
//! Offset 2 * page_size:  Page 3
//! ...
//! ```
//!
//! Pages are numbered from 1. The page size is negotiated once per file: a
//! freshly created database uses [`DEFAULT_PAGE_SIZE`], an existing one is
//! opened with whatever its header declares. Nothing above the pager ever
//! touches the file directly.
//!
//! ## Page Ownership
//!
//! The file is memory-mapped, but the mapping never escapes the pager.
//! [`Pager::read_page`] hands out an owned [`MemPage`] copy of the page
//! bytes; mutations happen on that buffer and reach the file only through
//! [`Pager::write_page`]. Dropping a `MemPage` releases it, so the
//! acquire/release discipline the B-tree engine depends on is enforced by
//! ownership rather than by convention.
//!
//! ## Module Organization
//!
//! - `header`: the 100-byte file header (magic, page size, literal fields)
//! - `pager`: file handle, page allocation, page I/O

mod header;
mod pager;

pub use header::{
    FileHeader, DEFAULT_PAGE_SIZE, FILE_HEADER_SIZE, FILE_MAGIC, MAX_PAGE_SIZE, MIN_PAGE_SIZE,
};
pub use pager::{MemPage, Pager};
