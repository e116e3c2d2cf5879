//! # Error Taxonomy
//!
//! Every fallible operation in the crate returns [`Result`] with a [`DbError`].
//! The set of kinds is closed and shared by all layers: the pager, the B-tree
//! engine, the record codec, and the database machine report failures through
//! the same enum, and no layer rewrites another layer's error.
//!
//! Several kinds are ordinary control-flow outcomes rather than defects:
//! [`DbError::NotFound`] is how a lookup reports a missing key, and
//! [`DbError::Duplicate`] is how an insert reports a key collision. Callers
//! are expected to match on them.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// An I/O error occurred while accessing the database file.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The page counter cannot grow any further.
    #[error("page allocation limit reached")]
    OutOfMemory,

    /// A page number outside `1..=n_pages` was requested.
    #[error("page {npage} out of bounds (file has {n_pages} pages)")]
    PageOutOfBounds { npage: u32, n_pages: u32 },

    /// A cell number outside the node's cell count was requested.
    #[error("cell {ncell} out of bounds (node has {n_cells} cells)")]
    CellOutOfBounds { ncell: u16, n_cells: u16 },

    /// The file header or a node header failed validation.
    #[error("corrupt header: {0}")]
    CorruptHeader(&'static str),

    /// No entry with the given key exists.
    #[error("no entry with the given key")]
    NotFound,

    /// An entry with the given key already exists.
    #[error("an entry with that key already exists")]
    Duplicate,

    /// The API was used outside its contract (wrong cursor kind, wrong
    /// register type, out-of-range index, and so on).
    #[error("misuse: {0}")]
    Misuse(&'static str),

    /// A program executed `Halt` with a nonzero status.
    #[error("program halted with status {code}: {message}")]
    Halt { code: i32, message: String },
}
