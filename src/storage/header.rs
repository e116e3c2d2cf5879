//! # File Header
//!
//! The first 100 bytes of page 1 frame the whole database file. Most fields
//! are bit-exact literals; a handful (page size, change counter, schema
//! version, user cookie) carry real values.
//!
//! ## Layout
//!
//! ```text
//! Offset  Size  Field             Contents
//! ------  ----  ----------------  ----------------------------------------
//! 0x00    16    magic             "SQLite format 3\0"
//! 0x10    2     page_size         big-endian, power of two
//! 0x12    6     format tail       01 01 00 40 20 20
//! 0x18    4     change counter
//! 0x1C    4     unused
//! 0x20    8     zeros
//! 0x28    4     schema version
//! 0x2C    4     schema format     00 00 00 01
//! 0x30    4     page cache size   rejected when equal to 20000
//! 0x34    4     zeros
//! 0x38    4     text encoding     00 00 00 01
//! 0x3C    4     user cookie
//! 0x40    4     zeros
//! 0x44    32    unused
//! ```
//!
//! ## Validation
//!
//! [`FileHeader::validate`] checks exactly the literal fields above plus two
//! extra conditions: the stored page size must be a supported power of two,
//! and the page-cache field must not hold 20000. The latter is a fingerprint
//! of a buggy sibling tool whose files are structurally unreadable; freshly
//! created headers store 0 there so our own files never trip the check.
//!
//! ## Zerocopy
//!
//! The header is a `#[repr(C)]` zerocopy struct over big-endian wrapper
//! types, so it can be read in place from a page buffer and written back as
//! raw bytes without any field-by-field serialization.

use zerocopy::big_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::errors::{DbError, Result};

pub const FILE_HEADER_SIZE: usize = 100;
pub const FILE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

pub const DEFAULT_PAGE_SIZE: u32 = 1024;
pub const MIN_PAGE_SIZE: u32 = 512;
/// Node headers store page offsets as u16, which rules out 65536.
pub const MAX_PAGE_SIZE: u32 = 32768;

const FORMAT_TAIL: [u8; 6] = [0x01, 0x01, 0x00, 0x40, 0x20, 0x20];
const SCHEMA_FORMAT: [u8; 4] = [0x00, 0x00, 0x00, 0x01];
const TEXT_ENCODING: [u8; 4] = [0x00, 0x00, 0x00, 0x01];
const FOREIGN_PAGE_CACHE_SIZE: u32 = 20000;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct FileHeader {
    magic: [u8; 16],
    page_size: U16,
    format_tail: [u8; 6],
    change_counter: U32,
    unused_1c: [u8; 4],
    zero_20: [u8; 4],
    zero_24: [u8; 4],
    schema_version: U32,
    schema_format: [u8; 4],
    page_cache_size: U32,
    zero_34: [u8; 4],
    text_encoding: [u8; 4],
    user_cookie: U32,
    zero_40: [u8; 4],
    unused_44: [u8; 32],
}

const _: () = assert!(std::mem::size_of::<FileHeader>() == FILE_HEADER_SIZE);

impl FileHeader {
    pub fn new(page_size: u16) -> Self {
        Self {
            magic: *FILE_MAGIC,
            page_size: U16::new(page_size),
            format_tail: FORMAT_TAIL,
            change_counter: U32::new(0),
            unused_1c: [0; 4],
            zero_20: [0; 4],
            zero_24: [0; 4],
            schema_version: U32::new(0),
            schema_format: SCHEMA_FORMAT,
            page_cache_size: U32::new(0),
            zero_34: [0; 4],
            text_encoding: TEXT_ENCODING,
            user_cookie: U32::new(0),
            zero_40: [0; 4],
            unused_44: [0; 32],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        if bytes.len() < FILE_HEADER_SIZE {
            return Err(DbError::CorruptHeader("file shorter than the header"));
        }
        Self::ref_from_bytes(&bytes[..FILE_HEADER_SIZE])
            .map_err(|_| DbError::CorruptHeader("unreadable file header"))
    }

    /// Copies the header into the first 100 bytes of `out`.
    pub fn write_to(&self, out: &mut [u8]) {
        out[..FILE_HEADER_SIZE].copy_from_slice(self.as_bytes());
    }

    be_accessors! {
        page_size: u16,
        change_counter: u32,
        schema_version: u32,
        page_cache_size: u32,
        user_cookie: u32,
    }

    pub fn validate(&self) -> Result<()> {
        if &self.magic != FILE_MAGIC {
            return Err(DbError::CorruptHeader("bad magic string"));
        }
        if self.format_tail != FORMAT_TAIL {
            return Err(DbError::CorruptHeader("bad format bytes at 0x12"));
        }
        if self.zero_20 != [0; 4] || self.zero_24 != [0; 4] {
            return Err(DbError::CorruptHeader("reserved bytes at 0x20 not zero"));
        }
        if self.schema_format != SCHEMA_FORMAT {
            return Err(DbError::CorruptHeader("unsupported schema format"));
        }
        if self.page_cache_size.get() == FOREIGN_PAGE_CACHE_SIZE {
            return Err(DbError::CorruptHeader("file written by a foreign tool"));
        }
        if self.zero_34 != [0; 4] {
            return Err(DbError::CorruptHeader("reserved bytes at 0x34 not zero"));
        }
        if self.text_encoding != TEXT_ENCODING {
            return Err(DbError::CorruptHeader("unsupported text encoding"));
        }
        if self.zero_40 != [0; 4] {
            return Err(DbError::CorruptHeader("reserved bytes at 0x40 not zero"));
        }
        let page_size = self.page_size.get() as u32;
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) || !page_size.is_power_of_two() {
            return Err(DbError::CorruptHeader("unsupported page size"));
        }
        Ok(())
    }
}
