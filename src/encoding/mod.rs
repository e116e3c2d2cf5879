//! # Encoding Module
//!
//! Low-level integer codecs shared by the page format and the record codec:
//!
//! - **General varints**: 1-to-9-byte big-endian integers with high-bit
//!   continuation, used for serial-type codes in record headers
//! - **Fixed varint slots**: the 4-byte compressed form every varint inside
//!   a B-tree cell is stored in

pub mod varint;

pub use varint::{
    decode_varint, encode_varint, get_varint32, put_varint32, varint_len, VARINT32_MAX,
    VARINT32_SIZE,
};
