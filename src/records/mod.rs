//! # Record Serialization
//!
//! A record is a typed tuple serialized into a table-leaf payload. The
//! layout is self-describing: a header enumerates one serial-type code per
//! column, followed by the concatenated column payloads.
//!
//! ## Record Binary Layout
//!
//! ```text
//! +---------------+----------------------+------------------+
//! | Header Length | Serial-Type Codes    | Column Payloads  |
//! | (u8)          | [varint; N]          | [u8; ...]        |
//! +---------------+----------------------+------------------+
//! ```
//!
//! The header length counts its own byte. Serial types map codes to storage:
//!
//! | Code      | Type  | Payload             |
//! |-----------|-------|---------------------|
//! | 0         | null  | none                |
//! | 1         | int8  | 1 byte, big-endian  |
//! | 2         | int16 | 2 bytes, big-endian |
//! | 4         | int32 | 4 bytes, big-endian |
//! | 13 + 2n   | text  | n raw bytes         |
//!
//! ## Module Structure
//!
//! - `types`: [`Value`] and [`SerialType`]
//! - `builder`: [`build_record`] for construction
//! - `view`: [`RecordView`] for parsing and column access

mod builder;
mod types;
mod view;

pub use builder::build_record;
pub use types::{SerialType, Value};
pub use view::RecordView;
