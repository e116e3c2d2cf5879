//! Record parsing and column access.

use crate::encoding::varint::decode_varint;
use crate::errors::{DbError, Result};

use super::types::{SerialType, Value};

/// A parsed view over a serialized record.
///
/// Parsing walks the header once and memoizes each column's serial type and
/// payload offset; column reads after that are direct slices. The view
/// borrows the record bytes, which normally live in a payload copied out of
/// a table-leaf cell.
#[derive(Debug)]
pub struct RecordView<'a> {
    data: &'a [u8],
    types: Vec<SerialType>,
    offsets: Vec<usize>,
}

impl<'a> RecordView<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let header_len = *data
            .first()
            .ok_or(DbError::CorruptHeader("empty record"))? as usize;
        if header_len < 1 || header_len > data.len() {
            return Err(DbError::CorruptHeader("record header out of bounds"));
        }

        let mut types = Vec::new();
        let mut offsets = Vec::new();
        let mut pos = 1;
        let mut payload_pos = header_len;
        while pos < header_len {
            let (code, read) = decode_varint(&data[pos..header_len])?;
            pos += read;
            let t = SerialType::from_code(code)?;
            offsets.push(payload_pos);
            payload_pos += t.payload_size();
            types.push(t);
        }
        if payload_pos > data.len() {
            return Err(DbError::CorruptHeader("record payload truncated"));
        }

        Ok(Self {
            data,
            types,
            offsets,
        })
    }

    pub fn column_count(&self) -> usize {
        self.types.len()
    }

    pub fn serial_type(&self, column: usize) -> Result<SerialType> {
        self.types
            .get(column)
            .copied()
            .ok_or(DbError::Misuse("column index out of range"))
    }

    /// Decodes column `column` into a [`Value`].
    pub fn value(&self, column: usize) -> Result<Value> {
        let t = self.serial_type(column)?;
        let offset = self.offsets[column];
        let payload = &self.data[offset..offset + t.payload_size()];

        Ok(match t {
            SerialType::Null => Value::Null,
            SerialType::Int8 => Value::Int(payload[0] as i8 as i32),
            SerialType::Int16 => {
                Value::Int(i16::from_be_bytes(payload.try_into().expect("2 bytes")) as i32)
            }
            SerialType::Int32 => {
                Value::Int(i32::from_be_bytes(payload.try_into().expect("4 bytes")))
            }
            SerialType::Text { .. } => Value::Text(String::from_utf8_lossy(payload).into_owned()),
        })
    }

    /// Decodes every column.
    pub fn values(&self) -> Result<Vec<Value>> {
        (0..self.column_count()).map(|i| self.value(i)).collect()
    }
}
