//! Record construction.

use crate::encoding::varint::{encode_varint, varint_len};
use crate::errors::{DbError, Result};

use super::types::{SerialType, Value};

/// Serializes a tuple of values into a record payload.
///
/// Integers are stored in the narrowest of int8/int16/int32 that holds them;
/// text stores its raw bytes. The header length must fit in its single byte,
/// which bounds a record to roughly 120 text columns.
pub fn build_record(values: &[Value]) -> Result<Vec<u8>> {
    let types: Vec<SerialType> = values.iter().map(SerialType::for_value).collect();

    let header_len = 1 + types
        .iter()
        .map(|t| varint_len(t.code()))
        .sum::<usize>();
    if header_len > u8::MAX as usize {
        return Err(DbError::Misuse("record header exceeds 255 bytes"));
    }
    let payload_len = types.iter().map(|t| t.payload_size()).sum::<usize>();

    let mut out = vec![0u8; header_len + payload_len];
    out[0] = header_len as u8;

    let mut pos = 1;
    for t in &types {
        pos += encode_varint(&mut out[pos..], t.code());
    }
    debug_assert_eq!(pos, header_len);

    for (value, t) in values.iter().zip(&types) {
        match (value, t) {
            (Value::Null, SerialType::Null) => {}
            (Value::Int(v), SerialType::Int8) => {
                out[pos] = *v as i8 as u8;
                pos += 1;
            }
            (Value::Int(v), SerialType::Int16) => {
                out[pos..pos + 2].copy_from_slice(&(*v as i16).to_be_bytes());
                pos += 2;
            }
            (Value::Int(v), SerialType::Int32) => {
                out[pos..pos + 4].copy_from_slice(&v.to_be_bytes());
                pos += 4;
            }
            (Value::Text(s), SerialType::Text { len }) => {
                out[pos..pos + len].copy_from_slice(s.as_bytes());
                pos += len;
            }
            _ => unreachable!("serial type derived from the value"),
        }
    }
    debug_assert_eq!(pos, out.len());

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_byte_layout() {
        let record = build_record(&[Value::Int(1), Value::Text("a".into())]).unwrap();
        assert_eq!(record, vec![3, 1, 15, 0x01, b'a']);
    }

    #[test]
    fn null_columns_occupy_no_payload() {
        let record = build_record(&[Value::Null, Value::Null]).unwrap();
        assert_eq!(record, vec![3, 0, 0]);
    }

    #[test]
    fn int_widths_by_magnitude() {
        let record = build_record(&[Value::Int(-2), Value::Int(300), Value::Int(70_000)]).unwrap();
        // header: len byte + codes 1, 2, 4
        assert_eq!(&record[..4], &[4, 1, 2, 4]);
        assert_eq!(record[4], 0xFE);
        assert_eq!(&record[5..7], &300i16.to_be_bytes());
        assert_eq!(&record[7..11], &70_000i32.to_be_bytes());
    }

    #[test]
    fn empty_record_is_just_the_header_byte() {
        assert_eq!(build_record(&[]).unwrap(), vec![1]);
    }
}
