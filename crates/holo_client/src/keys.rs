//! Key encoding used for partition keys and primary-key round trips.
//!
//! Encodings are order-preserving: comparing two encoded keys bytewise gives the
//! same order as comparing the typed key tuples.

use std::fmt;
use std::ops::Range;

use crate::error::{OpError, OpResult};
use crate::schema::{ColumnType, Schema};
use crate::value::Value;

const SIGN_FLIP_MASK: u64 = 1u64 << 63;
const ESCAPE_BYTE: u8 = 0x00;
const ESCAPED_ZERO: u8 = 0x01;
const TERMINATOR: u8 = 0x00;
/// Width of an encoded hash-code partition key.
pub const HASH_PARTITION_KEY_LEN: usize = 2;

/// Routing token derived from an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PartitionKey {
    /// Encoded key bytes addressing exactly one tablet.
    Key(Vec<u8>),
    /// No point key is derivable; the read must fan out to every tablet.
    FullScan,
}

impl PartitionKey {
    pub fn from_hash_code(hash_code: u16) -> Self {
        Self::Key(encode_hash_code(hash_code))
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Key(bytes) => Some(bytes.as_slice()),
            Self::FullScan => None,
        }
    }

    pub fn is_full_scan(&self) -> bool {
        matches!(self, Self::FullScan)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(bytes) => write!(f, "0x{}", hex::encode(bytes)),
            Self::FullScan => f.write_str("<full scan>"),
        }
    }
}

fn encode_i64_ordered(value: i64) -> [u8; 8] {
    (value as u64 ^ SIGN_FLIP_MASK).to_be_bytes()
}

fn decode_i64_ordered(bytes: [u8; 8]) -> i64 {
    (u64::from_be_bytes(bytes) ^ SIGN_FLIP_MASK) as i64
}

fn encode_f64_ordered(value: f64) -> [u8; 8] {
    let bits = value.to_bits();
    let ordered = if bits & SIGN_FLIP_MASK != 0 {
        !bits
    } else {
        bits ^ SIGN_FLIP_MASK
    };
    ordered.to_be_bytes()
}

fn decode_f64_ordered(bytes: [u8; 8]) -> f64 {
    let ordered = u64::from_be_bytes(bytes);
    let bits = if ordered & SIGN_FLIP_MASK != 0 {
        ordered ^ SIGN_FLIP_MASK
    } else {
        !ordered
    };
    f64::from_bits(bits)
}

/// Mixes `bytes` into the 16-bit hash space used for hash partitioning.
pub fn hash_code(bytes: &[u8]) -> u16 {
    let mut mixed: u64 = 0x9E37_79B9_7F4A_7C15;
    for b in bytes {
        mixed ^= u64::from(*b);
        mixed = mixed.wrapping_mul(0xBF58_476D_1CE4_E5B9);
        mixed ^= mixed >> 27;
        mixed = mixed.wrapping_mul(0x94D0_49BB_1331_11EB);
        mixed ^= mixed >> 31;
    }
    (mixed % (u64::from(u16::MAX) + 1)) as u16
}

pub fn encode_hash_code(hash_code: u16) -> Vec<u8> {
    hash_code.to_be_bytes().to_vec()
}

/// Appends one key value. `is_last` selects the unescaped tail encoding for
/// variable-length values.
pub fn encode_key_value(value: &Value, is_last: bool, out: &mut Vec<u8>) {
    match value {
        Value::Int8(v) => out.push((*v as u8) ^ 0x80),
        Value::Int16(v) => out.extend_from_slice(&((*v as u16) ^ 0x8000).to_be_bytes()),
        Value::Int32(v) => out.extend_from_slice(&((*v as u32) ^ 0x8000_0000).to_be_bytes()),
        Value::Int64(v) | Value::TimestampNanos(v) => {
            out.extend_from_slice(&encode_i64_ordered(*v))
        }
        Value::Float64(v) => out.extend_from_slice(&encode_f64_ordered(*v)),
        Value::Bool(v) => out.push(u8::from(*v)),
        Value::Utf8(v) => encode_varlen(v.as_bytes(), is_last, out),
        Value::Binary(v) => encode_varlen(v, is_last, out),
    }
}

fn encode_varlen(bytes: &[u8], is_last: bool, out: &mut Vec<u8>) {
    if is_last {
        out.extend_from_slice(bytes);
        return;
    }
    for b in bytes {
        out.push(*b);
        if *b == ESCAPE_BYTE {
            out.push(ESCAPED_ZERO);
        }
    }
    out.push(ESCAPE_BYTE);
    out.push(TERMINATOR);
}

/// Encodes a key tuple in column order.
pub fn encode_key<'a, I>(values: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a Value>,
    I::IntoIter: ExactSizeIterator,
{
    let values = values.into_iter();
    let count = values.len();
    let mut out = Vec::new();
    for (idx, value) in values.enumerate() {
        encode_key_value(value, idx + 1 == count, &mut out);
    }
    out
}

/// Decodes bytes produced by [`encode_key`] for the schema columns in `columns`.
pub fn decode_key(schema: &Schema, columns: Range<usize>, bytes: &[u8]) -> OpResult<Vec<Value>> {
    let last = columns.end.saturating_sub(1);
    let mut values = Vec::with_capacity(columns.len());
    let mut rest = bytes;
    for idx in columns {
        let column = schema.column(idx)?;
        let (value, remaining) =
            decode_key_value(column.column_type, idx == last, rest).map_err(|err| {
                OpError::schema(format!("decode key column '{}': {err}", column.name))
            })?;
        values.push(value);
        rest = remaining;
    }
    if !rest.is_empty() {
        return Err(OpError::schema(format!(
            "encoded key has {} trailing bytes",
            rest.len()
        )));
    }
    Ok(values)
}

fn take_fixed<const N: usize>(bytes: &[u8]) -> Result<([u8; N], &[u8]), String> {
    if bytes.len() < N {
        return Err(format!("need {N} bytes, have {}", bytes.len()));
    }
    let (head, tail) = bytes.split_at(N);
    let mut out = [0u8; N];
    out.copy_from_slice(head);
    Ok((out, tail))
}

fn decode_key_value(
    column_type: ColumnType,
    is_last: bool,
    bytes: &[u8],
) -> Result<(Value, &[u8]), String> {
    match column_type {
        ColumnType::Int8 => {
            let ([b], rest) = take_fixed::<1>(bytes)?;
            Ok((Value::Int8((b ^ 0x80) as i8), rest))
        }
        ColumnType::Int16 => {
            let (raw, rest) = take_fixed::<2>(bytes)?;
            Ok((Value::Int16((u16::from_be_bytes(raw) ^ 0x8000) as i16), rest))
        }
        ColumnType::Int32 => {
            let (raw, rest) = take_fixed::<4>(bytes)?;
            Ok((
                Value::Int32((u32::from_be_bytes(raw) ^ 0x8000_0000) as i32),
                rest,
            ))
        }
        ColumnType::Int64 => {
            let (raw, rest) = take_fixed::<8>(bytes)?;
            Ok((Value::Int64(decode_i64_ordered(raw)), rest))
        }
        ColumnType::TimestampNanos => {
            let (raw, rest) = take_fixed::<8>(bytes)?;
            Ok((Value::TimestampNanos(decode_i64_ordered(raw)), rest))
        }
        ColumnType::Float64 => {
            let (raw, rest) = take_fixed::<8>(bytes)?;
            Ok((Value::Float64(decode_f64_ordered(raw)), rest))
        }
        ColumnType::Bool => {
            let ([b], rest) = take_fixed::<1>(bytes)?;
            match b {
                0 => Ok((Value::Bool(false), rest)),
                1 => Ok((Value::Bool(true), rest)),
                other => Err(format!("invalid bool byte {other:#04x}")),
            }
        }
        ColumnType::Utf8 => {
            let (raw, rest) = decode_varlen(bytes, is_last)?;
            let text = String::from_utf8(raw).map_err(|err| format!("invalid utf8: {err}"))?;
            Ok((Value::Utf8(text), rest))
        }
        ColumnType::Binary => {
            let (raw, rest) = decode_varlen(bytes, is_last)?;
            Ok((Value::Binary(raw), rest))
        }
    }
}

fn decode_varlen(bytes: &[u8], is_last: bool) -> Result<(Vec<u8>, &[u8]), String> {
    if is_last {
        return Ok((bytes.to_vec(), &bytes[bytes.len()..]));
    }
    let mut out = Vec::new();
    let mut idx = 0usize;
    while idx < bytes.len() {
        let b = bytes[idx];
        if b != ESCAPE_BYTE {
            out.push(b);
            idx += 1;
            continue;
        }
        match bytes.get(idx + 1) {
            Some(&ESCAPED_ZERO) => {
                out.push(ESCAPE_BYTE);
                idx += 2;
            }
            Some(&TERMINATOR) => return Ok((out, &bytes[idx + 2..])),
            Some(other) => return Err(format!("invalid escape sequence 0x00 {other:#04x}")),
            None => break,
        }
    }
    Err("unterminated variable-length key component".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnSchema;

    fn composite_schema() -> Schema {
        Schema::new(vec![
            ColumnSchema::new("tenant", ColumnType::Utf8).hash_key(),
            ColumnSchema::new("ts", ColumnType::Int64).range_key(),
            ColumnSchema::new("tag", ColumnType::Binary).range_key(),
            ColumnSchema::new("v", ColumnType::Float64),
        ])
        .expect("valid schema")
    }

    #[test]
    fn composite_key_decodes_to_input_values() {
        let schema = composite_schema();
        let values = vec![
            Value::Utf8("a\0b".to_string()),
            Value::Int64(-7),
            Value::Binary(vec![0, 1, 0]),
        ];
        let encoded = encode_key(values.iter());
        let decoded = decode_key(&schema, schema.key_columns(), &encoded).expect("decode");
        assert_eq!(decoded, values);
    }

    #[test]
    fn integer_encoding_preserves_order() {
        let keys = [-300i64, -1, 0, 1, 42, i64::MAX]
            .iter()
            .map(|v| encode_key([Value::Int64(*v)].iter()))
            .collect::<Vec<_>>();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);

        let negative = encode_key([Value::Int32(-5)].iter());
        let positive = encode_key([Value::Int32(5)].iter());
        assert!(negative < positive);
    }

    #[test]
    fn float_encoding_preserves_order() {
        let keys = [-10.5f64, -0.25, 0.0, 3.5, 1e9]
            .iter()
            .map(|v| encode_key([Value::Float64(*v)].iter()))
            .collect::<Vec<_>>();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn decode_rejects_truncated_and_trailing_bytes() {
        let schema = Schema::new(vec![ColumnSchema::new("k", ColumnType::Int32).range_key()])
            .expect("valid schema");
        let err = decode_key(&schema, schema.key_columns(), &[0x80, 0x00]).expect_err("short");
        assert!(matches!(err, OpError::SchemaMismatch(_)), "err={err}");
        let err = decode_key(&schema, schema.key_columns(), &[0x80, 0, 0, 5, 9])
            .expect_err("trailing");
        assert!(err.to_string().contains("trailing"), "err={err}");
    }

    #[test]
    fn decode_rejects_unterminated_inner_string() {
        let schema = composite_schema();
        let err = decode_key(&schema, schema.key_columns(), b"abc").expect_err("unterminated");
        assert!(err.to_string().contains("tenant"), "err={err}");
    }

    #[test]
    fn hash_code_is_stable_and_partition_key_is_two_bytes() {
        assert_eq!(hash_code(b"user:1"), hash_code(b"user:1"));
        let key = PartitionKey::from_hash_code(0x0102);
        assert_eq!(key.as_bytes(), Some(&[0x01, 0x02][..]));
        assert_eq!(key.to_string(), "0x0102");
        assert!(PartitionKey::FullScan.as_bytes().is_none());
    }
}
