// Copyright (c) 2024-present, tuple-archive contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The tuple value codec (spec §4.2): a self-describing byte encoding for
//! scalars, URIs, and nested [`Record`] trees.
//!
//! Only `Record`, `Uri`, `BigInteger`, `BigDecimal`, and `Short` ever travel
//! through this codec as a row's `valueObject` column — the other scalar
//! kinds get their own typed row column (see [`crate::row`]). The codec
//! itself is recursive and supports every [`Value`] variant, because a
//! `Record` entry can nest any value, including the ones that have a
//! dedicated top-level column.
//!
//! Every value is prefixed with a one-byte tag. A record's tag (`'O'`,
//! 0x4F) is followed by a 4-byte entry count and then that many
//! `(propertyLen, propertyBytes, recursively-encoded value)` entries —
//! the entry count is what lets a record nested inside another record's
//! entry know where its own entries end, which a bare unbounded sequence
//! of `'O'` frames cannot express on its own.

use crate::coding::{Decode, Encode};
use crate::error::{ValueDecodingError, ValueEncodingError};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

const TAG_URI: u8 = 0x52; // 'R'
const TAG_RECORD: u8 = 0x4F; // 'O'
const TAG_INT32: u8 = 0x01;
const TAG_INT64: u8 = 0x02;
const TAG_FLOAT32: u8 = 0x03;
const TAG_FLOAT64: u8 = 0x04;
const TAG_STRING: u8 = 0x05;
const TAG_BOOL: u8 = 0x06;
const TAG_SHORT: u8 = 0x07;
const TAG_BIG_INTEGER: u8 = 0x08;
const TAG_BIG_DECIMAL: u8 = 0x09;

/// A tuple value: exactly one of the scalar kinds, a URI, or a nested
/// [`Record`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bool(bool),
    Short(i16),
    /// Two's-complement big-endian magnitude of an arbitrary-precision
    /// integer.
    BigInteger(Vec<u8>),
    /// `(unscaled two's-complement magnitude, scale)`, mirroring the
    /// conventional unscaled-value/scale decomposition of a decimal.
    BigDecimal(Vec<u8>, i32),
    Uri(String),
    Record(Record),
}

impl Value {
    /// Returns the value as `f64` if it is one of the numeric kinds,
    /// `None` otherwise. Used by the aggregation iterator (§4.6).
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int32(v) => Some(f64::from(*v)),
            Self::Int64(v) => Some(*v as f64),
            Self::Float32(v) => Some(f64::from(*v)),
            Self::Float64(v) => Some(*v),
            Self::Short(v) => Some(f64::from(*v)),
            _ => None,
        }
    }
}

/// An ordered, append-only list of `(property URI, value)` pairs.
///
/// Order is preserved on round-trip; duplicate properties are permitted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record(Vec<(String, Value)>);

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a `(property, value)` entry, preserving insertion order.
    pub fn push(&mut self, property: impl Into<String>, value: Value) {
        self.0.push((property.into(), value));
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(p, v)| (p.as_str(), v))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Encode for Value {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), ValueEncodingError> {
        match self {
            Self::Uri(uri) => {
                let bytes = uri.as_bytes();
                if bytes.len() > u8::MAX as usize {
                    return Err(ValueEncodingError::PropertyUriTooLong(bytes.len()));
                }
                writer.write_u8(TAG_URI)?;
                writer.write_u8(bytes.len() as u8)?;
                writer.write_all(bytes)?;
            }
            Self::Record(record) => {
                writer.write_u8(TAG_RECORD)?;
                writer.write_u32::<BigEndian>(record.len() as u32)?;
                for (property, value) in record.iter() {
                    let prop_bytes = property.as_bytes();
                    if prop_bytes.len() > u8::MAX as usize {
                        return Err(ValueEncodingError::PropertyUriTooLong(prop_bytes.len()));
                    }
                    writer.write_u8(prop_bytes.len() as u8)?;
                    writer.write_all(prop_bytes)?;
                    value.encode_into(writer)?;
                }
            }
            Self::Int32(v) => {
                writer.write_u8(TAG_INT32)?;
                writer.write_i32::<BigEndian>(*v)?;
            }
            Self::Int64(v) => {
                writer.write_u8(TAG_INT64)?;
                writer.write_i64::<BigEndian>(*v)?;
            }
            Self::Float32(v) => {
                writer.write_u8(TAG_FLOAT32)?;
                writer.write_f32::<BigEndian>(*v)?;
            }
            Self::Float64(v) => {
                writer.write_u8(TAG_FLOAT64)?;
                writer.write_f64::<BigEndian>(*v)?;
            }
            Self::String(s) => {
                let bytes = s.as_bytes();
                writer.write_u8(TAG_STRING)?;
                writer.write_u32::<BigEndian>(bytes.len() as u32)?;
                writer.write_all(bytes)?;
            }
            Self::Bool(b) => {
                writer.write_u8(TAG_BOOL)?;
                writer.write_u8(u8::from(*b))?;
            }
            Self::Short(v) => {
                writer.write_u8(TAG_SHORT)?;
                writer.write_i16::<BigEndian>(*v)?;
            }
            Self::BigInteger(bytes) => {
                writer.write_u8(TAG_BIG_INTEGER)?;
                writer.write_u32::<BigEndian>(bytes.len() as u32)?;
                writer.write_all(bytes)?;
            }
            Self::BigDecimal(unscaled, scale) => {
                writer.write_u8(TAG_BIG_DECIMAL)?;
                writer.write_i32::<BigEndian>(*scale)?;
                writer.write_u32::<BigEndian>(unscaled.len() as u32)?;
                writer.write_all(unscaled)?;
            }
        }
        Ok(())
    }
}

impl Decode for Value {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, ValueDecodingError> {
        let tag = read_u8(reader)?;
        match tag {
            TAG_URI => {
                let len = read_u8(reader)? as usize;
                Ok(Self::Uri(read_utf8(reader, len)?))
            }
            TAG_RECORD => {
                let count = reader
                    .read_u32::<BigEndian>()
                    .map_err(|_| ValueDecodingError::UnexpectedEof)?;
                let mut record = Record::new();
                for _ in 0..count {
                    let prop_len = read_u8(reader)? as usize;
                    let property = read_utf8(reader, prop_len)?;
                    let value = Self::decode_from(reader)?;
                    record.push(property, value);
                }
                Ok(Self::Record(record))
            }
            TAG_INT32 => Ok(Self::Int32(
                reader
                    .read_i32::<BigEndian>()
                    .map_err(|_| ValueDecodingError::UnexpectedEof)?,
            )),
            TAG_INT64 => Ok(Self::Int64(
                reader
                    .read_i64::<BigEndian>()
                    .map_err(|_| ValueDecodingError::UnexpectedEof)?,
            )),
            TAG_FLOAT32 => Ok(Self::Float32(
                reader
                    .read_f32::<BigEndian>()
                    .map_err(|_| ValueDecodingError::UnexpectedEof)?,
            )),
            TAG_FLOAT64 => Ok(Self::Float64(
                reader
                    .read_f64::<BigEndian>()
                    .map_err(|_| ValueDecodingError::UnexpectedEof)?,
            )),
            TAG_STRING => {
                let len = reader
                    .read_u32::<BigEndian>()
                    .map_err(|_| ValueDecodingError::UnexpectedEof)? as usize;
                Ok(Self::String(read_utf8(reader, len)?))
            }
            TAG_BOOL => Ok(Self::Bool(read_u8(reader)? != 0)),
            TAG_SHORT => Ok(Self::Short(
                reader
                    .read_i16::<BigEndian>()
                    .map_err(|_| ValueDecodingError::UnexpectedEof)?,
            )),
            TAG_BIG_INTEGER => {
                let len = reader
                    .read_u32::<BigEndian>()
                    .map_err(|_| ValueDecodingError::UnexpectedEof)? as usize;
                Ok(Self::BigInteger(read_bytes(reader, len)?))
            }
            TAG_BIG_DECIMAL => {
                let scale = reader
                    .read_i32::<BigEndian>()
                    .map_err(|_| ValueDecodingError::UnexpectedEof)?;
                let len = reader
                    .read_u32::<BigEndian>()
                    .map_err(|_| ValueDecodingError::UnexpectedEof)? as usize;
                Ok(Self::BigDecimal(read_bytes(reader, len)?, scale))
            }
            other => Err(ValueDecodingError::UnknownTag(other)),
        }
    }
}

fn read_u8<R: Read>(reader: &mut R) -> Result<u8, ValueDecodingError> {
    let mut buf = [0u8; 1];
    reader
        .read_exact(&mut buf)
        .map_err(|_| ValueDecodingError::UnexpectedEof)?;
    Ok(buf[0])
}

fn read_bytes<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>, ValueDecodingError> {
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .map_err(|_| ValueDecodingError::UnexpectedEof)?;
    Ok(buf)
}

fn read_utf8<R: Read>(reader: &mut R, len: usize) -> Result<String, ValueDecodingError> {
    let bytes = read_bytes(reader, len)?;
    String::from_utf8(bytes).map_err(|_| ValueDecodingError::InvalidUtf8)
}

/// Decodes a complete `valueObject` byte slice.
pub fn decode(bytes: &[u8]) -> Result<Value, ValueDecodingError> {
    let mut cursor = std::io::Cursor::new(bytes);
    Value::decode_from(&mut cursor)
}

/// Encodes a value into its `valueObject` byte form.
pub fn encode(value: &Value) -> Result<Vec<u8>, ValueEncodingError> {
    value.encode_into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: Value) {
        let bytes = encode(&v).expect("encode");
        let decoded = decode(&bytes).expect("decode");
        assert_eq!(v, decoded);
    }

    #[test]
    fn scalars_roundtrip() {
        roundtrip(Value::Int32(-42));
        roundtrip(Value::Int64(i64::MIN));
        roundtrip(Value::Float32(1.5));
        roundtrip(Value::Float64(-0.001));
        roundtrip(Value::String("hello world".into()));
        roundtrip(Value::Bool(true));
        roundtrip(Value::Bool(false));
        roundtrip(Value::Short(-7));
        roundtrip(Value::BigInteger(vec![0x7f, 0xff, 0xff, 0xff]));
        roundtrip(Value::BigDecimal(vec![0x01, 0x00], -2));
    }

    #[test]
    fn uri_roundtrips() {
        roundtrip(Value::Uri("http://example.org/i".into()));
    }

    #[test]
    fn uri_too_long_fails_encode() {
        let long = "x".repeat(300);
        let v = Value::Uri(long);
        assert!(matches!(
            v.encode_into_vec(),
            Err(ValueEncodingError::PropertyUriTooLong(300))
        ));
    }

    #[test]
    fn nested_record_roundtrips() {
        let mut inner = Record::new();
        inner.push("http://example.org/value", Value::Uri("value".into()));
        inner.push("http://example.org/extra", Value::Int32(7));

        let mut outer = Record::new();
        outer.push("p1", Value::String("v1".into()));
        outer.push("nested", Value::Record(inner));
        outer.push("p2", Value::Bool(true));

        roundtrip(Value::Record(outer));
    }

    #[test]
    fn empty_record_roundtrips() {
        roundtrip(Value::Record(Record::new()));
    }

    #[test]
    fn unknown_tag_fails_decode() {
        let bytes = [0xAA];
        assert!(matches!(
            decode(&bytes),
            Err(ValueDecodingError::UnknownTag(0xAA))
        ));
    }

    #[test]
    fn truncated_bytes_fail_decode() {
        let bytes = [TAG_URI, 5, b'h', b'i']; // declares 5 bytes, has 2
        assert!(matches!(
            decode(&bytes),
            Err(ValueDecodingError::UnexpectedEof)
        ));
    }
}
