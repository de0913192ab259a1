// Copyright (c) 2024-present, tuple-archive contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Shared serialization traits, used by [`crate::value`] to turn values into
//! the `valueObject` byte form stored in the `id: bytes[24]` row column.

use crate::error::{ValueDecodingError, ValueEncodingError};
use std::io::{Read, Write};

/// Trait for types that serialize into the value-object byte form.
pub trait Encode {
    /// Serializes `self` into `writer`.
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), ValueEncodingError>;

    /// Serializes `self` into a freshly allocated vector.
    fn encode_into_vec(&self) -> Result<Vec<u8>, ValueEncodingError> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf)?;
        Ok(buf)
    }
}

/// Trait for types that deserialize from the value-object byte form.
pub trait Decode: Sized {
    /// Deserializes a value from `reader`, consuming exactly its encoded
    /// bytes and no more.
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, ValueDecodingError>;
}
