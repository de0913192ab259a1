// Copyright (c) 2024-present, tuple-archive contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::fmt;

/// Errors that can occur while operating on an archive.
///
/// `MappingNotFound` is intentionally absent: a missing mapping is a normal
/// outcome (an empty fetch result), not an error condition — see
/// [`crate::fetch`].
#[derive(Debug)]
pub enum Error {
    /// Underlying storage read or write failed.
    Io(std::io::Error),

    /// The `parquet` crate failed to read or write a row file.
    Parquet(parquet::errors::ParquetError),

    /// A value could not be encoded into its byte form (e.g. a property URI
    /// longer than 255 bytes).
    ValueEncoding(ValueEncodingError),

    /// A value's byte form could not be decoded (unknown tag, truncated
    /// frame, ...).
    ValueDecoding(ValueDecodingError),

    /// `min`/`max`/`avg`/`sum` requested over a non-numeric value.
    UnsupportedAggregation,

    /// A partition directory name failed to parse, or its `Pmin > Pmax`.
    /// Surfaced only where the spec requires it to be fatal; pruning paths
    /// instead log and skip the directory.
    InvariantViolation(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Parquet(e) => write!(f, "parquet error: {e}"),
            Self::ValueEncoding(e) => write!(f, "value encoding error: {e}"),
            Self::ValueDecoding(e) => write!(f, "value decoding error: {e}"),
            Self::UnsupportedAggregation => {
                write!(f, "aggregation requested over a non-numeric value")
            }
            Self::InvariantViolation(msg) => write!(f, "invariant violation: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parquet(e) => Some(e),
            Self::ValueEncoding(e) => Some(e),
            Self::ValueDecoding(e) => Some(e),
            Self::UnsupportedAggregation | Self::InvariantViolation(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<parquet::errors::ParquetError> for Error {
    fn from(value: parquet::errors::ParquetError) -> Self {
        Self::Parquet(value)
    }
}

impl From<ValueEncodingError> for Error {
    fn from(value: ValueEncodingError) -> Self {
        Self::ValueEncoding(value)
    }
}

impl From<ValueDecodingError> for Error {
    fn from(value: ValueDecodingError) -> Self {
        Self::ValueDecoding(value)
    }
}

/// Archive result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error raised while encoding a [`crate::value::Value`] into its byte form.
#[derive(Debug)]
pub enum ValueEncodingError {
    /// A Record entry's property URI was longer than 255 bytes.
    PropertyUriTooLong(usize),
    /// I/O error while writing into the target buffer.
    Io(std::io::Error),
}

impl fmt::Display for ValueEncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PropertyUriTooLong(len) => {
                write!(f, "property URI of {len} bytes exceeds the 255 byte limit")
            }
            Self::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ValueEncodingError {}

impl From<std::io::Error> for ValueEncodingError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Error raised while decoding a value's byte form.
#[derive(Debug)]
pub enum ValueDecodingError {
    /// The leading tag byte did not match any known frame or scalar type.
    UnknownTag(u8),
    /// The byte stream ended before a complete value was read.
    UnexpectedEof,
    /// A string or URI payload was not valid UTF-8.
    InvalidUtf8,
    /// I/O error while reading from the source buffer.
    Io(std::io::Error),
}

impl fmt::Display for ValueDecodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTag(tag) => write!(f, "unknown value tag byte 0x{tag:02x}"),
            Self::UnexpectedEof => write!(f, "unexpected end of value byte stream"),
            Self::InvalidUtf8 => write!(f, "value payload was not valid UTF-8"),
            Self::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ValueDecodingError {}

impl From<std::io::Error> for ValueDecodingError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
