// Copyright (c) 2024-present, tuple-archive contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A columnar, partitioned on-disk archive for `(item, property, context,
//! time, seqNr, value)` tuples.
//!
//! Tuples are grouped into `(itemId, propertyId, contextId)` partitions and
//! written into year/week directories whose names encode the id range they
//! contain, backed directly by the `parquet` crate's low-level column
//! writer/reader API.
//!
//! # Example usage
//!
//! ```
//! use tuple_archive::{ArchiveConfig, Tuple, Value};
//!
//! # let folder = tempfile::tempdir()?;
//! let store = ArchiveConfig::new(folder).open()?;
//!
//! store.put(vec![Tuple::new(
//!     "http://example.org/item/1",
//!     "http://example.org/prop/temperature",
//!     "http://example.org/ctx/default",
//!     1_700_000_000,
//!     0,
//!     Value::Float64(21.5),
//! )])?;
//!
//! let results = store.fetch("http://example.org/item/1", None, None, 0)?;
//! assert_eq!(results.len(), 1);
//! # Ok::<(), tuple_archive::Error>(())
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod aggregate;
mod cache;
mod coding;
mod error;
mod fetch;
mod id;
mod partition;
mod row;
mod store;
mod tuple;
mod value;
mod writer;

#[cfg(feature = "ingest")]
pub mod ingest;

#[doc(hidden)]
pub use coding::{Decode, Encode};
#[doc(hidden)]
pub use fetch::FetchPlan;
#[doc(hidden)]
pub use id::{MappingStore, Role};
#[doc(hidden)]
pub use partition::{PartitionKey, WeekRange, YearRange};
#[doc(hidden)]
pub use row::{IdPredicate, Row, WriterSettings};

pub use aggregate::AggregationOp;
pub use error::{Error, Result, ValueDecodingError, ValueEncodingError};
pub use store::{ArchiveConfig, ArchiveStore};
pub use tuple::Tuple;
pub use value::{Record, Value};
