// Copyright (c) 2024-present, tuple-archive contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Convenience ingestion parsers (spec §6, `ingest` feature): thin,
//! dependency-light readers for two text formats that produce [`Tuple`]
//! values for [`crate::ArchiveStore::put`]. Neither format carries a
//! context URI, so both modules stamp every tuple they produce with
//! [`DEFAULT_CONTEXT`] — see `DESIGN.md`.
//!
//! These are consumers of the Store API, not part of the core engine: a
//! parse failure never touches archive state, and neither module depends
//! on anything beyond [`crate::Tuple`]/[`crate::Value`].

use crate::Tuple;

pub mod json;
pub mod line_protocol;

/// The context URI stamped onto every tuple produced by these parsers,
/// since neither the line-protocol nor the JSON format names a context.
pub const DEFAULT_CONTEXT: &str = "urn:tuple-archive:default-context";

fn with_default_context(item: String, property: String, time: i64, seq_nr: i32, value: crate::Value) -> Tuple {
    Tuple::new(item, property, DEFAULT_CONTEXT, time, seq_nr, value)
}
