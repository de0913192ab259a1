// Copyright (c) 2024-present, tuple-archive contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A reader for the JSON tuple format (spec §6): a nested object keyed by
//! item URI, then property URI, then an array of `{value, time, seqNr?}`
//! entries. `@context` objects remap URI prefixes, with later occurrences
//! (in document order) overriding earlier ones; this crate depends on
//! `serde_json`'s `preserve_order` feature specifically so that document
//! order is the iteration order rather than lexicographic key order.

use super::with_default_context;
use crate::{Record, Tuple, Value};
use serde_json::Map as JsonMap;
use std::collections::HashMap;
use std::fmt;

/// Failures parsing a JSON tuple document.
#[derive(Debug)]
pub enum JsonIngestError {
    Syntax(serde_json::Error),
    NotAnObject,
    ItemNotAnObject(String),
    PropertyNotAnArray { item: String, property: String },
    EntryNotAnObject { item: String, property: String },
    EntryMissingValue { item: String, property: String },
    EntryMissingTime { item: String, property: String },
    UnsupportedValue { item: String, property: String },
}

impl fmt::Display for JsonIngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax(e) => write!(f, "invalid JSON: {e}"),
            Self::NotAnObject => write!(f, "document root is not an object"),
            Self::ItemNotAnObject(item) => write!(f, "item {item} is not an object"),
            Self::PropertyNotAnArray { item, property } => {
                write!(f, "property {property} of item {item} is not an array")
            }
            Self::EntryNotAnObject { item, property } => {
                write!(f, "an entry of {item}/{property} is not an object")
            }
            Self::EntryMissingValue { item, property } => {
                write!(f, "an entry of {item}/{property} is missing `value`")
            }
            Self::EntryMissingTime { item, property } => {
                write!(f, "an entry of {item}/{property} is missing `time`")
            }
            Self::UnsupportedValue { item, property } => {
                write!(f, "an entry of {item}/{property} holds an unsupported JSON value")
            }
        }
    }
}

impl std::error::Error for JsonIngestError {}

impl From<serde_json::Error> for JsonIngestError {
    fn from(e: serde_json::Error) -> Self {
        Self::Syntax(e)
    }
}

const CONTEXT_KEY: &str = "@context";
const ID_KEY: &str = "@id";

/// Parses a JSON tuple document into its flattened [`Tuple`] values.
pub fn parse_document(json: &str) -> Result<Vec<Tuple>, JsonIngestError> {
    let root: serde_json::Value = serde_json::from_str(json)?;
    let root_obj = root.as_object().ok_or(JsonIngestError::NotAnObject)?;

    let mut context = HashMap::new();
    merge_context(&mut context, root_obj.get(CONTEXT_KEY));

    let mut tuples = Vec::new();
    for (item_key, item_value) in root_obj {
        if item_key == CONTEXT_KEY {
            continue;
        }
        let item_obj = item_value
            .as_object()
            .ok_or_else(|| JsonIngestError::ItemNotAnObject(item_key.clone()))?;

        let item_uri = expand(&context, item_key);
        let mut item_context = context.clone();
        merge_context(&mut item_context, item_obj.get(CONTEXT_KEY));

        for (property_key, property_value) in item_obj {
            if property_key == CONTEXT_KEY {
                continue;
            }
            let property_uri = expand(&item_context, property_key);
            let entries = property_value.as_array().ok_or_else(|| JsonIngestError::PropertyNotAnArray {
                item: item_uri.clone(),
                property: property_uri.clone(),
            })?;

            for entry in entries {
                let entry_obj = entry.as_object().ok_or_else(|| JsonIngestError::EntryNotAnObject {
                    item: item_uri.clone(),
                    property: property_uri.clone(),
                })?;
                let value_json = entry_obj.get("value").ok_or_else(|| JsonIngestError::EntryMissingValue {
                    item: item_uri.clone(),
                    property: property_uri.clone(),
                })?;
                let time = entry_obj
                    .get("time")
                    .and_then(serde_json::Value::as_i64)
                    .ok_or_else(|| JsonIngestError::EntryMissingTime {
                        item: item_uri.clone(),
                        property: property_uri.clone(),
                    })?;
                let seq_nr = entry_obj.get("seqNr").and_then(serde_json::Value::as_i64).unwrap_or(0) as i32;

                let value = to_value(value_json, &item_context, &item_uri, &property_uri)?;
                tuples.push(with_default_context(item_uri.clone(), property_uri.clone(), time, seq_nr, value));
            }
        }
    }

    Ok(tuples)
}

/// Merges a `@context` object's prefix → URI entries into `context`, later
/// keys overriding earlier ones already present.
fn merge_context(context: &mut HashMap<String, String>, value: Option<&serde_json::Value>) {
    let Some(obj) = value.and_then(serde_json::Value::as_object) else {
        return;
    };
    for (prefix, uri) in obj {
        if let Some(uri) = uri.as_str() {
            context.insert(prefix.clone(), uri.to_string());
        }
    }
}

/// Expands `key` of the form `prefix:local` using `context`, when `prefix`
/// is a known mapping; otherwise returns `key` unchanged.
fn expand(context: &HashMap<String, String>, key: &str) -> String {
    if let Some((prefix, local)) = key.split_once(':') {
        if let Some(base) = context.get(prefix) {
            return format!("{base}{local}");
        }
    }
    key.to_string()
}

fn to_value(
    json: &serde_json::Value,
    context: &HashMap<String, String>,
    item: &str,
    property: &str,
) -> Result<Value, JsonIngestError> {
    match json {
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::String(s) => Ok(Value::String(s.clone())),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int64(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Float64(f))
            } else {
                Err(JsonIngestError::UnsupportedValue {
                    item: item.to_string(),
                    property: property.to_string(),
                })
            }
        }
        serde_json::Value::Object(obj) => object_to_value(obj, context, item, property),
        serde_json::Value::Null | serde_json::Value::Array(_) => Err(JsonIngestError::UnsupportedValue {
            item: item.to_string(),
            property: property.to_string(),
        }),
    }
}

fn object_to_value(
    obj: &JsonMap<String, serde_json::Value>,
    context: &HashMap<String, String>,
    item: &str,
    property: &str,
) -> Result<Value, JsonIngestError> {
    if let Some(id) = obj.get(ID_KEY).and_then(serde_json::Value::as_str) {
        return Ok(Value::Uri(expand(context, id)));
    }
    let mut record = Record::default();
    for (key, value) in obj {
        if key == CONTEXT_KEY {
            continue;
        }
        let field_property = expand(context, key);
        let field_value = to_value(value, context, item, property)?;
        record.push(field_property, field_value);
    }
    Ok(Value::Record(record))
}
