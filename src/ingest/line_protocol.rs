// Copyright (c) 2024-present, tuple-archive contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A hand-rolled reader for the line-protocol text format (spec §6): this
//! crate's variant gives the measurement the role of the property URI and
//! pulls the item URI out of a dedicated `item` tag, which the generic
//! line-protocol parsers in the wider ecosystem don't model, so this
//! module is written from scratch rather than wrapping one of them.
//!
//! Grammar: `measurement,tag=value[,...] field=value[,...] [timestamp]`,
//! with backslash-escaping of `,`, `=`, space, `"`, and `\` throughout, and
//! `\t` decoding to a literal tab inside quoted field values.

use super::with_default_context;
use crate::Tuple;
use crate::Value;
use std::fmt;

/// Failures parsing one line-protocol line.
#[derive(Debug)]
pub enum LineProtocolError {
    Empty,
    MissingFields,
    MissingItemTag,
    MalformedTag(String),
    MalformedField(String),
    InvalidTimestamp(String),
    InvalidIntegerField(String),
    InvalidNumericField(String),
    UnterminatedQuote,
}

impl fmt::Display for LineProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty line"),
            Self::MissingFields => write!(f, "line has no field set"),
            Self::MissingItemTag => write!(f, "line has no `item` tag"),
            Self::MalformedTag(s) => write!(f, "malformed tag: {s}"),
            Self::MalformedField(s) => write!(f, "malformed field: {s}"),
            Self::InvalidTimestamp(s) => write!(f, "invalid timestamp: {s}"),
            Self::InvalidIntegerField(s) => write!(f, "invalid integer field: {s}"),
            Self::InvalidNumericField(s) => write!(f, "invalid numeric field: {s}"),
            Self::UnterminatedQuote => write!(f, "unterminated quoted string"),
        }
    }
}

impl std::error::Error for LineProtocolError {}

/// Parses one line-protocol line into a single [`Tuple`], using `now_ms`
/// to stamp a timestamp when the line carries none. A line with more than
/// one field in its field set uses only the first; later fields are
/// logged and dropped (this parser, like the Store API it feeds, produces
/// one tuple at a time).
pub fn parse_line(line: &str, now_ms: impl FnOnce() -> i64) -> Result<Tuple, LineProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(LineProtocolError::Empty);
    }

    let segments = split_unescaped_unquoted(line, ' ');
    let series_part = segments.first().ok_or(LineProtocolError::Empty)?;
    let fields_part = segments.get(1).ok_or(LineProtocolError::MissingFields)?;
    let timestamp_part = segments.get(2);

    let series_tokens = split_unescaped(series_part, ',');
    let measurement = series_tokens.first().ok_or(LineProtocolError::Empty)?;
    let property = unescape(measurement);

    let mut item = None;
    for tag in &series_tokens[1..] {
        let (key, value) = split_once_unescaped(tag, '=').ok_or_else(|| LineProtocolError::MalformedTag(tag.clone()))?;
        if unescape(&key) == "item" {
            item = Some(unescape(&value));
        }
    }
    let item = item.ok_or(LineProtocolError::MissingItemTag)?;

    let field_tokens = split_unescaped_unquoted_commas(fields_part)?;
    let first_field = field_tokens.first().ok_or(LineProtocolError::MissingFields)?;
    if field_tokens.len() > 1 {
        log::debug!("line-protocol line has {} fields; using only the first", field_tokens.len());
    }
    let (_field_key, raw_value) =
        split_once_unescaped(first_field, '=').ok_or_else(|| LineProtocolError::MalformedField(first_field.clone()))?;
    let value = parse_field_value(&raw_value)?;

    let time = match timestamp_part {
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| LineProtocolError::InvalidTimestamp(raw.clone()))?
            / 1_000_000,
        None => now_ms(),
    };

    Ok(with_default_context(item, property, time, 0, value))
}

fn parse_field_value(raw: &str) -> Result<Value, LineProtocolError> {
    if let Some(inner) = raw.strip_prefix('"') {
        let inner = inner.strip_suffix('"').ok_or(LineProtocolError::UnterminatedQuote)?;
        return Ok(Value::String(unescape(inner)));
    }
    if let Some(digits) = raw.strip_suffix('i') {
        return digits
            .parse::<i64>()
            .map(Value::Int64)
            .map_err(|_| LineProtocolError::InvalidIntegerField(raw.to_string()));
    }
    match raw {
        "t" | "true" | "T" | "True" => return Ok(Value::Bool(true)),
        "f" | "false" | "F" | "False" => return Ok(Value::Bool(false)),
        _ => {}
    }
    raw.parse::<f64>()
        .map(Value::Float64)
        .map_err(|_| LineProtocolError::InvalidNumericField(raw.to_string()))
}

/// Unescapes `\,`, `\=`, `\ `, `\"`, `\\` to their literal character, and
/// `\t` to an actual tab — the escape set spec §6 names for this format.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(',') => {
                out.push(',');
                chars.next();
            }
            Some('=') => {
                out.push('=');
                chars.next();
            }
            Some(' ') => {
                out.push(' ');
                chars.next();
            }
            Some('"') => {
                out.push('"');
                chars.next();
            }
            Some('\\') => {
                out.push('\\');
                chars.next();
            }
            Some('t') => {
                out.push('\t');
                chars.next();
            }
            _ => out.push('\\'),
        }
    }
    out
}

/// Splits `s` on unescaped occurrences of `sep`, never looking inside a
/// `"`-quoted run (used for the top-level space split, where quoted field
/// values may contain literal spaces).
fn split_unescaped_unquoted(s: &str, sep: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    let mut in_quotes = false;
    for c in s.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c == sep && !in_quotes => {
                out.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    out.push(current);
    out
}

/// Splits `s` on unescaped occurrences of `sep`, with no quote-awareness
/// (used for the tag set, which never contains quoted values).
fn split_unescaped(s: &str, sep: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        if c == '\\' {
            current.push(c);
            escaped = true;
        } else if c == sep {
            out.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    out.push(current);
    out
}

/// As [`split_unescaped`], but commas inside a `"`-quoted run do not split
/// (used for the field set, whose string values may contain literal
/// commas).
fn split_unescaped_unquoted_commas(s: &str) -> Result<Vec<String>, LineProtocolError> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    let mut in_quotes = false;
    for c in s.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => out.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    if in_quotes {
        return Err(LineProtocolError::UnterminatedQuote);
    }
    out.push(current);
    Ok(out)
}

/// Splits `s` at the first unescaped `sep`, returning `(before, after)`.
fn split_once_unescaped(s: &str, sep: char) -> Option<(String, String)> {
    let mut escaped = false;
    let chars: Vec<char> = s.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
        } else if c == sep {
            let before: String = chars[..i].iter().collect();
            let after: String = chars[i + 1..].iter().collect();
            return Some((before, after));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s1_int_field_with_default_timestamp() {
        let tuple = parse_line("http://example.org/p,item=http://example.org/i value=42i", || 1_700_000_000).unwrap();
        assert_eq!(tuple.item, "http://example.org/i");
        assert_eq!(tuple.property, "http://example.org/p");
        assert_eq!(tuple.time, 1_700_000_000);
        assert_eq!(tuple.value, Value::Int64(42));
    }

    #[test]
    fn explicit_nanosecond_timestamp_divides_to_milliseconds() {
        let tuple = parse_line(
            "http://example.org/p,item=http://example.org/i value=1 1529592952925259295",
            || 0,
        )
        .unwrap();
        assert_eq!(tuple.time, 1_529_592_952_925);
    }

    #[test]
    fn double_field_without_suffix() {
        let tuple = parse_line("http://example.org/p,item=http://example.org/i value=3.5", || 0).unwrap();
        assert_eq!(tuple.value, Value::Float64(3.5));
    }

    #[test]
    fn boolean_fields() {
        let t = parse_line("http://example.org/p,item=http://example.org/i value=t", || 0).unwrap();
        assert_eq!(t.value, Value::Bool(true));
        let f = parse_line("http://example.org/p,item=http://example.org/i value=f", || 0).unwrap();
        assert_eq!(f.value, Value::Bool(false));
    }

    #[test]
    fn quoted_string_field_with_escaped_comma_and_space() {
        let tuple = parse_line(
            r#"http://example.org/p,item=http://example.org/i value="a\,b\ c""#,
            || 0,
        )
        .unwrap();
        assert_eq!(tuple.value, Value::String("a,b c".to_string()));
    }

    #[test]
    fn missing_item_tag_is_an_error() {
        let result = parse_line("http://example.org/p value=1", || 0);
        assert!(matches!(result, Err(LineProtocolError::MissingItemTag)));
    }
}
