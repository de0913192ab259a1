// Copyright (c) 2024-present, tuple-archive contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The partition key codec and two-level directory layout (spec §4.7, §6).
//!
//! A partition key `P = (itemId, propertyId, contextId)` is 24 bytes,
//! big-endian, compared lexicographically. A week (leaf) directory is
//! named `encode(Pmin)_encode(Pmax)`; a year directory adds a `_YYYY`
//! suffix. `encode` reads the 24 bytes as one unsigned 192-bit big-endian
//! integer and renders it as a decimal string, so directory names sort
//! lexicographically by length then content.

use byteorder::{BigEndian, ByteOrder};

/// Byte width of a serialized partition key: three 8-byte ids.
pub const KEY_LEN: usize = 24;

/// A composite `(itemId, propertyId, contextId)` partition key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey {
    pub item_id: u64,
    pub property_id: u64,
    pub context_id: u64,
}

impl PartitionKey {
    #[must_use]
    pub fn new(item_id: u64, property_id: u64, context_id: u64) -> Self {
        Self {
            item_id,
            property_id,
            context_id,
        }
    }

    /// Serializes to the 24-byte big-endian row id.
    #[must_use]
    pub fn to_bytes(self) -> [u8; KEY_LEN] {
        let mut buf = [0u8; KEY_LEN];
        BigEndian::write_u64(&mut buf[0..8], self.item_id);
        BigEndian::write_u64(&mut buf[8..16], self.property_id);
        BigEndian::write_u64(&mut buf[16..24], self.context_id);
        buf
    }

    #[must_use]
    pub fn from_bytes(bytes: &[u8; KEY_LEN]) -> Self {
        Self {
            item_id: BigEndian::read_u64(&bytes[0..8]),
            property_id: BigEndian::read_u64(&bytes[8..16]),
            context_id: BigEndian::read_u64(&bytes[16..24]),
        }
    }

    /// Renders this key as the decimal-string directory-name component
    /// (§4.7's `encode`): the 24 bytes read as one unsigned 192-bit
    /// big-endian integer.
    #[must_use]
    pub fn encode(self) -> String {
        encode_u192_decimal(&self.to_bytes())
    }

    /// Parses a directory-name component back into a key (§4.7's
    /// `decode`). Returns `None` if `name` is not a valid decimal
    /// rendering of a 192-bit value — such directories are not data
    /// directories and the fetch engine skips them silently.
    #[must_use]
    pub fn decode(name: &str) -> Option<Self> {
        let bytes = decode_u192_decimal(name)?;
        Some(Self::from_bytes(&bytes))
    }
}

/// Renders 24 big-endian bytes as an unsigned decimal string via repeated
/// long division by 10 — there is no native 192-bit integer type, so this
/// operates directly on the byte buffer.
fn encode_u192_decimal(bytes: &[u8; KEY_LEN]) -> String {
    let mut digits = Vec::new();
    let mut scratch = *bytes;

    if scratch.iter().all(|b| *b == 0) {
        return "0".to_string();
    }

    while scratch.iter().any(|b| *b != 0) {
        let mut remainder: u32 = 0;
        for byte in &mut scratch {
            let acc = (remainder << 8) | u32::from(*byte);
            *byte = (acc / 10) as u8;
            remainder = acc % 10;
        }
        digits.push(b'0' + remainder as u8);
    }

    digits.reverse();
    String::from_utf8(digits).expect("ASCII digits are valid UTF-8")
}

/// Inverse of [`encode_u192_decimal`]: parses a decimal string into 24
/// big-endian bytes via repeated multiply-and-add, rejecting anything that
/// is not all-ASCII-digit or that overflows 192 bits.
fn decode_u192_decimal(s: &str) -> Option<[u8; KEY_LEN]> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut bytes = [0u8; KEY_LEN];
    for ch in s.bytes() {
        let digit = u32::from(ch - b'0');

        let mut carry = digit;
        for byte in bytes.iter_mut().rev() {
            let acc = u32::from(*byte) * 10 + carry;
            *byte = (acc & 0xFF) as u8;
            carry = acc >> 8;
        }
        if carry != 0 {
            return None; // overflowed 192 bits
        }
    }
    Some(bytes)
}

/// A parsed leaf (week) directory name: `<encode(min)>_<encode(max)>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeekRange {
    pub min: PartitionKey,
    pub max: PartitionKey,
}

impl WeekRange {
    /// Parses a week directory's file name. Returns `None` for anything
    /// that is not a non-data directory per §4.7 — the caller skips it
    /// silently (or logs an `InvariantViolation` if desired).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let (min_str, max_str) = name.split_once('_')?;
        let min = PartitionKey::decode(min_str)?;
        let max = PartitionKey::decode(max_str)?;
        Some(Self { min, max })
    }

    #[must_use]
    pub fn dir_name(&self) -> String {
        format!("{}_{}", self.min.encode(), self.max.encode())
    }

    /// True iff `Pmin ≤ Pmax` lexicographically (spec §3 invariant).
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.min <= self.max
    }
}

/// A parsed year directory name: `<encode(min)>_<encode(max)>_<YYYY>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct YearRange {
    pub min: PartitionKey,
    pub max: PartitionKey,
    pub year: i32,
}

impl YearRange {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let mut parts = name.rsplitn(2, '_');
        let year_str = parts.next()?;
        let rest = parts.next()?;
        let year: i32 = year_str.parse().ok()?;
        let (min_str, max_str) = rest.split_once('_')?;
        let min = PartitionKey::decode(min_str)?;
        let max = PartitionKey::decode(max_str)?;
        Some(Self { min, max, year })
    }

    #[must_use]
    pub fn dir_name(&self) -> String {
        format!("{}_{}_{}", self.min.encode(), self.max.encode(), self.year)
    }

    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.min <= self.max
    }

    /// True iff `week`'s range is contained componentwise within this
    /// year's range (spec §8 testable property 3).
    #[must_use]
    pub fn contains_week(&self, week: &WeekRange) -> bool {
        self.min.item_id <= week.min.item_id
            && self.min.property_id <= week.min.property_id
            && self.min.context_id <= week.min.context_id
            && week.max.item_id <= self.max.item_id
            && week.max.property_id <= self.max.property_id
            && week.max.context_id <= self.max.context_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_roundtrip_zero() {
        let key = PartitionKey::new(0, 0, 0);
        assert_eq!(key.encode(), "0");
        assert_eq!(PartitionKey::decode("0"), Some(key));
    }

    #[test]
    fn decimal_roundtrip_nontrivial() {
        let key = PartitionKey::new(1, 2, 3);
        let encoded = key.encode();
        assert_eq!(PartitionKey::decode(&encoded), Some(key));
    }

    #[test]
    fn decimal_roundtrip_max() {
        let key = PartitionKey::new(u64::MAX, u64::MAX, u64::MAX);
        let encoded = key.encode();
        assert_eq!(PartitionKey::decode(&encoded), Some(key));
    }

    #[test]
    fn malformed_names_are_rejected() {
        assert_eq!(PartitionKey::decode("not_a_number"), None);
        assert_eq!(PartitionKey::decode(""), None);
        assert_eq!(PartitionKey::decode("12abc"), None);
    }

    #[test]
    fn week_range_parses_and_renders() {
        let min = PartitionKey::new(1, 1, 1);
        let max = PartitionKey::new(5, 5, 5);
        let range = WeekRange { min, max };
        let name = range.dir_name();
        assert_eq!(WeekRange::parse(&name), Some(range));
        assert!(range.is_well_formed());
    }

    #[test]
    fn year_range_parses_and_renders() {
        let min = PartitionKey::new(1, 1, 1);
        let max = PartitionKey::new(5, 5, 5);
        let range = YearRange { min, max, year: 2024 };
        let name = range.dir_name();
        assert_eq!(YearRange::parse(&name), Some(range));
    }

    #[test]
    fn year_range_malformed_skipped() {
        assert_eq!(YearRange::parse("garbage"), None);
        assert_eq!(YearRange::parse("1_2_notayear"), None);
    }

    #[test]
    fn containment_holds_and_is_detected() {
        let year = YearRange {
            min: PartitionKey::new(1, 1, 1),
            max: PartitionKey::new(10, 10, 10),
            year: 2024,
        };
        let week_in = WeekRange {
            min: PartitionKey::new(2, 2, 2),
            max: PartitionKey::new(8, 8, 8),
        };
        let week_out = WeekRange {
            min: PartitionKey::new(0, 2, 2),
            max: PartitionKey::new(8, 8, 8),
        };
        assert!(year.contains_week(&week_in));
        assert!(!year.contains_week(&week_out));
    }
}
