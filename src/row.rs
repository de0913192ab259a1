// Copyright (c) 2024-present, tuple-archive contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The on-disk row format (spec §3, §6): `(id: bytes[24], time, seqNr,
//! valueInt?, valueLong?, valueFloat?, valueDouble?, valueString?,
//! valueBool?, valueObject?)`, backed directly by the `parquet` crate's
//! low-level column-writer API (no DataFusion/Arrow in the write path —
//! the row schema is fixed and small enough that hand-written column
//! buffers are simpler and give us direct control over row-group sizing,
//! which the spec pins to a byte budget rather than a row count).

use crate::error::{Error, Result};
use crate::partition::KEY_LEN;
use crate::value::{self, Value};
use parquet::basic::{Compression, ZstdLevel};
use parquet::column::reader::ColumnReader;
use parquet::data_type::{
    BoolType, ByteArray, ByteArrayType, DoubleType, FixedLenByteArray, FixedLenByteArrayType,
    FloatType, Int32Type, Int64Type,
};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::statistics::Statistics;
use parquet::file::writer::{SerializedColumnWriter, SerializedFileWriter};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// A single on-disk row, decoded back into its typed value.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub id: [u8; KEY_LEN],
    pub time: i64,
    pub seq_nr: i32,
    pub value: Value,
}

const SCHEMA_TEXT: &str = r#"
message row {
    REQUIRED FIXED_LEN_BYTE_ARRAY (24) id;
    REQUIRED INT64 time;
    REQUIRED INT32 seqNr;
    OPTIONAL INT32 valueInt;
    OPTIONAL INT64 valueLong;
    OPTIONAL FLOAT valueFloat;
    OPTIONAL DOUBLE valueDouble;
    OPTIONAL BYTE_ARRAY valueString (UTF8);
    OPTIONAL BOOLEAN valueBool;
    OPTIONAL BYTE_ARRAY valueObject;
}
"#;

/// Column ordinals, matching [`SCHEMA_TEXT`]'s declaration order.
mod col {
    pub const ID: usize = 0;
    pub const TIME: usize = 1;
    pub const SEQ_NR: usize = 2;
    pub const VALUE_INT: usize = 3;
    pub const VALUE_LONG: usize = 4;
    pub const VALUE_FLOAT: usize = 5;
    pub const VALUE_DOUBLE: usize = 6;
    pub const VALUE_STRING: usize = 7;
    pub const VALUE_BOOL: usize = 8;
    pub const VALUE_OBJECT: usize = 9;
    pub const COUNT: usize = 10;
}

/// Tuning knobs for [`RowWriter`], mirroring spec §4.4's writer settings.
#[derive(Clone, Copy, Debug)]
pub struct WriterSettings {
    pub row_group_size_bytes: usize,
    pub page_size_bytes: usize,
    pub dictionary_page_size_bytes: usize,
    pub zstd_level: i32,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            row_group_size_bytes: 1024 * 1024,
            page_size_bytes: 8 * 1024,
            dictionary_page_size_bytes: 1024 * 1024,
            zstd_level: 12,
        }
    }
}

fn writer_properties(settings: WriterSettings) -> Result<WriterProperties> {
    let level = ZstdLevel::try_new(settings.zstd_level)?;
    Ok(WriterProperties::builder()
        .set_compression(Compression::ZSTD(level))
        .set_dictionary_enabled(true)
        .set_data_page_size_limit(settings.page_size_bytes)
        .set_dictionary_page_size_limit(settings.dictionary_page_size_bytes)
        .build())
}

/// Buffers rows and flushes row groups once the accumulated, roughly
/// estimated byte size crosses [`WriterSettings::row_group_size_bytes`].
/// Always produces at least one (possibly empty) row group so the file is
/// valid parquet even if no rows were ever written.
pub struct RowWriter {
    inner: SerializedFileWriter<File>,
    settings: WriterSettings,
    buffer: Vec<Row>,
    buffered_bytes: usize,
}

impl RowWriter {
    pub fn create(path: &Path, settings: WriterSettings) -> Result<Self> {
        let schema = Arc::new(parquet::schema::parser::parse_message_type(SCHEMA_TEXT)?);
        let props = Arc::new(writer_properties(settings)?);
        let file = File::create(path)?;
        let inner = SerializedFileWriter::new(file, schema, props)?;
        Ok(Self {
            inner,
            settings,
            buffer: Vec::new(),
            buffered_bytes: 0,
        })
    }

    /// Appends one row; encodes `Record`/`Uri`/`BigInteger`/`BigDecimal`/
    /// `Short` via the value codec (§4.2) into the `valueObject` column.
    pub fn write_row(&mut self, row: Row) -> Result<()> {
        self.buffered_bytes += estimate_row_bytes(&row);
        self.buffer.push(row);
        if self.buffered_bytes >= self.settings.row_group_size_bytes {
            self.flush_row_group()?;
        }
        Ok(())
    }

    fn flush_row_group(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut self.buffer);
        self.buffered_bytes = 0;
        write_row_group(&mut self.inner, &rows)?;
        Ok(())
    }

    /// Finalizes the file, flushing any buffered rows into a final row
    /// group first.
    pub fn finish(mut self) -> Result<()> {
        self.flush_row_group()?;
        self.inner.close()?;
        Ok(())
    }
}

fn estimate_row_bytes(row: &Row) -> usize {
    const FIXED_OVERHEAD: usize = KEY_LEN + 8 + 4;
    FIXED_OVERHEAD
        + match &row.value {
            Value::String(s) => s.len(),
            Value::Record(_) | Value::Uri(_) | Value::BigInteger(_) | Value::BigDecimal(..) => {
                value::encode(&row.value).map(|b| b.len()).unwrap_or(16)
            }
            _ => 8,
        }
}

fn is_object_value(value: &Value) -> bool {
    matches!(
        value,
        Value::Record(_)
            | Value::Uri(_)
            | Value::BigInteger(_)
            | Value::BigDecimal(..)
            | Value::Short(_)
    )
}

fn write_row_group(writer: &mut SerializedFileWriter<File>, rows: &[Row]) -> Result<()> {
    let mut row_group_writer = writer.next_row_group()?;
    let mut col_idx = 0;
    while let Some(mut column_writer) = row_group_writer.next_column()? {
        write_column(&mut column_writer, col_idx, rows)?;
        column_writer.close()?;
        col_idx += 1;
    }
    row_group_writer.close()?;
    Ok(())
}

/// Builds the `(values, def_levels)` pair the typed column writer API
/// expects: `values` holds only the present entries, `def_levels` is one
/// entry per row (`1` = present, `0` = null).
fn optional_levels<T>(rows: &[Row], f: impl Fn(&Row) -> Option<T>) -> (Vec<T>, Vec<i16>) {
    let mut values = Vec::new();
    let mut def_levels = Vec::with_capacity(rows.len());
    for row in rows {
        match f(row) {
            Some(v) => {
                values.push(v);
                def_levels.push(1);
            }
            None => def_levels.push(0),
        }
    }
    (values, def_levels)
}

/// Writes one column's worth of values for `rows` into `writer`. `col_idx`
/// must agree with [`SCHEMA_TEXT`]'s declaration order (see [`col`]) —
/// `typed::<T>()` panics on a physical-type mismatch, so the match arms
/// below are the single place that pairing is allowed to be decided.
fn write_column(writer: &mut SerializedColumnWriter<'_>, col_idx: usize, rows: &[Row]) -> Result<()> {
    match col_idx {
        c if c == col::ID => {
            let values: Vec<FixedLenByteArray> = rows
                .iter()
                .map(|r| FixedLenByteArray::from(ByteArray::from(r.id.to_vec())))
                .collect();
            writer.typed::<FixedLenByteArrayType>().write_batch(&values, None, None)?;
        }
        c if c == col::TIME => {
            let values: Vec<i64> = rows.iter().map(|r| r.time).collect();
            writer.typed::<Int64Type>().write_batch(&values, None, None)?;
        }
        c if c == col::SEQ_NR => {
            let values: Vec<i32> = rows.iter().map(|r| r.seq_nr).collect();
            writer.typed::<Int32Type>().write_batch(&values, None, None)?;
        }
        c if c == col::VALUE_INT => {
            let (values, defs) = optional_levels(rows, |r| match r.value {
                Value::Int32(v) => Some(v),
                _ => None,
            });
            writer.typed::<Int32Type>().write_batch(&values, Some(&defs), None)?;
        }
        c if c == col::VALUE_LONG => {
            let (values, defs) = optional_levels(rows, |r| match r.value {
                Value::Int64(v) => Some(v),
                _ => None,
            });
            writer.typed::<Int64Type>().write_batch(&values, Some(&defs), None)?;
        }
        c if c == col::VALUE_FLOAT => {
            let (values, defs) = optional_levels(rows, |r| match r.value {
                Value::Float32(v) => Some(v),
                _ => None,
            });
            writer.typed::<FloatType>().write_batch(&values, Some(&defs), None)?;
        }
        c if c == col::VALUE_DOUBLE => {
            let (values, defs) = optional_levels(rows, |r| match r.value {
                Value::Float64(v) => Some(v),
                _ => None,
            });
            writer.typed::<DoubleType>().write_batch(&values, Some(&defs), None)?;
        }
        c if c == col::VALUE_STRING => {
            let (values, defs) = optional_levels(rows, |r| match &r.value {
                Value::String(s) => Some(ByteArray::from(s.as_bytes().to_vec())),
                _ => None,
            });
            writer.typed::<ByteArrayType>().write_batch(&values, Some(&defs), None)?;
        }
        c if c == col::VALUE_BOOL => {
            let (values, defs) = optional_levels(rows, |r| match r.value {
                Value::Bool(v) => Some(v),
                _ => None,
            });
            writer.typed::<BoolType>().write_batch(&values, Some(&defs), None)?;
        }
        c if c == col::VALUE_OBJECT => {
            let (values, defs) = optional_levels(rows, |r| {
                is_object_value(&r.value).then(|| {
                    let bytes = value::encode(&r.value).unwrap_or_default();
                    ByteArray::from(bytes)
                })
            });
            writer.typed::<ByteArrayType>().write_batch(&values, Some(&defs), None)?;
        }
        other => {
            return Err(Error::InvariantViolation(format!(
                "unexpected column writer at ordinal {other}"
            )))
        }
    }
    Ok(())
}

/// A row-group-granular predicate over the `id` column, used both to prune
/// whole row groups via column-chunk statistics and to filter individual
/// rows within a surviving group (spec §4.5's "predicate pushdown").
#[derive(Clone, Debug)]
pub enum IdPredicate {
    /// Exact 24-byte equality (both `property` and `context` were
    /// supplied).
    Equals([u8; KEY_LEN]),
    /// Lexicographic range over the 16-byte item+property prefix (a
    /// `property` but no `context` was supplied; `context` is wildcard).
    ItemPropertyPrefixRange { low: [u8; 16], high_exclusive: [u8; 16] },
    /// Lexicographic range over the 8-byte item-id prefix (neither
    /// `property` nor `context` was supplied).
    ItemPrefixRange { low: [u8; 8], high_exclusive: [u8; 8] },
    /// Item and context pinned, `property` wildcard. The property id sits
    /// between the item and context ids in the 24-byte key, so this is
    /// *not* a contiguous lexicographic range and needs its own exact
    /// per-segment match rather than a `low..high_exclusive` pair.
    ItemContextMatch { item: [u8; 8], context: [u8; 8] },
}

impl IdPredicate {
    fn matches(&self, id: &[u8]) -> bool {
        match self {
            Self::Equals(expected) => id == expected.as_slice(),
            Self::ItemPropertyPrefixRange {
                low,
                high_exclusive,
            } => &id[0..16] >= low.as_slice() && &id[0..16] < high_exclusive.as_slice(),
            Self::ItemPrefixRange {
                low,
                high_exclusive,
            } => &id[0..8] >= low.as_slice() && &id[0..8] < high_exclusive.as_slice(),
            Self::ItemContextMatch { item, context } => {
                &id[0..8] == item.as_slice() && &id[16..24] == context.as_slice()
            }
        }
    }

    /// Whether a row group whose `id` column statistics span
    /// `[min, max]` could possibly contain a matching row. Used to skip
    /// whole row groups without reading them.
    fn could_match_range(&self, min: &[u8], max: &[u8]) -> bool {
        match self {
            Self::Equals(expected) => {
                expected.as_slice() >= min && expected.as_slice() <= max
            }
            Self::ItemPropertyPrefixRange {
                low,
                high_exclusive,
            } => &max[0..16] >= low.as_slice() && &min[0..16] < high_exclusive.as_slice(),
            Self::ItemPrefixRange {
                low,
                high_exclusive,
            } => &max[0..8] >= low.as_slice() && &min[0..8] < high_exclusive.as_slice(),
            Self::ItemContextMatch { item, .. } => {
                // The context id isn't contiguous with the item id in the
                // 24-byte key, so a row group's [min, max] statistics can't
                // bound it directly; only the item-id containment check is
                // a sound (if coarser) row-group-level filter here. The
                // per-row `matches` check above still enforces the exact
                // context match.
                item.as_slice() >= &min[0..8] && item.as_slice() <= &max[0..8]
            }
        }
    }
}

/// Reads the rows of one `data.parquet` file matching `predicate`, pruning
/// whole row groups via the `id` column's min/max statistics before
/// decoding any rows.
pub fn read_rows(path: &Path, predicate: &IdPredicate) -> Result<Vec<Row>> {
    let file = File::open(path)?;
    let reader = SerializedFileReader::new(file)?;
    let metadata = reader.metadata();
    let mut out = Vec::new();

    for group_idx in 0..metadata.num_row_groups() {
        let group_meta = metadata.row_group(group_idx);
        if let Some(stats) = group_meta.column(col::ID).statistics() {
            if let Statistics::FixedLenByteArray(s) = stats {
                if let (Some(min), Some(max)) = (s.min_opt(), s.max_opt()) {
                    if !predicate.could_match_range(min.data(), max.data()) {
                        continue;
                    }
                }
            }
        }

        let row_group_reader = reader.get_row_group(group_idx)?;
        let num_rows = group_meta.num_rows() as usize;
        out.extend(read_row_group(row_group_reader.as_ref(), num_rows, predicate)?);
    }

    Ok(out)
}

/// Estimates the number of rows in `path` that could match `predicate`,
/// using only row-group `id` statistics — never decoding a single row.
/// Used by `approximate_size` (spec §4.1), which is explicitly an estimate
/// (§1 Non-goals: "exact cardinality counts" is out of scope), so a
/// row-group whose statistics are ambiguous is counted in full rather than
/// decoded to find out.
pub fn estimate_matching_rows(path: &Path, predicate: &IdPredicate) -> Result<u64> {
    let file = File::open(path)?;
    let reader = SerializedFileReader::new(file)?;
    let metadata = reader.metadata();
    let mut total = 0u64;

    for group_idx in 0..metadata.num_row_groups() {
        let group_meta = metadata.row_group(group_idx);
        let could_match = match group_meta.column(col::ID).statistics() {
            Some(Statistics::FixedLenByteArray(s)) => match (s.min_opt(), s.max_opt()) {
                (Some(min), Some(max)) => predicate.could_match_range(min.data(), max.data()),
                _ => true,
            },
            _ => true,
        };
        if could_match {
            total += group_meta.num_rows() as u64;
        }
    }

    Ok(total)
}

/// The total row count of a data file, ignoring any predicate — used by
/// `approximate_size` when the caller gave no `item` to prune by.
pub fn count_rows(path: &Path) -> Result<u64> {
    let file = File::open(path)?;
    let reader = SerializedFileReader::new(file)?;
    Ok(reader.metadata().file_metadata().num_rows() as u64)
}

fn read_row_group(
    group: &dyn parquet::file::reader::RowGroupReader,
    num_rows: usize,
    predicate: &IdPredicate,
) -> Result<Vec<Row>> {
    let mut ids = vec![[0u8; KEY_LEN]; num_rows];
    let mut times = vec![0i64; num_rows];
    let mut seq_nrs = vec![0i32; num_rows];
    let mut value_int: Vec<Option<i32>> = vec![None; num_rows];
    let mut value_long: Vec<Option<i64>> = vec![None; num_rows];
    let mut value_float: Vec<Option<f32>> = vec![None; num_rows];
    let mut value_double: Vec<Option<f64>> = vec![None; num_rows];
    let mut value_string: Vec<Option<String>> = vec![None; num_rows];
    let mut value_bool: Vec<Option<bool>> = vec![None; num_rows];
    let mut value_object: Vec<Option<Vec<u8>>> = vec![None; num_rows];

    for c in 0..col::COUNT {
        let col_reader = group.get_column_reader(c)?;
        read_into_column(col_reader, c, num_rows, &mut ids, &mut times, &mut seq_nrs,
            &mut value_int, &mut value_long, &mut value_float, &mut value_double,
            &mut value_string, &mut value_bool, &mut value_object)?;
    }

    let mut rows = Vec::with_capacity(num_rows);
    for i in 0..num_rows {
        if !predicate.matches(&ids[i]) {
            continue;
        }
        let value = if let Some(v) = value_int[i] {
            Value::Int32(v)
        } else if let Some(v) = value_long[i] {
            Value::Int64(v)
        } else if let Some(v) = value_float[i] {
            Value::Float32(v)
        } else if let Some(v) = value_double[i] {
            Value::Float64(v)
        } else if let Some(v) = value_string.get(i).cloned().flatten() {
            Value::String(v)
        } else if let Some(v) = value_bool[i] {
            Value::Bool(v)
        } else if let Some(bytes) = value_object.get(i).cloned().flatten() {
            match value::decode(&bytes) {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("skipping row with undecodable valueObject: {e}");
                    continue;
                }
            }
        } else {
            log::warn!("skipping row with no populated value column");
            continue;
        };

        rows.push(Row {
            id: ids[i],
            time: times[i],
            seq_nr: seq_nrs[i],
            value,
        });
    }

    Ok(rows)
}

#[allow(clippy::too_many_arguments)]
fn read_into_column(
    reader: ColumnReader,
    col_idx: usize,
    num_rows: usize,
    ids: &mut [[u8; KEY_LEN]],
    times: &mut [i64],
    seq_nrs: &mut [i32],
    value_int: &mut [Option<i32>],
    value_long: &mut [Option<i64>],
    value_float: &mut [Option<f32>],
    value_double: &mut [Option<f64>],
    value_string: &mut [Option<String>],
    value_bool: &mut [Option<bool>],
    value_object: &mut [Option<Vec<u8>>],
) -> Result<()> {
    match (reader, col_idx) {
        (ColumnReader::FixedLenByteArrayColumnReader(mut r), c) if c == col::ID => {
            let mut values = vec![FixedLenByteArray::default(); num_rows];
            let (count, _, _) = r.read_records(num_rows, None, None, &mut values)?;
            for i in 0..count {
                ids[i].copy_from_slice(values[i].data());
            }
        }
        (ColumnReader::Int64ColumnReader(mut r), c) if c == col::TIME => {
            let (_, _, _) = r.read_records(num_rows, None, None, times)?;
        }
        (ColumnReader::Int32ColumnReader(mut r), c) if c == col::SEQ_NR => {
            let (_, _, _) = r.read_records(num_rows, None, None, seq_nrs)?;
        }
        (ColumnReader::Int32ColumnReader(mut r), c) if c == col::VALUE_INT => {
            read_optional_column(&mut r, num_rows, value_int)?;
        }
        (ColumnReader::Int64ColumnReader(mut r), c) if c == col::VALUE_LONG => {
            read_optional_column(&mut r, num_rows, value_long)?;
        }
        (ColumnReader::FloatColumnReader(mut r), c) if c == col::VALUE_FLOAT => {
            read_optional_column(&mut r, num_rows, value_float)?;
        }
        (ColumnReader::DoubleColumnReader(mut r), c) if c == col::VALUE_DOUBLE => {
            read_optional_column(&mut r, num_rows, value_double)?;
        }
        (ColumnReader::ByteArrayColumnReader(mut r), c) if c == col::VALUE_STRING => {
            let mut raw: Vec<Option<ByteArray>> = vec![None; num_rows];
            read_optional_column(&mut r, num_rows, &mut raw)?;
            for (slot, v) in value_string.iter_mut().zip(raw) {
                *slot = v.and_then(|b| String::from_utf8(b.data().to_vec()).ok());
            }
        }
        (ColumnReader::BoolColumnReader(mut r), c) if c == col::VALUE_BOOL => {
            read_optional_column(&mut r, num_rows, value_bool)?;
        }
        (ColumnReader::ByteArrayColumnReader(mut r), c) if c == col::VALUE_OBJECT => {
            let mut raw: Vec<Option<ByteArray>> = vec![None; num_rows];
            read_optional_column(&mut r, num_rows, &mut raw)?;
            for (slot, v) in value_object.iter_mut().zip(raw) {
                *slot = v.map(|b| b.data().to_vec());
            }
        }
        (_, other) => {
            return Err(Error::InvariantViolation(format!(
                "unexpected column reader at ordinal {other}"
            )))
        }
    }
    Ok(())
}

/// Reads an OPTIONAL column's `num_rows` logical rows into `out`, using
/// definition levels to place `None` where the column was null.
fn read_optional_column<T: Clone + Default>(
    reader: &mut impl OptionalTypedReader<T>,
    num_rows: usize,
    out: &mut [Option<T>],
) -> Result<()> {
    let mut values = vec![T::default(); num_rows];
    let mut def_levels = vec![0i16; num_rows];
    let (_, levels_read) = reader.read_records_with_defs(num_rows, &mut def_levels, &mut values)?;
    let _ = levels_read;

    let mut value_idx = 0;
    for (i, slot) in out.iter_mut().enumerate() {
        if def_levels[i] == 1 {
            *slot = Some(values[value_idx].clone());
            value_idx += 1;
        } else {
            *slot = None;
        }
    }
    Ok(())
}

/// Bridges the various `ColumnReaderImpl<T>` inherent `read_records`
/// signatures (which differ only by `T`) behind one trait so
/// [`read_optional_column`] can stay generic.
trait OptionalTypedReader<T> {
    fn read_records_with_defs(
        &mut self,
        max_records: usize,
        def_levels: &mut [i16],
        values: &mut [T],
    ) -> Result<(usize, usize)>;
}

macro_rules! impl_optional_typed_reader {
    ($reader_ty:ty, $t:ty) => {
        impl OptionalTypedReader<$t> for $reader_ty {
            fn read_records_with_defs(
                &mut self,
                max_records: usize,
                def_levels: &mut [i16],
                values: &mut [$t],
            ) -> Result<(usize, usize)> {
                let (records_read, levels_read, _) =
                    self.read_records(max_records, Some(def_levels), None, values)?;
                Ok((records_read, levels_read))
            }
        }
    };
}

impl_optional_typed_reader!(parquet::column::reader::ColumnReaderImpl<parquet::data_type::Int32Type>, i32);
impl_optional_typed_reader!(parquet::column::reader::ColumnReaderImpl<parquet::data_type::Int64Type>, i64);
impl_optional_typed_reader!(parquet::column::reader::ColumnReaderImpl<parquet::data_type::FloatType>, f32);
impl_optional_typed_reader!(parquet::column::reader::ColumnReaderImpl<parquet::data_type::DoubleType>, f64);
impl_optional_typed_reader!(parquet::column::reader::ColumnReaderImpl<parquet::data_type::BoolType>, bool);
impl_optional_typed_reader!(parquet::column::reader::ColumnReaderImpl<parquet::data_type::ByteArrayType>, ByteArray);

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_row(id_item: u64, time: i64, value: Value) -> Row {
        let key = crate::partition::PartitionKey::new(id_item, 1, 1);
        Row {
            id: key.to_bytes(),
            time,
            seq_nr: 0,
            value,
        }
    }

    #[test]
    fn write_then_read_back_scalars() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.parquet");
        let mut writer = RowWriter::create(&path, WriterSettings::default()).unwrap();
        writer.write_row(sample_row(1, 10, Value::Int64(42))).unwrap();
        writer.write_row(sample_row(1, 20, Value::String("hi".into()))).unwrap();
        writer.finish().unwrap();

        let key = crate::partition::PartitionKey::new(1, 1, 1);
        let predicate = IdPredicate::Equals(key.to_bytes());
        let rows = read_rows(&path, &predicate).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, Value::Int64(42));
        assert_eq!(rows[1].value, Value::String("hi".into()));
    }

    #[test]
    fn write_then_read_back_record_value() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.parquet");
        let mut writer = RowWriter::create(&path, WriterSettings::default()).unwrap();
        let mut record = crate::value::Record::new();
        record.push("p", Value::Int32(1));
        writer.write_row(sample_row(9, 1, Value::Record(record.clone()))).unwrap();
        writer.finish().unwrap();

        let key = crate::partition::PartitionKey::new(9, 1, 1);
        let predicate = IdPredicate::Equals(key.to_bytes());
        let rows = read_rows(&path, &predicate).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, Value::Record(record));
    }

    #[test]
    fn item_prefix_range_filters_other_items() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.parquet");
        let mut writer = RowWriter::create(&path, WriterSettings::default()).unwrap();
        writer.write_row(sample_row(1, 1, Value::Int32(1))).unwrap();
        writer.write_row(sample_row(2, 1, Value::Int32(2))).unwrap();
        writer.finish().unwrap();

        let predicate = IdPredicate::ItemPrefixRange {
            low: 1u64.to_be_bytes(),
            high_exclusive: 2u64.to_be_bytes(),
        };
        let rows = read_rows(&path, &predicate).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, Value::Int32(1));
    }
}
