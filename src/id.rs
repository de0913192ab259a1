// Copyright (c) 2024-present, tuple-archive contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The id mapper (spec §4.3): URI ↔ dense `u64` id, one table per role
//! (item / property / context), backed by a small two-column parquet file
//! under `metadata/`.
//!
//! Each [`MappingTable`] keeps its entire contents in memory — bootstrapped
//! from disk at [`MappingTable::open`] and rewritten atomically on
//! [`MappingTable::flush`] — rather than re-scanning the file on every
//! lookup. This is what lets `put` resolve ids through a single mutex
//! acquisition per tuple and still uphold the durability contract ("mapping
//! files updated" by the time `put` returns) without the O(n²) cost of
//! rewriting the file on every single new URI.

use crate::error::Result;
use crate::partition::PartitionKey;
use parquet::basic::Compression;
use parquet::data_type::{ByteArray, ByteArrayType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::writer::SerializedFileWriter;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// The three id-mapper roles, each with its own file and column names
/// (spec §6's `itemMapping.parquet` / `propertyMapping.parquet` /
/// `contextMapping.parquet`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Item,
    Property,
    Context,
}

impl Role {
    fn file_name(self) -> &'static str {
        match self {
            Self::Item => "itemMapping.parquet",
            Self::Property => "propertyMapping.parquet",
            Self::Context => "contextMapping.parquet",
        }
    }

    fn id_column(self) -> &'static str {
        match self {
            Self::Item => "itemId",
            Self::Property => "propertyId",
            Self::Context => "contextId",
        }
    }

    fn value_column(self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Property => "property",
            Self::Context => "context",
        }
    }
}

struct Inner {
    by_value: HashMap<String, u64>,
    /// `by_id[0]` is unused filler; mapping ids start at 1 (spec §3).
    by_id: Vec<String>,
    next_id: u64,
    dirty: bool,
}

/// One role's URI ↔ id table, bootstrapped from and flushed back to its
/// mapping file.
pub struct MappingTable {
    path: PathBuf,
    role: Role,
    inner: Mutex<Inner>,
}

impl MappingTable {
    /// Loads `<archive_root>/metadata/<role file>`, creating it empty if
    /// absent, and replays it into the write-side map (§4.3's startup
    /// bootstrap, resolving §9's open question in favor of resuming ids
    /// across restarts rather than starting every process at 0).
    pub fn open(metadata_dir: &Path, role: Role) -> Result<Self> {
        let path = metadata_dir.join(role.file_name());
        let entries = if path.exists() {
            read_mapping_file(&path, role)?
        } else {
            Vec::new()
        };

        let mut by_value = HashMap::with_capacity(entries.len());
        let mut by_id = vec![String::new()];
        let mut max_id = 0u64;
        for (id, value) in entries {
            max_id = max_id.max(id);
            by_value.insert(value.clone(), id);
            if by_id.len() <= id as usize {
                by_id.resize(id as usize + 1, String::new());
            }
            by_id[id as usize] = value;
        }

        Ok(Self {
            path,
            role,
            inner: Mutex::new(Inner {
                by_value,
                by_id,
                next_id: max_id + 1,
                dirty: false,
            }),
        })
    }

    /// Looks up `value`'s id without allocating a new one.
    pub fn resolve(&self, value: &str) -> Option<u64> {
        self.inner.lock().unwrap().by_value.get(value).copied()
    }

    /// Looks up `value`'s id, allocating a fresh dense id on first sight
    /// (spec §4.3: "first sight of a URI in a role increments the counter
    /// and appends `(id, uri)`" — the append happens on the next
    /// [`Self::flush`], not eagerly per call).
    pub fn resolve_or_insert(&self, value: &str) -> u64 {
        self.resolve_or_insert_reporting_new(value).0
    }

    /// As [`Self::resolve_or_insert`], additionally reporting whether this
    /// call allocated a brand-new id — the columnar writer (§4.4) needs
    /// this to compute the next partition's starting key.
    pub fn resolve_or_insert_reporting_new(&self, value: &str) -> (u64, bool) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(&id) = inner.by_value.get(value) {
            return (id, false);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.by_value.insert(value.to_string(), id);
        if inner.by_id.len() <= id as usize {
            inner.by_id.resize(id as usize + 1, String::new());
        }
        inner.by_id[id as usize] = value.to_string();
        inner.dirty = true;
        (id, true)
    }

    /// The next id this table would allocate; `next_id_peek() - 1` is the
    /// highest id allocated so far in this role (0 if none yet).
    pub fn next_id_peek(&self) -> u64 {
        self.inner.lock().unwrap().next_id
    }

    /// Reverse lookup, used to recover a property's URI from its id while
    /// iterating fetch results.
    pub fn reverse(&self, id: u64) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.by_id.get(id as usize).filter(|s| !s.is_empty()).cloned()
    }

    /// Rewrites the mapping file if any id was allocated since the last
    /// flush, via a temp file + rename so a crash mid-write cannot leave a
    /// half-written mapping file in place.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.dirty {
            return Ok(());
        }
        let tmp_path = self.path.with_extension("parquet.tmp");
        write_mapping_file(&tmp_path, self.role, &inner.by_id)?;
        std::fs::rename(&tmp_path, &self.path)?;
        inner.dirty = false;
        Ok(())
    }
}

fn mapping_schema_text(role: Role) -> String {
    format!(
        "message mapping {{ REQUIRED INT64 {}; REQUIRED BYTE_ARRAY {} (UTF8); }}",
        role.id_column(),
        role.value_column(),
    )
}

fn write_mapping_file(path: &Path, role: Role, by_id: &[String]) -> Result<()> {
    let schema = Arc::new(parquet::schema::parser::parse_message_type(
        &mapping_schema_text(role),
    )?);
    // Mapping files are small relative to data files (§4.3); uncompressed
    // avoids depending on a codec feature beyond the ZSTD one the row
    // writer already needs.
    let props = Arc::new(
        WriterProperties::builder()
            .set_compression(Compression::UNCOMPRESSED)
            .build(),
    );
    let file = File::create(path)?;
    let mut writer = SerializedFileWriter::new(file, schema, props)?;

    let ids: Vec<i64> = (1..by_id.len() as u64)
        .filter(|&id| !by_id[id as usize].is_empty())
        .map(|id| id as i64)
        .collect();
    let values: Vec<ByteArray> = (1..by_id.len() as u64)
        .filter(|&id| !by_id[id as usize].is_empty())
        .map(|id| ByteArray::from(by_id[id as usize].as_bytes().to_vec()))
        .collect();

    let mut row_group_writer = writer.next_row_group()?;
    if let Some(mut col) = row_group_writer.next_column()? {
        col.typed::<Int64Type>().write_batch(&ids, None, None)?;
        col.close()?;
    }
    if let Some(mut col) = row_group_writer.next_column()? {
        col.typed::<ByteArrayType>().write_batch(&values, None, None)?;
        col.close()?;
    }
    row_group_writer.close()?;
    writer.close()?;
    Ok(())
}

fn read_mapping_file(path: &Path, _role: Role) -> Result<Vec<(u64, String)>> {
    let file = File::open(path)?;
    let reader = SerializedFileReader::new(file)?;
    let metadata = reader.metadata();
    let mut out = Vec::new();

    for group_idx in 0..metadata.num_row_groups() {
        let num_rows = metadata.row_group(group_idx).num_rows() as usize;
        let row_group = reader.get_row_group(group_idx)?;

        let mut ids = vec![0i64; num_rows];
        if let parquet::column::reader::ColumnReader::Int64ColumnReader(mut r) =
            row_group.get_column_reader(0)?
        {
            r.read_records(num_rows, None, None, &mut ids)?;
        }

        let mut values = vec![ByteArray::default(); num_rows];
        if let parquet::column::reader::ColumnReader::ByteArrayColumnReader(mut r) =
            row_group.get_column_reader(1)?
        {
            r.read_records(num_rows, None, None, &mut values)?;
        }

        for i in 0..num_rows {
            let value = String::from_utf8(values[i].data().to_vec())
                .map_err(|_| crate::error::ValueDecodingError::InvalidUtf8)?;
            out.push((ids[i] as u64, value));
        }
    }

    Ok(out)
}

/// The three role tables, opened together at `ArchiveConfig::open`.
pub struct MappingStore {
    pub item: MappingTable,
    pub property: MappingTable,
    pub context: MappingTable,
}

impl MappingStore {
    pub fn open(metadata_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(metadata_dir)?;
        Ok(Self {
            item: MappingTable::open(metadata_dir, Role::Item)?,
            property: MappingTable::open(metadata_dir, Role::Property)?,
            context: MappingTable::open(metadata_dir, Role::Context)?,
        })
    }

    /// Flushes all three tables; called once at the end of every `put`.
    pub fn flush(&self) -> Result<()> {
        self.item.flush()?;
        self.property.flush()?;
        self.context.flush()?;
        Ok(())
    }

    /// Resolves (allocating as needed) the id-triple for one tuple, along
    /// with which roles were newly allocated — the columnar writer (§4.4)
    /// needs the latter to compute the next partition's starting key.
    pub fn resolve_tuple(&self, item: &str, property: &str, context: &str) -> (PartitionKey, NewIdFlags) {
        let (item_id, item_new) = self.item.resolve_or_insert_reporting_new(item);
        let (property_id, property_new) = self.property.resolve_or_insert_reporting_new(property);
        let (context_id, context_new) = self.context.resolve_or_insert_reporting_new(context);
        (
            PartitionKey::new(item_id, property_id, context_id),
            NewIdFlags {
                item: item_new,
                property: property_new,
                context: context_new,
            },
        )
    }

    /// `(item, property, context)` highest id allocated so far in each
    /// role (0 in a role where nothing has been allocated yet).
    pub fn current_max_key(&self) -> PartitionKey {
        PartitionKey::new(
            self.item.next_id_peek().saturating_sub(1),
            self.property.next_id_peek().saturating_sub(1),
            self.context.next_id_peek().saturating_sub(1),
        )
    }
}

/// Which roles of a just-resolved tuple id-triple were newly allocated.
#[derive(Clone, Copy, Debug)]
pub struct NewIdFlags {
    pub item: bool,
    pub property: bool,
    pub context: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn first_sight_allocates_dense_ids_starting_at_one() {
        let dir = tempdir().unwrap();
        let table = MappingTable::open(dir.path(), Role::Item).unwrap();
        assert_eq!(table.resolve_or_insert("http://a"), 1);
        assert_eq!(table.resolve_or_insert("http://b"), 2);
        assert_eq!(table.resolve_or_insert("http://a"), 1);
    }

    #[test]
    fn flush_then_reopen_bootstraps_existing_ids_and_resumes_counter() {
        let dir = tempdir().unwrap();
        {
            let table = MappingTable::open(dir.path(), Role::Property).unwrap();
            assert_eq!(table.resolve_or_insert("http://p1"), 1);
            assert_eq!(table.resolve_or_insert("http://p2"), 2);
            table.flush().unwrap();
        }
        let table = MappingTable::open(dir.path(), Role::Property).unwrap();
        assert_eq!(table.resolve("http://p1"), Some(1));
        assert_eq!(table.resolve("http://p2"), Some(2));
        assert_eq!(table.reverse(1).as_deref(), Some("http://p1"));
        assert_eq!(table.resolve_or_insert("http://p3"), 3);
    }

    #[test]
    fn unflushed_inserts_do_not_rewrite_file() {
        let dir = tempdir().unwrap();
        let table = MappingTable::open(dir.path(), Role::Context).unwrap();
        assert!(!dir.path().join(Role::Context.file_name()).exists());
        table.resolve_or_insert("http://c1");
        assert!(!dir.path().join(Role::Context.file_name()).exists());
        table.flush().unwrap();
        assert!(dir.path().join(Role::Context.file_name()).exists());
    }

    #[test]
    fn mapping_store_opens_all_three_roles() {
        let dir = tempdir().unwrap();
        let metadata_dir = dir.path().join("metadata");
        let store = MappingStore::open(&metadata_dir).unwrap();
        assert_eq!(store.item.resolve_or_insert("http://item/1"), 1);
        assert_eq!(store.property.resolve_or_insert("http://prop/1"), 1);
        assert_eq!(store.context.resolve_or_insert("http://ctx/1"), 1);
        store.flush().unwrap();
    }
}
