// Copyright (c) 2024-present, tuple-archive contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The Store API façade (spec §4.1, §4.8): [`ArchiveConfig`] is the builder
//! that opens an [`ArchiveStore`], which exposes `put`/`fetch`/`properties`/
//! `descendants`/`approximate_size`/`delete`/`close` over one archive root.

use crate::aggregate::{self, AggregationOp};
use crate::cache::{MappingCache, ReverseCache, DEFAULT_MAPPING_CACHE_CAPACITY, DEFAULT_REVERSE_CACHE_CAPACITY};
use crate::error::Result;
use crate::fetch;
use crate::id::MappingStore;
use crate::row::{self, WriterSettings};
use crate::tuple::Tuple;
use crate::writer::ColumnarWriter;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Configuration builder for an [`ArchiveStore`], mirroring the teacher's
/// `Config` (chained `with_*` setters, a terminal `open()`).
#[derive(Clone, Debug)]
pub struct ArchiveConfig {
    archive_root: PathBuf,
    item_cache_capacity: usize,
    reverse_property_cache_capacity: usize,
    compression_level: i32,
    row_group_size_bytes: usize,
    page_size_bytes: usize,
    dictionary_page_size_bytes: usize,
}

impl ArchiveConfig {
    /// Initializes a new config rooted at `archive_root`, with the defaults
    /// from spec §4.8.
    pub fn new<P: AsRef<Path>>(archive_root: P) -> Self {
        Self {
            archive_root: archive_root.as_ref().to_path_buf(),
            item_cache_capacity: DEFAULT_MAPPING_CACHE_CAPACITY,
            reverse_property_cache_capacity: DEFAULT_REVERSE_CACHE_CAPACITY,
            compression_level: 12,
            row_group_size_bytes: 1024 * 1024,
            page_size_bytes: 8 * 1024,
            dictionary_page_size_bytes: 1024 * 1024,
        }
    }

    /// Sets the capacity of the forward `(item, property, context) → ids`
    /// resolution cache.
    ///
    /// Defaults to 20,000 entries.
    #[must_use]
    pub fn item_cache_capacity(mut self, capacity: usize) -> Self {
        self.item_cache_capacity = capacity;
        self
    }

    /// Sets the capacity of the reverse `id → URI` lookup caches (shared by
    /// the property and context roles).
    ///
    /// Defaults to 10,000 entries.
    #[must_use]
    pub fn reverse_property_cache_capacity(mut self, capacity: usize) -> Self {
        self.reverse_property_cache_capacity = capacity;
        self
    }

    /// Sets the ZSTD compression level used for data file row groups.
    ///
    /// Defaults to 12.
    #[must_use]
    pub fn compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Sets the approximate byte budget for one row group before the writer
    /// flushes it.
    ///
    /// Defaults to 1 MiB.
    #[must_use]
    pub fn row_group_size_bytes(mut self, bytes: usize) -> Self {
        self.row_group_size_bytes = bytes;
        self
    }

    /// Sets the parquet data page size limit.
    ///
    /// Defaults to 8 KiB.
    #[must_use]
    pub fn page_size_bytes(mut self, bytes: usize) -> Self {
        self.page_size_bytes = bytes;
        self
    }

    /// Sets the parquet dictionary page size limit.
    ///
    /// Defaults to 1 MiB.
    #[must_use]
    pub fn dictionary_page_size_bytes(mut self, bytes: usize) -> Self {
        self.dictionary_page_size_bytes = bytes;
        self
    }

    fn writer_settings(&self) -> WriterSettings {
        WriterSettings {
            row_group_size_bytes: self.row_group_size_bytes,
            page_size_bytes: self.page_size_bytes,
            dictionary_page_size_bytes: self.dictionary_page_size_bytes,
            zstd_level: self.compression_level,
        }
    }

    /// Opens the archive, bootstrapping the id mappers from
    /// `<archive_root>/metadata/` (spec §4.3's startup bootstrap).
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs while creating the archive
    /// root or reading an existing mapping file.
    pub fn open(self) -> Result<ArchiveStore> {
        ArchiveStore::open(self)
    }
}

/// A single tuple archive rooted at one directory on disk.
///
/// `put` takes an internal write lock serializing callers onto the
/// single-writer core (spec §5); `fetch` and friends read through the two
/// bounded caches from [`crate::cache`] without ever blocking on a writer.
pub struct ArchiveStore {
    archive_root: PathBuf,
    mapping: Arc<MappingStore>,
    mapping_cache: MappingCache,
    property_reverse: ReverseCache,
    context_reverse: ReverseCache,
    writer_settings: WriterSettings,
    write_lock: Mutex<()>,
}

impl ArchiveStore {
    fn open(config: ArchiveConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.archive_root)?;
        let mapping = Arc::new(MappingStore::open(&config.archive_root.join("metadata"))?);
        Ok(Self {
            archive_root: config.archive_root,
            mapping,
            mapping_cache: MappingCache::with_capacity(config.item_cache_capacity),
            property_reverse: ReverseCache::with_capacity(config.reverse_property_cache_capacity),
            context_reverse: ReverseCache::with_capacity(config.reverse_property_cache_capacity),
            writer_settings: config.writer_settings(),
            write_lock: Mutex::new(()),
        })
    }

    /// Appends `tuples` to the archive, resolving ids, rolling
    /// week/year partitions as needed, and flushing the id mappers before
    /// returning (spec §4.4, §5).
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO or parquet-encoding error occurs.
    pub fn put<I: IntoIterator<Item = Tuple>>(&self, tuples: I) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        let mut writer = ColumnarWriter::new(self.archive_root.clone(), self.mapping.clone(), self.writer_settings);
        for tuple in tuples {
            writer.write_tuple(&tuple)?;
        }
        writer.finish()
    }

    /// Fetches up to `limit` tuples per distinct property for `item`,
    /// optionally pinned to one `property`/`context`, newest first (spec
    /// §4.1, §4.5). `limit == 0` means unlimited.
    ///
    /// # Errors
    ///
    /// Will return `Err` if a data file cannot be read.
    pub fn fetch(&self, item: &str, property: Option<&str>, context: Option<&str>, limit: usize) -> Result<Vec<Tuple>> {
        let Some(plan) = fetch::plan(&self.archive_root, &self.mapping, &self.mapping_cache, item, property, context)?
        else {
            return Ok(Vec::new());
        };
        fetch::execute(&plan, &self.mapping, &self.property_reverse, &self.context_reverse, None, limit)
    }

    /// As [`Self::fetch`], restricted to `time` in `[begin, end]` and,
    /// when `op` is given, bucketed into `interval`-sized windows and
    /// reduced with it (spec §4.1, §4.6).
    ///
    /// # Errors
    ///
    /// Will return `Err` if a data file cannot be read, or
    /// [`crate::error::Error::UnsupportedAggregation`] if `op` is one of
    /// `min`/`max`/`avg`/`sum` and a bucket holds a non-numeric value.
    #[allow(clippy::too_many_arguments)]
    pub fn fetch_window(
        &self,
        item: &str,
        property: Option<&str>,
        context: Option<&str>,
        begin: i64,
        end: i64,
        limit: usize,
        interval: i64,
        op: Option<AggregationOp>,
    ) -> Result<Vec<Tuple>> {
        let Some(plan) = fetch::plan(&self.archive_root, &self.mapping, &self.mapping_cache, item, property, context)?
        else {
            return Ok(Vec::new());
        };
        let tuples = fetch::execute(
            &plan,
            &self.mapping,
            &self.property_reverse,
            &self.context_reverse,
            Some((begin, end)),
            limit,
        )?;
        match op {
            Some(op) => aggregate::aggregate(tuples, end, interval, op),
            None => Ok(tuples),
        }
    }

    /// The distinct property URIs recorded for `item` (spec §4.1).
    ///
    /// # Errors
    ///
    /// Will return `Err` if a data file cannot be read.
    pub fn properties(&self, item: &str) -> Result<Vec<String>> {
        let Some(plan) = fetch::plan(&self.archive_root, &self.mapping, &self.mapping_cache, item, None, None)?
        else {
            return Ok(Vec::new());
        };
        let tuples = fetch::execute(&plan, &self.mapping, &self.property_reverse, &self.context_reverse, None, 0)?;
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for tuple in tuples {
            if seen.insert(tuple.property.clone()) {
                out.push(tuple.property);
            }
        }
        Ok(out)
    }

    /// This archive never models item hierarchy (spec §1 Non-goals), so
    /// there are no descendants to report.
    pub fn descendants(&self, _item: &str, _limit: Option<usize>) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// An estimated row count matching the given, possibly partial, query —
    /// a lower bound derived from row-group `id` statistics, never an exact
    /// cardinality (spec §1 Non-goals, §4.1).
    ///
    /// # Errors
    ///
    /// Will return `Err` if a data file's metadata cannot be read.
    pub fn approximate_size(&self, item: Option<&str>, property: Option<&str>, context: Option<&str>) -> Result<u64> {
        let Some(item) = item else {
            return self.approximate_size_all();
        };
        let Some(plan) = fetch::plan(&self.archive_root, &self.mapping, &self.mapping_cache, item, property, context)?
        else {
            return Ok(0);
        };
        let mut total = 0u64;
        for file in plan.files() {
            total += row::estimate_matching_rows(file, plan.predicate())?;
        }
        Ok(total)
    }

    fn approximate_size_all(&self) -> Result<u64> {
        let mut total = 0u64;
        let Ok(year_entries) = std::fs::read_dir(&self.archive_root) else {
            return Ok(0);
        };
        for year_entry in year_entries.flatten() {
            if !year_entry.path().is_dir() {
                continue;
            }
            if year_entry.file_name() == "metadata" {
                continue;
            }
            let Ok(week_entries) = std::fs::read_dir(year_entry.path()) else {
                continue;
            };
            for week_entry in week_entries.flatten() {
                let Ok(data_entries) = std::fs::read_dir(week_entry.path()) else {
                    continue;
                };
                for data_entry in data_entries.flatten() {
                    let path = data_entry.path();
                    if path.extension().and_then(std::ffi::OsStr::to_str) == Some("parquet") {
                        total += row::count_rows(&path)?;
                    }
                }
            }
        }
        Ok(total)
    }

    /// Deletion is out of scope for this archive (spec §1 Non-goals): the
    /// format has no tombstone or compaction machinery, so this is always a
    /// no-op.
    pub fn delete(&self, _item: &str, _property: Option<&str>, _context: Option<&str>) -> bool {
        false
    }

    /// Drops the in-memory read caches. The id mappers themselves always
    /// hold their full contents in memory for the lifetime of the store
    /// (spec §4.3), so this only affects the two bounded lookup caches.
    pub fn close(&self) {
        self.mapping_cache.clear();
        self.property_reverse.clear();
        self.context_reverse.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use tempfile::tempdir;

    #[test]
    fn put_then_fetch_round_trips_a_tuple() {
        let dir = tempdir().unwrap();
        let store = ArchiveConfig::new(dir.path()).open().unwrap();
        store
            .put(vec![Tuple::new("http://i", "http://p", "http://c", 100, 0, Value::Int32(42))])
            .unwrap();
        let results = store.fetch("http://i", None, None, 0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].value, Value::Int32(42));
    }

    #[test]
    fn fetch_unknown_item_returns_empty() {
        let dir = tempdir().unwrap();
        let store = ArchiveConfig::new(dir.path()).open().unwrap();
        let results = store.fetch("http://missing", None, None, 0).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn properties_lists_each_distinct_property_once() {
        let dir = tempdir().unwrap();
        let store = ArchiveConfig::new(dir.path()).open().unwrap();
        store
            .put(vec![
                Tuple::new("http://i", "http://a", "http://c", 1, 0, Value::Int32(1)),
                Tuple::new("http://i", "http://b", "http://c", 2, 0, Value::Int32(2)),
                Tuple::new("http://i", "http://a", "http://c", 3, 0, Value::Int32(3)),
            ])
            .unwrap();
        let mut props = store.properties("http://i").unwrap();
        props.sort();
        assert_eq!(props, vec!["http://a".to_string(), "http://b".to_string()]);
    }

    #[test]
    fn fetch_window_with_average_aggregates_buckets() {
        let dir = tempdir().unwrap();
        let store = ArchiveConfig::new(dir.path()).open().unwrap();
        store
            .put(vec![
                Tuple::new("http://i", "http://p", "http://c", 10, 0, Value::Float64(1.0)),
                Tuple::new("http://i", "http://p", "http://c", 20, 0, Value::Float64(2.0)),
                Tuple::new("http://i", "http://p", "http://c", 30, 0, Value::Float64(3.0)),
                Tuple::new("http://i", "http://p", "http://c", 40, 0, Value::Float64(4.0)),
            ])
            .unwrap();
        let results = store
            .fetch_window("http://i", None, None, 0, 40, 0, 20, Some(AggregationOp::Avg))
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].value, Value::Float64(3.5));
        assert_eq!(results[1].value, Value::Float64(1.5));
    }

    #[test]
    fn descendants_and_delete_are_no_ops() {
        let dir = tempdir().unwrap();
        let store = ArchiveConfig::new(dir.path()).open().unwrap();
        assert!(store.descendants("http://i", None).unwrap().is_empty());
        assert!(!store.delete("http://i", None, None));
    }

    #[test]
    fn approximate_size_counts_written_rows() {
        let dir = tempdir().unwrap();
        let store = ArchiveConfig::new(dir.path()).open().unwrap();
        store
            .put(vec![
                Tuple::new("http://i", "http://p", "http://c", 1, 0, Value::Int32(1)),
                Tuple::new("http://i", "http://p", "http://c", 2, 0, Value::Int32(2)),
            ])
            .unwrap();
        assert_eq!(store.approximate_size(Some("http://i"), None, None).unwrap(), 2);
        assert_eq!(store.approximate_size(None, None, None).unwrap(), 2);
    }
}
