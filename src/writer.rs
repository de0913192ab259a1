// Copyright (c) 2024-present, tuple-archive contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The columnar writer (spec §4.4): a buffered, single-writer state
//! machine that rolls week/year partitions as tuple time advances and
//! renames their provisional directories into their id-range-encoded
//! final names.
//!
//! Both partition directories start under a fixed provisional name
//! (`year_temp`, and within it `week_temp`) and are renamed into their
//! final `encode(min)_encode(max)[_YYYY]` form only once they are known to
//! be complete — on a week or year roll, or at [`ColumnarWriter::finish`].
//! Renaming the still-provisional year directory after its last week has
//! already been renamed moves that week along with it, since a directory
//! rename is just a rename of its whole subtree.

use crate::error::Result;
use crate::id::{MappingStore, NewIdFlags};
use crate::partition::{PartitionKey, WeekRange, YearRange};
use crate::row::{Row, RowWriter, WriterSettings};
use crate::tuple::Tuple;
use chrono::Datelike;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const WEEK_SECONDS: i64 = 604_800;
const YEAR_TEMP_NAME: &str = "year_temp";
const WEEK_TEMP_NAME: &str = "week_temp";
const DATA_FILE_NAME: &str = "data.parquet";

fn year_of(unix_seconds: i64) -> i32 {
    chrono::DateTime::from_timestamp(unix_seconds, 0)
        .map(|dt| dt.year())
        .unwrap_or(1970)
}

struct OpenWeek {
    row_writer: RowWriter,
    year_dir: PathBuf,
    week_dir: PathBuf,
    week_min: PartitionKey,
    year_min: PartitionKey,
    next_chunk_timestamp: i64,
    prev_tuple_year: i32,
}

/// Owns the single mutable writer state entered only from
/// [`crate::store::ArchiveStore::put`] (spec §5: single-writer core).
pub struct ColumnarWriter {
    archive_root: PathBuf,
    mapping: Arc<MappingStore>,
    settings: WriterSettings,
    open: Option<OpenWeek>,
}

impl ColumnarWriter {
    pub fn new(archive_root: PathBuf, mapping: Arc<MappingStore>, settings: WriterSettings) -> Self {
        Self {
            archive_root,
            mapping,
            settings,
            open: None,
        }
    }

    /// Writes one tuple, rolling week/year partitions first if its `time`
    /// has crossed the current week's boundary.
    pub fn write_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        // Snapshot the highest id allocated in each role *before* this
        // tuple's own ids are resolved: a roll triggered by this tuple
        // closes out the *previous* week/year, whose Pmax must not
        // already include whatever this tuple is about to introduce.
        let max_key_before = self.mapping.current_max_key();
        let (key, new_flags) = self
            .mapping
            .resolve_tuple(&tuple.item, &tuple.property, &tuple.context);

        match &self.open {
            None => self.open_first_week(tuple.time, key)?,
            Some(open) if tuple.time >= open.next_chunk_timestamp => {
                self.roll(tuple.time, new_flags, max_key_before)?;
            }
            Some(_) => {}
        }

        let open = self.open.as_mut().expect("week opened above");
        let row = Row {
            id: key.to_bytes(),
            time: tuple.time,
            seq_nr: tuple.seq_nr,
            value: tuple.value.clone(),
        };
        open.row_writer.write_row(row)?;
        open.prev_tuple_year = year_of(tuple.time);
        Ok(())
    }

    fn open_first_week(&mut self, first_time: i64, first_key: PartitionKey) -> Result<()> {
        let year_dir = self.archive_root.join(YEAR_TEMP_NAME);
        let week_dir = year_dir.join(WEEK_TEMP_NAME);
        std::fs::create_dir_all(&week_dir)?;
        let row_writer = RowWriter::create(&week_dir.join(DATA_FILE_NAME), self.settings)?;
        self.open = Some(OpenWeek {
            row_writer,
            year_dir,
            week_dir,
            week_min: first_key,
            year_min: first_key,
            next_chunk_timestamp: first_time + WEEK_SECONDS,
            prev_tuple_year: year_of(first_time),
        });
        Ok(())
    }

    /// Closes the current week, renames it (and its year, if the year also
    /// changed), and opens a fresh week for `new_tuple_time`. `max_key` is
    /// the highest id allocated in each role *before* the triggering
    /// tuple's own ids were resolved (see [`Self::write_tuple`]).
    fn roll(&mut self, new_tuple_time: i64, new_flags: NewIdFlags, max_key: PartitionKey) -> Result<()> {
        let open = self.open.take().expect("roll called without an open week");
        let new_tuple_year = year_of(new_tuple_time);
        let year_changed = new_tuple_year != open.prev_tuple_year;

        open.row_writer.finish()?;
        let week_range = WeekRange {
            min: open.week_min,
            max: max_key,
        };
        rename_into(&open.year_dir, &open.week_dir, &week_range.dir_name())?;

        let mut year_dir = open.year_dir;
        if year_changed {
            let year_range = YearRange {
                min: open.year_min,
                max: max_key,
                year: open.prev_tuple_year,
            };
            rename_into(&self.archive_root, &year_dir, &year_range.dir_name())?;
            year_dir = self.archive_root.join(YEAR_TEMP_NAME);
        }

        let week_min = bump(max_key, new_flags);
        let year_min = if year_changed { week_min } else { open.year_min };

        let week_dir = year_dir.join(WEEK_TEMP_NAME);
        std::fs::create_dir_all(&week_dir)?;
        let row_writer = RowWriter::create(&week_dir.join(DATA_FILE_NAME), self.settings)?;

        self.open = Some(OpenWeek {
            row_writer,
            year_dir,
            week_dir,
            week_min,
            year_min,
            next_chunk_timestamp: new_tuple_time + WEEK_SECONDS,
            prev_tuple_year: new_tuple_year,
        });
        Ok(())
    }

    /// Finalizes the current week and its enclosing year (if any tuple was
    /// ever written), the same way an ordinary roll would, but without
    /// opening a new week afterwards.
    pub fn finish(mut self) -> Result<()> {
        if let Some(open) = self.open.take() {
            let max_key = self.mapping.current_max_key();
            open.row_writer.finish()?;
            let week_range = WeekRange {
                min: open.week_min,
                max: max_key,
            };
            rename_into(&open.year_dir, &open.week_dir, &week_range.dir_name())?;

            let year_range = YearRange {
                min: open.year_min,
                max: max_key,
                year: open.prev_tuple_year,
            };
            rename_into(&self.archive_root, &open.year_dir, &year_range.dir_name())?;
        }
        self.mapping.flush()
    }
}

/// Renames `dir` (a child of `parent`) to `new_name`, still under `parent`.
///
/// A later `put` can allocate ids that fall back inside an id range an
/// earlier `put` already finalized under this same name (e.g. a week or
/// year reusing ids already seen this calendar year); in that case `dir`
/// can't simply replace the existing, non-empty target (`fs::rename` onto
/// a non-empty directory fails with `ENOTEMPTY` on most platforms). When
/// the target already exists, merge `dir`'s contents into it instead,
/// giving any colliding data file a fresh unique name rather than
/// overwriting it.
fn rename_into(parent: &Path, dir: &Path, new_name: &str) -> Result<()> {
    let target = parent.join(new_name);
    if !target.exists() {
        std::fs::rename(dir, target)?;
        return Ok(());
    }
    merge_directory_into(dir, &target)?;
    std::fs::remove_dir_all(dir)?;
    Ok(())
}

/// Moves every entry of `src` into `dst`, recursing into subdirectories
/// that collide by name and giving colliding files a fresh unique name
/// under their shared parent (spec §4.4: partition directories may be
/// revisited by a later `put`, but every data file they ever wrote must
/// stay readable).
fn merge_directory_into(src: &Path, dst: &Path) -> Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        let dst_path = dst.join(&name);
        if entry.path().is_dir() {
            if dst_path.exists() {
                merge_directory_into(&entry.path(), &dst_path)?;
                std::fs::remove_dir_all(entry.path())?;
            } else {
                std::fs::rename(entry.path(), dst_path)?;
            }
        } else if dst_path.exists() {
            let unique_name = unique_file_name(dst, &name);
            std::fs::rename(entry.path(), dst.join(unique_name))?;
        } else {
            std::fs::rename(entry.path(), dst_path)?;
        }
    }
    Ok(())
}

/// Picks a name of the form `<stem>-1.<ext>`, `<stem>-2.<ext>`, ... not
/// already present in `dir`, preserving `original`'s extension.
fn unique_file_name(dir: &Path, original: &std::ffi::OsStr) -> PathBuf {
    let original = original.to_string_lossy();
    let (stem, ext) = original.split_once('.').unwrap_or((original.as_ref(), ""));
    let mut n = 1u32;
    loop {
        let candidate = if ext.is_empty() {
            format!("{stem}-{n}")
        } else {
            format!("{stem}-{n}.{ext}")
        };
        if !dir.join(&candidate).exists() {
            return PathBuf::from(candidate);
        }
        n += 1;
    }
}

/// The next partition's starting key: `max` bumped by one in each role the
/// partition's first tuple newly allocated, unchanged otherwise (spec
/// §4.4's week-roll formula, reused identically for the enclosing year).
fn bump(max: PartitionKey, flags: NewIdFlags) -> PartitionKey {
    PartitionKey::new(
        max.item_id + u64::from(flags.item),
        max.property_id + u64::from(flags.property),
        max.context_id + u64::from(flags.context),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::MappingStore;
    use crate::value::Value;
    use tempfile::tempdir;

    fn sample(item: &str, property: &str, time: i64) -> Tuple {
        Tuple::new(item, property, "ctx", time, 0, Value::Int32(1))
    }

    #[test]
    fn single_week_finishes_into_one_dated_directory() {
        let dir = tempdir().unwrap();
        let mapping = Arc::new(MappingStore::open(&dir.path().join("metadata")).unwrap());
        let mut writer = ColumnarWriter::new(dir.path().to_path_buf(), mapping, WriterSettings::default());
        writer.write_tuple(&sample("http://i1", "http://p1", 1_700_000_000)).unwrap();
        writer.write_tuple(&sample("http://i1", "http://p2", 1_700_000_100)).unwrap();
        writer.finish().unwrap();

        let year_dirs: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n != "metadata")
            .collect();
        assert_eq!(year_dirs.len(), 1);
        assert!(YearRange::parse(&year_dirs[0]).is_some());
    }

    #[test]
    fn week_roll_produces_two_week_directories_under_one_year() {
        let dir = tempdir().unwrap();
        let mapping = Arc::new(MappingStore::open(&dir.path().join("metadata")).unwrap());
        let mut writer = ColumnarWriter::new(dir.path().to_path_buf(), mapping, WriterSettings::default());
        let base = 1_700_000_000i64;
        writer.write_tuple(&sample("http://i1", "http://p1", base)).unwrap();
        writer
            .write_tuple(&sample("http://i2", "http://p1", base + WEEK_SECONDS + 10))
            .unwrap();
        writer.finish().unwrap();

        let year_dirs: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.file_name().unwrap() != "metadata")
            .collect();
        assert_eq!(year_dirs.len(), 1);
        let week_dirs: Vec<_> = std::fs::read_dir(&year_dirs[0]).unwrap().collect();
        assert_eq!(week_dirs.len(), 2);
    }
}
