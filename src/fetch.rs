// Copyright (c) 2024-present, tuple-archive contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The fetch engine (spec §4.5): resolves a `(item, property?, context?)`
//! query to ids, prunes partition directories by id range, reads the
//! surviving `data.parquet` files with the `id` predicate pushed down, and
//! merges the results into one time-ordered, per-property-limited sequence.
//!
//! Partition directory names encode *id* ranges, not *time* ranges (spec
//! §3), so nothing short of reading the candidate rows tells us their time
//! order. [`crate::row::read_rows`] already materializes a file's matching
//! rows into a `Vec` rather than streaming them, so this module follows
//! that shape: gather every surviving file's rows, convert to `Tuple`s,
//! then sort and limit once over the whole candidate set. This produces
//! the same externally observable sequence the spec's per-reader streaming
//! algorithm would (time desc, seqNr desc, ≤ `limit` per property) without
//! needing a secondary time index.

use crate::cache::{MappingCache, MappingResolution, ReverseCache};
use crate::error::Result;
use crate::id::MappingStore;
use crate::partition::{PartitionKey, WeekRange, YearRange};
use crate::row::{self, IdPredicate};
use crate::tuple::Tuple;
use std::path::{Path, PathBuf};

/// A resolved, pruned query ready for execution.
pub struct FetchPlan {
    predicate: IdPredicate,
    files: Vec<PathBuf>,
    /// The property URI to stamp onto every result row, if the caller
    /// pinned one; `None` means each row's own property must be recovered
    /// via reverse lookup.
    fixed_property: Option<String>,
    /// As `fixed_property`, for context.
    fixed_context: Option<String>,
    item_uri: String,
}

impl FetchPlan {
    /// The pruned candidate data files this plan would read.
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// The `id` predicate this plan pushes down into each candidate file.
    #[must_use]
    pub fn predicate(&self) -> &IdPredicate {
        &self.predicate
    }
}

/// Resolves and prunes a fetch query. Returns `Ok(None)` when the item has
/// no mapping (spec §4.5 step 1: "If item's mapping is missing, return
/// empty").
pub fn plan(
    archive_root: &Path,
    mapping: &MappingStore,
    mapping_cache: &MappingCache,
    item: &str,
    property: Option<&str>,
    context: Option<&str>,
) -> Result<Option<FetchPlan>> {
    let resolution = mapping_cache.get_or_resolve(Some(item), property, context, || MappingResolution {
        item_id: mapping.item.resolve(item),
        property_id: property.and_then(|p| mapping.property.resolve(p)),
        context_id: context.and_then(|c| mapping.context.resolve(c)),
    });

    let Some(item_id) = resolution.item_id else {
        return Ok(None);
    };
    if property.is_some() && resolution.property_id.is_none() {
        return Ok(None);
    }
    if context.is_some() && resolution.context_id.is_none() {
        return Ok(None);
    }

    // Four cases, one per combination of which of `property`/`context` was
    // pinned (spec §4.5 step 2 only spells out the first and last; the
    // other two are the symmetric single-field pins, each needing their
    // own predicate shape so an unpinned field's rows aren't mislabeled
    // with the pinned field's URI in `execute`).
    let predicate = match (resolution.property_id, resolution.context_id) {
        (Some(property_id), Some(context_id)) => {
            let key = PartitionKey::new(item_id, property_id, context_id);
            IdPredicate::Equals(key.to_bytes())
        }
        (Some(property_id), None) => {
            let mut low = [0u8; 16];
            low[0..8].copy_from_slice(&item_id.to_be_bytes());
            low[8..16].copy_from_slice(&property_id.to_be_bytes());
            let mut high_exclusive = [0u8; 16];
            high_exclusive[0..8].copy_from_slice(&item_id.to_be_bytes());
            high_exclusive[8..16].copy_from_slice(&(property_id + 1).to_be_bytes());
            IdPredicate::ItemPropertyPrefixRange { low, high_exclusive }
        }
        (None, Some(context_id)) => IdPredicate::ItemContextMatch {
            item: item_id.to_be_bytes(),
            context: context_id.to_be_bytes(),
        },
        (None, None) => IdPredicate::ItemPrefixRange {
            low: item_id.to_be_bytes(),
            high_exclusive: (item_id + 1).to_be_bytes(),
        },
    };

    let files = prune_partitions(archive_root, item_id)?;

    Ok(Some(FetchPlan {
        predicate,
        files,
        fixed_property: property.map(str::to_string),
        fixed_context: context.map(str::to_string),
        item_uri: item.to_string(),
    }))
}

/// Walks `<archive>/<year>/<week>/` keeping only directories whose parsed
/// id range contains `item_id`; malformed names are skipped silently (spec
/// §4.5 step 3, §4.7).
fn prune_partitions(archive_root: &Path, item_id: u64) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let Ok(year_entries) = std::fs::read_dir(archive_root) else {
        return Ok(files);
    };

    for year_entry in year_entries.flatten() {
        if !year_entry.path().is_dir() {
            continue;
        }
        let name = year_entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name == "metadata" {
            continue;
        }
        let Some(year_range) = YearRange::parse(name) else {
            continue;
        };
        if !year_range.is_well_formed() {
            log::warn!("skipping year directory {name} with Pmin > Pmax");
            continue;
        }
        if item_id < year_range.min.item_id || item_id > year_range.max.item_id {
            continue;
        }

        let Ok(week_entries) = std::fs::read_dir(year_entry.path()) else {
            continue;
        };
        for week_entry in week_entries.flatten() {
            if !week_entry.path().is_dir() {
                continue;
            }
            let week_name = week_entry.file_name();
            let Some(week_name) = week_name.to_str() else {
                continue;
            };
            let Some(week_range) = WeekRange::parse(week_name) else {
                continue;
            };
            if !week_range.is_well_formed() {
                log::warn!("skipping week directory {week_name} with Pmin > Pmax");
                continue;
            }
            if item_id < week_range.min.item_id || item_id > week_range.max.item_id {
                continue;
            }
            // Usually just `data.parquet`, but a week directory revisited by
            // a later `put` reusing the same id range may hold additional
            // `data-<n>.parquet` files merged in alongside it (see
            // `writer::rename_into`), so every `.parquet` file here is a
            // candidate, not just the first one.
            let Ok(data_entries) = std::fs::read_dir(week_entry.path()) else {
                continue;
            };
            for data_entry in data_entries.flatten() {
                let path = data_entry.path();
                if path.extension().and_then(std::ffi::OsStr::to_str) == Some("parquet") {
                    files.push(path);
                }
            }
        }
    }

    Ok(files)
}

/// Executes `plan`, producing the time-descending, per-property-limited
/// tuple sequence the Store API promises. `limit == 0` disables the
/// per-property cap.
pub fn execute(
    plan: &FetchPlan,
    mapping: &MappingStore,
    property_reverse: &ReverseCache,
    context_reverse: &ReverseCache,
    window: Option<(i64, i64)>,
    limit: usize,
) -> Result<Vec<Tuple>> {
    let mut rows = Vec::new();
    for file in &plan.files {
        rows.extend(row::read_rows(file, &plan.predicate)?);
    }
    if let Some((begin, end)) = window {
        rows.retain(|r| r.time >= begin && r.time <= end);
    }

    rows.sort_by(|a, b| b.time.cmp(&a.time).then(b.seq_nr.cmp(&a.seq_nr)));

    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let key = PartitionKey::from_bytes(&row.id);

        let property_uri = match &plan.fixed_property {
            Some(p) => p.clone(),
            None => {
                let Some(uri) =
                    property_reverse.get_or_resolve(key.property_id, || mapping.property.reverse(key.property_id))
                else {
                    log::warn!("skipping row with unresolvable propertyId {}", key.property_id);
                    continue;
                };
                uri
            }
        };
        let context_uri = match &plan.fixed_context {
            Some(c) => c.clone(),
            None => {
                let Some(uri) =
                    context_reverse.get_or_resolve(key.context_id, || mapping.context.reverse(key.context_id))
                else {
                    log::warn!("skipping row with unresolvable contextId {}", key.context_id);
                    continue;
                };
                uri
            }
        };

        tuples.push(Tuple::new(
            plan.item_uri.clone(),
            property_uri,
            context_uri,
            row.time,
            row.seq_nr,
            row.value,
        ));
    }

    apply_property_limit(tuples, limit)
}

/// Enforces "at most `limit` results per distinct property" (spec §4.5)
/// over an already time-ordered sequence. A plain per-property counter
/// produces the same bound the spec's "reset on property change within a
/// reader" algorithm guarantees, now that all candidate partitions have
/// been merged into a single ordered sequence (see this module's header).
fn apply_property_limit(tuples: Vec<Tuple>, limit: usize) -> Result<Vec<Tuple>> {
    if limit == 0 {
        return Ok(tuples);
    }
    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut out = Vec::with_capacity(tuples.len());
    for tuple in tuples {
        let count = counts.entry(tuple.property.clone()).or_insert(0);
        if *count >= limit {
            continue;
        }
        *count += 1;
        out.push(tuple);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use crate::writer::ColumnarWriter;
    use crate::row::WriterSettings;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn write_sample(root: &Path, mapping: Arc<MappingStore>, tuples: &[Tuple]) {
        let mut writer = ColumnarWriter::new(root.to_path_buf(), mapping, WriterSettings::default());
        for t in tuples {
            writer.write_tuple(t).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn fetch_missing_item_returns_none_plan() {
        let dir = tempdir().unwrap();
        let mapping = Arc::new(MappingStore::open(&dir.path().join("metadata")).unwrap());
        let cache = MappingCache::with_capacity(16);
        let result = plan(dir.path(), &mapping, &cache, "http://missing", None, None).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn fetch_round_trips_written_tuples_time_descending() {
        let dir = tempdir().unwrap();
        let mapping = Arc::new(MappingStore::open(&dir.path().join("metadata")).unwrap());

        let tuples = vec![
            Tuple::new("http://i", "http://p", "http://c", 10, 0, Value::Int32(1)),
            Tuple::new("http://i", "http://p", "http://c", 30, 0, Value::Int32(3)),
            Tuple::new("http://i", "http://p", "http://c", 20, 0, Value::Int32(2)),
        ];
        write_sample(dir.path(), mapping.clone(), &tuples);

        let cache = MappingCache::with_capacity(16);
        let plan = plan(dir.path(), &mapping, &cache, "http://i", Some("http://p"), Some("http://c"))
            .unwrap()
            .unwrap();

        let prop_cache = ReverseCache::with_capacity(16);
        let ctx_cache = ReverseCache::with_capacity(16);
        let results = execute(&plan, &mapping, &prop_cache, &ctx_cache, None, 0).unwrap();
        let times: Vec<i64> = results.iter().map(|t| t.time).collect();
        assert_eq!(times, vec![30, 20, 10]);
    }

    #[test]
    fn property_limit_caps_results_per_property() {
        let dir = tempdir().unwrap();
        let mapping = Arc::new(MappingStore::open(&dir.path().join("metadata")).unwrap());

        let mut tuples = Vec::new();
        for i in 0..10 {
            tuples.push(Tuple::new("http://i", "http://a", "http://c", i, 0, Value::Int32(i as i32)));
        }
        for i in 0..10 {
            tuples.push(Tuple::new("http://i", "http://b", "http://c", i, 0, Value::Int32(i as i32)));
        }
        write_sample(dir.path(), mapping.clone(), &tuples);

        let cache = MappingCache::with_capacity(16);
        let plan = plan(dir.path(), &mapping, &cache, "http://i", None, None).unwrap().unwrap();

        let prop_cache = ReverseCache::with_capacity(16);
        let ctx_cache = ReverseCache::with_capacity(16);
        let results = execute(&plan, &mapping, &prop_cache, &ctx_cache, None, 3).unwrap();
        assert_eq!(results.len(), 6);

        let a_count = results.iter().filter(|t| t.property == "http://a").count();
        let b_count = results.iter().filter(|t| t.property == "http://b").count();
        assert_eq!(a_count, 3);
        assert_eq!(b_count, 3);
    }

    #[test]
    fn property_without_context_narrows_to_that_property_and_resolves_context() {
        let dir = tempdir().unwrap();
        let mapping = Arc::new(MappingStore::open(&dir.path().join("metadata")).unwrap());

        let tuples = vec![
            Tuple::new("http://i", "http://p", "http://c1", 10, 0, Value::Int32(1)),
            Tuple::new("http://i", "http://other", "http://c2", 20, 0, Value::Int32(2)),
        ];
        write_sample(dir.path(), mapping.clone(), &tuples);

        let cache = MappingCache::with_capacity(16);
        let plan = plan(dir.path(), &mapping, &cache, "http://i", Some("http://p"), None)
            .unwrap()
            .unwrap();
        assert!(matches!(plan.predicate, IdPredicate::ItemPropertyPrefixRange { .. }));

        let prop_cache = ReverseCache::with_capacity(16);
        let ctx_cache = ReverseCache::with_capacity(16);
        let results = execute(&plan, &mapping, &prop_cache, &ctx_cache, None, 0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].property, "http://p");
        assert_eq!(results[0].context, "http://c1");
    }

    #[test]
    fn context_without_property_narrows_to_that_context_and_resolves_property() {
        let dir = tempdir().unwrap();
        let mapping = Arc::new(MappingStore::open(&dir.path().join("metadata")).unwrap());

        let tuples = vec![
            Tuple::new("http://i", "http://p1", "http://c", 10, 0, Value::Int32(1)),
            Tuple::new("http://i", "http://p2", "http://other-c", 20, 0, Value::Int32(2)),
        ];
        write_sample(dir.path(), mapping.clone(), &tuples);

        let cache = MappingCache::with_capacity(16);
        let plan = plan(dir.path(), &mapping, &cache, "http://i", None, Some("http://c"))
            .unwrap()
            .unwrap();
        assert!(matches!(plan.predicate, IdPredicate::ItemContextMatch { .. }));

        let prop_cache = ReverseCache::with_capacity(16);
        let ctx_cache = ReverseCache::with_capacity(16);
        let results = execute(&plan, &mapping, &prop_cache, &ctx_cache, None, 0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].property, "http://p1");
        assert_eq!(results[0].context, "http://c");
    }
}
