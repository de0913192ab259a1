// Copyright (c) 2024-present, tuple-archive contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The two bounded read-side caches from spec §4.3: a ~20,000-entry LRU
//! memoizing `(itemUri?, propertyUri?, contextUri?) → mapping ids`, and a
//! ~10,000-entry LRU memoizing the reverse `propertyId → propertyUri`
//! lookup used while surfacing property names during iteration.
//!
//! Both sit in front of [`crate::id::MappingStore`], which already keeps
//! every mapping in memory; the cache layer exists so the two operations
//! this module names (forward triple resolution, reverse property lookup)
//! stay the shared, mutex-guarded surface §5 describes readers as sharing,
//! independent of how the write side happens to be implemented.

use crate::partition::PartitionKey;
use quick_cache::{sync::Cache as QuickCache, UnitWeighter};

/// One resolved `(item, property, context)` triple: `None` in a slot means
/// the corresponding URI was not supplied (the fetch planner's "any"), not
/// that it was looked up and missing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MappingResolution {
    pub item_id: Option<u64>,
    pub property_id: Option<u64>,
    pub context_id: Option<u64>,
}

impl MappingResolution {
    /// The 24-byte partition key prefix this resolution can build, if every
    /// role present was actually found (missing-but-requested roles are the
    /// caller's problem, not this type's — see [`crate::fetch`]).
    #[must_use]
    pub fn item_property_context(&self) -> Option<PartitionKey> {
        Some(PartitionKey::new(
            self.item_id?,
            self.property_id?,
            self.context_id?,
        ))
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct TripleKey(Option<String>, Option<String>, Option<String>);

/// Default capacity for the forward mapping-resolution cache (spec §4.3).
pub const DEFAULT_MAPPING_CACHE_CAPACITY: usize = 20_000;
/// Default capacity for the reverse property-id → URI cache (spec §4.3).
pub const DEFAULT_REVERSE_CACHE_CAPACITY: usize = 10_000;

/// Memoizes forward `(item?, property?, context?) → ids` resolution.
pub struct MappingCache {
    inner: QuickCache<TripleKey, MappingResolution, UnitWeighter, rustc_hash::FxBuildHasher>,
}

impl MappingCache {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        use quick_cache::sync::DefaultLifecycle;

        let capacity = capacity.max(1);
        let quick_cache = QuickCache::with(
            capacity,
            capacity as u64,
            UnitWeighter,
            Default::default(),
            DefaultLifecycle::default(),
        );
        Self { inner: quick_cache }
    }

    /// Returns the cached resolution for this triple, computing and
    /// inserting it via `resolve` on a miss.
    pub fn get_or_resolve(
        &self,
        item: Option<&str>,
        property: Option<&str>,
        context: Option<&str>,
        resolve: impl FnOnce() -> MappingResolution,
    ) -> MappingResolution {
        let key = TripleKey(
            item.map(str::to_string),
            property.map(str::to_string),
            context.map(str::to_string),
        );
        if let Some(hit) = self.inner.get(&key) {
            return hit;
        }
        let resolution = resolve();
        self.inner.insert(key, resolution);
        resolution
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

/// Memoizes `propertyId → property URI` reverse lookups.
pub struct ReverseCache {
    inner: QuickCache<u64, String, UnitWeighter, rustc_hash::FxBuildHasher>,
}

impl ReverseCache {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        use quick_cache::sync::DefaultLifecycle;

        let capacity = capacity.max(1);
        let quick_cache = QuickCache::with(
            capacity,
            capacity as u64,
            UnitWeighter,
            Default::default(),
            DefaultLifecycle::default(),
        );
        Self { inner: quick_cache }
    }

    /// Returns the cached URI for `property_id`, calling `resolve` on a
    /// miss. `resolve` returning `None` (id not present in the mapping) is
    /// not cached, so a later insert of that id is observed promptly.
    pub fn get_or_resolve(&self, property_id: u64, resolve: impl FnOnce() -> Option<String>) -> Option<String> {
        if let Some(hit) = self.inner.get(&property_id) {
            return Some(hit);
        }
        let uri = resolve()?;
        self.inner.insert(property_id, uri.clone());
        Some(uri)
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn mapping_cache_memoizes_resolution() {
        let cache = MappingCache::with_capacity(4);
        let calls = Cell::new(0);
        let resolve = || {
            calls.set(calls.get() + 1);
            MappingResolution {
                item_id: Some(1),
                property_id: Some(2),
                context_id: Some(3),
            }
        };
        let first = cache.get_or_resolve(Some("i"), Some("p"), Some("c"), resolve);
        let second = cache.get_or_resolve(Some("i"), Some("p"), Some("c"), resolve);
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn reverse_cache_memoizes_hit_but_not_miss() {
        let cache = ReverseCache::with_capacity(4);
        let calls = Cell::new(0);
        assert_eq!(
            cache.get_or_resolve(7, || {
                calls.set(calls.get() + 1);
                None
            }),
            None
        );
        assert_eq!(calls.get(), 1);
        // A miss is not cached, so a second lookup calls resolve again.
        assert_eq!(
            cache.get_or_resolve(7, || {
                calls.set(calls.get() + 1);
                None
            }),
            None
        );
        assert_eq!(calls.get(), 2);

        let hit = cache.get_or_resolve(7, || {
            calls.set(calls.get() + 1);
            Some("http://p".to_string())
        });
        assert_eq!(hit.as_deref(), Some("http://p"));
        assert_eq!(calls.get(), 3);

        let cached = cache.get_or_resolve(7, || {
            calls.set(calls.get() + 1);
            None
        });
        assert_eq!(cached.as_deref(), Some("http://p"));
        assert_eq!(calls.get(), 3);
    }
}
