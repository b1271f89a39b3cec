// SPDX-License-Identifier: MIT OR Apache-2.0

// flagflux_rust/src/core/store.rs

//! Feature data storage.
//!
//! The store is fed by the streaming data system (`init` on the initial
//! payload, `upsert`/`delete` on patches) and read by the evaluator through
//! narrow lookup functions. Writes are version-guarded so that out-of-order
//! patches cannot roll data backwards; deletes leave a versioned tombstone
//! behind for the same reason.

use crate::core::model::{FeatureFlag, Segment};
use std::collections::HashMap;
use std::sync::RwLock;

/// The two kinds of top-level items a store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Features,
    Segments,
}

/// A versioned item held by a feature store.
#[derive(Debug, Clone)]
pub enum StoreItem {
    Flag(FeatureFlag),
    Segment(Segment),
    /// Placeholder left behind by a versioned delete.
    Tombstone(u64),
}

impl StoreItem {
    pub fn version(&self) -> u64 {
        match self {
            StoreItem::Flag(f) => f.version,
            StoreItem::Segment(s) => s.version,
            StoreItem::Tombstone(version) => *version,
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            StoreItem::Flag(f) => Some(&f.key),
            StoreItem::Segment(s) => Some(&s.key),
            StoreItem::Tombstone(_) => None,
        }
    }
}

/// Full data set used to (re)initialize a store.
#[derive(Debug, Clone, Default)]
pub struct AllData {
    pub flags: HashMap<String, FeatureFlag>,
    pub segments: HashMap<String, Segment>,
}

pub trait FeatureStore: Send + Sync {
    /// Replace the entire store contents and mark the store initialized.
    fn init(&self, data: AllData);

    fn get_flag(&self, key: &str) -> Option<FeatureFlag>;

    fn get_segment(&self, key: &str) -> Option<Segment>;

    fn all_flags(&self) -> HashMap<String, FeatureFlag>;

    /// Insert or update an item, ignored when the stored version is newer.
    fn upsert(&self, kind: DataKind, item: StoreItem);

    /// Version-guarded delete; leaves a tombstone so stale upserts are ignored.
    fn delete(&self, kind: DataKind, key: &str, version: u64);

    fn initialized(&self) -> bool;
}

/// Process-local store backed by hash maps under a read/write lock.
#[derive(Debug, Default)]
pub struct InMemoryFeatureStore {
    inner: RwLock<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    flags: HashMap<String, StoreItem>,
    segments: HashMap<String, StoreItem>,
    initialized: bool,
}

impl StoreState {
    fn map_for(&mut self, kind: DataKind) -> &mut HashMap<String, StoreItem> {
        match kind {
            DataKind::Features => &mut self.flags,
            DataKind::Segments => &mut self.segments,
        }
    }
}

impl InMemoryFeatureStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeatureStore for InMemoryFeatureStore {
    fn init(&self, data: AllData) {
        let mut state = self.inner.write().expect("feature store lock poisoned");
        state.flags = data
            .flags
            .into_iter()
            .map(|(key, flag)| (key, StoreItem::Flag(flag)))
            .collect();
        state.segments = data
            .segments
            .into_iter()
            .map(|(key, segment)| (key, StoreItem::Segment(segment)))
            .collect();
        state.initialized = true;
    }

    fn get_flag(&self, key: &str) -> Option<FeatureFlag> {
        let state = self.inner.read().expect("feature store lock poisoned");
        match state.flags.get(key) {
            Some(StoreItem::Flag(flag)) if !flag.deleted => Some(flag.clone()),
            _ => None,
        }
    }

    fn get_segment(&self, key: &str) -> Option<Segment> {
        let state = self.inner.read().expect("feature store lock poisoned");
        match state.segments.get(key) {
            Some(StoreItem::Segment(segment)) if !segment.deleted => Some(segment.clone()),
            _ => None,
        }
    }

    fn all_flags(&self) -> HashMap<String, FeatureFlag> {
        let state = self.inner.read().expect("feature store lock poisoned");
        state
            .flags
            .iter()
            .filter_map(|(key, item)| match item {
                StoreItem::Flag(flag) if !flag.deleted => Some((key.clone(), flag.clone())),
                _ => None,
            })
            .collect()
    }

    fn upsert(&self, kind: DataKind, item: StoreItem) {
        let key = match item.key() {
            Some(key) => key.to_string(),
            None => {
                log::warn!("Ignoring store upsert with no key");
                return;
            }
        };
        let mut state = self.inner.write().expect("feature store lock poisoned");
        let map = state.map_for(kind);
        let newer = map
            .get(&key)
            .map_or(true, |existing| existing.version() < item.version());
        if newer {
            map.insert(key, item);
        }
    }

    fn delete(&self, kind: DataKind, key: &str, version: u64) {
        let mut state = self.inner.write().expect("feature store lock poisoned");
        let map = state.map_for(kind);
        let newer = map
            .get(key)
            .map_or(true, |existing| existing.version() < version);
        if newer {
            map.insert(key.to_string(), StoreItem::Tombstone(version));
        }
    }

    fn initialized(&self) -> bool {
        self.inner
            .read()
            .expect("feature store lock poisoned")
            .initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag(key: &str, version: u64) -> FeatureFlag {
        FeatureFlag {
            key: key.to_string(),
            version,
            ..FeatureFlag::default()
        }
    }

    #[test]
    fn init_replaces_contents_and_marks_initialized() {
        let store = InMemoryFeatureStore::new();
        assert!(!store.initialized());
        let mut data = AllData::default();
        data.flags.insert("f1".to_string(), flag("f1", 1));
        store.init(data);
        assert!(store.initialized());
        assert_eq!(store.get_flag("f1").unwrap().version, 1);
        assert!(store.get_flag("missing").is_none());
    }

    #[test]
    fn upsert_respects_versions() {
        let store = InMemoryFeatureStore::new();
        store.upsert(DataKind::Features, StoreItem::Flag(flag("f1", 5)));
        store.upsert(DataKind::Features, StoreItem::Flag(flag("f1", 3)));
        assert_eq!(store.get_flag("f1").unwrap().version, 5);
        store.upsert(DataKind::Features, StoreItem::Flag(flag("f1", 6)));
        assert_eq!(store.get_flag("f1").unwrap().version, 6);
    }

    #[test]
    fn delete_leaves_a_tombstone_blocking_stale_upserts() {
        let store = InMemoryFeatureStore::new();
        store.upsert(DataKind::Features, StoreItem::Flag(flag("f1", 5)));
        store.delete(DataKind::Features, "f1", 7);
        assert!(store.get_flag("f1").is_none());
        store.upsert(DataKind::Features, StoreItem::Flag(flag("f1", 6)));
        assert!(store.get_flag("f1").is_none());
        store.upsert(DataKind::Features, StoreItem::Flag(flag("f1", 8)));
        assert_eq!(store.get_flag("f1").unwrap().version, 8);
    }

    #[test]
    fn all_flags_skips_tombstones() {
        let store = InMemoryFeatureStore::new();
        store.upsert(DataKind::Features, StoreItem::Flag(flag("f1", 1)));
        store.upsert(DataKind::Features, StoreItem::Flag(flag("f2", 1)));
        store.delete(DataKind::Features, "f2", 2);
        let all = store.all_flags();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("f1"));
    }
}
