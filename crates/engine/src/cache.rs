//! In-memory mirror of persisted records
//!
//! The store maps a record's identity to the record itself, tagged with its
//! model type. It holds the same `Shared<M>` handles callers hold, never
//! copies, so a mutation made through any handle is visible through the
//! cache.
//!
//! ## Design
//!
//! Entries live in a `DashMap` keyed by [`RecordId`]; each entry is
//! synchronized on its own. Each entry is stamped with a sequence number
//! when it first enters the cache, and reads return records in that order.
//! Nothing here makes composed calls atomic.

use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strata_odm_core::{Model, Record, RecordId, Shared};

struct CacheEntry {
    seq: u64,
    model: TypeId,
    record: Arc<dyn Any + Send + Sync>,
}

/// Identity-keyed cache of live records
#[derive(Default)]
pub struct CacheStore {
    entries: DashMap<RecordId, CacheEntry>,
    next_seq: AtomicU64,
}

impl CacheStore {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one record; re-inserting the same record keeps its position
    pub fn put<M: Model>(&self, record: &Shared<M>) {
        self.entries
            .entry(record.id())
            .or_insert_with(|| CacheEntry {
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                model: TypeId::of::<M>(),
                record: Arc::clone(record) as Arc<dyn Any + Send + Sync>,
            });
    }

    /// Insert every record
    pub fn put_all<M: Model>(&self, records: &[Shared<M>]) {
        for record in records {
            self.put(record);
        }
    }

    /// Remove a record by identity; true if it was cached
    pub fn remove(&self, id: RecordId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Every cached record of model `M`, in insertion order
    pub fn read_all<M: Model>(&self) -> Vec<Shared<M>> {
        let wanted = TypeId::of::<M>();
        let mut stamped: Vec<(u64, Shared<M>)> = self
            .entries
            .iter()
            .filter(|entry| entry.model == wanted)
            .filter_map(|entry| {
                let record = Arc::clone(&entry.record).downcast::<Record<M>>().ok()?;
                Some((entry.seq, record))
            })
            .collect();
        stamped.sort_by_key(|(seq, _)| *seq);
        stamped.into_iter().map(|(_, record)| record).collect()
    }

    /// Drop every record of model `M` for which `predicate` holds
    ///
    /// Returns how many were dropped.
    pub fn remove_where<M: Model>(&self, predicate: impl Fn(&Shared<M>) -> bool) -> usize {
        let doomed: Vec<RecordId> = self
            .read_all::<M>()
            .into_iter()
            .filter(|record| predicate(record))
            .map(|record| record.id())
            .collect();
        doomed.into_iter().filter(|id| self.remove(*id)).count()
    }

    /// Drop every record of model `M`
    pub fn remove_type<M: Model>(&self) -> usize {
        let wanted = TypeId::of::<M>();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.model != wanted);
        before.saturating_sub(self.entries.len())
    }

    /// Whether the record is cached
    pub fn contains(&self, id: RecordId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of cached records across all models
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of cached records of model `M`
    pub fn count<M: Model>(&self) -> usize {
        let wanted = TypeId::of::<M>();
        self.entries.iter().filter(|e| e.model == wanted).count()
    }

    /// Drop everything
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("entries", &self.entries.len())
            .finish()
    }
}
