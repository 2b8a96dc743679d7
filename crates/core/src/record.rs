//! Shared model instances
//!
//! A [`Record`] is the live handle the mapping layer hands out, caches and
//! writes back. Identity is the [`RecordId`] assigned at creation, never the
//! primary key: two records holding the same key are distinct instances.
//!
//! Each record carries an advisory write lock. Persisting a record holds it
//! from the start of serialization until the backing write returns, so two
//! threads cannot interleave mutate-and-save on the same instance.

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u64);

impl RecordId {
    fn next() -> Self {
        RecordId(NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record#{}", self.0)
    }
}

/// Shared handle to a record
pub type Shared<M> = Arc<Record<M>>;

/// A live model instance
pub struct Record<M> {
    id: RecordId,
    state: RwLock<M>,
    write_lock: Mutex<()>,
}

/// Scoped hold on a record's write lock, released on drop
pub struct WriteGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl<M> Record<M> {
    /// Wrap a model value in a new shared record
    pub fn new(model: M) -> Shared<M> {
        Arc::new(Record {
            id: RecordId::next(),
            state: RwLock::new(model),
            write_lock: Mutex::new(()),
        })
    }

    /// Identity of this record
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Read the model value
    pub fn read(&self) -> RwLockReadGuard<'_, M> {
        self.state.read()
    }

    /// Mutate the model value directly, without the write lock
    pub fn write(&self) -> RwLockWriteGuard<'_, M> {
        self.state.write()
    }

    /// Acquire the advisory write lock, blocking while a save is in flight
    pub fn lock_write(&self) -> WriteGuard<'_> {
        WriteGuard {
            _guard: self.write_lock.lock(),
        }
    }

    /// Acquire the write lock if nobody holds it
    pub fn try_lock_write(&self) -> Option<WriteGuard<'_>> {
        self.write_lock
            .try_lock()
            .map(|guard| WriteGuard { _guard: guard })
    }

    /// Whether a write is in flight
    pub fn is_write_locked(&self) -> bool {
        self.write_lock.is_locked()
    }

    /// Mutate under the write lock, so no save observes a half-applied change
    pub fn update<R>(&self, f: impl FnOnce(&mut M) -> R) -> R {
        let _guard = self.lock_write();
        let mut state = self.state.write();
        f(&mut state)
    }

    /// Copy of the current model value
    pub fn snapshot(&self) -> M
    where
        M: Clone,
    {
        self.state.read().clone()
    }
}

impl<M: fmt::Debug> fmt::Debug for Record<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("id", &self.id)
            .field("state", &*self.state.read())
            .finish()
    }
}
