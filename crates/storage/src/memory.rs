//! In-process document backend
//!
//! `memory://[user:pass@]host[:port]/database` connects to a document store
//! that lives inside the process. It behaves like a small document
//! database: named collections of [`Document`]s, upserts keyed by a
//! selector document, first-match deletes, and sessions.
//!
//! ## Design
//!
//! - Collections live in a `DashMap`, each behind its own `RwLock`, so
//!   writes to different collections never contend.
//! - Engines are shared per location (`host[:port]/database`) through a
//!   process-wide weak registry: two connections to the same URI see the
//!   same data, and the data goes away once the last connection is dropped.
//! - The first connection fixes the engine's credentials; later ones must
//!   present the same user name and password.
//! - Every batch is validated before anything is applied, so a failed
//!   batch leaves the collection untouched.

use crate::connection::{ConnectionAddress, Connection, Connector, Upsert};
use crate::session::Session;
use dashmap::{DashMap, DashSet};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use strata_odm_core::{Document, Error, Result};
use tracing::{debug, trace};

/// Scheme served by [`MemoryConnector`]
pub const MEMORY_SCHEME: &str = "memory";

// =============================================================================
// Global Engine Registry
// =============================================================================

/// Open engines (location -> weak reference)
static OPEN_ENGINES: Lazy<Mutex<HashMap<String, Weak<MemoryEngine>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

// =============================================================================
// Write statistics
// =============================================================================

/// Counters of write traffic an engine has accepted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Successful upsert calls (one per batch)
    pub upsert_calls: u64,
    /// Documents written by upserts
    pub documents_upserted: u64,
    /// Successful delete calls (one per batch)
    pub delete_calls: u64,
    /// Documents removed
    pub documents_deleted: u64,
}

#[derive(Default)]
struct WriteCounters {
    upsert_calls: AtomicU64,
    documents_upserted: AtomicU64,
    delete_calls: AtomicU64,
    documents_deleted: AtomicU64,
}

impl WriteCounters {
    fn snapshot(&self) -> WriteStats {
        WriteStats {
            upsert_calls: self.upsert_calls.load(Ordering::Relaxed),
            documents_upserted: self.documents_upserted.load(Ordering::Relaxed),
            delete_calls: self.delete_calls.load(Ordering::Relaxed),
            documents_deleted: self.documents_deleted.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

type Collection = Arc<RwLock<Vec<Document>>>;

/// An in-process document database
pub struct MemoryEngine {
    location: String,
    owner: (Option<String>, Option<String>),
    collections: DashMap<String, Collection>,
    stats: WriteCounters,
}

impl MemoryEngine {
    /// Open or join the engine at `address`
    pub fn open(address: &ConnectionAddress) -> Result<Arc<MemoryEngine>> {
        let location = address.location();
        let presented = (address.username.clone(), address.password.clone());

        let mut registry = OPEN_ENGINES.lock();
        if let Some(engine) = registry.get(&location).and_then(Weak::upgrade) {
            if engine.owner != presented {
                return Err(Error::InvalidConnection(format!(
                    "authentication failed for {}",
                    address
                )));
            }
            return Ok(engine);
        }

        debug!(location = %location, "Creating in-memory engine");
        let engine = Arc::new(MemoryEngine {
            location: location.clone(),
            owner: presented,
            collections: DashMap::new(),
            stats: WriteCounters::default(),
        });
        registry.retain(|_, weak| weak.strong_count() > 0);
        registry.insert(location, Arc::downgrade(&engine));
        Ok(engine)
    }

    /// Engine currently open at `location` (`host[:port]/database`)
    pub fn lookup(location: &str) -> Option<Arc<MemoryEngine>> {
        OPEN_ENGINES.lock().get(location).and_then(Weak::upgrade)
    }

    /// `host[:port]/database` of this engine
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Write counters so far
    pub fn stats(&self) -> WriteStats {
        self.stats.snapshot()
    }

    /// Number of documents in a collection (0 if it does not exist)
    pub fn document_count(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|c| c.read().len())
            .unwrap_or(0)
    }

    /// Sorted collection names
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Create a collection; fails if it exists
    pub fn create_collection(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::Storage("collection name is empty".to_string()));
        }
        match self.collections.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(Error::Storage(format!(
                "collection {} already exists",
                name
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(RwLock::new(Vec::new())));
                debug!(location = %self.location, collection = name, "Created collection");
                Ok(())
            }
        }
    }

    fn collection(&self, name: &str) -> Option<Collection> {
        self.collections.get(name).map(|c| Arc::clone(c.value()))
    }

    fn collection_or_create(&self, name: &str) -> Collection {
        Arc::clone(
            self.collections
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(RwLock::new(Vec::new())))
                .value(),
        )
    }

    /// Documents matching `filter`, in insertion order
    pub fn find(&self, collection: &str, filter: &Document) -> Vec<Document> {
        match self.collection(collection) {
            Some(docs) => docs
                .read()
                .iter()
                .filter(|doc| doc.matches(filter))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Apply a batch of upserts atomically
    ///
    /// An existing match receives the value's fields, keeping fields the
    /// value does not mention. A miss inserts key and value merged.
    pub fn upsert(&self, collection: &str, batch: &[Upsert]) -> Result<usize> {
        if batch.iter().any(|op| op.key.is_empty()) {
            return Err(Error::Storage(format!(
                "upsert into {} with an empty key document",
                collection
            )));
        }

        let docs = self.collection_or_create(collection);
        let mut docs = docs.write();
        for op in batch {
            match docs.iter_mut().find(|doc| doc.matches(&op.key)) {
                Some(existing) => existing.merge(&op.value),
                None => {
                    let mut created = op.key.clone();
                    created.merge(&op.value);
                    docs.push(created);
                }
            }
        }

        self.stats.upsert_calls.fetch_add(1, Ordering::Relaxed);
        self.stats
            .documents_upserted
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
        trace!(collection, count = batch.len(), "Upserted documents");
        Ok(batch.len())
    }

    /// Delete the first document matching each key
    pub fn delete(&self, collection: &str, keys: &[Document]) -> Result<usize> {
        if keys.iter().any(Document::is_empty) {
            return Err(Error::Storage(format!(
                "delete from {} with an empty key document",
                collection
            )));
        }

        let removed = match self.collection(collection) {
            Some(docs) => {
                let mut docs = docs.write();
                let mut removed = 0;
                for key in keys {
                    if let Some(index) = docs.iter().position(|doc| doc.matches(key)) {
                        docs.remove(index);
                        removed += 1;
                    }
                }
                removed
            }
            None => 0,
        };

        self.stats.delete_calls.fetch_add(1, Ordering::Relaxed);
        self.stats
            .documents_deleted
            .fetch_add(removed as u64, Ordering::Relaxed);
        trace!(collection, removed, "Deleted documents");
        Ok(removed)
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("location", &self.location)
            .field("collections", &self.collections.len())
            .finish()
    }
}

// =============================================================================
// Connection
// =============================================================================

/// Connection to a [`MemoryEngine`]
pub struct MemoryConnection {
    engine: Arc<MemoryEngine>,
    database: String,
    sessions: DashSet<Session>,
    closed: AtomicBool,
}

impl MemoryConnection {
    /// Engine behind this connection
    pub fn engine(&self) -> &Arc<MemoryEngine> {
        &self.engine
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(Error::NotConnected)
        } else {
            Ok(())
        }
    }

    fn check_session(&self, session: Option<&Session>) -> Result<()> {
        match session {
            Some(session) if !self.sessions.contains(session) => Err(Error::InvalidSession(
                format!("{} is not open on this connection", session),
            )),
            _ => Ok(()),
        }
    }
}

impl Connection for MemoryConnection {
    fn ping(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    fn collection_names(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(self.engine.collection_names())
    }

    fn create_collection(&self, name: &str) -> Result<()> {
        self.ensure_open()?;
        self.engine.create_collection(name)
    }

    fn find(&self, collection: &str, filter: &Document) -> Result<Vec<Document>> {
        self.ensure_open()?;
        Ok(self.engine.find(collection, filter))
    }

    fn upsert(
        &self,
        collection: &str,
        batch: &[Upsert],
        session: Option<&Session>,
    ) -> Result<usize> {
        self.ensure_open()?;
        self.check_session(session)?;
        self.engine.upsert(collection, batch)
    }

    fn delete(
        &self,
        collection: &str,
        keys: &[Document],
        session: Option<&Session>,
    ) -> Result<usize> {
        self.ensure_open()?;
        self.check_session(session)?;
        self.engine.delete(collection, keys)
    }

    fn start_session(&self) -> Result<Session> {
        self.ensure_open()?;
        let session = Session::new();
        self.sessions.insert(session);
        Ok(session)
    }

    fn end_session(&self, session: &Session) -> Result<()> {
        self.ensure_open()?;
        self.sessions
            .remove(session)
            .map(|_| ())
            .ok_or_else(|| Error::InvalidSession(format!("{} is not open", session)))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.sessions.clear();
    }
}

/// Connector for the `memory` scheme
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryConnector;

impl Connector for MemoryConnector {
    fn scheme(&self) -> &str {
        MEMORY_SCHEME
    }

    fn connect(&self, address: &ConnectionAddress) -> Result<Box<dyn Connection>> {
        let engine = MemoryEngine::open(address)?;
        Ok(Box::new(MemoryConnection {
            engine,
            database: address.database.clone(),
            sessions: DashSet::new(),
            closed: AtomicBool::new(false),
        }))
    }
}
