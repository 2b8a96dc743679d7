//! Database: the caller-facing entry point
//!
//! A `Database` owns everything the mapping layer needs:
//! - the codec registry, extended with [`Database::register_codec`]
//! - validated schemas, one per registered model type
//! - the storage gateway and its connection
//! - the cache store for models declared `cached`
//!
//! ## Reads
//!
//! Fetches decode every returned document into a fresh [`Record`]. A
//! document missing a declared field decodes with that field's default and
//! is immediately written back (one upsert per such record) unless
//! `repair_on_read` is off. Records of cached models are then added to the
//! cache.
//!
//! ## Writes
//!
//! A save or delete holds the record's write lock from serialization until
//! the backend answers. Bulk writes deduplicate the batch, lock records in
//! `RecordId` order and issue a single backend call.
//!
//! ## Thread Safety
//!
//! `Database` is `Send + Sync`; share it behind an `Arc`.

mod config;
mod models;

pub use config::{CredentialsConfig, OdmConfig, DEFAULT_URI};
pub use models::ModelSet;

use crate::cache::CacheStore;
use crate::filter;
use crate::serializer;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use strata_odm_core::{
    CodecRegistry, Document, Error, FilterOp, Model, ModelSchema, Persist, Record, RecordId,
    Result, ScalarCodec, Shared, WriteGuard,
};
use strata_odm_storage::{ConnectionTarget, Options, Session, StorageGateway, Upsert};
use tracing::{debug, info, warn};

/// Object-document mapping database
pub struct Database {
    config: OdmConfig,
    gateway: StorageGateway,
    codecs: RwLock<CodecRegistry>,
    /// TypeId of M -> Arc<ModelSchema<M>>
    schemas: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    /// Storage name -> owning model type
    tables: DashMap<String, TypeId>,
    cache: CacheStore,
}

impl Database {
    /// Create an unconnected database
    pub fn new(config: OdmConfig) -> Self {
        Database {
            config,
            gateway: StorageGateway::new(),
            codecs: RwLock::new(CodecRegistry::new()),
            schemas: DashMap::new(),
            tables: DashMap::new(),
            cache: CacheStore::new(),
        }
    }

    /// Create a database and connect to the configured backend
    pub fn open(config: OdmConfig) -> Result<Arc<Self>> {
        let target = config.target()?;
        let db = Self::new(config);
        db.connect(&target)?;
        Ok(Arc::new(db))
    }

    /// Current configuration
    pub fn config(&self) -> &OdmConfig {
        &self.config
    }

    /// Underlying storage gateway
    pub fn gateway(&self) -> &StorageGateway {
        &self.gateway
    }

    /// Underlying cache store
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    // ========================================================================
    // Connection
    // ========================================================================

    /// Connect to a backend
    pub fn connect(&self, target: &ConnectionTarget) -> Result<()> {
        self.gateway.connect(target)
    }

    /// Connect with a URI
    pub fn connect_uri(&self, uri: &str) -> Result<()> {
        self.gateway.connect_uri(uri)
    }

    /// Connect with a credential map
    pub fn connect_credentials(&self, credentials: &HashMap<String, String>) -> Result<()> {
        self.gateway.connect_credentials(credentials)
    }

    /// Whether the connection is alive; never fails
    pub fn is_connection_valid(&self) -> bool {
        self.gateway.is_connection_valid()
    }

    /// Release the connection
    pub fn terminate_connection(&self) -> Result<()> {
        self.gateway.terminate_connection()
    }

    /// Open a backend session; pass [`Session::options`] to `*_with` writes
    pub fn start_session(&self) -> Result<Session> {
        self.gateway.start_session()
    }

    /// Close a backend session
    pub fn end_session(&self, session: &Session) -> Result<()> {
        self.gateway.end_session(session)
    }

    // ========================================================================
    // Codecs and registration
    // ========================================================================

    /// Register a codec for the exact type `T`, replacing any previous one
    ///
    /// Register codecs before the models that use them.
    pub fn register_codec<T: Any, C: ScalarCodec<T>>(&self, codec: C) {
        self.codecs.write().register::<T, C>(codec);
        debug!(type_name = std::any::type_name::<T>(), "Registered codec");
    }

    /// Register every model of a set, in order
    pub fn register_models<S: ModelSet>(&self) -> Result<()> {
        S::register_all(self)
    }

    /// Validate and register model `M`
    ///
    /// Provisions the backing collection and, for models that are both
    /// cached and auto-fetched, primes the cache. Registering an already
    /// registered model returns its existing schema.
    ///
    /// # Errors
    ///
    /// - schema errors from the declaration
    /// - `NoCodecFound` if a field type has no codec
    /// - `InvalidSchema` if another model owns the storage name
    /// - `NotConnected` if no connection is held
    pub fn register<M: Model>(&self) -> Result<Arc<ModelSchema<M>>> {
        if let Some(existing) = self.registered::<M>() {
            return Ok(existing);
        }

        let schema = ModelSchema::<M>::of()?;
        {
            let codecs = self.codecs.read();
            for field in schema.fields() {
                codecs.validate(field.type_descriptor())?;
            }
        }

        let type_id = TypeId::of::<M>();
        self.check_table_owner(&schema, type_id)?;
        self.gateway.provision_collection(schema.table())?;

        {
            let owner = *self
                .tables
                .entry(schema.table().to_string())
                .or_insert(type_id);
            if owner != type_id {
                return Err(Self::table_taken(&schema));
            }
        }

        let fresh = Arc::new(schema);
        let stored = Arc::clone(
            self.schemas
                .entry(type_id)
                .or_insert_with(|| Arc::clone(&fresh) as Arc<dyn Any + Send + Sync>)
                .value(),
        );
        let schema = stored
            .downcast::<ModelSchema<M>>()
            .map_err(|_| Error::ModelNotRegistered {
                model: std::any::type_name::<M>(),
            })?;
        if !Arc::ptr_eq(&schema, &fresh) {
            // Another thread registered it first
            return Ok(schema);
        }

        info!(
            model = schema.model_name(),
            table = schema.table(),
            cached = schema.is_cached(),
            "Registered model"
        );

        if schema.auto_fetch() {
            if let Err(e) = self.fetch_all::<M>() {
                warn!(model = schema.model_name(), error = %e, "Auto-fetch failed");
            }
        }
        Ok(schema)
    }

    /// Schema of a registered model
    pub fn schema<M: Model>(&self) -> Result<Arc<ModelSchema<M>>> {
        self.registered::<M>().ok_or(Error::ModelNotRegistered {
            model: std::any::type_name::<M>(),
        })
    }

    /// Whether `M` is registered
    pub fn is_registered<M: Model>(&self) -> bool {
        self.schemas.contains_key(&TypeId::of::<M>())
    }

    fn registered<M: Model>(&self) -> Option<Arc<ModelSchema<M>>> {
        let entry = self.schemas.get(&TypeId::of::<M>())?;
        Arc::clone(entry.value()).downcast::<ModelSchema<M>>().ok()
    }

    fn check_table_owner<M>(&self, schema: &ModelSchema<M>, type_id: TypeId) -> Result<()> {
        match self.tables.get(schema.table()) {
            Some(owner) if *owner != type_id => Err(Self::table_taken(schema)),
            _ => Ok(()),
        }
    }

    fn table_taken<M>(schema: &ModelSchema<M>) -> Error {
        Error::InvalidSchema {
            model: schema.model_name(),
            reason: format!("storage name {} is used by another model", schema.table()),
        }
    }

    fn cached_schema<M: Model>(&self) -> Result<Arc<ModelSchema<M>>> {
        let Some(schema) = self.registered::<M>() else {
            // Cache policy is known from the declaration alone
            if let Ok(declared) = ModelSchema::<M>::of() {
                if !declared.is_cached() {
                    return Err(Error::NotCached {
                        model: declared.model_name(),
                    });
                }
            }
            return Err(Error::ModelNotRegistered {
                model: std::any::type_name::<M>(),
            });
        };
        if !schema.is_cached() {
            return Err(Error::NotCached {
                model: schema.model_name(),
            });
        }
        Ok(schema)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.gateway.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    // ========================================================================
    // Fetch
    // ========================================================================

    /// Load every stored instance of `M`
    pub fn fetch_all<M: Model>(&self) -> Result<Vec<Shared<M>>> {
        self.ensure_connected()?;
        let schema = self.schema::<M>()?;
        let documents = self.gateway.find(schema.table(), &Document::new())?;
        self.materialize(&schema, documents)
    }

    /// Load stored instances of `M` whose `field` equals `value`
    ///
    /// # Errors
    ///
    /// - `UnknownField` if `M` has no such field
    /// - `TypeMismatch` if `V` is not the field's declared type
    pub fn fetch_matching<M: Model, V: Persist>(
        &self,
        field: &str,
        value: &V,
    ) -> Result<Vec<Shared<M>>> {
        self.ensure_connected()?;
        let schema = self.schema::<M>()?;
        let query = self.equality_query(&schema, field, value)?;
        let documents = self.gateway.find(schema.table(), &query)?;
        self.materialize(&schema, documents)
    }

    fn equality_query<M: Model, V: Persist>(
        &self,
        schema: &ModelSchema<M>,
        field: &str,
        value: &V,
    ) -> Result<Document> {
        let descriptor = schema.require_field(field)?;
        let ty = descriptor.type_descriptor();
        if ty.type_id() != TypeId::of::<V>() {
            return Err(Error::TypeMismatch {
                field: field.to_string(),
                expected: ty.type_name(),
            });
        }
        let encoded = self.codecs.read().encode(ty, value as &dyn Any)?;
        Ok(Document::new().with(descriptor.external_name(), encoded))
    }

    fn materialize<M: Model>(
        &self,
        schema: &ModelSchema<M>,
        documents: Vec<Document>,
    ) -> Result<Vec<Shared<M>>> {
        let codecs = self.codecs.read();
        let mut records = Vec::with_capacity(documents.len());
        for document in &documents {
            let decoded = serializer::deserialize(schema, &codecs, document)?;
            let dirty = decoded.is_dirty();
            let record = Record::new(decoded.model);
            if dirty {
                if self.config.repair_on_read {
                    self.repair(schema, &codecs, &record, &decoded.missing);
                } else {
                    debug!(
                        model = schema.model_name(),
                        missing = ?decoded.missing,
                        "Document lacks fields, repair disabled"
                    );
                }
            }
            records.push(record);
        }

        if schema.is_cached() {
            self.cache.put_all(&records);
        }
        debug!(
            model = schema.model_name(),
            count = records.len(),
            "Fetched records"
        );
        Ok(records)
    }

    fn repair<M: Model>(
        &self,
        schema: &ModelSchema<M>,
        codecs: &CodecRegistry,
        record: &Shared<M>,
        missing: &[String],
    ) {
        let _guard = record.lock_write();
        let written = serializer::serialize(schema, codecs, &*record.read()).and_then(|doc| {
            self.gateway
                .upsert_one(schema.table(), doc.key, doc.value, &Options::new())
        });
        match written {
            Ok(()) => debug!(model = schema.model_name(), missing = ?missing, "Repaired document"),
            Err(e) => warn!(
                model = schema.model_name(),
                missing = ?missing,
                error = %e,
                "Repair write failed"
            ),
        }
    }

    // ========================================================================
    // Save / delete
    // ========================================================================

    /// Persist one record
    pub fn save<M: Model>(&self, record: &Shared<M>) -> Result<()> {
        self.save_with(record, &Options::new())
    }

    /// Persist one record with write options
    pub fn save_with<M: Model>(&self, record: &Shared<M>, options: &Options) -> Result<()> {
        self.ensure_connected()?;
        let schema = self.schema::<M>()?;
        {
            let _guard = record.lock_write();
            let doc = {
                let codecs = self.codecs.read();
                serializer::serialize(&schema, &codecs, &*record.read())?
            };
            self.gateway
                .upsert_one(schema.table(), doc.key, doc.value, options)?;
        }
        if schema.is_cached() {
            self.cache.put(record);
        }
        debug!(model = schema.model_name(), record = %record.id(), "Saved record");
        Ok(())
    }

    /// Persist many records in one batch
    pub fn save_many<M: Model>(&self, records: &[Shared<M>]) -> Result<()> {
        self.save_many_with(records, &Options::new())
    }

    /// Persist many records in one batch with write options
    ///
    /// Either every record is written or none is.
    pub fn save_many_with<M: Model>(&self, records: &[Shared<M>], options: &Options) -> Result<()> {
        self.ensure_connected()?;
        let schema = self.schema::<M>()?;
        let ordered = ordered_unique(records);
        {
            let _guards = lock_all(&ordered);
            let batch = {
                let codecs = self.codecs.read();
                ordered
                    .iter()
                    .map(|record| {
                        serializer::serialize(&schema, &codecs, &*record.read())
                            .map(|doc| Upsert::new(doc.key, doc.value))
                    })
                    .collect::<Result<Vec<_>>>()?
            };
            self.gateway.upsert_many(schema.table(), batch, options)?;
        }
        if schema.is_cached() {
            for record in &ordered {
                self.cache.put(record);
            }
        }
        debug!(
            model = schema.model_name(),
            count = ordered.len(),
            "Saved batch"
        );
        Ok(())
    }

    /// Delete one record; true if a stored document was removed
    pub fn delete<M: Model>(&self, record: &Shared<M>) -> Result<bool> {
        self.delete_with(record, &Options::new())
    }

    /// Delete one record with write options
    pub fn delete_with<M: Model>(&self, record: &Shared<M>, options: &Options) -> Result<bool> {
        self.ensure_connected()?;
        let schema = self.schema::<M>()?;
        let removed = {
            let _guard = record.lock_write();
            let key = {
                let codecs = self.codecs.read();
                serializer::key_document(&schema, &codecs, &*record.read())?
            };
            self.gateway.delete_one(schema.table(), key, options)?
        };
        if schema.is_cached() {
            self.cache.remove(record.id());
        }
        debug!(model = schema.model_name(), record = %record.id(), removed, "Deleted record");
        Ok(removed)
    }

    /// Delete many records in one batch; returns how many documents went
    pub fn delete_many<M: Model>(&self, records: &[Shared<M>]) -> Result<usize> {
        self.delete_many_with(records, &Options::new())
    }

    /// Delete many records in one batch with write options
    pub fn delete_many_with<M: Model>(
        &self,
        records: &[Shared<M>],
        options: &Options,
    ) -> Result<usize> {
        self.ensure_connected()?;
        let schema = self.schema::<M>()?;
        let ordered = ordered_unique(records);
        let removed = {
            let _guards = lock_all(&ordered);
            let keys = {
                let codecs = self.codecs.read();
                ordered
                    .iter()
                    .map(|record| serializer::key_document(&schema, &codecs, &*record.read()))
                    .collect::<Result<Vec<_>>>()?
            };
            self.gateway.delete_many(schema.table(), keys, options)?
        };
        if schema.is_cached() {
            for record in &ordered {
                self.cache.remove(record.id());
            }
        }
        Ok(removed)
    }

    // ========================================================================
    // Cache
    // ========================================================================

    /// Every cached record of `M`, in insertion order
    ///
    /// # Errors
    ///
    /// `NotCached` if `M` is not declared cached.
    pub fn read_all_from_cache<M: Model>(&self) -> Result<Vec<Shared<M>>> {
        self.cached_schema::<M>()?;
        Ok(self.cache.read_all::<M>())
    }

    /// Cached records of `M` whose `field` equals `value`
    pub fn read_matching_from_cache<M, V>(&self, field: &str, value: &V) -> Result<Vec<Shared<M>>>
    where
        M: Model,
        V: Persist + PartialEq,
    {
        let schema = self.cached_schema::<M>()?;
        let records = self.cache.read_all::<M>();
        Ok(filter::filter(&schema, &records, field, FilterOp::Eq, value))
    }

    /// Drop every cached record of `M` and fetch them all again
    pub fn update_whole_cache<M: Model>(&self) -> Result<Vec<Shared<M>>> {
        let schema = self.cached_schema::<M>()?;
        self.ensure_connected()?;
        let dropped = self.cache.remove_type::<M>();
        debug!(model = schema.model_name(), dropped, "Invalidated cache");
        self.fetch_all::<M>()
    }

    /// Drop cached records of `M` whose `field` equals `value` and fetch
    /// the matching ones again
    pub fn update_matching_cache<M, V>(&self, field: &str, value: &V) -> Result<Vec<Shared<M>>>
    where
        M: Model,
        V: Persist + PartialEq,
    {
        let schema = self.cached_schema::<M>()?;
        self.ensure_connected()?;
        let query = self.equality_query(&schema, field, value)?;
        let descriptor = schema.require_field(field)?;
        let dropped = self.cache.remove_where::<M>(|record| {
            filter::field_matches(descriptor, &*record.read(), FilterOp::Eq, value)
        });
        debug!(model = schema.model_name(), field, dropped, "Invalidated matching cache entries");

        let documents = self.gateway.find(schema.table(), &query)?;
        self.materialize(&schema, documents)
    }

    // ========================================================================
    // Filter
    // ========================================================================

    /// Records whose `field` satisfies `op value`, in input order
    ///
    /// Unknown fields match nothing.
    pub fn filter<M, V>(
        &self,
        records: &[Shared<M>],
        field: &str,
        op: FilterOp,
        value: &V,
    ) -> Result<Vec<Shared<M>>>
    where
        M: Model,
        V: Persist + PartialEq,
    {
        let schema = self.schema::<M>()?;
        Ok(filter::filter(&schema, records, field, op, value))
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("gateway", &self.gateway)
            .field("models", &self.schemas.len())
            .field("cache", &self.cache)
            .finish()
    }
}

/// Distinct records in `RecordId` order
fn ordered_unique<M>(records: &[Shared<M>]) -> Vec<Shared<M>> {
    records
        .iter()
        .map(|record| (record.id(), Arc::clone(record)))
        .collect::<BTreeMap<RecordId, Shared<M>>>()
        .into_values()
        .collect()
}

fn lock_all<M>(records: &[Shared<M>]) -> Vec<WriteGuard<'_>> {
    records.iter().map(|record| record.lock_write()).collect()
}
