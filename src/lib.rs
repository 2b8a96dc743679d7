//! strata-odm - typed models over document stores
//!
//! Declare a model once (storage name, fields, primary key) and persist it
//! to a document backend, with an optional in-memory cache and comparison
//! filters over live records.
//!
//! # Quick Start
//!
//! ```ignore
//! use strata_odm::{Database, FilterOp, Model, ModelBuilder, OdmConfig, Record};
//!
//! #[derive(Default)]
//! struct User { id: i64, name: String, age: i32 }
//!
//! impl Model for User {
//!     fn declare(model: ModelBuilder<Self>) -> ModelBuilder<Self> {
//!         model
//!             .table("users")
//!             .cached(true)
//!             .primary_key("id", |u| &u.id, |u, v| u.id = v)
//!             .field("name", |u| &u.name, |u, v| u.name = v)
//!             .field("age", |u| &u.age, |u, v| u.age = v)
//!     }
//! }
//!
//! let db = Database::open(OdmConfig::memory("app"))?;
//! db.register::<User>()?;
//!
//! let user = Record::new(User { id: 1, name: "Ada".into(), age: 36 });
//! db.save(&user)?;
//! let adults = db.filter(&db.read_all_from_cache::<User>()?, "age", FilterOp::Gte, &18)?;
//! ```
//!
//! # Architecture
//!
//! - `strata-odm-core`: values, type descriptors, codecs, schemas, records
//! - `strata-odm-storage`: gateway, connection seam, in-memory backend
//! - `strata-odm-engine`: serializer, cache, filter, `Database`

pub use strata_odm_core::*;
pub use strata_odm_engine::{
    cache, filter, serializer, CacheStore, CredentialsConfig, Database, Decoded, ModelSet, OdmConfig,
    DEFAULT_URI,
};
pub use strata_odm_storage::{
    Connection, ConnectionAddress, ConnectionTarget, Connector, Credentials, MemoryConnector,
    MemoryEngine, Options, Session, StorageGateway, Upsert, WriteStats, SESSION_OPTION,
};
