//! Mapping engine for strata-odm
//!
//! This crate ties the core types to a storage backend:
//! - serializer: model instance ⇄ key/value documents, missing-field detection
//! - cache: identity-keyed store of live records
//! - filter: comparison predicates over records
//! - database: the `Database` facade (registration, fetch, save, delete, cache)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod database;
pub mod filter;
pub mod serializer;

pub use cache::CacheStore;
pub use database::{CredentialsConfig, Database, ModelSet, OdmConfig, DEFAULT_URI};
pub use serializer::{deserialize, key_document, serialize, Decoded};
