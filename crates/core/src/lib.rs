//! Core types and traits for strata-odm
//!
//! This crate defines the foundational types used throughout the mapping layer:
//! - Value / Document: generic storage representation
//! - Persist / TypeDescriptor: how a Rust type describes its shape
//! - Codec / CodecRegistry: conversions between native values and `Value`
//! - Model / ModelBuilder / ModelSchema: explicit model declarations
//! - Record: shared, lockable model instances
//! - FilterOp: comparison operators
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod field;
pub mod record;
pub mod schema;
pub mod types;
pub mod value;

pub use codec::{Codec, CodecKind, CodecRegistry, DynCodec, ScalarCodec};
pub use error::{Error, Result};
pub use field::{AnyValue, Persist, PersistEnum, Shape, TypeDescriptor};
pub use record::{Record, RecordId, Shared, WriteGuard};
pub use schema::{FieldDescriptor, Model, ModelBuilder, ModelSchema};
pub use types::FilterOp;
pub use value::{Document, SerializedRecord, Value};
