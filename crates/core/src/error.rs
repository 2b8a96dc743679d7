//! Error types for strata-odm
//!
//! This module defines all error types used throughout the mapping layer.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Taxonomy
//!
//! - **Connection state**: `AlreadyConnected`, `NotConnected`, `InvalidConnection`, `InvalidSession`
//! - **Schema**: `ModelDeclarationMissing`, `NoPrimaryKey`, `MultiplePrimaryKeys`,
//!   `InvalidSchema`, `ModelNotRegistered`
//! - **Codec**: `NoCodecFound`, `Codec`, `TypeMismatch`, `UnknownField`
//! - **Cache policy**: `NotCached`
//! - **Storage/config**: `Storage`, `Config`
//!
//! None of these are retried automatically.

use thiserror::Error;

/// Result type alias for strata-odm operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the object-document mapping layer
#[derive(Debug, Error)]
pub enum Error {
    /// `connect` was called on a gateway that already holds a connection
    #[error("Already connected to database")]
    AlreadyConnected,

    /// A data operation was issued without a live connection
    #[error("Not connected to database")]
    NotConnected,

    /// The connection URI or credential set could not be used
    #[error("Invalid connection target: {0}")]
    InvalidConnection(String),

    /// A write carried a session token the backend does not know
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// The type never declared a storage name
    #[error("Model {model} is missing its model declaration")]
    ModelDeclarationMissing {
        /// Rust type name of the offending model
        model: &'static str,
    },

    /// No field is marked as primary key
    #[error("Model {model} declares no primary key")]
    NoPrimaryKey {
        /// Rust type name of the offending model
        model: &'static str,
    },

    /// More than one field is marked as primary key
    #[error("Model {model} declares {count} primary keys, expected exactly one")]
    MultiplePrimaryKeys {
        /// Rust type name of the offending model
        model: &'static str,
        /// Number of primary-key fields found
        count: usize,
    },

    /// Field names are empty, duplicated, or the storage name is taken
    #[error("Invalid schema for {model}: {reason}")]
    InvalidSchema {
        /// Rust type name of the offending model
        model: &'static str,
        /// What is wrong with the declaration
        reason: String,
    },

    /// A data operation referenced a model that was never registered
    #[error("Model {model} has not been registered")]
    ModelNotRegistered {
        /// Rust type name of the model
        model: &'static str,
    },

    /// No codec resolves for a field type
    #[error("No codec found for type {type_name}")]
    NoCodecFound {
        /// Rust type name that has no codec
        type_name: &'static str,
    },

    /// A stored value could not be converted back to its native type
    #[error("Codec error for {type_name}: {reason}")]
    Codec {
        /// Rust type name being decoded or encoded
        type_name: &'static str,
        /// Why the conversion failed
        reason: String,
    },

    /// A query value does not have the declared type of the field
    #[error("Type mismatch on field {field}: expected {expected}")]
    TypeMismatch {
        /// Field queried
        field: String,
        /// Declared type of the field
        expected: &'static str,
    },

    /// A field name is not part of the model
    #[error("Unknown field {field} on model {model}")]
    UnknownField {
        /// Rust type name of the model
        model: &'static str,
        /// Requested field name
        field: String,
    },

    /// A cache API was used on a model that does not opt into caching
    #[error("Model {model} is not cached")]
    NotCached {
        /// Rust type name of the model
        model: &'static str,
    },

    /// Backing store rejected an operation
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration could not be read, parsed or written
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build a codec error for type `T`
    pub fn codec<T: ?Sized>(reason: impl Into<String>) -> Self {
        Error::Codec {
            type_name: std::any::type_name::<T>(),
            reason: reason.into(),
        }
    }

    /// True for `AlreadyConnected`, `NotConnected`, `InvalidConnection` and `InvalidSession`
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::AlreadyConnected
                | Error::NotConnected
                | Error::InvalidConnection(_)
                | Error::InvalidSession(_)
        )
    }

    /// True for errors raised while validating a model declaration
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Error::ModelDeclarationMissing { .. }
                | Error::NoPrimaryKey { .. }
                | Error::MultiplePrimaryKeys { .. }
                | Error::InvalidSchema { .. }
        )
    }
}
