//! Storage layer for strata-odm
//!
//! This crate implements the document backend seam:
//! - StorageGateway: single connection holder and data-operation surface
//! - Connection / Connector: traits a backend implements
//! - MemoryEngine: in-process document store behind `memory://` URIs
//! - Session: backend sessions, carried through write options

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod gateway;
pub mod memory;
pub mod session;

pub use connection::{
    Connection, ConnectionAddress, ConnectionTarget, Connector, Credentials, Upsert,
};
pub use gateway::StorageGateway;
pub use memory::{MemoryConnection, MemoryConnector, MemoryEngine, WriteStats, MEMORY_SCHEME};
pub use session::{Options, Session, SESSION_OPTION};
