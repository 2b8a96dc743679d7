//! Storage gateway
//!
//! The single point through which the mapping layer talks to a backend.
//! It owns at most one live connection and a table of connectors keyed by
//! URI scheme; the `memory` connector is always installed.
//!
//! Every data operation fails with [`Error::NotConnected`] while no
//! connection is held. Write options may carry a session under
//! [`SESSION_OPTION`](crate::session::SESSION_OPTION).

use crate::connection::{Connection, ConnectionTarget, Connector, Credentials, Upsert};
use crate::memory::{MemoryConnector, MEMORY_SCHEME};
use crate::session::{Options, Session};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use strata_odm_core::{Document, Error, Result};
use tracing::{debug, info, warn};

/// Gateway to a document backend
pub struct StorageGateway {
    connectors: RwLock<HashMap<String, Arc<dyn Connector>>>,
    default_scheme: String,
    connection: RwLock<Option<Arc<dyn Connection>>>,
}

impl StorageGateway {
    /// Gateway with the `memory` connector, used for credential targets
    pub fn new() -> Self {
        Self::with_default_scheme(MEMORY_SCHEME)
    }

    /// Gateway whose credential targets resolve to `scheme`
    pub fn with_default_scheme(scheme: &str) -> Self {
        let mut connectors: HashMap<String, Arc<dyn Connector>> = HashMap::new();
        connectors.insert(MEMORY_SCHEME.to_string(), Arc::new(MemoryConnector));
        StorageGateway {
            connectors: RwLock::new(connectors),
            default_scheme: scheme.to_ascii_lowercase(),
            connection: RwLock::new(None),
        }
    }

    /// Install a connector, replacing any for the same scheme
    pub fn register_connector(&self, connector: Arc<dyn Connector>) {
        let scheme = connector.scheme().to_ascii_lowercase();
        debug!(scheme = %scheme, "Registered connector");
        self.connectors.write().insert(scheme, connector);
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    /// Open a connection to `target`
    ///
    /// # Errors
    ///
    /// - `AlreadyConnected` if a connection is held
    /// - `InvalidConnection` if the target is malformed, names an unknown
    ///   scheme, or the backend refuses it
    pub fn connect(&self, target: &ConnectionTarget) -> Result<()> {
        let mut slot = self.connection.write();
        if slot.is_some() {
            return Err(Error::AlreadyConnected);
        }

        let address = target.resolve(&self.default_scheme)?;
        let connector = self
            .connectors
            .read()
            .get(&address.scheme)
            .cloned()
            .ok_or_else(|| {
                Error::InvalidConnection(format!("no connector for scheme {:?}", address.scheme))
            })?;

        let connection: Arc<dyn Connection> = Arc::from(connector.connect(&address)?);
        if !connection.ping() {
            connection.close();
            return Err(Error::InvalidConnection(format!(
                "{} did not answer",
                address
            )));
        }

        info!(target_address = %address, "Connected to database");
        *slot = Some(connection);
        Ok(())
    }

    /// Connect with a URI
    pub fn connect_uri(&self, uri: &str) -> Result<()> {
        self.connect(&ConnectionTarget::uri(uri))
    }

    /// Connect with a credential map (`host`, `port`, `name`, `username`, `password`)
    pub fn connect_credentials(&self, credentials: &HashMap<String, String>) -> Result<()> {
        self.connect(&ConnectionTarget::Credentials(Credentials::from_map(
            credentials,
        )?))
    }

    /// Whether a connection is held, regardless of its health
    pub fn is_connected(&self) -> bool {
        self.connection.read().is_some()
    }

    /// Whether a connection is held and answers a ping
    ///
    /// Never fails; returns false when disconnected.
    pub fn is_connection_valid(&self) -> bool {
        self.connection
            .read()
            .as_ref()
            .map(|connection| connection.ping())
            .unwrap_or(false)
    }

    /// Release the connection
    ///
    /// # Errors
    ///
    /// `NotConnected` if none is held.
    pub fn terminate_connection(&self) -> Result<()> {
        let connection = self.connection.write().take().ok_or(Error::NotConnected)?;
        connection.close();
        info!(database = connection.database_name(), "Terminated connection");
        Ok(())
    }

    /// Name of the connected database
    pub fn database_name(&self) -> Result<String> {
        Ok(self.live()?.database_name().to_string())
    }

    fn live(&self) -> Result<Arc<dyn Connection>> {
        self.connection.read().clone().ok_or(Error::NotConnected)
    }

    // =========================================================================
    // Data operations
    // =========================================================================

    /// Create `collection` unless it exists
    pub fn provision_collection(&self, collection: &str) -> Result<()> {
        let connection = self.live()?;
        if connection
            .collection_names()?
            .iter()
            .any(|name| name == collection)
        {
            return Ok(());
        }
        match connection.create_collection(collection) {
            Ok(()) => Ok(()),
            // Lost a race with another provisioner
            Err(_) if connection.collection_names()?.iter().any(|n| n == collection) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Documents of `collection` matching every field of `filter`
    pub fn find(&self, collection: &str, filter: &Document) -> Result<Vec<Document>> {
        self.live()?.find(collection, filter)
    }

    /// Upsert one document selected by `key`
    pub fn upsert_one(
        &self,
        collection: &str,
        key: Document,
        value: Document,
        options: &Options,
    ) -> Result<()> {
        self.upsert_many(collection, vec![Upsert::new(key, value)], options)
            .map(|_| ())
    }

    /// Upsert a batch, all-or-nothing
    ///
    /// An empty batch is a no-op and issues no backend write.
    pub fn upsert_many(
        &self,
        collection: &str,
        batch: Vec<Upsert>,
        options: &Options,
    ) -> Result<usize> {
        let connection = self.live()?;
        let session = Session::from_options(options)?;
        if batch.is_empty() {
            return Ok(0);
        }
        let written = connection.upsert(collection, &batch, session.as_ref())?;
        debug!(collection, written, "Upserted batch");
        Ok(written)
    }

    /// Delete the first document matching `key`; true if one was removed
    pub fn delete_one(&self, collection: &str, key: Document, options: &Options) -> Result<bool> {
        self.delete_many(collection, vec![key], options)
            .map(|removed| removed > 0)
    }

    /// Delete the first match of each key, all-or-nothing
    pub fn delete_many(
        &self,
        collection: &str,
        keys: Vec<Document>,
        options: &Options,
    ) -> Result<usize> {
        let connection = self.live()?;
        let session = Session::from_options(options)?;
        if keys.is_empty() {
            return Ok(0);
        }
        let removed = connection.delete(collection, &keys, session.as_ref())?;
        if removed < keys.len() {
            warn!(
                collection,
                requested = keys.len(),
                removed,
                "Some delete keys matched no document"
            );
        }
        Ok(removed)
    }

    /// Open a backend session
    pub fn start_session(&self) -> Result<Session> {
        self.live()?.start_session()
    }

    /// Close a backend session
    pub fn end_session(&self, session: &Session) -> Result<()> {
        self.live()?.end_session(session)
    }
}

impl Default for StorageGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StorageGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageGateway")
            .field("default_scheme", &self.default_scheme)
            .field("connected", &self.is_connected())
            .finish()
    }
}
