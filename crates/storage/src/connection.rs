//! Connection targets and the backend seam
//!
//! A gateway reaches a backend through two traits:
//! - [`Connector`]: knows one URI scheme and opens connections for it
//! - [`Connection`]: a live handle that reads and writes documents
//!
//! Targets come either as a URI
//! (`scheme://[user:pass@]host[:port]/database`) or as a credential map
//! with the keys `host`, `port`, `name`, `username`, `password`. Both
//! normalize to a [`ConnectionAddress`].

use crate::session::Session;
use std::collections::HashMap;
use std::fmt;
use strata_odm_core::{Document, Error, Result};

/// Host assumed when a credential map omits it
pub const DEFAULT_HOST: &str = "localhost";

// =============================================================================
// Targets
// =============================================================================

/// Where to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    /// `scheme://[user:pass@]host[:port]/database`
    Uri(String),
    /// Discrete credential fields
    Credentials(Credentials),
}

impl ConnectionTarget {
    /// Target from a URI string
    pub fn uri(uri: impl Into<String>) -> Self {
        ConnectionTarget::Uri(uri.into())
    }

    /// Resolve into an address, using `default_scheme` for credential maps
    pub fn resolve(&self, default_scheme: &str) -> Result<ConnectionAddress> {
        match self {
            ConnectionTarget::Uri(uri) => ConnectionAddress::parse(uri),
            ConnectionTarget::Credentials(credentials) => {
                credentials.to_address(default_scheme)
            }
        }
    }
}

impl From<Credentials> for ConnectionTarget {
    fn from(credentials: Credentials) -> Self {
        ConnectionTarget::Credentials(credentials)
    }
}

/// Credential set for a backend
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Host name
    pub host: Option<String>,
    /// Port number
    pub port: Option<u16>,
    /// Database name (required)
    pub name: Option<String>,
    /// User name
    pub username: Option<String>,
    /// Password
    pub password: Option<String>,
}

impl Credentials {
    /// Credentials naming only a database
    pub fn database(name: impl Into<String>) -> Self {
        Credentials {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Read a credential map
    ///
    /// Unknown keys are rejected so a typo does not silently connect
    /// somewhere else.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let mut credentials = Credentials::default();
        for (key, value) in map {
            match key.as_str() {
                "host" => credentials.host = Some(value.clone()),
                "port" => {
                    let port = value.trim().parse::<u16>().map_err(|_| {
                        Error::InvalidConnection(format!("invalid port {:?}", value))
                    })?;
                    credentials.port = Some(port);
                }
                "name" => credentials.name = Some(value.clone()),
                "username" => credentials.username = Some(value.clone()),
                "password" => credentials.password = Some(value.clone()),
                other => {
                    return Err(Error::InvalidConnection(format!(
                        "unknown credential key {:?}",
                        other
                    )))
                }
            }
        }
        Ok(credentials)
    }

    fn to_address(&self, scheme: &str) -> Result<ConnectionAddress> {
        let database = match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                return Err(Error::InvalidConnection(
                    "credentials do not name a database".to_string(),
                ))
            }
        };
        if self.password.is_some() && self.username.is_none() {
            return Err(Error::InvalidConnection(
                "password given without username".to_string(),
            ));
        }
        Ok(ConnectionAddress {
            scheme: scheme.to_string(),
            host: self
                .host
                .clone()
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: self.port,
            database,
            username: self.username.clone(),
            password: self.password.clone(),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

// =============================================================================
// Address
// =============================================================================

/// Normalized connection target
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionAddress {
    /// URI scheme, selects the connector
    pub scheme: String,
    /// Host name
    pub host: String,
    /// Optional port
    pub port: Option<u16>,
    /// Database name
    pub database: String,
    /// Optional user name
    pub username: Option<String>,
    /// Optional password
    pub password: Option<String>,
}

impl ConnectionAddress {
    /// Parse `scheme://[user[:pass]@]host[:port]/database`
    pub fn parse(uri: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidConnection(format!("{}: {:?}", reason, uri));

        let (scheme, rest) = uri.trim().split_once("://").ok_or_else(|| invalid("missing scheme"))?;
        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        {
            return Err(invalid("malformed scheme"));
        }

        let (authority, path) = rest
            .split_once('/')
            .ok_or_else(|| invalid("missing database name"))?;
        // Query strings carry no meaning here
        let database = path.split('?').next().unwrap_or_default();
        if database.is_empty() || database.contains('/') {
            return Err(invalid("missing database name"));
        }

        let (userinfo, hostport) = match authority.rsplit_once('@') {
            Some((userinfo, hostport)) => (Some(userinfo), hostport),
            None => (None, authority),
        };
        let (username, password) = match userinfo {
            None => (None, None),
            Some(info) => match info.split_once(':') {
                Some((user, pass)) => (Some(user.to_string()), Some(pass.to_string())),
                None => (Some(info.to_string()), None),
            },
        };
        if matches!(username.as_deref(), Some("")) {
            return Err(invalid("empty username"));
        }

        let (host, port) = match hostport.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
                (host, Some(port))
            }
            None => (hostport, None),
        };
        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        Ok(ConnectionAddress {
            scheme: scheme.to_ascii_lowercase(),
            host: host.to_string(),
            port,
            database: database.to_string(),
            username,
            password,
        })
    }

    /// `host[:port]/database`, identifying one backend database
    pub fn location(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}/{}", self.host, port, self.database),
            None => format!("{}/{}", self.host, self.database),
        }
    }
}

impl fmt::Debug for ConnectionAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionAddress")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl fmt::Display for ConnectionAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Credentials never appear in logs
        write!(f, "{}://{}", self.scheme, self.location())
    }
}

// =============================================================================
// Backend traits
// =============================================================================

/// One keyed upsert
#[derive(Debug, Clone, PartialEq)]
pub struct Upsert {
    /// Document selecting the target (the primary-key document)
    pub key: Document,
    /// Fields to set
    pub value: Document,
}

impl Upsert {
    /// Create an upsert
    pub fn new(key: Document, value: Document) -> Self {
        Upsert { key, value }
    }
}

/// A live connection to a document backend
///
/// Batch writes are all-or-nothing: either every element is applied or
/// none is and the call fails.
pub trait Connection: Send + Sync {
    /// Whether the connection still answers
    fn ping(&self) -> bool;

    /// Database this connection is bound to
    fn database_name(&self) -> &str;

    /// Names of existing collections
    fn collection_names(&self) -> Result<Vec<String>>;

    /// Create a collection; creating an existing one is an error
    fn create_collection(&self, name: &str) -> Result<()>;

    /// Documents matching every field of `filter`, in storage order
    fn find(&self, collection: &str, filter: &Document) -> Result<Vec<Document>>;

    /// Apply upserts, returning how many documents were written
    fn upsert(&self, collection: &str, batch: &[Upsert], session: Option<&Session>)
        -> Result<usize>;

    /// Delete the first document matching each key, returning how many went
    fn delete(&self, collection: &str, keys: &[Document], session: Option<&Session>)
        -> Result<usize>;

    /// Open a session
    fn start_session(&self) -> Result<Session>;

    /// Close a session
    fn end_session(&self, session: &Session) -> Result<()>;

    /// Release the connection; later calls fail
    fn close(&self);
}

/// Opens connections for one URI scheme
pub trait Connector: Send + Sync {
    /// Scheme this connector serves, lowercase
    fn scheme(&self) -> &str;

    /// Open a connection
    fn connect(&self, address: &ConnectionAddress) -> Result<Box<dyn Connection>>;
}
