//! Database configuration via TOML
//!
//! A configuration names the backend to connect to, either as a URI or as
//! a `[credentials]` table, and whether reads repair documents that lack a
//! declared field.

use serde::{Deserialize, Serialize};
use std::path::Path;
use strata_odm_core::{Error, Result};
use strata_odm_storage::{ConnectionTarget, Credentials};

/// URI used when a configuration names no backend
pub const DEFAULT_URI: &str = "memory://localhost/app";

/// `[credentials]` table of the configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialsConfig {
    /// Host name (default: localhost)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Port number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Database name
    pub name: String,
    /// User name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Mapping-layer configuration
///
/// # Example
///
/// ```toml
/// uri = "memory://localhost/app"
/// repair_on_read = true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OdmConfig {
    /// Connection URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Re-save records whose stored document lacks a declared field
    #[serde(default = "default_repair_on_read")]
    pub repair_on_read: bool,
    /// Connection credentials, alternative to `uri`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<CredentialsConfig>,
}

fn default_repair_on_read() -> bool {
    true
}

impl Default for OdmConfig {
    fn default() -> Self {
        Self {
            uri: Some(DEFAULT_URI.to_string()),
            repair_on_read: default_repair_on_read(),
            credentials: None,
        }
    }
}

impl OdmConfig {
    /// Configuration connecting to `uri`
    pub fn with_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Self::default()
        }
    }

    /// Configuration for an in-process database called `name`
    pub fn memory(name: &str) -> Self {
        Self::with_uri(format!("memory://localhost/{}", name))
    }

    /// The connection target this configuration names
    ///
    /// # Errors
    ///
    /// Fails when both or neither of `uri` and `[credentials]` are set.
    pub fn target(&self) -> Result<ConnectionTarget> {
        match (&self.uri, &self.credentials) {
            (Some(uri), None) => Ok(ConnectionTarget::uri(uri.clone())),
            (None, Some(credentials)) => Ok(ConnectionTarget::Credentials(Credentials {
                host: credentials.host.clone(),
                port: credentials.port,
                name: Some(credentials.name.clone()),
                username: credentials.username.clone(),
                password: credentials.password.clone(),
            })),
            (Some(_), Some(_)) => Err(Error::Config(
                "set either `uri` or `[credentials]`, not both".to_string(),
            )),
            (None, None) => Err(Error::Config(
                "no connection configured: set `uri` or `[credentials]`".to_string(),
            )),
        }
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# strata-odm configuration
#
# Connection URI used by Database::open
uri = "memory://localhost/app"

# Re-save records whose stored document lacks a declared field (default: true)
repair_on_read = true

# Alternative to `uri`
# [credentials]
# host = "localhost"
# port = 27017
# name = "app"
# username = "user"
# password = "secret"
"#
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or names no
    /// usable connection.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: OdmConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.target()?;
        Ok(config)
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
