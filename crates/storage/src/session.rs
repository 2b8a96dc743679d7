//! Sessions and write options
//!
//! Write paths accept a free-form [`Options`] map. A session is passed
//! through it under the reserved key [`SESSION_OPTION`], as the session's
//! token string:
//!
//! ```ignore
//! let session = gateway.start_session()?;
//! let options = Options::from([(SESSION_OPTION.to_string(), session.to_value())]);
//! gateway.upsert_one("users", key, value, &options)?;
//! ```

use std::collections::HashMap;
use std::fmt;
use strata_odm_core::{Error, Result, Value};
use uuid::Uuid;

/// Free-form options accepted by write operations
pub type Options = HashMap<String, Value>;

/// Reserved options key carrying a session token
pub const SESSION_OPTION: &str = "strata.session";

/// Token identifying a backend session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Session(Uuid);

impl Session {
    /// Create a fresh session token
    pub fn new() -> Self {
        Session(Uuid::new_v4())
    }

    /// Parse a token produced by [`Session::token`]
    pub fn from_token(token: &str) -> Result<Self> {
        Uuid::parse_str(token.trim())
            .map(Session)
            .map_err(|_| Error::InvalidSession(format!("malformed session token {:?}", token)))
    }

    /// Token string
    pub fn token(&self) -> String {
        self.0.to_string()
    }

    /// Value to place under [`SESSION_OPTION`]
    pub fn to_value(&self) -> Value {
        Value::String(self.token())
    }

    /// Options map carrying only this session
    pub fn options(&self) -> Options {
        Options::from([(SESSION_OPTION.to_string(), self.to_value())])
    }

    /// Session carried by `options`, if any
    pub fn from_options(options: &Options) -> Result<Option<Self>> {
        match options.get(SESSION_OPTION) {
            None => Ok(None),
            Some(Value::String(token)) => Self::from_token(token).map(Some),
            Some(other) => Err(Error::InvalidSession(format!(
                "session option must be a String, got {}",
                other.type_name()
            ))),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session:{}", self.0)
    }
}
