//! API key resolution and format checks
//!
//! A credential is either one key shared by every account, or a table that
//! maps an in-game account id (the `wizard_id` the game sends along with
//! every command) to that account's key.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::sink::Reporter;

static API_KEY_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[a-z0-9]{40}$").expect("API key pattern is a valid regex"));

/// Account/session key used to pick a per-account credential
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    /// Read an identity from a JSON field; the game sends numeric ids
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) => Self(s.clone()),
            Some(Value::Number(n)) => Self(n.to_string()),
            _ => Self::default(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configured API key(s)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Credential {
    /// One key for every account
    Single(String),
    /// Account id -> key
    PerIdentity(BTreeMap<String, String>),
}

impl Default for Credential {
    fn default() -> Self {
        Credential::Single(String::new())
    }
}

impl Credential {
    /// Trim whitespace from a single key. Tables are left exactly as entered.
    pub fn trimmed(self) -> Self {
        match self {
            Credential::Single(key) => Credential::Single(key.trim().to_string()),
            table => table,
        }
    }

    /// True if anything at all has been entered, valid or not
    pub fn is_configured(&self) -> bool {
        match self {
            Credential::Single(key) => !key.is_empty(),
            Credential::PerIdentity(keys) => !keys.is_empty(),
        }
    }

    /// Look up the key for `identity`
    pub fn resolve(&self, identity: &Identity) -> Option<String> {
        match self {
            Credential::Single(key) if key.is_empty() => None,
            Credential::Single(key) => Some(key.clone()),
            Credential::PerIdentity(keys) => keys.get(identity.as_str()).cloned(),
        }
    }

    /// Resolve the key for `identity` and keep it only if it is well formed.
    ///
    /// A key that is present but malformed is reported as a warning and the
    /// request goes out unauthenticated. A missing key is not reported here.
    pub fn authorize(&self, identity: &Identity, reporter: &Reporter) -> Option<String> {
        let token = self.resolve(identity)?;
        if is_valid_api_key(&token) {
            Some(token)
        } else {
            reporter.warning(
                "Invalid API key. Copy/paste it from SWARFARM profile settings. \
                 Logging without API key until it is updated.",
            );
            None
        }
    }
}

/// Exactly 40 lowercase hex characters
pub fn is_valid_api_key(token: &str) -> bool {
    API_KEY_FORMAT.is_match(token)
}
