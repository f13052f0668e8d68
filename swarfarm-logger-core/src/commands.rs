//! Accepted command cache
//!
//! SWARFARM publishes which game commands it wants to receive, tagged with a
//! schema version. The relay keeps the latest list here and refuses to
//! submit anything until a list has been fetched at least once.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::sink::Reporter;
use crate::transport::{classify, ApiRequest, Outcome, Transport, DATA_LOGS};

/// Key of the schema version marker in the server's command list
pub const VERSION_KEY: &str = "__version";

/// One fetched command list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcceptedCommands {
    commands: BTreeMap<String, Value>,
    version: Option<Value>,
}

impl AcceptedCommands {
    /// Build from the body of `GET data_logs/`
    ///
    /// A non-empty list without a version marker is rejected.
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(Error::Remote {
                status: 200,
                detail: "accepted command list is not a JSON object".to_string(),
            });
        };

        let version = map.remove(VERSION_KEY);
        if version.is_none() && !map.is_empty() {
            return Err(Error::Remote {
                status: 200,
                detail: format!("accepted command list has no {}", VERSION_KEY),
            });
        }

        Ok(Self {
            commands: map.into_iter().collect(),
            version,
        })
    }

    pub fn accepts(&self, command: &str) -> bool {
        self.commands.contains_key(command)
    }

    /// Acceptance schema the server published for `command`
    pub fn schema(&self, command: &str) -> Option<&Value> {
        self.commands.get(command)
    }

    pub fn version(&self) -> Option<&Value> {
        self.version.as_ref()
    }

    /// Command names, version marker excluded
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Process-wide holder of the current [`AcceptedCommands`]
///
/// Readers take an `Arc` snapshot and never observe a half-applied refresh.
/// Once populated the cache is only ever replaced, never cleared.
#[derive(Debug, Default)]
pub struct AcceptedCommandCache {
    current: RwLock<Option<Arc<AcceptedCommands>>>,
}

impl AcceptedCommandCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a refresh has succeeded
    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn snapshot(&self) -> Option<Arc<AcceptedCommands>> {
        self.current.read().clone()
    }

    /// False for every command until the first successful refresh
    pub fn is_accepted(&self, command: &str) -> bool {
        self.current
            .read()
            .as_ref()
            .is_some_and(|commands| commands.accepts(command))
    }

    pub fn version(&self) -> Option<Value> {
        self.current
            .read()
            .as_ref()
            .and_then(|commands| commands.version().cloned())
    }

    pub fn replace(&self, commands: AcceptedCommands) {
        *self.current.write() = Some(Arc::new(commands));
    }

    /// Fetch the server's command list and swap it in.
    ///
    /// Any failure is reported and leaves the current list untouched.
    /// Returns the number of accepted commands on success.
    pub async fn refresh(&self, transport: &dyn Transport, reporter: &Reporter) -> Result<usize> {
        reporter.debug("Retrieving list of accepted log types from SWARFARM...");

        let outcome = classify(transport.send(ApiRequest::get(DATA_LOGS)).await);
        let result = match outcome {
            Outcome::Success(Some(body)) => AcceptedCommands::from_json(body),
            Outcome::Success(None) => Err(Error::Remote {
                status: 200,
                detail: "response body is not JSON".to_string(),
            }),
            Outcome::TransportFailed(message) => Err(Error::Transport(message)),
            other => Err(Error::Remote {
                status: other.status().unwrap_or_default(),
                detail: other.detail(),
            }),
        };

        match result {
            Ok(commands) => {
                let count = commands.len();
                let names = commands.names().collect::<Vec<_>>().join(", ");
                self.replace(commands);
                reporter.success(format!(
                    "Looking for the following commands to log: {}",
                    names
                ));
                Ok(count)
            }
            Err(e) => {
                let observed = match &e {
                    Error::Remote { status, .. } if *status != 200 => status.to_string(),
                    other => other.to_string(),
                };
                reporter.error(format!("Error while getting commands to log: {}", observed));
                Err(e)
            }
        }
    }
}
