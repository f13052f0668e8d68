//! Game command events as observed by the host

use serde_json::{json, Value};

use crate::credential::Identity;

/// Command the game sends when an account logs in; its response is the
/// full profile snapshot.
pub const LOGIN_COMMAND: &str = "HubUserLogin";

/// One `(request, response)` pair the host saw go by
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    command: String,
    identity: Identity,
    request: Value,
    response: Value,
}

impl LogEvent {
    /// Build from the host's notification.
    ///
    /// Returns `None` if the request carries no `command` string.
    pub fn from_exchange(request: Value, response: Value) -> Option<Self> {
        let command = request.get("command")?.as_str()?.to_string();
        let identity = Identity::from_json(request.get("wizard_id"));

        Some(Self {
            command,
            identity,
            request,
            response,
        })
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Account the request was made for
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn request(&self) -> &Value {
        &self.request
    }

    pub fn response(&self) -> &Value {
        &self.response
    }

    pub fn is_login(&self) -> bool {
        self.command == LOGIN_COMMAND
    }

    /// Account the response describes; used for profile uploads
    pub fn profile_identity(&self) -> Identity {
        Identity::from_json(self.response.get("wizard_id"))
    }

    /// Body for `POST data_logs/`
    pub fn to_submission(&self, version: Option<&Value>) -> Value {
        json!({
            "data": {
                "request": self.request,
                "response": self.response,
                "__version": version.cloned().unwrap_or(Value::Null),
            }
        })
    }
}
