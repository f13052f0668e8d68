//! Log event submission
//!
//! One event, one `POST data_logs/`, no queue and no retry. Events whose
//! command the server has not asked for never leave the process.

use std::sync::Arc;

use serde_json::Value;

use crate::commands::AcceptedCommandCache;
use crate::credential::Credential;
use crate::event::LogEvent;
use crate::sink::Reporter;
use crate::transport::{classify, ApiRequest, Outcome, Transport, DATA_LOGS};

/// Submits single events if the accepted command list allows them
#[derive(Clone)]
pub struct LogDispatcher {
    transport: Arc<dyn Transport>,
    cache: Arc<AcceptedCommandCache>,
    reporter: Reporter,
}

impl LogDispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<AcceptedCommandCache>,
        reporter: Reporter,
    ) -> Self {
        Self {
            transport,
            cache,
            reporter,
        }
    }

    /// Submit `event` using the key `credential` resolves for its account.
    ///
    /// Returns `None` if the command is not accepted; nothing is sent and
    /// nothing is logged in that case. Otherwise returns what the server
    /// answered, after reporting it.
    pub async fn submit(&self, event: &LogEvent, credential: &Credential) -> Option<Outcome> {
        // Acceptance and version come from the same snapshot
        let commands = self.cache.snapshot()?;
        if !commands.accepts(event.command()) {
            return None;
        }

        let token = credential.authorize(event.identity(), &self.reporter);
        let request = ApiRequest::post(DATA_LOGS, event.to_submission(commands.version()))
            .with_token(token);

        let outcome = classify(self.transport.send(request).await);

        match &outcome {
            Outcome::Success(_) => {
                self.reporter
                    .success(format!("{} logged successfully", event.command()));
            }
            Outcome::Unauthorized(_) => {
                self.reporter.error(format!(
                    "SWARFARM Authentication failure: {}",
                    outcome.detail()
                ));
            }
            Outcome::TransportFailed(message) => {
                self.reporter.error(format!("Error: {}", message));
            }
            Outcome::ValidationFailed(_)
            | Outcome::Conflict(_)
            | Outcome::UnexpectedStatus { .. } => {
                self.reporter.error(format!(
                    "Error {}: {}",
                    outcome.status().unwrap_or_default(),
                    outcome.detail()
                ));
            }
        }

        if requests_refresh(outcome.body()) {
            tracing::debug!(command = event.command(), "Server flagged command list as stale");
            // Failures are reported by the cache itself
            let _ = self.cache.refresh(self.transport.as_ref(), &self.reporter).await;
        }

        Some(outcome)
    }
}

/// True if the body carries a truthy `reinit` flag
fn requests_refresh(body: Option<&Value>) -> bool {
    match body.and_then(|b| b.get("reinit")) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
