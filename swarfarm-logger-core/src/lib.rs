//! # swarfarm-logger-core
//!
//! Relays game command events and account profile snapshots from a host
//! application to SWARFARM, and follows profile imports to completion.
//!
//! This library provides:
//! - The accepted command cache, refreshed hourly and on server request
//! - Authenticated submission of individual log events
//! - Profile upload with job status polling bounded by a failsafe timer
//! - Per-account API key resolution and format checks
//! - Configuration, logging and the host log sink contract
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use swarfarm_logger_core::{Config, LiveConfig, MemorySink, Relay};
//!
//! # async fn example() -> swarfarm_logger_core::Result<()> {
//! let config = Config::load()?;
//! let live = LiveConfig::new(config.swarfarm);
//! let sink = Arc::new(MemorySink::new());
//!
//! if let Some(relay) = Relay::connect(live, sink).await? {
//!     relay.handle_event(
//!         json!({"command": "HubUserLogin", "wizard_id": 1001}),
//!         json!({"wizard_id": 1001, "wizard_info": {}}),
//!     );
//!     relay.shutdown().await;
//! }
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use commands::{AcceptedCommandCache, AcceptedCommands};
pub use config::{Config, LiveConfig, SwarfarmConfig};
pub use credential::{is_valid_api_key, Credential, Identity};
pub use dispatch::LogDispatcher;
pub use error::{Error, Result};
pub use event::LogEvent;
pub use poller::{JobPoller, JobState, PollTimings, UploadJob};
pub use profile::ProfileUploader;
pub use relay::Relay;
pub use sink::{LogEntry, LogKind, LogSink, MemorySink, NullSink, Reporter};
pub use transport::{ApiReply, ApiRequest, HttpTransport, Outcome, Transport};

// Public modules
pub mod commands;
pub mod config;
pub mod credential;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod logging;
pub mod poller;
pub mod profile;
pub mod relay;
pub mod sink;
pub mod transport;

#[cfg(test)]
mod testing;
