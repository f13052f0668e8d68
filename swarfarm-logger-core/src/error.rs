//! Error types for swarfarm-logger-core

use thiserror::Error;

/// Main error type for the swarfarm-logger-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// No response was received from the remote service
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote service answered, but not with what we asked for
    #[error("remote rejected request ({status}): {detail}")]
    Remote { status: u16, detail: String },
}

/// Result type alias for swarfarm-logger-core
pub type Result<T> = std::result::Result<T, Error>;
