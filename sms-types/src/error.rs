//! Error types for the SMS Mirror wire format.

use thiserror::Error;

/// Errors that can occur while decoding or encoding channel messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// Frame is not well-formed JSON.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame is JSON but not a structured message.
    #[error("malformed message: {0}")]
    Malformed(String),
}
