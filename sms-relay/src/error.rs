//! Error types for sms-relay.

use sms_crypto::CryptoError;
use sms_types::{MessageId, WireError};

/// Main error type for sms-relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// A required field is missing or malformed.
    #[error("validation error: {reason}")]
    Validation {
        /// What was wrong with the request.
        reason: String,
    },

    /// The target device is unknown or its channel is not open.
    #[error("device unavailable: {reason}")]
    DeviceUnavailable {
        /// Which device, or why none could be used.
        reason: String,
    },

    /// A channel frame is not a well-formed message.
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] WireError),

    /// Key derivation or envelope failure.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Any other fault.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Shorthand for a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Shorthand for a device-unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            reason: reason.into(),
        }
    }
}

/// Errors raised while handling one device channel.
///
/// None of these are sent back to the device; they are logged and the
/// channel either carries on or is torn down.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// A text frame did not decode into a message.
    #[error("malformed payload: {0}")]
    Malformed(#[from] WireError),

    /// A binary frame arrived; only JSON text frames are accepted.
    #[error("binary frames are not supported ({len} bytes)")]
    BinaryFrame {
        /// Frame size.
        len: usize,
    },

    /// The relay could not record the payload.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The underlying WebSocket failed.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ChannelError {
    /// Whether the frame was at fault (as opposed to the relay or transport).
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::BinaryFrame { .. })
    }
}

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A record with this id already exists.
    #[error("duplicate message id: {id}")]
    DuplicateId {
        /// The id that was reused.
        id: MessageId,
    },
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
