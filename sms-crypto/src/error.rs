//! Error types for sms-crypto.

use thiserror::Error;

/// Errors that can occur during envelope operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key derivation failed (bad Argon2 parameters).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Encryption operation failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed.
    /// Covers malformed envelopes, wrong passphrases and tag mismatches
    /// alike; no detail is given so callers cannot learn which part failed.
    #[error("decryption failed")]
    DecryptionFailed,
}
