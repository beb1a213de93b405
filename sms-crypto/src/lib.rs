//! # sms-crypto
//!
//! Passphrase-based authenticated encryption for SMS Mirror.
//!
//! This crate is a standalone primitive: the relay exposes it over its
//! Control API, and devices or the CLI can use it directly. It is not wired
//! into relay delivery.
//!
//! ## Scheme
//!
//! ```text
//! passphrase ──Argon2id(STATIC_SALT)──► 256-bit key
//!                                          │
//! plaintext ──XChaCha20-Poly1305(key, iv)──┴──► ciphertext + 16-byte tag
//! ```
//!
//! 1. Derive a key from the passphrase using Argon2id and [`STATIC_SALT`]
//! 2. Generate a random 192-bit iv per call
//! 3. Encrypt, keeping the Poly1305 tag detached
//! 4. Return an [`EncryptedEnvelope`] of hex-encoded ciphertext, iv and tag
//!
//! ## Limitation
//!
//! The salt is a fixed, public constant. Every deployment derives the same
//! key from the same passphrase, so passphrases get no per-deployment
//! salting and precomputation against common passphrases is possible.
//! Use long random passphrases.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod encrypt;
mod error;

pub use encrypt::{
    decrypt, derive_key, encrypt, Argon2Params, EncryptedEnvelope, PassphraseCipher, KEY_SIZE,
    NONCE_SIZE, STATIC_SALT, TAG_SIZE,
};
pub use error::CryptoError;
