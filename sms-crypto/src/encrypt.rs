//! Envelope encryption with passphrase-derived keys.
//!
//! This module provides:
//! - Argon2id key derivation over a fixed salt
//! - XChaCha20-Poly1305 encryption with random nonces and a detached tag
//! - The hex-encoded [`EncryptedEnvelope`] wire shape

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    Tag, XChaCha20Poly1305, XNonce,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Size of the derived key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of the XChaCha20-Poly1305 nonce ("iv") in bytes (192 bits).
pub const NONCE_SIZE: usize = 24;

/// Size of the Poly1305 authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Fixed, non-secret salt for passphrase key derivation.
///
/// Known weakness: identical across deployments and calls. See crate docs.
pub const STATIC_SALT: &[u8] = b"sms-mirror-static-salt-v1";

/// Output of [`encrypt`]; input of [`decrypt`].
///
/// All fields are lowercase hex. Field names follow the REST contract
/// (`encrypted`, `iv`, `authTag`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    /// Hex ciphertext (same length as the plaintext).
    pub encrypted: String,
    /// Hex 24-byte nonce used for this envelope.
    pub iv: String,
    /// Hex 16-byte Poly1305 tag.
    pub auth_tag: String,
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
}

impl Argon2Params {
    /// Create parameters with explicit costs.
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }

    fn to_argon2_params(self) -> Result<Params, CryptoError> {
        Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_SIZE),
        )
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))
    }
}

impl Default for Argon2Params {
    /// 19 MiB, 2 iterations, 1 lane.
    fn default() -> Self {
        Self::new(19 * 1024, 2, 1)
    }
}

/// Derive a 256-bit key from a passphrase over [`STATIC_SALT`].
///
/// Deterministic: the same passphrase and parameters always give the same key.
pub fn derive_key(
    passphrase: &str,
    params: Argon2Params,
) -> Result<Zeroizing<[u8; KEY_SIZE]>, CryptoError> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2_params()?);

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    argon2
        .hash_password_into(passphrase.as_bytes(), STATIC_SALT, &mut *key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    Ok(key)
}

/// Encrypts and decrypts envelopes with a fixed set of KDF parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassphraseCipher {
    params: Argon2Params,
}

impl PassphraseCipher {
    /// Create a cipher using the given KDF parameters.
    pub fn new(params: Argon2Params) -> Self {
        Self { params }
    }

    /// Encrypt `plaintext` under a key derived from `passphrase`.
    ///
    /// A fresh random iv is generated for every call.
    pub fn encrypt(&self, plaintext: &str, passphrase: &str) -> Result<EncryptedEnvelope, CryptoError> {
        let key = derive_key(passphrase, self.params)?;

        let mut nonce = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let cipher = XChaCha20Poly1305::new_from_slice(&key[..])
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = cipher
            .encrypt_in_place_detached(XNonce::from_slice(&nonce), b"", &mut buffer)
            .map_err(|_| CryptoError::EncryptionFailed("aead encrypt failed".into()))?;

        Ok(EncryptedEnvelope {
            encrypted: hex::encode(&buffer),
            iv: hex::encode(nonce),
            auth_tag: hex::encode(tag),
        })
    }

    /// Decrypt an envelope produced by [`PassphraseCipher::encrypt`].
    ///
    /// The envelope's iv is bound explicitly into the cipher. Any failure,
    /// including a wrong passphrase, is [`CryptoError::DecryptionFailed`].
    pub fn decrypt(&self, envelope: &EncryptedEnvelope, passphrase: &str) -> Result<String, CryptoError> {
        let mut buffer =
            hex::decode(&envelope.encrypted).map_err(|_| CryptoError::DecryptionFailed)?;
        let nonce = decode_fixed::<NONCE_SIZE>(&envelope.iv)?;
        let tag = decode_fixed::<TAG_SIZE>(&envelope.auth_tag)?;

        let key = derive_key(passphrase, self.params)?;
        let cipher = XChaCha20Poly1305::new_from_slice(&key[..])
            .map_err(|_| CryptoError::DecryptionFailed)?;

        cipher
            .decrypt_in_place_detached(
                XNonce::from_slice(&nonce),
                b"",
                &mut buffer,
                Tag::from_slice(&tag),
            )
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(buffer).map_err(|_| CryptoError::DecryptionFailed)
    }
}

/// Encrypt with the default KDF parameters.
pub fn encrypt(plaintext: &str, passphrase: &str) -> Result<EncryptedEnvelope, CryptoError> {
    PassphraseCipher::default().encrypt(plaintext, passphrase)
}

/// Decrypt with the default KDF parameters.
pub fn decrypt(envelope: &EncryptedEnvelope, passphrase: &str) -> Result<String, CryptoError> {
    PassphraseCipher::default().decrypt(envelope, passphrase)
}

fn decode_fixed<const N: usize>(hex_str: &str) -> Result<[u8; N], CryptoError> {
    let bytes = hex::decode(hex_str).map_err(|_| CryptoError::DecryptionFailed)?;
    bytes.try_into().map_err(|_| CryptoError::DecryptionFailed)
}
