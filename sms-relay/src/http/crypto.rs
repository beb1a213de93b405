//! Encryption utility endpoints.
//!
//! Key derivation is deliberately slow, so both handlers run on the
//! blocking pool.

use super::error::ApiError;
use crate::server::SmsRelay;
use axum::extract::rejection::JsonRejection;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sms_crypto::{CryptoError, EncryptedEnvelope};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Body of `POST /api/encrypt`.
#[derive(Debug, Default, Deserialize)]
pub struct EncryptRequest {
    /// Plaintext.
    pub text: Option<String>,
    /// Passphrase.
    pub password: Option<String>,
}

/// Response of `POST /api/encrypt`.
#[derive(Debug, Serialize)]
pub struct EncryptResponse {
    /// The envelope.
    pub encrypted: EncryptedEnvelope,
}

/// Body of `POST /api/decrypt`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptRequest {
    /// The envelope, as returned by `/api/encrypt`.
    pub encrypted_data: Option<Value>,
    /// Passphrase.
    pub password: Option<String>,
}

/// Response of `POST /api/decrypt`.
#[derive(Debug, Serialize)]
pub struct DecryptResponse {
    /// Recovered plaintext.
    pub decrypted: String,
}

/// `POST /api/encrypt`
pub async fn encrypt(
    Extension(relay): Extension<Arc<SmsRelay>>,
    body: Result<Json<EncryptRequest>, JsonRejection>,
) -> Result<Json<EncryptResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::Validation(e.body_text()))?;
    let (Some(text), Some(password)) = (
        request.text.filter(|t| !t.is_empty()),
        request.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::Validation("Text and password required".into()));
    };

    let cipher = relay.cipher();
    let result = tokio::task::spawn_blocking(move || cipher.encrypt(&text, &password)).await;

    match flatten(result) {
        Ok(encrypted) => Ok(Json(EncryptResponse { encrypted })),
        Err(e) => Err(crypto_failure(&relay, "Encryption failed", e)),
    }
}

/// `POST /api/decrypt`
pub async fn decrypt(
    Extension(relay): Extension<Arc<SmsRelay>>,
    body: Result<Json<DecryptRequest>, JsonRejection>,
) -> Result<Json<DecryptResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::Validation(e.body_text()))?;
    let (Some(encrypted_data), Some(password)) = (
        request.encrypted_data.filter(|v| !v.is_null()),
        request.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::Validation(
            "Encrypted data and password required".into(),
        ));
    };

    // A structurally wrong envelope fails the same way as a wrong passphrase
    let envelope: EncryptedEnvelope = serde_json::from_value(encrypted_data).map_err(|_| {
        crypto_failure(&relay, "Decryption failed", CryptoError::DecryptionFailed)
    })?;

    let cipher = relay.cipher();
    let result = tokio::task::spawn_blocking(move || cipher.decrypt(&envelope, &password)).await;

    match flatten(result) {
        Ok(decrypted) => Ok(Json(DecryptResponse { decrypted })),
        Err(e) => Err(crypto_failure(&relay, "Decryption failed", e)),
    }
}

fn flatten<T>(
    result: Result<Result<T, CryptoError>, tokio::task::JoinError>,
) -> Result<T, CryptoError> {
    result.unwrap_or_else(|e| Err(CryptoError::EncryptionFailed(format!("worker failed: {e}"))))
}

fn crypto_failure(relay: &SmsRelay, message: &'static str, err: CryptoError) -> ApiError {
    relay
        .metrics()
        .crypto_failures
        .fetch_add(1, Ordering::Relaxed);
    tracing::debug!("{}: {}", message, err);
    ApiError::Crypto(message)
}
