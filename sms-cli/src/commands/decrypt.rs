//! Decrypt command: open an envelope locally.

use anyhow::{Context, Result};
use serde_json::Value;
use sms_crypto::{Argon2Params, EncryptedEnvelope, PassphraseCipher};

/// Run the decrypt command.
pub fn run(envelope: &str, password: &str) -> Result<()> {
    let plaintext = open(&PassphraseCipher::new(Argon2Params::default()), envelope, password)?;
    println!("{plaintext}");
    Ok(())
}

/// Parse `envelope_json` and decrypt it.
///
/// Accepts either a bare envelope or the `{"encrypted": {...}}` body
/// returned by `/api/encrypt`.
pub(crate) fn open(cipher: &PassphraseCipher, envelope_json: &str, password: &str) -> Result<String> {
    let mut value: Value = serde_json::from_str(envelope_json).context("Envelope is not JSON")?;
    if value.get("encrypted").is_some_and(Value::is_object) {
        value = value["encrypted"].take();
    }
    let envelope: EncryptedEnvelope =
        serde_json::from_value(value).context("Envelope needs encrypted, iv and authTag")?;

    cipher
        .decrypt(&envelope, password)
        .context("Decryption failed")
}
