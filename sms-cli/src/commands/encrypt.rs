//! Encrypt command: seal text into an envelope locally.

use anyhow::{Context, Result};
use sms_crypto::{Argon2Params, PassphraseCipher};

/// Run the encrypt command.
pub fn run(text: &str, password: &str) -> Result<()> {
    let json = seal(&PassphraseCipher::new(Argon2Params::default()), text, password)?;
    println!("{json}");
    Ok(())
}

/// Encrypt `text` and render the envelope as pretty JSON.
pub(crate) fn seal(cipher: &PassphraseCipher, text: &str, password: &str) -> Result<String> {
    if text.is_empty() || password.is_empty() {
        anyhow::bail!("Text and password required");
    }
    let envelope = cipher
        .encrypt(text, password)
        .context("Encryption failed")?;
    Ok(serde_json::to_string_pretty(&envelope)?)
}
