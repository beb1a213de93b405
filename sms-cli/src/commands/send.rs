//! Send command: ask a connected device to send an SMS.

use crate::client::RelayClient;
use anyhow::Result;
use serde_json::{json, Value};

/// Run the send command.
pub async fn run(
    client: &RelayClient,
    to: &str,
    message: &str,
    device_id: Option<&str>,
    encrypted: bool,
) -> Result<()> {
    let response = send(client, to, message, device_id, encrypted).await?;
    println!(
        "Queued request {}",
        response["requestId"].as_str().unwrap_or("-")
    );
    Ok(())
}

async fn send(
    client: &RelayClient,
    to: &str,
    message: &str,
    device_id: Option<&str>,
    encrypted: bool,
) -> Result<Value> {
    let mut body = json!({ "to": to, "message": message, "encrypted": encrypted });
    if let Some(device_id) = device_id {
        body["deviceId"] = json!(device_id);
    }
    client.post("/api/sms/send", &body).await
}
