//! Register command: record a device identity and print its channel URL.

use crate::client::RelayClient;
use anyhow::Result;
use serde_json::{json, Value};

/// Run the register command.
pub async fn run(
    client: &RelayClient,
    device_id: &str,
    name: &str,
    platform: Option<&str>,
) -> Result<()> {
    let response = register(client, device_id, name, platform).await?;
    println!("Registered {device_id}");
    println!("  Channel: {}", response["websocketUrl"].as_str().unwrap_or("-"));
    Ok(())
}

async fn register(
    client: &RelayClient,
    device_id: &str,
    name: &str,
    platform: Option<&str>,
) -> Result<Value> {
    let mut body = json!({ "deviceId": device_id, "deviceName": name });
    if let Some(platform) = platform {
        body["platform"] = json!(platform);
    }
    client.post("/api/register", &body).await
}
