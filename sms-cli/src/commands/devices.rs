//! Devices command: list known devices.

use crate::client::RelayClient;
use anyhow::Result;
use serde_json::Value;

/// Run the devices command.
pub async fn run(client: &RelayClient) -> Result<()> {
    let response = client.get("/api/devices", &[]).await?;
    let devices = response["devices"].as_array().cloned().unwrap_or_default();
    if devices.is_empty() {
        println!("No devices");
        return Ok(());
    }
    for device in &devices {
        println!("{}", render(device));
    }
    Ok(())
}

fn render(device: &Value) -> String {
    let status = if device["connected"].as_bool() == Some(true) {
        "online"
    } else {
        "offline"
    };
    format!(
        "{:<20} {:<8} {:<10} {}",
        device["deviceId"].as_str().unwrap_or("-"),
        status,
        device["platform"].as_str().unwrap_or("-"),
        device["deviceName"].as_str().unwrap_or(""),
    )
}
