//! Health command: show relay status.

use crate::client::RelayClient;
use anyhow::Result;
use serde_json::Value;

/// Run the health command.
pub async fn run(client: &RelayClient) -> Result<()> {
    let health = client.get("/api/health", &[]).await?;
    println!("{}", render(&health));
    Ok(())
}

fn render(health: &Value) -> String {
    format!(
        "Relay: {}\n  Status:      {}\n  Version:     {}\n  Connections: {}\n  Uptime:      {}s",
        health["timestamp"].as_str().unwrap_or("-"),
        health["status"].as_str().unwrap_or("unknown"),
        health["version"].as_str().unwrap_or("-"),
        health["activeConnections"].as_u64().unwrap_or(0),
        health["uptimeSeconds"].as_u64().unwrap_or(0),
    )
}
