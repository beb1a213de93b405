//! Messages command: show relayed history.

use crate::client::RelayClient;
use anyhow::Result;
use serde_json::Value;

/// Run the messages command.
pub async fn run(client: &RelayClient, device_id: Option<&str>, limit: Option<u32>) -> Result<()> {
    let mut query = Vec::new();
    if let Some(device_id) = device_id {
        query.push(("deviceId", device_id.to_string()));
    }
    if let Some(limit) = limit {
        query.push(("limit", limit.to_string()));
    }

    let response = client.get("/api/messages", &query).await?;
    let messages = response["messages"].as_array().cloned().unwrap_or_default();
    if messages.is_empty() {
        println!("No messages");
        return Ok(());
    }
    for record in &messages {
        println!("{}", render(record));
    }
    Ok(())
}

/// One line per record: time, origin, payload type.
fn render(record: &Value) -> String {
    let payload = &record["payload"];
    let mut line = format!(
        "{}  {:<16} {}",
        record["timestamp"].as_str().unwrap_or("-"),
        record["originDevice"].as_str().unwrap_or("-"),
        payload["type"].as_str().unwrap_or("?"),
    );
    if record["encrypted"].as_bool() == Some(true) {
        line.push_str(" [encrypted]");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::spawn_relay;
    use serde_json::json;
    use sms_relay::storage::{MessageStorage, NewMessage};
    use sms_types::{DeviceId, Message};

    #[tokio::test]
    async fn history_query_passes_filter_and_limit() {
        let (client, relay) = spawn_relay().await;
        for device in ["a", "a", "b"] {
            let payload = Message::from_json(r#"{"type": "note"}"#).unwrap();
            relay
                .storage()
                .append(NewMessage {
                    id: None,
                    origin_device: DeviceId::parse(device).unwrap(),
                    timestamp: None,
                    payload,
                })
                .await
                .unwrap();
        }

        let response = client
            .get(
                "/api/messages",
                &[("deviceId", "a".to_string()), ("limit", "1".to_string())],
            )
            .await
            .unwrap();
        let messages = response["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["originDevice"], "a");
    }

    #[test]
    fn render_marks_encrypted() {
        let record = json!({
            "timestamp": "2026-01-01T00:00:00Z",
            "originDevice": "pixel-7",
            "payload": {"type": "sms_received"},
            "encrypted": true
        });
        let line = render(&record);
        assert!(line.contains("pixel-7"));
        assert!(line.contains("sms_received"));
        assert!(line.ends_with("[encrypted]"));
    }
}
