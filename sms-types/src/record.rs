//! MessageRecord - a relayed payload as kept in message history.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{DeviceId, Message, MessageId, WireError};

/// One relayed payload. Immutable once stored.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    /// Relay-assigned id, never reused.
    pub id: MessageId,
    /// Device whose channel the payload arrived on.
    pub origin_device: DeviceId,
    /// Relay-assigned creation time.
    pub timestamp: DateTime<Utc>,
    /// Insertion sequence number; breaks timestamp ties.
    pub seq: u64,
    /// Whether the payload was flagged as encrypted.
    pub encrypted: bool,
    /// The payload as received.
    pub payload: Message,
}

impl MessageRecord {
    /// JSON view of the record: payload fields overlaid with the record's
    /// own `id`, `originDevice`, `timestamp` (and `encrypted` when set).
    pub fn to_map(&self) -> Result<Map<String, Value>, WireError> {
        let mut map = self.payload.to_map()?;
        map.insert("id".into(), Value::String(self.id.to_string()));
        map.insert(
            "originDevice".into(),
            Value::String(self.origin_device.to_string()),
        );
        map.insert("timestamp".into(), serde_json::to_value(self.timestamp)?);
        if self.encrypted {
            map.insert("encrypted".into(), Value::Bool(true));
        }
        Ok(map)
    }
}

impl Serialize for MessageRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error as _;
        self.to_map()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}
