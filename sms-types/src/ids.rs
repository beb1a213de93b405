//! Identity types for SMS Mirror.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a device identifier in bytes.
pub const MAX_DEVICE_ID_LEN: usize = 128;

/// An opaque identifier a device presents on every connection and request.
///
/// Chosen by the device (vendor id, generated string, ...). The relay only
/// requires it to be non-empty and reasonably short.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Parse a device id, trimming surrounding whitespace.
    ///
    /// Returns `None` for empty ids and ids over [`MAX_DEVICE_ID_LEN`] bytes.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.len() > MAX_DEVICE_ID_LEN {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self.0)
    }
}

/// A unique identifier for a relayed message.
///
/// UUID v4, so ids are never reused and cannot be guessed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(uuid::Uuid);

impl MessageId {
    /// Create a new random MessageId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Parse a MessageId from its hyphenated string form.
    pub fn parse(raw: &str) -> Option<Self> {
        uuid::Uuid::parse_str(raw).ok().map(Self)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

/// Identifier of a send request pushed to a device.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(uuid::Uuid);

impl RequestId {
    /// Create a new random RequestId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_trims_whitespace() {
        let id = DeviceId::parse("  pixel-7 ").unwrap();
        assert_eq!(id.as_str(), "pixel-7");
        assert_eq!(id.to_string(), "pixel-7");
    }

    #[test]
    fn device_id_rejects_empty_and_oversized() {
        assert!(DeviceId::parse("").is_none());
        assert!(DeviceId::parse("   ").is_none());
        assert!(DeviceId::parse(&"x".repeat(MAX_DEVICE_ID_LEN + 1)).is_none());
        assert!(DeviceId::parse(&"x".repeat(MAX_DEVICE_ID_LEN)).is_some());
    }

    #[test]
    fn device_id_serializes_as_plain_string() {
        let id = DeviceId::parse("A").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"A\"");
    }

    #[test]
    fn message_id_is_uuid_v4() {
        let id = MessageId::new();
        assert_eq!(id.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn message_ids_are_unique() {
        let a = MessageId::new();
        let b = MessageId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn message_id_parse() {
        let id = MessageId::new();
        assert_eq!(MessageId::parse(&id.to_string()), Some(id));
        assert_eq!(MessageId::parse("not-a-uuid"), None);
    }

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }
}
