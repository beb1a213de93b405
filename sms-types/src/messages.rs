//! Channel messages for SMS Mirror.
//!
//! Every frame on a device channel is a JSON object with a `type` field.
//! Known types decode into typed variants; anything else is kept as
//! [`Message::Other`]. Each variant carries the fields it does not model in
//! an `extra` map, so a payload survives a relay hop verbatim.
//!
//! Only the envelope is validated: a frame must be a JSON object with a
//! non-empty string `type`. A modelled field of the wrong JSON type (a
//! numeric `from`, a millisecond `timestamp`) is carried in `extra` instead,
//! and a known type missing a required field decodes as [`Message::Other`].

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{DeviceId, RequestId, WireError};

/// Fields a message carries beyond the ones its variant models.
pub type Extra = Map<String, Value>;

const KNOWN_TYPES: &[&str] = &[
    "connection_confirmed",
    "device_connected",
    "sms_received",
    "sms_send_request",
    "ping",
    "pong",
];

/// Known types whose modelled fields are all optional.
const LENIENT_TYPES: &[&str] = &["device_connected", "sms_received", "ping"];

/// All channel messages, in both directions.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Server → device, sent as soon as the channel opens.
    ConnectionConfirmed(ConnectionConfirmed),
    /// Device → server, announces platform details after opening.
    DeviceConnected(DeviceConnected),
    /// Device → server, an SMS observed on the device.
    SmsReceived(SmsReceived),
    /// Server → device, asks a capable device to send an SMS.
    SmsSendRequest(SmsSendRequest),
    /// Liveness probe (either direction).
    Ping(Ping),
    /// Liveness answer (either direction).
    Pong(Pong),
    /// Any other `type`, relayed as-is.
    Other(OtherMessage),
}

/// Sent by the server immediately on channel open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfirmed {
    /// Device the channel is bound to.
    pub device_id: DeviceId,
    /// Server time of the confirmation.
    pub timestamp: DateTime<Utc>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

/// Sent by a device once its channel is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConnected {
    /// Device id as the device sees itself (the channel's id is authoritative).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    /// Platform tag, e.g. `iOS` or `android`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Device-side time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

/// An SMS observed on a device.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsReceived {
    /// Sender phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Recipient phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Message body (possibly an encrypted blob).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Whether `message` is encrypted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<bool>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

/// A send intent pushed to a target device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsSendRequest {
    /// Recipient phone number.
    pub to: String,
    /// Message body.
    pub message: String,
    /// Relay-assigned request id.
    pub request_id: RequestId,
    /// Relay time of the request.
    pub timestamp: DateTime<Utc>,
    /// Whether `message` is encrypted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<bool>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

/// Liveness probe.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ping {
    /// Sender, when the device includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    /// Sender time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

/// Liveness answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pong {
    /// Device the answer concerns.
    pub device_id: DeviceId,
    /// Answer time.
    pub timestamp: DateTime<Utc>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

/// A message whose `type` the relay does not model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OtherMessage {
    /// The `type` value.
    #[serde(rename = "type")]
    pub kind: String,
    /// All remaining fields.
    #[serde(flatten)]
    pub fields: Extra,
}

/// Serialize-side view of the known variants.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TaggedRef<'a> {
    ConnectionConfirmed(&'a ConnectionConfirmed),
    DeviceConnected(&'a DeviceConnected),
    SmsReceived(&'a SmsReceived),
    SmsSendRequest(&'a SmsSendRequest),
    Ping(&'a Ping),
    Pong(&'a Pong),
}

/// Deserialize-side view of the known variants.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Tagged {
    ConnectionConfirmed(ConnectionConfirmed),
    DeviceConnected(DeviceConnected),
    SmsReceived(SmsReceived),
    SmsSendRequest(SmsSendRequest),
    Ping(Ping),
    Pong(Pong),
}

impl From<Tagged> for Message {
    fn from(tagged: Tagged) -> Self {
        match tagged {
            Tagged::ConnectionConfirmed(m) => Message::ConnectionConfirmed(m),
            Tagged::DeviceConnected(m) => Message::DeviceConnected(m),
            Tagged::SmsReceived(m) => Message::SmsReceived(m),
            Tagged::SmsSendRequest(m) => Message::SmsSendRequest(m),
            Tagged::Ping(m) => Message::Ping(m),
            Tagged::Pong(m) => Message::Pong(m),
        }
    }
}

impl Message {
    /// The `type` value of this message.
    pub fn kind(&self) -> &str {
        match self {
            Message::ConnectionConfirmed(_) => "connection_confirmed",
            Message::DeviceConnected(_) => "device_connected",
            Message::SmsReceived(_) => "sms_received",
            Message::SmsSendRequest(_) => "sms_send_request",
            Message::Ping(_) => "ping",
            Message::Pong(_) => "pong",
            Message::Other(other) => &other.kind,
        }
    }

    /// Whether the payload is flagged as carrying encrypted content.
    pub fn is_encrypted(&self) -> bool {
        match self {
            Message::SmsReceived(m) => m.encrypted.unwrap_or(false),
            Message::SmsSendRequest(m) => m.encrypted.unwrap_or(false),
            Message::Other(m) => m.fields.get("encrypted") == Some(&Value::Bool(true)),
            _ => false,
        }
    }

    /// Decode a text frame.
    pub fn from_json(text: &str) -> Result<Self, WireError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Decode an already-parsed JSON value, validating the known variants.
    pub fn from_value(value: Value) -> Result<Self, WireError> {
        let Value::Object(mut fields) = value else {
            return Err(WireError::Malformed("expected a JSON object".into()));
        };

        let kind = match fields.get("type") {
            Some(Value::String(kind)) if !kind.is_empty() => kind.clone(),
            Some(_) => return Err(WireError::Malformed("`type` must be a non-empty string".into())),
            None => return Err(WireError::Malformed("missing `type` field".into())),
        };

        if KNOWN_TYPES.contains(&kind.as_str()) {
            return Ok(decode_known(kind, fields));
        }

        fields.remove("type");
        Ok(Message::Other(OtherMessage { kind, fields }))
    }

    fn extra_mut(&mut self) -> &mut Extra {
        match self {
            Message::ConnectionConfirmed(m) => &mut m.extra,
            Message::DeviceConnected(m) => &mut m.extra,
            Message::SmsReceived(m) => &mut m.extra,
            Message::SmsSendRequest(m) => &mut m.extra,
            Message::Ping(m) => &mut m.extra,
            Message::Pong(m) => &mut m.extra,
            Message::Other(m) => &mut m.fields,
        }
    }

    /// Encode as a JSON object.
    pub fn to_map(&self) -> Result<Map<String, Value>, WireError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(WireError::Malformed("message did not encode to an object".into())),
        }
    }

    /// Encode as a text frame.
    pub fn to_json(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decode an object whose `type` is known.
fn decode_known(kind: String, mut fields: Map<String, Value>) -> Message {
    if let Ok(tagged) = serde_json::from_value::<Tagged>(Value::Object(fields.clone())) {
        return tagged.into();
    }

    if LENIENT_TYPES.contains(&kind.as_str()) {
        let stray: Extra = fields
            .iter()
            .filter(|(key, value)| key.as_str() != "type" && !decodes_alone(&kind, key, value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for key in stray.keys() {
            fields.remove(key);
        }

        if let Ok(tagged) = serde_json::from_value::<Tagged>(Value::Object(fields.clone())) {
            let mut message = Message::from(tagged);
            message.extra_mut().extend(stray);
            return message;
        }
        fields.extend(stray);
    }

    fields.remove("type");
    Message::Other(OtherMessage { kind, fields })
}

/// Whether `key: value` alone is a valid `kind` message.
fn decodes_alone(kind: &str, key: &str, value: &Value) -> bool {
    let mut single = Map::new();
    single.insert("type".into(), Value::String(kind.to_string()));
    single.insert(key.to_string(), value.clone());
    serde_json::from_value::<Tagged>(Value::Object(single)).is_ok()
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let tagged = match self {
            Message::ConnectionConfirmed(m) => TaggedRef::ConnectionConfirmed(m),
            Message::DeviceConnected(m) => TaggedRef::DeviceConnected(m),
            Message::SmsReceived(m) => TaggedRef::SmsReceived(m),
            Message::SmsSendRequest(m) => TaggedRef::SmsSendRequest(m),
            Message::Ping(m) => TaggedRef::Ping(m),
            Message::Pong(m) => TaggedRef::Pong(m),
            Message::Other(m) => return m.serialize(serializer),
        };
        tagged.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Message::from_value(value).map_err(D::Error::custom)
    }
}
