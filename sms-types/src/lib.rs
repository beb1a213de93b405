//! # sms-types
//!
//! Wire format types for the SMS Mirror relay protocol.
//!
//! This crate provides the foundational types shared by the relay, the CLI
//! and any device-side client:
//! - [`DeviceId`], [`MessageId`], [`RequestId`] - Identity types
//! - [`Message`] - Channel messages, a tagged union over the `type` field
//! - [`MessageRecord`] - A relayed payload as kept in message history
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod messages;
mod record;

pub use error::WireError;
pub use ids::{DeviceId, MessageId, RequestId, MAX_DEVICE_ID_LEN};
pub use messages::{
    ConnectionConfirmed, DeviceConnected, Message, OtherMessage, Ping, Pong, SmsReceived,
    SmsSendRequest,
};
pub use record::MessageRecord;

/// Current UTC time, the single clock used for wire timestamps.
pub fn now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}
