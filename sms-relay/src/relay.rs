//! Relay engine: turns inbound payloads into history records and deliveries.
//!
//! Two entry points:
//! - [`SmsRelay::handle_frame`] for text frames arriving on a device channel
//! - [`SmsRelay::send_sms`] for send requests arriving over the Control API

use crate::error::{ChannelError, RelayError, Result};
use crate::registry::ConnectionHandle;
use crate::server::SmsRelay;
use crate::storage::{MessageStorage, NewMessage};
use serde::Deserialize;
use serde_json::Value;
use sms_types::{
    DeviceId, Message, MessageId, MessageRecord, Pong, RequestId, SmsSendRequest, WireError,
};
use std::sync::atomic::Ordering;

/// What became of one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundOutcome {
    /// Stored and fanned out to the other open connections.
    Relayed {
        /// Id assigned to the stored record.
        id: MessageId,
        /// Number of peers the frame was queued to.
        deliveries: usize,
    },
    /// Answered directly to the sender; nothing stored or relayed.
    Reply(Message),
    /// Liveness only.
    Liveness,
}

/// A send request as submitted to `POST /api/sms/send`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSmsRequest {
    /// Destination phone number.
    pub to: Option<String>,
    /// Message body (plain or an encrypted envelope string).
    pub message: Option<String>,
    /// Device that should perform the send; any open device when absent.
    pub device_id: Option<String>,
    /// Whether `message` is encrypted.
    pub encrypted: Option<bool>,
}

impl SmsRelay {
    /// Handle one text frame from `origin`'s channel.
    ///
    /// Malformed frames are returned as errors for the caller to log; the
    /// channel stays open either way.
    pub async fn handle_frame(
        &self,
        origin: &DeviceId,
        text: &str,
    ) -> std::result::Result<InboundOutcome, ChannelError> {
        self.directory().touch(origin);

        let message = Message::from_json(text)?;
        match message {
            Message::Ping(_) => Ok(InboundOutcome::Reply(Message::Pong(Pong {
                device_id: origin.clone(),
                timestamp: sms_types::now(),
                extra: Default::default(),
            }))),
            Message::Pong(_) => Ok(InboundOutcome::Liveness),
            Message::Other(other) if other.kind == "pong" => Ok(InboundOutcome::Liveness),
            payload => {
                if let Message::DeviceConnected(announce) = &payload {
                    if let Some(platform) = &announce.platform {
                        self.directory().set_platform(origin, platform);
                    }
                    tracing::info!(
                        "Device {} announced itself (platform: {})",
                        origin,
                        announce.platform.as_deref().unwrap_or("unknown")
                    );
                }

                let (id, deliveries) = self.ingest(origin, payload).await?;
                Ok(InboundOutcome::Relayed { id, deliveries })
            }
        }
    }

    /// Store `payload` as sent by `origin` and copy it to every other open channel.
    ///
    /// Returns the record id and how many peers the copy was queued to.
    /// Closed or backed-up peers are skipped.
    pub async fn ingest(
        &self,
        origin: &DeviceId,
        payload: Message,
    ) -> std::result::Result<(MessageId, usize), ChannelError> {
        let record = self
            .storage()
            .append(NewMessage {
                id: None,
                origin_device: origin.clone(),
                timestamp: None,
                payload,
            })
            .await?;
        let frame = relay_frame(&record)?;

        let metrics = self.metrics();
        let mut delivered = 0;
        self.registry().for_each_open_except(origin, |peer| {
            match peer.try_deliver(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(skip) => {
                    metrics.delivery_skips.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        "Skipped delivery of {} to {}: {:?}",
                        record.id,
                        peer.device_id(),
                        skip
                    );
                }
            }
        });

        metrics.messages_relayed.fetch_add(1, Ordering::Relaxed);
        metrics
            .deliveries_total
            .fetch_add(delivered as u64, Ordering::Relaxed);

        tracing::debug!(
            "Relayed {} {} from {} to {} device(s)",
            record.payload.kind(),
            record.id,
            origin,
            delivered
        );
        Ok((record.id, delivered))
    }

    /// Push a send request to a device.
    ///
    /// With `device_id` set, that device must have an open channel. Without
    /// it, the first open channel that accepts the frame is used. Success
    /// means the frame was queued, not that an SMS went out.
    pub fn send_sms(&self, request: SendSmsRequest) -> Result<RequestId> {
        let (Some(to), Some(message)) = (non_empty(request.to), non_empty(request.message)) else {
            return Err(RelayError::validation("Recipient and message required"));
        };
        let target = request.device_id.as_deref().and_then(DeviceId::parse);

        let request_id = RequestId::new();
        let frame = Message::SmsSendRequest(SmsSendRequest {
            to,
            message,
            request_id,
            timestamp: sms_types::now(),
            encrypted: request.encrypted,
            extra: Default::default(),
        })
        .to_json()
        .map_err(|e| RelayError::Internal(e.to_string()))?;

        let device = match target {
            Some(device_id) => {
                let unavailable =
                    || RelayError::unavailable(format!("Device not available: {device_id}"));
                let handle = self.registry().lookup(&device_id).ok_or_else(unavailable)?;
                handle.try_deliver(frame).map_err(|_| unavailable())?;
                device_id
            }
            None => deliver_to_any(self.registry().list_open(), frame)
                .ok_or_else(|| RelayError::unavailable("No devices available"))?,
        };

        self.metrics().send_requests.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Send request {} pushed to device {}", request_id, device);
        Ok(request_id)
    }
}

/// Hand `frame` to the first connection that accepts it.
fn deliver_to_any(candidates: Vec<ConnectionHandle>, frame: String) -> Option<DeviceId> {
    candidates
        .into_iter()
        .find(|handle| handle.try_deliver(frame.clone()).is_ok())
        .map(|handle| handle.device_id().clone())
}

/// Payload as received, annotated with `id`, `timestamp` and `sourceDevice`.
fn relay_frame(record: &MessageRecord) -> std::result::Result<String, WireError> {
    let mut map = record.payload.to_map()?;
    map.insert("id".into(), Value::String(record.id.to_string()));
    map.insert("timestamp".into(), serde_json::to_value(record.timestamp)?);
    map.insert(
        "sourceDevice".into(),
        Value::String(record.origin_device.to_string()),
    );
    Ok(Value::Object(map).to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
