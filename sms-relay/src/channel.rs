//! Device channel: one WebSocket session per connected device.
//!
//! The device id comes from the `?deviceId=` query parameter. Each session
//! registers itself, confirms the connection, then multiplexes inbound
//! frames, queued outbound frames, liveness pings and supersession until the
//! peer goes away.

use crate::error::ChannelError;
use crate::registry::ConnectionHandle;
use crate::relay::InboundOutcome;
use crate::server::SmsRelay;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use sms_types::{ConnectionConfirmed, DeviceId, Message, Ping};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Query parameters accepted on the channel endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ChannelParams {
    /// Identity of the connecting device.
    #[serde(rename = "deviceId")]
    pub device_id: Option<String>,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The device closed the socket.
    PeerClosed,
    /// A newer connection for the same device took over.
    Superseded,
    /// Nothing arrived within the idle timeout.
    IdleTimeout,
    /// Reading or writing the socket failed.
    Transport(String),
}

impl std::fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "closed by peer"),
            Self::Superseded => write!(f, "superseded by a newer connection"),
            Self::IdleTimeout => write!(f, "idle timeout"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}

/// `GET /?deviceId=...` on the channel listener.
///
/// Rejects the upgrade with 400 when the device id is missing or invalid.
pub async fn channel_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<ChannelParams>,
    Extension(relay): Extension<Arc<SmsRelay>>,
) -> Response {
    let Some(device_id) = params.device_id.as_deref().and_then(DeviceId::parse) else {
        tracing::debug!("Rejected channel upgrade without a valid deviceId");
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "deviceId query parameter required" })),
        )
            .into_response();
    };

    let max_frame = relay.config().channel.max_frame_bytes;
    ws.max_message_size(max_frame)
        .on_upgrade(move |socket| ChannelSession::new(relay, device_id).run(socket))
}

/// A single device's channel session.
pub struct ChannelSession {
    relay: Arc<SmsRelay>,
    device_id: DeviceId,
}

impl ChannelSession {
    /// Create a session for `device_id`.
    pub fn new(relay: Arc<SmsRelay>, device_id: DeviceId) -> Self {
        Self { relay, device_id }
    }

    /// Run the session until the socket closes, then unregister.
    pub async fn run(self, socket: WebSocket) {
        let registry = self.relay.registry();
        let serial = registry.next_serial();
        let (handle, outbound_rx) = ConnectionHandle::open(
            self.device_id.clone(),
            serial,
            self.relay.config().channel.outbound_buffer,
        );

        registry.register(handle.clone());
        self.relay.directory().touch(&self.device_id);
        self.relay
            .metrics()
            .connections_total
            .fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            "Device connected: {} (connection #{}, open: {})",
            self.device_id,
            serial,
            self.relay.active_connections()
        );

        let end = self.serve(socket, &handle, outbound_rx).await;

        registry.unregister_connection(&self.device_id, serial);
        match &end {
            SessionEnd::Transport(_) | SessionEnd::IdleTimeout => tracing::warn!(
                "Device disconnected: {} (connection #{}): {}",
                self.device_id,
                serial,
                end
            ),
            _ => tracing::info!(
                "Device disconnected: {} (connection #{}): {}",
                self.device_id,
                serial,
                end
            ),
        }
    }

    async fn serve(
        &self,
        socket: WebSocket,
        handle: &ConnectionHandle,
        mut outbound_rx: tokio::sync::mpsc::Receiver<String>,
    ) -> SessionEnd {
        let (mut ws_tx, mut ws_rx) = socket.split();
        let config = &self.relay.config().channel;

        let confirmed = Message::ConnectionConfirmed(ConnectionConfirmed {
            device_id: self.device_id.clone(),
            timestamp: sms_types::now(),
            extra: Default::default(),
        });
        if let Some(text) = self.encode(&confirmed) {
            if let Err(e) = ws_tx.send(WsMessage::Text(text)).await {
                return SessionEnd::Transport(e.to_string());
            }
        }

        let ping_every = Duration::from_secs(config.ping_interval_secs.max(1));
        let idle_timeout = Duration::from_secs(config.idle_timeout_secs);
        let mut ticker = tokio::time::interval_at(Instant::now() + ping_every, ping_every);
        let mut last_inbound = Instant::now();

        let end = loop {
            tokio::select! {
                inbound = ws_rx.next() => {
                    let frame = match inbound {
                        Some(Ok(frame)) => frame,
                        Some(Err(e)) => break SessionEnd::Transport(e.to_string()),
                        None => break SessionEnd::PeerClosed,
                    };
                    last_inbound = Instant::now();

                    match frame {
                        WsMessage::Text(text) => {
                            if let Some(reply) = self.dispatch(&text).await {
                                if let Err(e) = ws_tx.send(WsMessage::Text(reply)).await {
                                    break SessionEnd::Transport(e.to_string());
                                }
                            }
                        }
                        WsMessage::Binary(data) => {
                            self.report(ChannelError::BinaryFrame { len: data.len() });
                        }
                        WsMessage::Close(_) => break SessionEnd::PeerClosed,
                        // Protocol-level ping/pong is answered by the transport
                        WsMessage::Ping(_) | WsMessage::Pong(_) => {}
                    }
                }
                Some(frame) = outbound_rx.recv() => {
                    if let Err(e) = ws_tx.send(WsMessage::Text(frame)).await {
                        break SessionEnd::Transport(e.to_string());
                    }
                }
                _ = handle.closed() => break SessionEnd::Superseded,
                _ = ticker.tick() => {
                    if last_inbound.elapsed() >= idle_timeout {
                        break SessionEnd::IdleTimeout;
                    }
                    let ping = Message::Ping(Ping {
                        timestamp: Some(sms_types::now()),
                        ..Default::default()
                    });
                    if let Some(text) = self.encode(&ping) {
                        if let Err(e) = ws_tx.send(WsMessage::Text(text)).await {
                            break SessionEnd::Transport(e.to_string());
                        }
                    }
                }
            }
        };

        let _ = ws_tx.close().await;
        end
    }

    /// Hand a text frame to the relay engine; returns a direct reply, if any.
    async fn dispatch(&self, text: &str) -> Option<String> {
        match self.relay.handle_frame(&self.device_id, text).await {
            Ok(InboundOutcome::Reply(reply)) => self.encode(&reply),
            Ok(_) => None,
            Err(e) => {
                self.report(e);
                None
            }
        }
    }

    fn report(&self, err: ChannelError) {
        if err.is_malformed() {
            self.relay
                .metrics()
                .malformed_payloads
                .fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Dropped malformed frame from {}: {}", self.device_id, err);
        } else {
            tracing::error!("Failed to handle frame from {}: {}", self.device_id, err);
        }
    }

    fn encode(&self, message: &Message) -> Option<String> {
        match message.to_json() {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::error!("Failed to encode {} for {}: {}", message.kind(), self.device_id, e);
                None
            }
        }
    }
}
