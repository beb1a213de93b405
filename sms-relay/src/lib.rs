//! # sms-relay
//!
//! Real-time relay server for SMS Mirror.
//!
//! This crate implements a relay that:
//! - Accepts one WebSocket channel per device and tracks presence
//! - Copies every payload a device sends to all other open channels
//! - Keeps an in-memory history of relayed messages
//! - Pushes send requests from the Control API to a capable device
//! - Exposes the passphrase encryption utility over HTTP
//!
//! ## Architecture
//!
//! ```text
//! Device A ──┐   WebSocket (:8080)  ┌── Device B
//!            │                      │
//!        ┌───┴──────────────────────┴───┐
//!        │           SmsRelay           │
//!        │  ConnectionRegistry  Store   │◄── Control API (:3001)
//!        │  DeviceDirectory     Metrics │
//!        └──────────────────────────────┘
//! ```
//!
//! ## Channel protocol
//!
//! JSON text frames, each with a `type` field:
//! - `connection_confirmed` (server → device, on open)
//! - `device_connected` (device → server, relayed)
//! - `sms_received` and any other type (device → server, stored and relayed)
//! - `sms_send_request` (server → device, from the Control API)
//! - `ping` / `pong` (liveness, never relayed)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod config;
pub mod directory;
pub mod error;
pub mod http;
pub mod limits;
pub mod maintenance;
pub mod registry;
pub mod relay;
pub mod server;
pub mod storage;

pub use config::Config;
pub use error::{RelayError, Result};
pub use server::SmsRelay;
