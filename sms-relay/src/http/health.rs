//! Health check endpoint.

use crate::server::SmsRelay;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Health status response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    /// Overall status.
    pub status: String,
    /// Time of the check.
    pub timestamp: DateTime<Utc>,
    /// Number of open device channels.
    pub active_connections: usize,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
    /// Server version.
    pub version: String,
}

/// Health check handler.
pub async fn health_handler(Extension(relay): Extension<Arc<SmsRelay>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".to_string(),
        timestamp: sms_types::now(),
        active_connections: relay.active_connections(),
        uptime_seconds: relay.uptime_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
