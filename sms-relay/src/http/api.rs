//! Control API handlers for devices, sends and history.

use super::error::ApiError;
use crate::directory::{DeviceInfo, Registration};
use crate::relay::SendSmsRequest;
use crate::server::SmsRelay;
use crate::storage::{parse_limit, MessageStorage};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use sms_types::{DeviceId, MessageRecord, RequestId};
use std::sync::Arc;
use url::Url;

/// Body of `POST /api/register`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Device identity.
    pub device_id: Option<String>,
    /// Human-readable name.
    pub device_name: Option<String>,
    /// Platform string.
    pub platform: Option<String>,
}

/// Response of `POST /api/register`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    /// Always true.
    pub success: bool,
    /// The stored device descriptor.
    pub device: DeviceInfo,
    /// Where the device should open its channel.
    pub websocket_url: String,
}

/// Response of `POST /api/sms/send`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    /// Always true.
    pub success: bool,
    /// Id carried by the pushed `sms_send_request`.
    pub request_id: RequestId,
}

/// Query of `GET /api/messages`.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    /// Only messages from this device.
    #[serde(rename = "deviceId")]
    pub device_id: Option<String>,
    /// Maximum number of records; parsed leniently.
    pub limit: Option<String>,
}

/// Response of `GET /api/messages`.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Records, newest first.
    pub messages: Vec<MessageRecord>,
}

/// One entry of `GET /api/devices`.
#[derive(Debug, Serialize)]
pub struct DeviceSummary {
    /// Directory entry.
    #[serde(flatten)]
    pub info: DeviceInfo,
    /// Whether the device has an open channel right now.
    pub connected: bool,
}

/// Response of `GET /api/devices`.
#[derive(Debug, Serialize)]
pub struct DevicesResponse {
    /// Every known device, sorted by id.
    pub devices: Vec<DeviceSummary>,
}

/// `POST /api/register`
pub async fn register_device(
    Extension(relay): Extension<Arc<SmsRelay>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let Json(request) = body.map_err(reject_body)?;

    let device_id = request.device_id.as_deref().and_then(DeviceId::parse);
    let device_name = request.device_name.filter(|name| !name.trim().is_empty());
    let (Some(device_id), Some(device_name)) = (device_id, device_name) else {
        return Err(ApiError::Validation("Device ID and name required".into()));
    };

    let websocket_url = Url::parse_with_params(
        &relay.config().server.public_channel_url,
        &[("deviceId", device_id.as_str())],
    )
    .map_err(|e| {
        tracing::error!("Bad public_channel_url: {}", e);
        ApiError::Internal
    })?;

    let device = relay.directory().register(
        &device_id,
        Registration {
            device_name: Some(device_name),
            platform: request.platform,
        },
    );
    tracing::info!(
        "Registered device {} ({})",
        device_id,
        device.device_name.as_deref().unwrap_or_default()
    );

    Ok(Json(RegisterResponse {
        success: true,
        device,
        websocket_url: websocket_url.to_string(),
    }))
}

/// `POST /api/sms/send`
pub async fn send_sms(
    Extension(relay): Extension<Arc<SmsRelay>>,
    body: Result<Json<SendSmsRequest>, JsonRejection>,
) -> Result<Json<SendResponse>, ApiError> {
    let Json(request) = body.map_err(reject_body)?;
    let request_id = relay.send_sms(request)?;
    Ok(Json(SendResponse {
        success: true,
        request_id,
    }))
}

/// `GET /api/messages?deviceId=&limit=`
pub async fn list_messages(
    Extension(relay): Extension<Arc<SmsRelay>>,
    Query(params): Query<HistoryParams>,
) -> Json<HistoryResponse> {
    let filter = match params.device_id.as_deref().filter(|raw| !raw.is_empty()) {
        None => None,
        Some(raw) => match DeviceId::parse(raw) {
            Some(device_id) => Some(device_id),
            // No record can come from an id that fails to parse
            None => return Json(HistoryResponse { messages: Vec::new() }),
        },
    };
    let limit = parse_limit(
        params.limit.as_deref(),
        relay.config().limits.max_history_limit,
    );

    let messages = relay.storage().query(filter.as_ref(), limit).await;
    Json(HistoryResponse { messages })
}

/// `GET /api/devices`
pub async fn list_devices(Extension(relay): Extension<Arc<SmsRelay>>) -> Json<DevicesResponse> {
    let devices = relay
        .directory()
        .list()
        .into_iter()
        .map(|info| DeviceSummary {
            connected: relay.registry().is_connected(&info.device_id),
            info,
        })
        .collect();
    Json(DevicesResponse { devices })
}

/// `DELETE /api/:message_id`
///
/// History is append-only; the request is acknowledged and logged.
pub async fn delete_message(Path(message_id): Path<String>) -> StatusCode {
    tracing::info!("Delete requested for message {}", message_id);
    StatusCode::NO_CONTENT
}

fn reject_body(rejection: JsonRejection) -> ApiError {
    tracing::debug!("Rejected request body: {}", rejection.body_text());
    ApiError::Validation(rejection.body_text())
}
