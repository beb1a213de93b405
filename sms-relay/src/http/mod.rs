//! HTTP endpoints for sms-relay.
//!
//! Two routers share one [`SmsRelay`]:
//! - the Control API (`/api/...` plus `/metrics`)
//! - the device channel listener (`/?deviceId=...`, WebSocket)

mod api;
mod crypto;
mod error;
pub mod health;
mod metrics;

use crate::channel::channel_upgrade;
use crate::server::SmsRelay;
use axum::extract::{ConnectInfo, DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Extension, Router};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub use api::{DeviceSummary, RegisterRequest, RegisterResponse, SendResponse};
pub use error::ApiError;
pub use health::HealthStatus;

/// Maximum accepted request body size (10 MiB).
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Build the Control API router.
///
/// Serve with `into_make_service_with_connect_info::<SocketAddr>()` so the
/// rate limiter can key on the client address.
pub fn build_router(relay: Arc<SmsRelay>) -> Router {
    let api = Router::new()
        .route("/health", get(health::health_handler))
        .route("/register", post(api::register_device))
        .route("/sms/send", post(api::send_sms))
        .route("/messages", get(api::list_messages))
        .route("/devices", get(api::list_devices))
        .route("/encrypt", post(crypto::encrypt))
        .route("/decrypt", post(crypto::decrypt))
        .route("/:message_id", delete(api::delete_message))
        .layer(middleware::from_fn(rate_limit));

    Router::new()
        .nest("/api", api)
        .route("/metrics", get(metrics::metrics_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(Extension(relay))
}

/// Build the device channel router.
pub fn build_channel_router(relay: Arc<SmsRelay>) -> Router {
    Router::new()
        .route("/", get(channel_upgrade))
        .layer(Extension(relay))
}

/// Set once the missing-`ConnectInfo` warning has been logged.
static MISSING_CONNECT_INFO_WARNED: AtomicBool = AtomicBool::new(false);

/// Per-client-IP quota on `/api`.
async fn rate_limit(
    Extension(relay): Extension<Arc<SmsRelay>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let client = match connect_info {
        Some(ConnectInfo(addr)) => addr.ip(),
        None => {
            if !MISSING_CONNECT_INFO_WARNED.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    "Client address unavailable; all Control API callers share one rate limit. \
                     Serve with into_make_service_with_connect_info::<SocketAddr>()"
                );
            }
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        }
    };

    if let Err(e) = relay.rate_limits().check_api(client) {
        relay
            .metrics()
            .rate_limit_hits
            .fetch_add(1, Ordering::Relaxed);
        tracing::debug!("{} for {}", e, client);
        return ApiError::RateLimited.into_response();
    }

    next.run(request).await
}
