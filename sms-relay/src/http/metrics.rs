//! Prometheus metrics endpoint.

use crate::server::SmsRelay;
use crate::storage::MessageStorage;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Returns metrics in Prometheus text format.
/// Includes both gauges (current state) and counters (monotonic since startup).
pub async fn metrics_handler(Extension(relay): Extension<Arc<SmsRelay>>) -> impl IntoResponse {
    let m = relay.metrics();

    // Gauges: current state
    let connections = relay.active_connections();
    let devices = relay.directory().len();
    let stored = relay.storage().len().await;
    let limiter_keys = relay.rate_limits().api_keys_count();

    // Counters: monotonic since startup
    let conns_total = m.connections_total.load(Ordering::Relaxed);
    let relayed = m.messages_relayed.load(Ordering::Relaxed);
    let deliveries = m.deliveries_total.load(Ordering::Relaxed);
    let skips = m.delivery_skips.load(Ordering::Relaxed);
    let malformed = m.malformed_payloads.load(Ordering::Relaxed);
    let sends = m.send_requests.load(Ordering::Relaxed);
    let rate_limits = m.rate_limit_hits.load(Ordering::Relaxed);
    let crypto = m.crypto_failures.load(Ordering::Relaxed);

    let body = format!(
        r#"# HELP sms_relay_connections_active Number of open device channels
# TYPE sms_relay_connections_active gauge
sms_relay_connections_active {connections}

# HELP sms_relay_devices_known Number of device identities seen
# TYPE sms_relay_devices_known gauge
sms_relay_devices_known {devices}

# HELP sms_relay_messages_stored Number of messages in history
# TYPE sms_relay_messages_stored gauge
sms_relay_messages_stored {stored}

# HELP sms_relay_rate_limit_keys Number of clients tracked by the API rate limiter
# TYPE sms_relay_rate_limit_keys gauge
sms_relay_rate_limit_keys {limiter_keys}

# HELP sms_relay_info Server information
# TYPE sms_relay_info gauge
sms_relay_info{{version="{version}"}} 1

# HELP sms_relay_connections_total Total device channels accepted
# TYPE sms_relay_connections_total counter
sms_relay_connections_total {conns_total}

# HELP sms_relay_messages_relayed_total Total payloads stored and fanned out
# TYPE sms_relay_messages_relayed_total counter
sms_relay_messages_relayed_total {relayed}

# HELP sms_relay_deliveries_total Total frames queued to peer devices
# TYPE sms_relay_deliveries_total counter
sms_relay_deliveries_total {deliveries}

# HELP sms_relay_delivery_skips_total Total frames skipped for closed or slow peers
# TYPE sms_relay_delivery_skips_total counter
sms_relay_delivery_skips_total {skips}

# HELP sms_relay_malformed_payloads_total Total inbound frames dropped as malformed
# TYPE sms_relay_malformed_payloads_total counter
sms_relay_malformed_payloads_total {malformed}

# HELP sms_relay_send_requests_total Total send requests pushed to devices
# TYPE sms_relay_send_requests_total counter
sms_relay_send_requests_total {sends}

# HELP sms_relay_rate_limit_hits_total Total Control API rate limit rejections
# TYPE sms_relay_rate_limit_hits_total counter
sms_relay_rate_limit_hits_total {rate_limits}

# HELP sms_relay_crypto_failures_total Total failed encrypt/decrypt requests
# TYPE sms_relay_crypto_failures_total counter
sms_relay_crypto_failures_total {crypto}
"#,
        version = env!("CARGO_PKG_VERSION"),
    );

    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
