//! Main SmsRelay server coordination.
//!
//! SmsRelay owns the connection registry, message history, device directory
//! and rate limiters. Channel sessions and HTTP handlers share it via `Arc`.

use crate::config::Config;
use crate::directory::DeviceDirectory;
use crate::limits::RateLimits;
use crate::registry::ConnectionRegistry;
use crate::storage::MemoryStorage;
use sms_crypto::PassphraseCipher;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

/// Operational metrics for monitoring relay activity.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total device channels accepted.
    pub connections_total: AtomicU64,
    /// Total payloads stored and fanned out.
    pub messages_relayed: AtomicU64,
    /// Total frames queued to a peer connection.
    pub deliveries_total: AtomicU64,
    /// Total frames dropped because a peer was closed or backed up.
    pub delivery_skips: AtomicU64,
    /// Total inbound frames that were not valid messages.
    pub malformed_payloads: AtomicU64,
    /// Total send requests pushed to a device.
    pub send_requests: AtomicU64,
    /// Total Control API rate limit rejections.
    pub rate_limit_hits: AtomicU64,
    /// Total failed encrypt/decrypt calls.
    pub crypto_failures: AtomicU64,
}

/// Main relay server.
pub struct SmsRelay {
    config: Config,
    registry: ConnectionRegistry,
    storage: MemoryStorage,
    directory: DeviceDirectory,
    /// Rate limiters for the Control API.
    rate_limits: RateLimits,
    cipher: PassphraseCipher,
    /// Operational metrics (counters).
    metrics: RelayMetrics,
    started_at: Instant,
}

impl std::fmt::Debug for SmsRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsRelay")
            .field("config", &self.config)
            .field("rate_limits", &self.rate_limits)
            .field("metrics", &self.metrics)
            .field("connections", &self.registry.len())
            .field("devices", &self.directory.len())
            .finish_non_exhaustive()
    }
}

impl SmsRelay {
    /// Create a new SmsRelay with the given config and an empty history.
    pub fn new(config: Config) -> Self {
        let rate_limits = RateLimits::new(&config.limits);
        let directory = DeviceDirectory::new(config.limits.max_device_name_len);
        Self {
            config,
            registry: ConnectionRegistry::new(),
            storage: MemoryStorage::new(),
            directory,
            rate_limits,
            cipher: PassphraseCipher::default(),
            metrics: RelayMetrics::default(),
            started_at: Instant::now(),
        }
    }

    /// Replace the cipher used by the encryption endpoints.
    pub fn with_cipher(mut self, cipher: PassphraseCipher) -> Self {
        self.cipher = cipher;
        self
    }

    /// Get the relay configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the connection registry.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Get access to the message history.
    pub fn storage(&self) -> &MemoryStorage {
        &self.storage
    }

    /// Get the device directory.
    pub fn directory(&self) -> &DeviceDirectory {
        &self.directory
    }

    /// Get access to the rate limiters.
    pub fn rate_limits(&self) -> &RateLimits {
        &self.rate_limits
    }

    /// Get the passphrase cipher.
    pub fn cipher(&self) -> PassphraseCipher {
        self.cipher
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Seconds since the relay was created.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Number of open device channels.
    pub fn active_connections(&self) -> usize {
        self.registry.open_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConnectionHandle;
    use crate::storage::MessageStorage;
    use sms_types::DeviceId;

    #[tokio::test]
    async fn new_relay_is_empty() {
        let relay = SmsRelay::new(Config::default());
        assert_eq!(relay.active_connections(), 0);
        assert!(relay.directory().is_empty());
        assert!(relay.storage().is_empty().await);
        assert!(relay.uptime_secs() < 5);
    }

    #[tokio::test]
    async fn active_connections_counts_open_channels() {
        let relay = SmsRelay::new(Config::default());
        let device = DeviceId::parse("A").unwrap();
        let (handle, rx) = ConnectionHandle::open(device, relay.registry().next_serial(), 4);
        relay.registry().register(handle);
        assert_eq!(relay.active_connections(), 1);

        drop(rx);
        assert_eq!(relay.active_connections(), 0);
    }

    #[test]
    fn debug_does_not_dump_internals() {
        let relay = SmsRelay::new(Config::default());
        let debug = format!("{:?}", relay);
        assert!(debug.contains("SmsRelay"));
        assert!(debug.contains("connections"));
    }
}
