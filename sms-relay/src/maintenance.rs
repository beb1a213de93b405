//! Background maintenance task.
//!
//! Runs periodically to evict idle rate limiter entries and log relay stats.

use crate::config::MaintenanceConfig;
use crate::server::SmsRelay;
use crate::storage::MessageStorage;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Spawn the background maintenance task.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_maintenance_task(
    relay: Arc<SmsRelay>,
    config: MaintenanceConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Maintenance task disabled");
            return;
        }

        let interval_secs = config.interval_secs.max(1);
        tracing::info!("Maintenance task started (interval: {}s)", interval_secs);

        let mut timer = interval(Duration::from_secs(interval_secs));

        loop {
            timer.tick().await;
            run_once(&relay).await;
        }
    })
}

/// One maintenance pass.
pub async fn run_once(relay: &SmsRelay) {
    let before = relay.rate_limits().api_keys_count();
    relay.rate_limits().shrink();
    let after = relay.rate_limits().api_keys_count();

    if before > after {
        tracing::debug!("Maintenance: evicted {} idle rate limit entries", before - after);
    }

    tracing::debug!(
        "Maintenance: {} open connections, {} known devices, {} stored messages",
        relay.active_connections(),
        relay.directory().len(),
        relay.storage().len().await
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::net::{IpAddr, Ipv4Addr};

    #[tokio::test]
    async fn run_once_keeps_relay_usable() {
        let relay = Arc::new(SmsRelay::new(Config::default()));
        let client = IpAddr::V4(Ipv4Addr::LOCALHOST);
        assert!(relay.rate_limits().check_api(client).is_ok());

        run_once(&relay).await;

        assert!(relay.rate_limits().check_api(client).is_ok());
    }

    #[tokio::test]
    async fn maintenance_task_disabled() {
        let relay = Arc::new(SmsRelay::new(Config::default()));
        let config = MaintenanceConfig {
            interval_secs: 1,
            enabled: false,
        };

        let handle = spawn_maintenance_task(relay, config);

        // Task should complete immediately when disabled
        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("Task should complete when disabled")
            .expect("Task should not panic");
    }

    #[tokio::test]
    async fn maintenance_task_runs_until_aborted() {
        let relay = Arc::new(SmsRelay::new(Config::default()));
        let config = MaintenanceConfig {
            interval_secs: 1,
            enabled: true,
        };

        let handle = spawn_maintenance_task(relay, config);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
