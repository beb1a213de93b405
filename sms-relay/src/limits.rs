//! Rate limiting for the Control API.
//!
//! Each client IP gets a fixed quota of requests per window. Device channel
//! traffic is not throttled here.
//!
//! ## Design Notes
//!
//! governor implements GCRA rather than a literal sliding window. The cell
//! period is the whole window with a burst of `quota`, so a client may spend
//! its quota at once and then earns one request back per window. No
//! window-length interval ever admits more than `quota` requests.

use crate::config::LimitsConfig;
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Type alias for a keyed rate limiter using DashMap.
type KeyedLimiter<K> = RateLimiter<
    K,
    dashmap::DashMap<K, InMemoryState>,
    DefaultClock,
    NoOpMiddleware<governor::clock::QuantaInstant>,
>;

/// Rate limiters for the relay server.
#[derive(Clone)]
pub struct RateLimits {
    /// Limits Control API requests per client IP.
    ///
    /// Configured via `limits.api_requests_per_window` and `limits.api_window_secs`.
    api_limiter: Arc<KeyedLimiter<IpAddr>>,
}

impl std::fmt::Debug for RateLimits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimits")
            .field("api_limiter", &"KeyedLimiter<IpAddr>")
            .finish()
    }
}

impl RateLimits {
    /// Create rate limiters from configuration.
    ///
    /// Zero values are treated as one; [`crate::config::Config::validate`]
    /// rejects them before this point.
    pub fn new(config: &LimitsConfig) -> Self {
        Self {
            api_limiter: Arc::new(RateLimiter::keyed(api_quota(config))),
        }
    }

    /// Check if a Control API request from `client` is allowed.
    ///
    /// # Returns
    ///
    /// `Ok(())` if allowed, `Err` if the client is over quota.
    pub fn check_api(&self, client: IpAddr) -> Result<(), RateLimitError> {
        self.api_limiter
            .check_key(&client)
            .map_err(|_| RateLimitError::ApiLimitExceeded)
    }

    /// Get the number of tracked client keys (for metrics).
    pub fn api_keys_count(&self) -> usize {
        self.api_limiter.len()
    }

    /// Evict entries whose quota has fully recharged.
    ///
    /// Idle clients otherwise stay in the DashMap forever. Called
    /// periodically from the maintenance task.
    pub fn shrink(&self) {
        self.api_limiter.retain_recent();
        self.api_limiter.shrink_to_fit();
    }
}

/// Build the per-client quota: a burst of `requests`, one cell per window.
fn api_quota(config: &LimitsConfig) -> Quota {
    let requests = NonZeroU32::new(config.api_requests_per_window).unwrap_or(NonZeroU32::MIN);
    let window = Duration::from_secs(config.api_window_secs.max(1));

    Quota::with_period(window)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(requests)
}

/// Rate limit error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// Too many Control API requests from this client.
    ApiLimitExceeded,
}

impl std::fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiLimitExceeded => write!(f, "API rate limit exceeded"),
        }
    }
}

impl std::error::Error for RateLimitError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn test_config(requests: u32) -> LimitsConfig {
        LimitsConfig {
            api_requests_per_window: requests,
            api_window_secs: 900,
            ..LimitsConfig::default()
        }
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn create_rate_limits() {
        let limits = RateLimits::new(&test_config(5));
        assert_eq!(limits.api_keys_count(), 0);
    }

    #[test]
    fn api_limit_allows_within_quota() {
        let limits = RateLimits::new(&test_config(5));

        // First 5 should succeed
        for _ in 0..5 {
            assert!(limits.check_api(ip(1)).is_ok());
        }

        // 6th should fail
        assert_eq!(limits.check_api(ip(1)), Err(RateLimitError::ApiLimitExceeded));
    }

    #[test]
    fn different_clients_have_independent_limits() {
        let limits = RateLimits::new(&test_config(2));

        assert!(limits.check_api(ip(1)).is_ok());
        assert!(limits.check_api(ip(1)).is_ok());
        assert!(limits.check_api(ip(1)).is_err());

        // Client 2 still has full quota
        assert!(limits.check_api(ip(2)).is_ok());
        assert!(limits.check_api(ip(2)).is_ok());
        assert!(limits.check_api(ip(2)).is_err());
    }

    #[test]
    fn zero_quota_is_treated_as_one() {
        let limits = RateLimits::new(&test_config(0));
        assert!(limits.check_api(ip(1)).is_ok());
        assert!(limits.check_api(ip(1)).is_err());
    }

    #[test]
    fn quota_holds_across_whole_window() {
        let limits = RateLimits::new(&LimitsConfig {
            api_requests_per_window: 2,
            api_window_secs: 1,
            ..LimitsConfig::default()
        });

        // Spread attempts over most of one window
        let start = std::time::Instant::now();
        let mut accepted = 0;
        while start.elapsed() < Duration::from_millis(950) {
            if limits.check_api(ip(1)).is_ok() {
                accepted += 1;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        assert_eq!(accepted, 2);
    }

    #[test]
    fn quota_recovers_after_window() {
        let limits = RateLimits::new(&LimitsConfig {
            api_requests_per_window: 1,
            api_window_secs: 1,
            ..LimitsConfig::default()
        });

        assert!(limits.check_api(ip(1)).is_ok());
        assert!(limits.check_api(ip(1)).is_err());
        std::thread::sleep(Duration::from_millis(1100));
        assert!(limits.check_api(ip(1)).is_ok());
    }

    #[test]
    fn rate_limits_are_debug() {
        let limits = RateLimits::new(&test_config(5));
        let debug = format!("{:?}", limits);
        assert!(debug.contains("RateLimits"));
    }

    #[test]
    fn rate_limit_error_display() {
        assert_eq!(
            RateLimitError::ApiLimitExceeded.to_string(),
            "API rate limit exceeded"
        );
    }

    #[test]
    fn shrink_does_not_panic() {
        let limits = RateLimits::new(&test_config(5));
        let _ = limits.check_api(ip(1));
        let _ = limits.check_api(ip(2));
        assert!(limits.api_keys_count() > 0);

        // Freshly used entries may or may not be evicted depending on timing
        limits.shrink();
    }
}
