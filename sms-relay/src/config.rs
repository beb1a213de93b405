//! Configuration loading for sms-relay.
//!
//! Configuration is loaded from a TOML file (default: `relay.toml`), then
//! `PORT`, `WS_PORT` and `ENCRYPTION_KEY_ID` from the environment are applied
//! on top.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration for sms-relay.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener configuration.
    pub server: ServerConfig,
    /// Device channel configuration.
    pub channel: ChannelConfig,
    /// Control API limits.
    pub limits: LimitsConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Maintenance task configuration.
    pub maintenance: MaintenanceConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the Control API (default: 0.0.0.0:3001).
    pub api_bind_address: String,
    /// Bind address for device channels (default: 0.0.0.0:8080).
    pub channel_bind_address: String,
    /// Channel URL handed out on registration (default: ws://localhost:8080).
    pub public_channel_url: String,
}

/// Device channel configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Outbound frames queued per connection before deliveries are skipped (default: 256).
    pub outbound_buffer: usize,
    /// Seconds between server pings (default: 30).
    pub ping_interval_secs: u64,
    /// Seconds without any inbound frame before a peer is dropped (default: 90).
    pub idle_timeout_secs: u64,
    /// Maximum inbound frame size in bytes (default: 10 MiB).
    pub max_frame_bytes: usize,
}

/// Control API limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Requests allowed per client IP per window (default: 100).
    pub api_requests_per_window: u32,
    /// Rate limit window in seconds (default: 900 = 15 minutes).
    pub api_window_secs: u64,
    /// Upper bound on the history `limit` parameter (default: 1000).
    pub max_history_limit: usize,
    /// Device names longer than this are truncated (default: 256).
    pub max_device_name_len: usize,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Identifier of the external key used for at-rest encryption of
    /// persisted message content. Reported only; the relay keeps history in
    /// memory.
    pub encryption_key_id: Option<String>,
}

/// Maintenance task configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Maintenance interval in seconds (default: 300).
    pub interval_secs: u64,
    /// Enable maintenance task (default: true).
    pub enabled: bool,
}

// Default value functions
fn default_api_bind() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_channel_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_public_channel_url() -> String {
    "ws://localhost:8080".to_string()
}

fn default_outbound_buffer() -> usize {
    256
}

fn default_ping_interval() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    90
}

fn default_max_frame_bytes() -> usize {
    10 * 1024 * 1024 // 10 MiB
}

fn default_api_requests_per_window() -> u32 {
    100
}

fn default_api_window_secs() -> u64 {
    15 * 60 // 15 minutes
}

fn default_max_history_limit() -> usize {
    1000
}

fn default_max_device_name_len() -> usize {
    256
}

fn default_maintenance_interval() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_bind_address: default_api_bind(),
            channel_bind_address: default_channel_bind(),
            public_channel_url: default_public_channel_url(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: default_outbound_buffer(),
            ping_interval_secs: default_ping_interval(),
            idle_timeout_secs: default_idle_timeout(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            api_requests_per_window: default_api_requests_per_window(),
            api_window_secs: default_api_window_secs(),
            max_history_limit: default_max_history_limit(),
            max_device_name_len: default_max_device_name_len(),
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_maintenance_interval(),
            enabled: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load from `path` if it exists (defaults otherwise), apply environment
    /// overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::info!("Config file {} not found, using defaults", path.display());
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PORT`, `WS_PORT` and `ENCRYPTION_KEY_ID` overrides.
    ///
    /// `lookup` resolves an environment variable name to its value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.api_bind_address = override_port(&self.server.api_bind_address, "PORT", &port)?;
        }
        if let Some(port) = lookup("WS_PORT") {
            self.server.channel_bind_address =
                override_port(&self.server.channel_bind_address, "WS_PORT", &port)?;
        }
        if let Some(key_id) = lookup("ENCRYPTION_KEY_ID").filter(|k| !k.is_empty()) {
            self.storage.encryption_key_id = Some(key_id);
        }
        Ok(())
    }

    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (self.channel.outbound_buffer == 0, "channel.outbound_buffer must be > 0"),
            (self.channel.ping_interval_secs == 0, "channel.ping_interval_secs must be > 0"),
            (
                self.channel.idle_timeout_secs < self.channel.ping_interval_secs,
                "channel.idle_timeout_secs must be >= channel.ping_interval_secs",
            ),
            (self.limits.api_requests_per_window == 0, "limits.api_requests_per_window must be > 0"),
            (self.limits.api_window_secs == 0, "limits.api_window_secs must be > 0"),
            (self.limits.max_history_limit == 0, "limits.max_history_limit must be > 0"),
            (self.maintenance.interval_secs == 0, "maintenance.interval_secs must be > 0"),
        ];

        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, reason)) => Err(ConfigError::Invalid {
                reason: (*reason).to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Replace the port of a `host:port` bind address.
fn override_port(bind: &str, var: &str, port: &str) -> Result<String, ConfigError> {
    let port: u16 = port.trim().parse().map_err(|_| ConfigError::Invalid {
        reason: format!("{var} must be a port number, got {port:?}"),
    })?;
    let host = bind.rsplit_once(':').map(|(host, _)| host).unwrap_or("0.0.0.0");
    Ok(format!("{host}:{port}"))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.server.api_bind_address, "0.0.0.0:3001");
        assert_eq!(config.server.channel_bind_address, "0.0.0.0:8080");
        assert_eq!(config.limits.api_requests_per_window, 100);
        assert_eq!(config.limits.api_window_secs, 900);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[server]
api_bind_address = "127.0.0.1:5000"
public_channel_url = "wss://relay.example.com"

[channel]
outbound_buffer = 16
ping_interval_secs = 10
idle_timeout_secs = 40

[limits]
api_requests_per_window = 5

[storage]
encryption_key_id = "kms-key-1"

[maintenance]
interval_secs = 60
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.api_bind_address, "127.0.0.1:5000");
        assert_eq!(config.server.channel_bind_address, "0.0.0.0:8080");
        assert_eq!(config.server.public_channel_url, "wss://relay.example.com");
        assert_eq!(config.channel.outbound_buffer, 16);
        assert_eq!(config.channel.idle_timeout_secs, 40);
        assert_eq!(config.limits.api_requests_per_window, 5);
        assert_eq!(config.storage.encryption_key_id.as_deref(), Some("kms-key-1"));
        assert_eq!(config.maintenance.interval_secs, 60);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.channel.max_frame_bytes, 10 * 1024 * 1024);
        assert_eq!(config.limits.max_history_limit, 1000);
        assert!(config.maintenance.enabled);
    }

    #[test]
    fn env_overrides_ports_and_key_id() {
        let env: HashMap<&str, &str> = [
            ("PORT", "4000"),
            ("WS_PORT", "9000"),
            ("ENCRYPTION_KEY_ID", "key-42"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.api_bind_address, "0.0.0.0:4000");
        assert_eq!(config.server.channel_bind_address, "0.0.0.0:9000");
        assert_eq!(config.storage.encryption_key_id.as_deref(), Some("key-42"));
    }

    #[test]
    fn env_rejects_bad_port() {
        let mut config = Config::default();
        let result = config.apply_env(|k| (k == "PORT").then(|| "not-a-port".to_string()));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn validate_rejects_zero_quota() {
        let mut config = Config::default();
        config.limits.api_requests_per_window = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn validate_rejects_idle_timeout_below_ping_interval() {
        let mut config = Config::default();
        config.channel.ping_interval_secs = 60;
        config.channel.idle_timeout_secs = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[limits]\nmax_history_limit = 10").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.limits.max_history_limit, 10);
    }

    #[test]
    fn from_file_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[limits\nbroken").unwrap();

        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
