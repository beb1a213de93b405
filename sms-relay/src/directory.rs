//! Device directory: every identity the relay has seen.
//!
//! Entries are created by `/api/register` or by opening a channel, and are
//! never removed. Whether a device is connected is a registry question and
//! is not stored here.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use sms_types::DeviceId;

/// What the relay knows about a device identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Device id.
    pub device_id: DeviceId,
    /// Human-readable name, if the device registered one.
    pub device_name: Option<String>,
    /// Platform string ("ios", "android", ...), if known.
    pub platform: Option<String>,
    /// First time the identity was seen.
    pub registered_at: DateTime<Utc>,
    /// Last registration, connection or message.
    pub last_seen: DateTime<Utc>,
}

/// Registration details supplied over the Control API.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    /// Human-readable name.
    pub device_name: Option<String>,
    /// Platform string.
    pub platform: Option<String>,
}

/// Directory of known device identities.
#[derive(Debug)]
pub struct DeviceDirectory {
    devices: DashMap<DeviceId, DeviceInfo>,
    max_name_len: usize,
}

impl DeviceDirectory {
    /// Create an empty directory; names longer than `max_name_len` chars are truncated.
    pub fn new(max_name_len: usize) -> Self {
        Self {
            devices: DashMap::new(),
            max_name_len,
        }
    }

    /// Record a registration, creating or refreshing the entry.
    ///
    /// Supplied fields overwrite stored ones; absent fields are kept.
    pub fn register(&self, device_id: &DeviceId, registration: Registration) -> DeviceInfo {
        let now = sms_types::now();
        let name = registration
            .device_name
            .map(|name| truncate_device_name(&name, self.max_name_len));

        let mut entry = self
            .devices
            .entry(device_id.clone())
            .or_insert_with(|| DeviceInfo::new(device_id.clone(), now));

        if name.is_some() {
            entry.device_name = name;
        }
        if registration.platform.is_some() {
            entry.platform = registration.platform;
        }
        entry.last_seen = now;
        entry.value().clone()
    }

    /// Mark a device as seen now, creating the entry if needed.
    pub fn touch(&self, device_id: &DeviceId) {
        let now = sms_types::now();
        self.devices
            .entry(device_id.clone())
            .or_insert_with(|| DeviceInfo::new(device_id.clone(), now))
            .last_seen = now;
    }

    /// Record the platform a device announced on its channel.
    pub fn set_platform(&self, device_id: &DeviceId, platform: &str) {
        let now = sms_types::now();
        let mut entry = self
            .devices
            .entry(device_id.clone())
            .or_insert_with(|| DeviceInfo::new(device_id.clone(), now));
        entry.platform = Some(platform.to_string());
        entry.last_seen = now;
    }

    /// Get one entry.
    pub fn get(&self, device_id: &DeviceId) -> Option<DeviceInfo> {
        self.devices.get(device_id).map(|entry| entry.value().clone())
    }

    /// All entries, ordered by device id.
    pub fn list(&self) -> Vec<DeviceInfo> {
        let mut devices: Vec<DeviceInfo> =
            self.devices.iter().map(|entry| entry.value().clone()).collect();
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        devices
    }

    /// Number of known identities.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no identity has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl DeviceInfo {
    fn new(device_id: DeviceId, now: DateTime<Utc>) -> Self {
        Self {
            device_id,
            device_name: None,
            platform: None,
            registered_at: now,
            last_seen: now,
        }
    }
}

/// Truncate a device name to at most `max_chars` characters.
///
/// Counts chars, not bytes, so multi-byte names are never split mid-character.
fn truncate_device_name(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        name.to_string()
    } else {
        name.chars().take(max_chars).collect()
    }
}
