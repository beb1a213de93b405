//! Storage layer for sms-relay.
//!
//! Keeps the history of relayed messages, newest first on query.

mod memory;

pub use memory::MemoryStorage;

use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sms_types::{DeviceId, Message, MessageId, MessageRecord};

/// Default number of records returned by a history query.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Request to append a payload to the history.
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Id to use; generated when absent.
    pub id: Option<MessageId>,
    /// Device whose channel the payload arrived on.
    pub origin_device: DeviceId,
    /// Creation time; now when absent.
    pub timestamp: Option<DateTime<Utc>>,
    /// The payload as received.
    pub payload: Message,
}

/// Trait for message history backends.
#[async_trait]
pub trait MessageStorage: Send + Sync {
    /// Append a record, assigning a sequence number, and return it.
    ///
    /// Fails with [`StorageError::DuplicateId`] if a supplied id is already stored.
    async fn append(&self, message: NewMessage) -> Result<MessageRecord, StorageError>;

    /// Get up to `limit` records, newest first.
    ///
    /// With `origin` set, only records from that device are returned.
    /// Ties on timestamp are broken by insertion order.
    async fn query(&self, origin: Option<&DeviceId>, limit: usize) -> Vec<MessageRecord>;

    /// Number of stored records.
    async fn len(&self) -> usize;

    /// Whether nothing has been stored yet.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Parse the `limit` query parameter.
///
/// Absent, non-numeric and non-positive values give [`DEFAULT_HISTORY_LIMIT`];
/// anything above `max` is clamped down.
pub fn parse_limit(raw: Option<&str>, max: usize) -> usize {
    let limit = raw
        .and_then(|value| value.trim().parse::<i64>().ok())
        .filter(|value| *value > 0)
        .map(|value| usize::try_from(value).unwrap_or(usize::MAX))
        .unwrap_or(DEFAULT_HISTORY_LIMIT);
    limit.min(max.max(1))
}
