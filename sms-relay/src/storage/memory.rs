//! In-memory storage backend for sms-relay.
//!
//! History lives for the lifetime of the process and is lost on restart.

use super::{MessageStorage, NewMessage};
use crate::error::StorageError;
use async_trait::async_trait;
use sms_types::{DeviceId, MessageId, MessageRecord};
use std::cmp::Reverse;
use std::collections::HashSet;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    records: Vec<MessageRecord>,
    ids: HashSet<MessageId>,
    next_seq: u64,
}

/// Append-only message history held in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStorage for MemoryStorage {
    async fn append(&self, message: NewMessage) -> Result<MessageRecord, StorageError> {
        let mut inner = self.inner.write().await;

        let id = message.id.unwrap_or_default();
        if !inner.ids.insert(id) {
            return Err(StorageError::DuplicateId { id });
        }

        inner.next_seq += 1;
        let record = MessageRecord {
            id,
            origin_device: message.origin_device,
            timestamp: message.timestamp.unwrap_or_else(sms_types::now),
            seq: inner.next_seq,
            encrypted: message.payload.is_encrypted(),
            payload: message.payload,
        };
        inner.records.push(record.clone());

        tracing::trace!(
            "Stored message {} from {} (seq {})",
            record.id,
            record.origin_device,
            record.seq
        );
        Ok(record)
    }

    async fn query(&self, origin: Option<&DeviceId>, limit: usize) -> Vec<MessageRecord> {
        let inner = self.inner.read().await;

        let mut matching: Vec<&MessageRecord> = inner
            .records
            .iter()
            .filter(|record| origin.map_or(true, |device| &record.origin_device == device))
            .collect();
        matching.sort_by_key(|record| Reverse((record.timestamp, record.seq)));

        matching.into_iter().take(limit).cloned().collect()
    }

    async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }
}
