//! Connection registry: which devices currently hold an open channel.
//!
//! At most one live connection per device. A newer connection for the same
//! device replaces the older one, and the older one is told to close. Each
//! connection carries a serial so a superseded connection's teardown cannot
//! remove its successor.

use dashmap::DashMap;
use sms_types::DeviceId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// Why a frame was not handed to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverySkip {
    /// The connection's writer has gone away.
    Closed,
    /// The connection's outbound queue is full.
    Full,
}

/// Handle to one open device channel.
///
/// Cloning is cheap; all clones feed the same outbound queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    device_id: DeviceId,
    serial: u64,
    sender: mpsc::Sender<String>,
    shutdown: Arc<Notify>,
}

impl ConnectionHandle {
    /// Create a handle and the receiving end of its outbound queue.
    pub fn open(device_id: DeviceId, serial: u64, buffer: usize) -> (Self, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let handle = Self {
            device_id,
            serial,
            sender,
            shutdown: Arc::new(Notify::new()),
        };
        (handle, receiver)
    }

    /// Device this connection belongs to.
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Registry-assigned serial, unique per connection.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Whether the connection can still accept frames.
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queue a text frame without waiting.
    ///
    /// Never blocks: a slow reader loses frames instead of stalling the relay.
    pub fn try_deliver(&self, frame: String) -> Result<(), DeliverySkip> {
        self.sender.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliverySkip::Full,
            mpsc::error::TrySendError::Closed(_) => DeliverySkip::Closed,
        })
    }

    /// Ask the connection's session to shut down.
    pub fn close(&self) {
        self.shutdown.notify_one();
    }

    /// Resolves once [`ConnectionHandle::close`] has been called.
    pub async fn closed(&self) {
        self.shutdown.notified().await;
    }
}

/// Registry of live device connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<DeviceId, ConnectionHandle>,
    next_serial: AtomicU64,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a serial for a new connection.
    pub fn next_serial(&self) -> u64 {
        self.next_serial.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Register a connection, replacing any existing one for the same device.
    ///
    /// The replaced connection is asked to close and returned.
    pub fn register(&self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let device_id = handle.device_id.clone();
        let previous = self.connections.insert(device_id.clone(), handle);

        if let Some(old) = &previous {
            old.close();
            tracing::info!(
                "Device {} reconnected, replacing connection #{}",
                device_id,
                old.serial
            );
        }

        tracing::debug!(
            "Registered connection: device={} (total: {})",
            device_id,
            self.connections.len()
        );
        previous
    }

    /// Remove whatever connection is registered for `device_id`.
    pub fn unregister(&self, device_id: &DeviceId) -> Option<ConnectionHandle> {
        self.connections.remove(device_id).map(|(_, handle)| handle)
    }

    /// Remove the entry for `device_id` only if it is still connection `serial`.
    ///
    /// Returns `true` if an entry was removed.
    pub fn unregister_connection(&self, device_id: &DeviceId, serial: u64) -> bool {
        let removed = self
            .connections
            .remove_if(device_id, |_, handle| handle.serial == serial)
            .is_some();

        if removed {
            tracing::debug!(
                "Unregistered connection: device={} (remaining: {})",
                device_id,
                self.connections.len()
            );
        }
        removed
    }

    /// Get the connection for a device, if it is registered and open.
    pub fn lookup(&self, device_id: &DeviceId) -> Option<ConnectionHandle> {
        self.connections
            .get(device_id)
            .filter(|entry| entry.is_open())
            .map(|entry| entry.value().clone())
    }

    /// Whether `device_id` has an open connection.
    pub fn is_connected(&self, device_id: &DeviceId) -> bool {
        self.lookup(device_id).is_some()
    }

    /// Snapshot of all open connections.
    pub fn list_open(&self) -> Vec<ConnectionHandle> {
        self.connections
            .iter()
            .filter(|entry| entry.is_open())
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Call `f` for every open connection except `excluded`.
    ///
    /// Works on a snapshot, so `f` may touch the registry without deadlocking.
    /// Returns how many connections were visited.
    pub fn for_each_open_except<F>(&self, excluded: &DeviceId, mut f: F) -> usize
    where
        F: FnMut(&ConnectionHandle),
    {
        let targets: Vec<ConnectionHandle> = self
            .list_open()
            .into_iter()
            .filter(|handle| handle.device_id() != excluded)
            .collect();

        for handle in &targets {
            f(handle);
        }
        targets.len()
    }

    /// Number of registered connections (open or not yet cleaned up).
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Number of open connections.
    pub fn open_count(&self) -> usize {
        self.connections.iter().filter(|entry| entry.is_open()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn device(id: &str) -> DeviceId {
        DeviceId::parse(id).unwrap()
    }

    fn open(registry: &ConnectionRegistry, id: &str) -> (ConnectionHandle, mpsc::Receiver<String>) {
        let (handle, rx) = ConnectionHandle::open(device(id), registry.next_serial(), 8);
        registry.register(handle.clone());
        (handle, rx)
    }

    #[test]
    fn serials_are_unique() {
        let registry = ConnectionRegistry::new();
        let a = registry.next_serial();
        let b = registry.next_serial();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn register_and_lookup() {
        let registry = ConnectionRegistry::new();
        let (_handle, _rx) = open(&registry, "A");

        assert!(registry.is_connected(&device("A")));
        assert!(!registry.is_connected(&device("B")));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn dropped_receiver_counts_as_closed() {
        let registry = ConnectionRegistry::new();
        let (_handle, rx) = open(&registry, "A");
        drop(rx);

        assert!(registry.lookup(&device("A")).is_none());
        assert_eq!(registry.open_count(), 0);
        // Still registered until the session cleans up
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn reconnect_replaces_and_closes_previous() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = open(&registry, "A");

        let (second, _rx2) = ConnectionHandle::open(device("A"), registry.next_serial(), 8);
        let previous = registry.register(second.clone()).unwrap();
        assert_eq!(previous.serial(), first.serial());

        // The superseded session is woken
        tokio::time::timeout(Duration::from_millis(100), first.closed())
            .await
            .expect("old connection should be told to close");

        assert_eq!(registry.lookup(&device("A")).unwrap().serial(), second.serial());
        let open = registry.list_open();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].serial(), second.serial());
    }

    #[tokio::test]
    async fn stale_unregister_keeps_newer_connection() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = open(&registry, "A");
        let (second, _rx2) = open(&registry, "A");

        // Old session tearing down late must not evict the new one
        assert!(!registry.unregister_connection(&device("A"), first.serial()));
        assert!(registry.is_connected(&device("A")));

        assert!(registry.unregister_connection(&device("A"), second.serial()));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn unregister_removes_any_connection() {
        let registry = ConnectionRegistry::new();
        let (_handle, _rx) = open(&registry, "A");
        assert!(registry.unregister(&device("A")).is_some());
        assert!(registry.unregister(&device("A")).is_none());
    }

    #[tokio::test]
    async fn for_each_open_except_skips_origin() {
        let registry = ConnectionRegistry::new();
        let (_a, mut rx_a) = open(&registry, "A");
        let (_b, mut rx_b) = open(&registry, "B");
        let (_c, mut rx_c) = open(&registry, "C");

        let visited = registry.for_each_open_except(&device("A"), |handle| {
            handle.try_deliver("hello".into()).unwrap();
        });

        assert_eq!(visited, 2);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), "hello");
        assert_eq!(rx_c.try_recv().unwrap(), "hello");
    }

    #[tokio::test]
    async fn try_deliver_reports_full_and_closed() {
        let (handle, rx) = ConnectionHandle::open(device("A"), 1, 1);
        assert!(handle.try_deliver("one".into()).is_ok());
        assert_eq!(handle.try_deliver("two".into()), Err(DeliverySkip::Full));

        drop(rx);
        assert_eq!(handle.try_deliver("three".into()), Err(DeliverySkip::Closed));
        assert!(!handle.is_open());
    }
}
