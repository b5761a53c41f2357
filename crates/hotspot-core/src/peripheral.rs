//! Trusted peripheral selection and connectivity events.
//!
//! The automation only reacts to one peripheral at a time: the
//! [`SelectedPeripheral`]. Connectivity notifications arrive from a
//! [`ConnectivitySource`] through a [`Subscription`], which must be closed
//! exactly once when the listener goes away.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::error::{HotspotError, Result};
use crate::types::MacAddress;

/// The peripheral whose presence drives the access point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "mac_address": "AA:BB:CC:DD:EE:FF",
    "display_name": "Car stereo"
}))]
pub struct SelectedPeripheral {
    /// Bluetooth address.
    pub mac_address: MacAddress,

    /// Name shown to the user.
    pub display_name: String,
}

/// Persistence for the selected peripheral.
#[async_trait]
pub trait PeripheralStore: Send + Sync {
    /// The current selection, if any.
    async fn selected(&self) -> Result<Option<SelectedPeripheral>>;

    /// Replace the selection.
    async fn set_selected(&self, peripheral: SelectedPeripheral) -> Result<()>;
}

/// A device paired with the local adapter, offered for selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "mac_address": "AA:BB:CC:DD:EE:FF",
    "name": "Car stereo"
}))]
pub struct PairedDevice {
    /// Bluetooth address.
    pub mac_address: MacAddress,

    /// Advertised name, or the address when the device has none.
    pub name: String,
}

impl PairedDevice {
    /// Build an entry, naming it after its address when `name` is missing.
    #[must_use]
    pub fn new(mac_address: MacAddress, name: Option<String>) -> Self {
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| mac_address.to_string());
        Self { mac_address, name }
    }
}

/// Lists the devices a peripheral can be selected from.
#[async_trait]
pub trait PairedDeviceSource: Send + Sync {
    /// Paired devices, sorted by name.
    async fn paired_devices(&self) -> Result<Vec<PairedDevice>>;
}

/// Link-level connectivity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PeripheralAction {
    /// The device connected.
    Connected,
    /// The device disconnected.
    Disconnected,
}

/// A connectivity notification for a concrete device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PeripheralEvent {
    /// `device` connected.
    Connected(MacAddress),
    /// `device` disconnected.
    Disconnected(MacAddress),
}

impl PeripheralEvent {
    /// Build an event from its parts.
    #[must_use]
    pub fn new(action: PeripheralAction, device: MacAddress) -> Self {
        match action {
            PeripheralAction::Connected => Self::Connected(device),
            PeripheralAction::Disconnected => Self::Disconnected(device),
        }
    }

    /// The device the event is about.
    #[must_use]
    pub const fn device(&self) -> &MacAddress {
        match self {
            Self::Connected(mac) | Self::Disconnected(mac) => mac,
        }
    }

    /// Which way the link went.
    #[must_use]
    pub const fn action(&self) -> PeripheralAction {
        match self {
            Self::Connected(_) => PeripheralAction::Connected,
            Self::Disconnected(_) => PeripheralAction::Disconnected,
        }
    }
}

impl fmt::Display for PeripheralEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(mac) => write!(f, "connected {mac}"),
            Self::Disconnected(mac) => write!(f, "disconnected {mac}"),
        }
    }
}

/// Identifies one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Something that delivers connectivity events to registered listeners.
pub trait ConnectivitySource: Send + Sync {
    /// Add a listener and return its id and event stream.
    fn register(&self) -> (ListenerId, mpsc::UnboundedReceiver<PeripheralEvent>);

    /// Remove a listener. Fails with [`HotspotError::NotRegistered`] if the
    /// id is unknown, which callers are expected to tolerate.
    fn unregister(&self, id: ListenerId) -> Result<()>;
}

/// A live registration with a [`ConnectivitySource`].
pub struct Subscription {
    id: ListenerId,
    source: Arc<dyn ConnectivitySource>,
    events: mpsc::UnboundedReceiver<PeripheralEvent>,
    closed: bool,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// Register with `source`.
    pub fn open(source: Arc<dyn ConnectivitySource>) -> Self {
        let (id, events) = source.register();
        debug!(listener = id.0, "Connectivity listener registered");
        Self {
            id,
            source,
            events,
            closed: false,
        }
    }

    /// The listener id.
    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.id
    }

    /// Whether [`Self::close`] has been called.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Next event, or `None` once closed or the source is gone.
    pub async fn recv(&mut self) -> Option<PeripheralEvent> {
        if self.closed {
            return None;
        }
        self.events.recv().await
    }

    /// Unregister. Safe to call any number of times; only the first call
    /// reaches the source, and a `NotRegistered` answer is logged, not
    /// returned.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.events.close();
        match self.source.unregister(self.id) {
            Ok(()) => debug!(listener = self.id.0, "Connectivity listener unregistered"),
            Err(err @ HotspotError::NotRegistered(_)) => {
                warn!(error = %err, "Listener was not registered");
            }
            Err(err) => warn!(error = %err, "Failed to unregister listener"),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// In-process fan-out of connectivity events.
///
/// Feeders (the BlueZ watcher, the HTTP injection endpoint, tests) call
/// [`EventHub::publish`]; every registered listener receives a copy.
#[derive(Debug, Default)]
pub struct EventHub {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<ListenerId, mpsc::UnboundedSender<PeripheralEvent>>>,
}

impl EventHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every listener. Returns how many received it.
    pub fn publish(&self, event: &PeripheralEvent) -> usize {
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        listeners.retain(|_, tx| tx.send(event.clone()).is_ok());
        listeners.len()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

impl ConnectivitySource for EventHub {
    fn register(&self) -> (ListenerId, mpsc::UnboundedReceiver<PeripheralEvent>) {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(id, tx);
        (id, rx)
    }

    fn unregister(&self, id: ListenerId) -> Result<()> {
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&id)
            .map(|_| ())
            .ok_or(HotspotError::NotRegistered(id.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(s: &str) -> MacAddress {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_published_events_reach_subscriber() {
        let hub = Arc::new(EventHub::new());
        let mut sub = Subscription::open(hub.clone());

        let event = PeripheralEvent::Connected(mac("AA:BB:CC:DD:EE:FF"));
        assert_eq!(hub.publish(&event), 1);
        assert_eq!(sub.recv().await, Some(event));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let hub = Arc::new(EventHub::new());
        let mut sub = Subscription::open(hub.clone());
        assert_eq!(hub.listener_count(), 1);

        sub.close();
        sub.close();
        assert!(sub.is_closed());
        assert_eq!(hub.listener_count(), 0);
        assert_eq!(sub.recv().await, None);
    }

    #[test]
    fn test_unregister_unknown_listener() {
        let hub = EventHub::new();
        let err = hub.unregister(ListenerId(42)).unwrap_err();
        assert!(matches!(err, HotspotError::NotRegistered(42)));
        assert!(err.is_expected_state());
    }

    #[test]
    fn test_close_after_source_forgot_listener_is_swallowed() {
        let hub = Arc::new(EventHub::new());
        let mut sub = Subscription::open(hub.clone());
        hub.unregister(sub.id()).unwrap();
        // Source no longer knows the id; close must not panic or error.
        sub.close();
        assert!(sub.is_closed());
    }

    #[test]
    fn test_drop_unregisters() {
        let hub = Arc::new(EventHub::new());
        {
            let _sub = Subscription::open(hub.clone());
            assert_eq!(hub.listener_count(), 1);
        }
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn test_paired_device_falls_back_to_address() {
        let device = PairedDevice::new(mac("AA:BB:CC:DD:EE:FF"), None);
        assert_eq!(device.name, "AA:BB:CC:DD:EE:FF");

        let device = PairedDevice::new(mac("AA:BB:CC:DD:EE:FF"), Some("  ".into()));
        assert_eq!(device.name, "AA:BB:CC:DD:EE:FF");

        let device = PairedDevice::new(mac("AA:BB:CC:DD:EE:FF"), Some("Car".into()));
        assert_eq!(device.name, "Car");
    }

    #[test]
    fn test_event_accessors() {
        let device = mac("01:02:03:04:05:06");
        let event = PeripheralEvent::new(PeripheralAction::Disconnected, device.clone());
        assert_eq!(event.device(), &device);
        assert_eq!(event.action(), PeripheralAction::Disconnected);
        assert_eq!(event.to_string(), "disconnected 01:02:03:04:05:06");
    }
}
