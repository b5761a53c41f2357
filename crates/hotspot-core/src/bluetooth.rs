//! BlueZ integration.
//!
//! [`BluezWatcher`] follows the `Connected` property of every device known
//! to the default adapter and publishes each change to an [`EventHub`].
//! Devices paired while the watcher runs are picked up from adapter events.
//! [`BluezPairedDevices`] lists the paired devices a peripheral can be
//! selected from.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bluer::{Adapter, AdapterEvent, Address, DeviceEvent, DeviceProperty};
use futures::stream::{SelectAll, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{HotspotError, Result};
use crate::peripheral::{
    EventHub, PairedDevice, PairedDeviceSource, PeripheralAction, PeripheralEvent,
};
use crate::types::MacAddress;

type DeviceStream = Pin<Box<dyn Stream<Item = (Address, DeviceEvent)> + Send>>;

fn unavailable(err: bluer::Error) -> HotspotError {
    HotspotError::BluetoothUnavailable(err.to_string())
}

/// Publishes BlueZ connect/disconnect changes to a hub.
#[derive(Debug, Clone)]
pub struct BluezWatcher {
    hub: Arc<EventHub>,
}

impl BluezWatcher {
    /// Create a watcher feeding `hub`.
    pub fn new(hub: Arc<EventHub>) -> Self {
        Self { hub }
    }

    /// Watch until `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// [`HotspotError::BluetoothUnavailable`] if BlueZ cannot be reached or
    /// there is no adapter.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let session = bluer::Session::new().await.map_err(unavailable)?;
        let adapter = session.default_adapter().await.map_err(unavailable)?;
        info!(adapter = adapter.name(), "Watching Bluetooth connectivity");

        let mut devices: SelectAll<DeviceStream> = SelectAll::new();
        for address in adapter.device_addresses().await.map_err(unavailable)? {
            Self::follow(&adapter, address, &mut devices).await;
        }
        let mut adapter_events = adapter.events().await.map_err(unavailable)?;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                Some(event) = adapter_events.next() => {
                    if let AdapterEvent::DeviceAdded(address) = event {
                        Self::follow(&adapter, address, &mut devices).await;
                    }
                }
                Some((address, event)) = devices.next(), if !devices.is_empty() => {
                    if let DeviceEvent::PropertyChanged(DeviceProperty::Connected(connected)) = event {
                        self.publish(address, connected);
                    }
                }
            }
        }

        debug!("Bluetooth watcher stopped");
        Ok(())
    }

    async fn follow(adapter: &Adapter, address: Address, devices: &mut SelectAll<DeviceStream>) {
        let events = match adapter.device(address) {
            Ok(device) => device.events().await,
            Err(err) => Err(err),
        };
        match events {
            Ok(events) => devices.push(Box::pin(events.map(move |event| (address, event)))),
            Err(err) => warn!(%address, error = %err, "Cannot follow device"),
        }
    }

    fn publish(&self, address: Address, connected: bool) {
        let device: MacAddress = match address.to_string().parse() {
            Ok(mac) => mac,
            Err(err) => {
                warn!(%address, error = %err, "Unparseable device address");
                return;
            }
        };
        let action = if connected {
            PeripheralAction::Connected
        } else {
            PeripheralAction::Disconnected
        };
        let event = PeripheralEvent::new(action, device);
        let delivered = self.hub.publish(&event);
        debug!(%event, delivered, "Bluetooth event published");
    }
}

/// Reads paired devices from the default adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct BluezPairedDevices;

impl BluezPairedDevices {
    /// Create a reader. BlueZ is contacted on each call.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PairedDeviceSource for BluezPairedDevices {
    async fn paired_devices(&self) -> Result<Vec<PairedDevice>> {
        let session = bluer::Session::new().await.map_err(unavailable)?;
        let adapter = session.default_adapter().await.map_err(unavailable)?;

        let mut paired = Vec::new();
        for address in adapter.device_addresses().await.map_err(unavailable)? {
            let device = adapter.device(address).map_err(unavailable)?;
            match device.is_paired().await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    warn!(%address, error = %err, "Cannot read pairing state");
                    continue;
                }
            }
            let Ok(mac) = address.to_string().parse::<MacAddress>() else {
                warn!(%address, "Unparseable device address");
                continue;
            };
            let name = device.name().await.unwrap_or_else(|err| {
                debug!(%address, error = %err, "Device name unavailable");
                None
            });
            paired.push(PairedDevice::new(mac, name));
        }

        paired.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = paired.len(), "Listed paired devices");
        Ok(paired)
    }
}
