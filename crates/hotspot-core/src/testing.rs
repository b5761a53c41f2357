//! In-memory implementations of the external collaborators.
//!
//! Used by the unit tests in this crate and, through the `testing` feature,
//! by the server's router tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use crate::automation::NoticeSink;
use crate::channel::{ActuationChannel, ChannelState};
use crate::error::{HotspotError, Result};
use crate::flags::FlagStore;
use crate::peripheral::{PairedDevice, PairedDeviceSource, PeripheralStore, SelectedPeripheral};
use crate::presets::{sort_by_recency, Preset, PresetStore};
use crate::types::{AccessPointConfiguration, Capabilities};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Flag store backed by a map. Counts writes and can be told to fail.
#[derive(Debug, Default)]
pub struct MemoryFlagStore {
    values: Mutex<BTreeMap<u8, bool>>,
    writes: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryFlagStore {
    /// Number of successful `set` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail with a persistence error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(HotspotError::PersistenceError("flag store offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl FlagStore for MemoryFlagStore {
    async fn get(&self, ordinal: u8) -> Result<Option<bool>> {
        self.check()?;
        Ok(lock(&self.values).get(&ordinal).copied())
    }

    async fn set(&self, ordinal: u8, value: bool) -> Result<()> {
        self.check()?;
        lock(&self.values).insert(ordinal, value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn dump(&self) -> Result<BTreeMap<u8, bool>> {
        self.check()?;
        Ok(lock(&self.values).clone())
    }
}

/// Preset store backed by a vector.
#[derive(Debug, Default)]
pub struct MemoryPresetStore {
    presets: Mutex<Vec<Preset>>,
}

impl MemoryPresetStore {
    /// Number of stored presets.
    pub fn len(&self) -> usize {
        lock(&self.presets).len()
    }

    /// Whether the store holds no presets.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PresetStore for MemoryPresetStore {
    async fn insert(&self, preset: Preset) -> Result<()> {
        lock(&self.presets).push(preset);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut presets = lock(&self.presets);
        let before = presets.len();
        presets.retain(|p| p.id != id);
        if presets.len() == before {
            return Err(HotspotError::PresetNotFound(id));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Preset>> {
        let mut presets = lock(&self.presets).clone();
        sort_by_recency(&mut presets);
        Ok(presets)
    }
}

/// Peripheral selection held in memory.
#[derive(Debug, Default)]
pub struct MemoryPeripheralStore {
    selected: Mutex<Option<SelectedPeripheral>>,
}

impl MemoryPeripheralStore {
    /// Start with `peripheral` selected.
    pub fn with_selected(peripheral: SelectedPeripheral) -> Self {
        Self {
            selected: Mutex::new(Some(peripheral)),
        }
    }
}

#[async_trait]
impl PeripheralStore for MemoryPeripheralStore {
    async fn selected(&self) -> Result<Option<SelectedPeripheral>> {
        Ok(lock(&self.selected).clone())
    }

    async fn set_selected(&self, peripheral: SelectedPeripheral) -> Result<()> {
        *lock(&self.selected) = Some(peripheral);
        Ok(())
    }
}

/// A call observed by [`MockChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCall {
    /// `start_access_point(force)`.
    Start {
        /// The force flag passed.
        force: bool,
    },
    /// `stop_access_point(force)`.
    Stop {
        /// The force flag passed.
        force: bool,
    },
    /// `apply_configuration(cfg)`.
    Apply(AccessPointConfiguration),
}

/// Actuation channel that records calls instead of touching a radio.
#[derive(Debug)]
pub struct MockChannel {
    state: Mutex<ChannelState>,
    configuration: Mutex<AccessPointConfiguration>,
    capabilities: Capabilities,
    calls: Mutex<Vec<ChannelCall>>,
    reject_configurations: AtomicBool,
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new(ChannelState::Connected)
    }
}

impl MockChannel {
    /// A channel in `state` running the default configuration.
    pub fn new(state: ChannelState) -> Self {
        Self {
            state: Mutex::new(state),
            configuration: Mutex::new(AccessPointConfiguration::default()),
            capabilities: Capabilities::default(),
            calls: Mutex::new(Vec::new()),
            reject_configurations: AtomicBool::new(false),
        }
    }

    /// Replace the committed configuration.
    pub fn with_configuration(self, configuration: AccessPointConfiguration) -> Self {
        *lock(&self.configuration) = configuration;
        self
    }

    /// Change the reported connection state.
    pub fn set_state(&self, state: ChannelState) {
        *lock(&self.state) = state;
    }

    /// Make `apply_configuration` answer `false`.
    pub fn set_reject_configurations(&self, reject: bool) {
        self.reject_configurations.store(reject, Ordering::SeqCst);
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<ChannelCall> {
        lock(&self.calls).clone()
    }

    fn connected(&self) -> Result<()> {
        match *lock(&self.state) {
            ChannelState::Connected => Ok(()),
            other => Err(HotspotError::ChannelUnavailable(format!("{other:?}"))),
        }
    }
}

#[async_trait]
impl ActuationChannel for MockChannel {
    async fn connection_state(&self) -> ChannelState {
        *lock(&self.state)
    }

    async fn capabilities(&self) -> Result<Capabilities> {
        Ok(self.capabilities)
    }

    async fn current_configuration(&self) -> Result<AccessPointConfiguration> {
        Ok(lock(&self.configuration).clone())
    }

    async fn start_access_point(&self, force: bool) -> Result<()> {
        self.connected()?;
        lock(&self.calls).push(ChannelCall::Start { force });
        Ok(())
    }

    async fn stop_access_point(&self, force: bool) -> Result<()> {
        self.connected()?;
        lock(&self.calls).push(ChannelCall::Stop { force });
        Ok(())
    }

    async fn apply_configuration(&self, configuration: &AccessPointConfiguration) -> Result<bool> {
        self.connected()?;
        lock(&self.calls).push(ChannelCall::Apply(configuration.clone()));
        if self.reject_configurations.load(Ordering::SeqCst) {
            return Ok(false);
        }
        *lock(&self.configuration) = configuration.clone();
        Ok(true)
    }
}

/// Notice sink that keeps every message.
#[derive(Debug, Default)]
pub struct RecordingNotices {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotices {
    /// Messages received so far.
    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }
}

impl NoticeSink for RecordingNotices {
    fn notice(&self, message: &str) {
        lock(&self.messages).push(message.to_string());
    }
}

/// Paired device list fixed at construction.
#[derive(Debug, Default)]
pub struct StaticPairedDevices {
    devices: Vec<PairedDevice>,
}

impl StaticPairedDevices {
    /// A source that always answers `devices`, sorted by name.
    pub fn new(mut devices: Vec<PairedDevice>) -> Self {
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        Self { devices }
    }
}

#[async_trait]
impl PairedDeviceSource for StaticPairedDevices {
    async fn paired_devices(&self) -> Result<Vec<PairedDevice>> {
        Ok(self.devices.clone())
    }
}
