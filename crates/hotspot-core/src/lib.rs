//! # hotspot-core
//!
//! Core logic for the hotspot access point daemon.
//!
//! This crate provides:
//! - Editing of the access point configuration with cross-field validation
//! - Named configuration presets
//! - Bluetooth-driven start/stop of the access point
//! - Persistent flags, presets and peripheral selection
//! - Daemon configuration loading
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`engine`] - Draft configuration, field updates, commit and presets
//! - [`automation`] - Per-event guard chain that starts/stops the access point
//! - [`service`] - Restart-tolerant supervision of the automation
//! - [`validators`] - SSID and passphrase checks
//! - [`flags`] - Typed access to persisted feature flags
//! - [`presets`] - Immutable configuration snapshots
//! - [`peripheral`] - Selected peripheral, connectivity events and subscriptions
//! - [`channel`] - The privileged actuation channel
//! - [`backup`] - Export/import of the persisted store
//! - [`storage`] - JSON file backend for the stores
//! - [`config`] - Daemon configuration loading, saving and validation
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Shared types and OpenAPI schemas

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod automation;
pub mod backup;
#[cfg(feature = "bluetooth")]
pub mod bluetooth;
pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod flags;
pub mod peripheral;
pub mod presets;
pub mod service;
pub mod storage;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;
pub mod validators;

// Re-export primary types for convenience
pub use automation::{
    AutomationController, AutomationOutcome, IgnoreReason, NoticeSink, TracingNotices,
};
pub use backup::{BackupCoordinator, BackupStatus, BackupTarget, TransferStatus};
#[cfg(feature = "bluetooth")]
pub use bluetooth::{BluezPairedDevices, BluezWatcher};
pub use channel::{ActuationChannel, ChannelState};
pub use config::{default_data_dir, ChannelSettings, DaemonConfig, ServerSettings, StorageSettings};
pub use engine::{ConfigEngine, EngineContext, SessionFlags, UpdateResults};
pub use error::{HotspotError, Result};
pub use flags::{ConfigFlag, FlagStore, FlagsRepository};
pub use peripheral::{
    ConnectivitySource, EventHub, ListenerId, PairedDevice, PairedDeviceSource, PeripheralAction,
    PeripheralEvent, PeripheralStore, SelectedPeripheral, Subscription,
};
pub use presets::{Preset, PresetStore};
pub use service::{AutomationService, ServiceHost, ServiceStart};
pub use storage::JsonStore;
pub use types::{
    is_valid_mac_address, AccessPointConfiguration, Band, Capabilities, MacAddress,
    MacRandomization, SecurityType,
};
pub use validators::{validate_passphrase, validate_ssid, PassphraseResult, SsidResult};
