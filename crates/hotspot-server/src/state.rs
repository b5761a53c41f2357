//! Application state shared across handlers.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hotspot_core::{
    ActuationChannel, AutomationController, BackupCoordinator, BackupTarget, ConfigEngine,
    DaemonConfig, EngineContext, EventHub, FlagStore, FlagsRepository, JsonStore, NoticeSink,
    PairedDeviceSource, PeripheralStore, PresetStore, TracingNotices,
};
use tokio::sync::RwLock;
use tracing::info;

use crate::channel::CommandChannel;
use crate::supervisor::DaemonHost;

#[cfg(feature = "bluetooth")]
fn paired_device_source() -> Option<Arc<dyn PairedDeviceSource>> {
    Some(Arc::new(hotspot_core::BluezPairedDevices::new()))
}

#[cfg(not(feature = "bluetooth"))]
fn paired_device_source() -> Option<Arc<dyn PairedDeviceSource>> {
    None
}

/// Handle passed to every handler.
pub type SharedState = Arc<RwLock<AppState>>;

/// The daemon's external collaborators.
#[derive(Clone)]
pub struct Collaborators {
    /// Feature flag persistence.
    pub flags: Arc<dyn FlagStore>,
    /// Preset persistence.
    pub presets: Arc<dyn PresetStore>,
    /// Selected peripheral persistence.
    pub peripherals: Arc<dyn PeripheralStore>,
    /// Whole-store export/import.
    pub backup: Arc<dyn BackupTarget>,
    /// Directory backup files are confined to.
    pub backup_dir: PathBuf,
    /// Privileged access point control.
    pub channel: Arc<dyn ActuationChannel>,
    /// Destination of automation diagnostics.
    pub notices: Arc<dyn NoticeSink>,
    /// Paired device listing. `None` when built without Bluetooth support.
    pub paired: Option<Arc<dyn PairedDeviceSource>>,
}

/// Shared application state.
pub struct AppState {
    /// The configuration editing session.
    pub engine: ConfigEngine,
    /// Typed flag access.
    pub flags: FlagsRepository,
    /// Export/import runner.
    pub backup: Arc<BackupCoordinator>,
    /// Connectivity event fan-out.
    pub hub: Arc<EventHub>,
    /// Automation decisions.
    pub controller: AutomationController,
    /// Automation service host.
    pub automation: Arc<DaemonHost>,
    /// Privileged channel, for health reporting.
    pub channel: Arc<dyn ActuationChannel>,
    /// Paired device listing, if available.
    pub paired: Option<Arc<dyn PairedDeviceSource>>,
    /// When the daemon started.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Build state from the daemon configuration: a [`JsonStore`] in the data
    /// directory and a [`CommandChannel`].
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or the engine cannot
    /// load the committed configuration.
    pub async fn new(config: &DaemonConfig) -> anyhow::Result<Self> {
        let store = Arc::new(JsonStore::open(&config.storage.data_dir).await?);
        info!(path = %store.path().display(), "State store opened");

        let collaborators = Collaborators {
            flags: store.clone(),
            presets: store.clone(),
            peripherals: store.clone(),
            backup: store,
            backup_dir: config.storage.backup_dir(),
            channel: Arc::new(CommandChannel::new(config.channel.clone())),
            notices: Arc::new(TracingNotices),
            paired: paired_device_source(),
        };
        Ok(Self::with_collaborators(collaborators).await?)
    }

    /// Build state around arbitrary collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the flags or the committed configuration cannot be
    /// read.
    pub async fn with_collaborators(c: Collaborators) -> hotspot_core::Result<Self> {
        let flags = FlagsRepository::new(c.flags);
        if flags.is_first_run().await? {
            info!("First run, recording it");
            flags.set_not_first_run().await?;
        }

        let engine = ConfigEngine::load(EngineContext {
            flags: flags.clone(),
            presets: c.presets,
            peripherals: c.peripherals.clone(),
            channel: c.channel.clone(),
        })
        .await?;

        let controller =
            AutomationController::new(flags.clone(), c.peripherals, c.channel.clone(), c.notices);

        Ok(Self {
            engine,
            flags,
            backup: Arc::new(BackupCoordinator::new(c.backup, c.backup_dir)),
            hub: Arc::new(EventHub::new()),
            controller,
            automation: Arc::new(DaemonHost::new()),
            channel: c.channel,
            paired: c.paired,
            started_at: Utc::now(),
        })
    }

    /// Wrap for sharing between handlers.
    #[must_use]
    pub fn shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }
}
