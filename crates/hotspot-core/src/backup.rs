//! Export and import of the whole persisted store.
//!
//! Each direction publishes its progress as a [`TransferStatus`] on a
//! `watch` channel. Export and import share one in-flight slot: starting a
//! transfer while another one runs fails immediately with
//! [`HotspotError::TransferInProgress`] and leaves both statuses alone.
//!
//! Backup files live under one root directory. Requested paths are resolved
//! against it and anything that ends up outside is refused with
//! [`HotspotError::BackupPathRejected`].

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tracing::{error, info, instrument};
use utoipa::ToSchema;

use crate::error::{HotspotError, Result};

/// Progress of a transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Nothing has run yet.
    #[default]
    Idle,
    /// A transfer is running.
    Processing,
    /// The last transfer finished.
    Success,
    /// The last transfer failed. Not retried automatically.
    Failure,
}

/// Status of both directions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BackupStatus {
    /// Export direction.
    pub export: TransferStatus,
    /// Import direction.
    pub import: TransferStatus,
}

/// Something whose whole state can be copied to and from a file.
#[async_trait]
pub trait BackupTarget: Send + Sync {
    /// Write everything to `path`.
    async fn export_to(&self, path: &Path) -> Result<()>;

    /// Replace everything with the contents of `path`. Either the whole
    /// file is taken or nothing changes.
    async fn import_from(&self, path: &Path) -> Result<()>;
}

/// Runs transfers one at a time and tracks their status.
pub struct BackupCoordinator {
    target: Arc<dyn BackupTarget>,
    root: PathBuf,
    in_flight: Mutex<()>,
    export_status: watch::Sender<TransferStatus>,
    import_status: watch::Sender<TransferStatus>,
}

impl std::fmt::Debug for BackupCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupCoordinator")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl BackupCoordinator {
    /// Create a coordinator with both directions idle, keeping backup files
    /// under `root`.
    pub fn new(target: Arc<dyn BackupTarget>, root: impl Into<PathBuf>) -> Self {
        Self {
            target,
            root: root.into(),
            in_flight: Mutex::new(()),
            export_status: watch::Sender::new(TransferStatus::Idle),
            import_status: watch::Sender::new(TransferStatus::Idle),
        }
    }

    /// Current status of both directions.
    pub fn status(&self) -> BackupStatus {
        BackupStatus {
            export: *self.export_status.borrow(),
            import: *self.import_status.borrow(),
        }
    }

    /// Watch export progress.
    pub fn subscribe_export(&self) -> watch::Receiver<TransferStatus> {
        self.export_status.subscribe()
    }

    /// Watch import progress.
    pub fn subscribe_import(&self) -> watch::Receiver<TransferStatus> {
        self.import_status.subscribe()
    }

    /// Directory backup files are confined to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `requested` to a file directly or indirectly inside the root.
    ///
    /// Relative paths are taken relative to the root. The parent directory
    /// must exist; symlinks in it are resolved before the containment check.
    ///
    /// # Errors
    ///
    /// [`HotspotError::BackupPathRejected`] if the path has no file name,
    /// ends in `..`, names a symlink, or resolves outside the root.
    pub async fn resolve(&self, requested: &Path) -> Result<PathBuf> {
        let rejected = || HotspotError::BackupPathRejected(requested.to_path_buf());

        let file_name = match requested.components().next_back() {
            Some(Component::Normal(name)) => name.to_owned(),
            _ => return Err(rejected()),
        };

        tokio::fs::create_dir_all(&self.root).await?;
        let root = tokio::fs::canonicalize(&self.root).await?;

        let joined = root.join(requested);
        let parent = joined.parent().ok_or_else(rejected)?;
        let parent = tokio::fs::canonicalize(parent)
            .await
            .map_err(|_| rejected())?;
        if !parent.starts_with(&root) {
            return Err(rejected());
        }
        let resolved = parent.join(file_name);
        if let Ok(meta) = tokio::fs::symlink_metadata(&resolved).await {
            if meta.file_type().is_symlink() {
                return Err(rejected());
            }
        }
        Ok(resolved)
    }

    /// Whether a transfer is running.
    pub fn is_busy(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Export the store to `path` under the root. Returns the file written.
    ///
    /// # Errors
    ///
    /// [`HotspotError::BackupPathRejected`] for paths outside the root,
    /// [`HotspotError::TransferInProgress`] if another transfer is running,
    /// otherwise whatever the target reports.
    #[instrument(skip(self))]
    pub async fn export(&self, path: &Path) -> Result<PathBuf> {
        let path = self.resolve(path).await?;
        let _slot = self
            .in_flight
            .try_lock()
            .map_err(|_| HotspotError::TransferInProgress)?;
        Self::track(&self.export_status, "export", self.target.export_to(&path)).await?;
        Ok(path)
    }

    /// Import the store from `path` under the root. Returns the file read.
    ///
    /// # Errors
    ///
    /// [`HotspotError::BackupPathRejected`] for paths outside the root,
    /// [`HotspotError::TransferInProgress`] if another transfer is running,
    /// otherwise whatever the target reports.
    #[instrument(skip(self))]
    pub async fn import(&self, path: &Path) -> Result<PathBuf> {
        let path = self.resolve(path).await?;
        let _slot = self
            .in_flight
            .try_lock()
            .map_err(|_| HotspotError::TransferInProgress)?;
        Self::track(&self.import_status, "import", self.target.import_from(&path)).await?;
        Ok(path)
    }

    async fn track(
        status: &watch::Sender<TransferStatus>,
        direction: &str,
        transfer: impl std::future::Future<Output = Result<()>>,
    ) -> Result<()> {
        status.send_replace(TransferStatus::Processing);
        match transfer.await {
            Ok(()) => {
                status.send_replace(TransferStatus::Success);
                info!(direction, "Backup transfer finished");
                Ok(())
            }
            Err(err) => {
                status.send_replace(TransferStatus::Failure);
                error!(direction, error = %err, "Backup transfer failed");
                Err(err)
            }
        }
    }
}
