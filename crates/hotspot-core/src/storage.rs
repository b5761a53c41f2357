//! Persistent storage for flags, presets and the selected peripheral.
//!
//! Everything lives in a single JSON document, `state.json`, in the data
//! directory. Writes go to a temporary file that is renamed over the old
//! one, so a crash leaves either the old or the new document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::backup::BackupTarget;
use crate::error::{HotspotError, Result};
use crate::flags::FlagStore;
use crate::peripheral::{PeripheralStore, SelectedPeripheral};
use crate::presets::{sort_by_recency, Preset, PresetStore};

/// File name of the state document.
pub const STATE_FILE: &str = "state.json";

/// On-disk layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StateDocument {
    /// Flag values by ordinal. Unknown ordinals are kept as-is.
    #[serde(default)]
    flags: BTreeMap<u8, bool>,

    #[serde(default)]
    presets: Vec<Preset>,

    #[serde(default)]
    selected_peripheral: Option<SelectedPeripheral>,
}

/// JSON file backend for every store trait.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    state: Mutex<StateDocument>,
}

impl JsonStore {
    /// Open the store in `data_dir`, starting empty if no state exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing state file cannot be read or parsed.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let path = data_dir.as_ref().join(STATE_FILE);
        let state = if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read_to_string(&path).await?;
            serde_json::from_str(&content)?
        } else {
            debug!(path = %path.display(), "No state file yet, starting empty");
            StateDocument::default()
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Path of the state document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the document, write it, then keep it.
    /// Nothing changes in memory if the write fails.
    async fn update<T>(&self, change: impl FnOnce(&mut StateDocument) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let value = change(&mut next)?;
        write_atomically(&self.path, &next).await?;
        *state = next;
        Ok(value)
    }
}

async fn write_atomically(path: &Path, document: &StateDocument) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(document)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl FlagStore for JsonStore {
    async fn get(&self, ordinal: u8) -> Result<Option<bool>> {
        Ok(self.state.lock().await.flags.get(&ordinal).copied())
    }

    async fn set(&self, ordinal: u8, value: bool) -> Result<()> {
        self.update(|doc| {
            doc.flags.insert(ordinal, value);
            Ok(())
        })
        .await
    }

    async fn dump(&self) -> Result<BTreeMap<u8, bool>> {
        Ok(self.state.lock().await.flags.clone())
    }
}

#[async_trait]
impl PresetStore for JsonStore {
    async fn insert(&self, preset: Preset) -> Result<()> {
        self.update(|doc| {
            doc.presets.push(preset);
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.update(|doc| {
            let before = doc.presets.len();
            doc.presets.retain(|p| p.id != id);
            if doc.presets.len() == before {
                return Err(HotspotError::PresetNotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn list(&self) -> Result<Vec<Preset>> {
        let mut presets = self.state.lock().await.presets.clone();
        sort_by_recency(&mut presets);
        Ok(presets)
    }
}

#[async_trait]
impl PeripheralStore for JsonStore {
    async fn selected(&self) -> Result<Option<SelectedPeripheral>> {
        Ok(self.state.lock().await.selected_peripheral.clone())
    }

    async fn set_selected(&self, peripheral: SelectedPeripheral) -> Result<()> {
        self.update(|doc| {
            doc.selected_peripheral = Some(peripheral);
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl BackupTarget for JsonStore {
    async fn export_to(&self, path: &Path) -> Result<()> {
        let state = self.state.lock().await;
        write_atomically(path, &state).await?;
        info!(path = %path.display(), "State exported");
        Ok(())
    }

    async fn import_from(&self, path: &Path) -> Result<()> {
        let content = tokio::fs::read_to_string(path).await?;
        let imported: StateDocument = serde_json::from_str(&content)?;
        self.update(|doc| {
            *doc = imported;
            Ok(())
        })
        .await?;
        info!(path = %path.display(), "State imported");
        Ok(())
    }
}
