//! Persisted feature flags.
//!
//! Flags are stored by a small integer key. The keys are part of the
//! on-disk format: ordinal `1` belonged to a flag that no longer exists and
//! must never be handed out again.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::Result;

/// Ordinal of the retired "uses room db" flag.
pub const RETIRED_ORDINAL: u8 = 1;

/// A persisted boolean toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigFlag {
    /// Set once the daemon has completed its first run.
    NotFirstRun,
    /// Accept control requests from unauthenticated local callers.
    InsecureReceiverEnabled,
    /// Start/stop the access point with the selected peripheral.
    AutoEnableOnBt,
    /// Surface a diagnostic notice at each automation decision.
    AutoEnableOnBtDebugToasts,
}

impl ConfigFlag {
    /// All live flags.
    pub const ALL: [Self; 4] = [
        Self::NotFirstRun,
        Self::InsecureReceiverEnabled,
        Self::AutoEnableOnBt,
        Self::AutoEnableOnBtDebugToasts,
    ];

    /// Stable storage key.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::NotFirstRun => 0,
            Self::InsecureReceiverEnabled => 2,
            Self::AutoEnableOnBt => 3,
            Self::AutoEnableOnBtDebugToasts => 4,
        }
    }

    /// Map a storage key back to a flag. Unknown and retired keys yield `None`.
    #[must_use]
    pub const fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(Self::NotFirstRun),
            2 => Some(Self::InsecureReceiverEnabled),
            3 => Some(Self::AutoEnableOnBt),
            4 => Some(Self::AutoEnableOnBtDebugToasts),
            _ => None,
        }
    }
}

/// Key-value store backing the flags.
#[async_trait]
pub trait FlagStore: Send + Sync {
    /// Read a flag; `None` when it was never written.
    async fn get(&self, ordinal: u8) -> Result<Option<bool>>;

    /// Write a flag, replacing any previous value.
    async fn set(&self, ordinal: u8, value: bool) -> Result<()>;

    /// Every stored key and value, including keys this build doesn't know.
    async fn dump(&self) -> Result<BTreeMap<u8, bool>>;
}

/// Typed access to the flag store.
#[derive(Clone)]
pub struct FlagsRepository {
    store: Arc<dyn FlagStore>,
}

impl std::fmt::Debug for FlagsRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlagsRepository").finish_non_exhaustive()
    }
}

impl FlagsRepository {
    /// Wrap a store.
    pub fn new(store: Arc<dyn FlagStore>) -> Self {
        Self { store }
    }

    async fn is_set(&self, flag: ConfigFlag) -> Result<bool> {
        Ok(self.store.get(flag.ordinal()).await? == Some(true))
    }

    async fn write(&self, flag: ConfigFlag, value: bool) -> Result<()> {
        tracing::debug!(flag = ?flag, value, "Writing flag");
        self.store.set(flag.ordinal(), value).await
    }

    /// `true` until [`Self::set_not_first_run`] has been called.
    pub async fn is_first_run(&self) -> Result<bool> {
        Ok(!self.is_set(ConfigFlag::NotFirstRun).await?)
    }

    /// Record that first-run setup has happened.
    pub async fn set_not_first_run(&self) -> Result<()> {
        self.write(ConfigFlag::NotFirstRun, true).await
    }

    /// Whether unauthenticated local control is allowed.
    pub async fn is_insecure_receiver_enabled(&self) -> Result<bool> {
        self.is_set(ConfigFlag::InsecureReceiverEnabled).await
    }

    /// Set [`ConfigFlag::InsecureReceiverEnabled`].
    pub async fn set_insecure_receiver_status(&self, enabled: bool) -> Result<()> {
        self.write(ConfigFlag::InsecureReceiverEnabled, enabled).await
    }

    /// Whether Bluetooth automation is on.
    pub async fn is_auto_enable_on_bt_enabled(&self) -> Result<bool> {
        self.is_set(ConfigFlag::AutoEnableOnBt).await
    }

    /// Set [`ConfigFlag::AutoEnableOnBt`].
    pub async fn set_auto_enable_on_bt_status(&self, enabled: bool) -> Result<()> {
        self.write(ConfigFlag::AutoEnableOnBt, enabled).await
    }

    /// Whether automation diagnostics are surfaced.
    pub async fn is_auto_enable_on_bt_debug_toasts_enabled(&self) -> Result<bool> {
        self.is_set(ConfigFlag::AutoEnableOnBtDebugToasts).await
    }

    /// Set [`ConfigFlag::AutoEnableOnBtDebugToasts`].
    pub async fn set_auto_enable_on_bt_debug_toasts_status(&self, enabled: bool) -> Result<()> {
        self.write(ConfigFlag::AutoEnableOnBtDebugToasts, enabled)
            .await
    }

    /// Every known flag that has been written. Retired keys are dropped.
    pub async fn dump(&self) -> Result<BTreeMap<ConfigFlag, bool>> {
        let raw = self.store.dump().await?;
        Ok(raw
            .into_iter()
            .filter_map(|(ordinal, value)| ConfigFlag::from_ordinal(ordinal).map(|f| (f, value)))
            .collect())
    }
}
