//! The configuration consistency engine.
//!
//! [`ConfigEngine`] owns the draft access point configuration while it is
//! being edited. Every edit replaces the whole draft record and records a
//! validation result; nothing reaches the access point until [`commit`]
//! succeeds, and commit and preset saving are refused while any result is
//! a failure.
//!
//! Two fields are coupled: 6 GHz only works with WPA3-SAE. Editing the
//! security type away from SAE pulls the band down to 5 GHz, and selecting
//! 6 GHz pulls the security type up to SAE. Each edit fires at most one of
//! these coercions.
//!
//! [`commit`]: ConfigEngine::commit

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::channel::ActuationChannel;
use crate::error::{HotspotError, Result};
use crate::flags::FlagsRepository;
use crate::peripheral::{PeripheralStore, SelectedPeripheral};
use crate::presets::{Preset, PresetStore};
use crate::types::{
    AccessPointConfiguration, Band, Capabilities, MacAddress, MacRandomization, SecurityType,
};
use crate::validators::{validate_passphrase, validate_ssid, PassphraseResult, SsidResult};

/// Per-field validation state of the draft.
///
/// Equal to its default value exactly when the draft may be committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UpdateResults {
    /// Result of the last SSID edit.
    pub ssid_result: SsidResult,

    /// Result of the last passphrase edit.
    pub passphrase_result: PassphraseResult,

    /// Set when the client limit was cleared and the driver maximum is used.
    pub max_client_limit_empty: bool,
}

impl UpdateResults {
    /// Whether every field is valid.
    #[must_use]
    pub fn is_all_success(&self) -> bool {
        *self == Self::default()
    }
}

/// Flags edited alongside the configuration and written on commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionFlags {
    /// Allow unauthenticated local control.
    pub insecure_receiver_enabled: bool,

    /// Bluetooth automation.
    pub auto_enable_on_bt: bool,

    /// Automation diagnostics.
    pub auto_enable_on_bt_debug_toasts: bool,
}

/// Everything the engine talks to.
#[derive(Clone)]
pub struct EngineContext {
    /// Feature flags.
    pub flags: FlagsRepository,
    /// Saved presets.
    pub presets: Arc<dyn PresetStore>,
    /// Selected peripheral.
    pub peripherals: Arc<dyn PeripheralStore>,
    /// Privileged access point control.
    pub channel: Arc<dyn ActuationChannel>,
}

/// Owner of the draft configuration.
pub struct ConfigEngine {
    ctx: EngineContext,
    draft: AccessPointConfiguration,
    results: UpdateResults,
    flags: SessionFlags,
    capabilities: Capabilities,
}

impl std::fmt::Debug for ConfigEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigEngine")
            .field("draft", &self.draft)
            .field("results", &self.results)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl ConfigEngine {
    /// Start an editing session from the committed configuration and the
    /// persisted flags.
    ///
    /// # Errors
    ///
    /// Fails if the channel cannot report its configuration or the flag
    /// store cannot be read.
    pub async fn load(ctx: EngineContext) -> Result<Self> {
        let draft = ctx.channel.current_configuration().await?;
        let capabilities = ctx.channel.capabilities().await?;
        let flags = SessionFlags {
            insecure_receiver_enabled: ctx.flags.is_insecure_receiver_enabled().await?,
            auto_enable_on_bt: ctx.flags.is_auto_enable_on_bt_enabled().await?,
            auto_enable_on_bt_debug_toasts: ctx
                .flags
                .is_auto_enable_on_bt_debug_toasts_enabled()
                .await?,
        };

        Ok(Self {
            ctx,
            draft,
            results: UpdateResults::default(),
            flags,
            capabilities,
        })
    }

    /// The draft being edited.
    #[must_use]
    pub const fn draft(&self) -> &AccessPointConfiguration {
        &self.draft
    }

    /// Validation state of the draft.
    #[must_use]
    pub const fn results(&self) -> &UpdateResults {
        &self.results
    }

    /// Flags as edited in this session.
    #[must_use]
    pub const fn session_flags(&self) -> SessionFlags {
        self.flags
    }

    /// Driver capabilities captured when the session started.
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Whether the draft may be committed or saved as a preset.
    #[must_use]
    pub fn can_commit(&self) -> bool {
        self.results.is_all_success()
    }

    /// Replace the draft with an edited copy.
    fn edit(&mut self, change: impl FnOnce(&mut AccessPointConfiguration)) {
        let mut next = self.draft.clone();
        change(&mut next);
        self.draft = next;
    }

    // =========================================================================
    // FIELD UPDATES
    // =========================================================================

    /// Set the SSID. Invalid values are kept so they can be corrected.
    pub fn update_ssid(&mut self, ssid: impl Into<String>) {
        let ssid = ssid.into();
        self.results.ssid_result = validate_ssid(&ssid);
        self.edit(|draft| draft.ssid = ssid);
    }

    /// Set the passphrase, validated against the current security type.
    pub fn update_passphrase(&mut self, passphrase: impl Into<String>) {
        let passphrase = passphrase.into();
        self.results.passphrase_result =
            validate_passphrase(&passphrase, self.draft.security_type);
        self.edit(|draft| draft.passphrase = passphrase);
    }

    /// Set the security type. Leaving WPA3-SAE while on 6 GHz moves the band
    /// to 5 GHz.
    pub fn update_security_type(&mut self, security_type: SecurityType) {
        let switch_back_to_5ghz =
            security_type != SecurityType::Wpa3Sae && self.draft.band == Band::Band6Ghz;
        if switch_back_to_5ghz {
            debug!(?security_type, "6 GHz requires WPA3-SAE, moving band to 5 GHz");
        }
        self.edit(|draft| {
            draft.security_type = security_type;
            if switch_back_to_5ghz {
                draft.band = Band::Band5Ghz;
            }
        });
    }

    /// Set the band. Selecting 6 GHz moves the security type to WPA3-SAE.
    pub fn update_band(&mut self, band: Band) {
        let switch_to_sae =
            band == Band::Band6Ghz && self.draft.security_type != SecurityType::Wpa3Sae;
        if switch_to_sae {
            debug!("6 GHz selected, moving security type to WPA3-SAE");
        }
        self.edit(|draft| {
            draft.band = band;
            if switch_to_sae {
                draft.security_type = SecurityType::Wpa3Sae;
            }
        });
    }

    /// Hide or broadcast the SSID.
    pub fn update_hidden(&mut self, is_hidden: bool) {
        self.edit(|draft| draft.is_hidden = is_hidden);
    }

    /// Set the client limit. `None` means "whatever the driver supports".
    pub fn update_max_client_limit(&mut self, max_clients: Option<u32>) {
        let limit = if let Some(n) = max_clients {
            self.results.max_client_limit_empty = false;
            n
        } else {
            self.results.max_client_limit_empty = true;
            self.capabilities.max_supported_clients
        };
        self.edit(|draft| draft.max_client_limit = limit);
    }

    /// Set the BSSID randomization policy.
    pub fn update_mac_randomization(&mut self, setting: MacRandomization) {
        self.edit(|draft| draft.mac_randomization = setting);
    }

    /// Enable or disable idle shutdown.
    pub fn update_auto_shutdown(&mut self, enabled: bool) {
        self.edit(|draft| draft.auto_shutdown_enabled = enabled);
    }

    /// Set the idle shutdown timeout in milliseconds.
    pub fn update_auto_shutdown_timeout(&mut self, timeout_ms: u64) {
        self.edit(|draft| draft.auto_shutdown_timeout_ms = timeout_ms);
    }

    /// Replace the block list.
    pub fn update_blocked_devices(&mut self, devices: BTreeSet<MacAddress>) {
        self.edit(|draft| draft.blocked_devices = devices);
    }

    /// Replace the allow list.
    pub fn update_allowed_clients(&mut self, clients: BTreeSet<MacAddress>) {
        self.edit(|draft| draft.allowed_clients = clients);
    }

    // =========================================================================
    // SESSION FLAGS
    // =========================================================================

    /// Stage [`crate::ConfigFlag::InsecureReceiverEnabled`] for the next commit.
    pub fn set_insecure_receiver_enabled(&mut self, enabled: bool) {
        self.flags.insecure_receiver_enabled = enabled;
    }

    /// Stage [`crate::ConfigFlag::AutoEnableOnBt`] for the next commit.
    pub fn set_auto_enable_on_bt(&mut self, enabled: bool) {
        self.flags.auto_enable_on_bt = enabled;
    }

    /// Stage [`crate::ConfigFlag::AutoEnableOnBtDebugToasts`] for the next commit.
    pub fn set_auto_enable_on_bt_debug_toasts(&mut self, enabled: bool) {
        self.flags.auto_enable_on_bt_debug_toasts = enabled;
    }

    // =========================================================================
    // COMMIT & RELOAD
    // =========================================================================

    /// Push the draft and the session flags out.
    ///
    /// Returns `Ok(false)` without touching anything if a field is invalid.
    /// An empty draft passphrase is replaced by the committed one first, so
    /// clearing the field never silently commits an empty key. The draft
    /// only takes the substituted passphrase once the apply succeeded.
    ///
    /// # Errors
    ///
    /// Flag store failures, [`HotspotError::ChannelUnavailable`], or
    /// [`HotspotError::ConfigurationRejected`] if the access point refused
    /// the configuration.
    #[instrument(skip(self), fields(ssid = %self.draft.ssid))]
    pub async fn commit(&mut self) -> Result<bool> {
        if !self.can_commit() {
            debug!(results = ?self.results, "Commit refused, draft has invalid fields");
            return Ok(false);
        }

        let mut candidate = self.draft.clone();
        if candidate.passphrase.is_empty() {
            candidate.passphrase = self.ctx.channel.current_configuration().await?.passphrase;
        }

        let flags = self.flags;
        self.ctx
            .flags
            .set_insecure_receiver_status(flags.insecure_receiver_enabled)
            .await?;
        self.ctx
            .flags
            .set_auto_enable_on_bt_status(flags.auto_enable_on_bt)
            .await?;
        self.ctx
            .flags
            .set_auto_enable_on_bt_debug_toasts_status(flags.auto_enable_on_bt_debug_toasts)
            .await?;

        if !self.ctx.channel.apply_configuration(&candidate).await? {
            return Err(HotspotError::ConfigurationRejected);
        }

        self.draft = candidate;
        info!("Configuration committed");
        Ok(true)
    }

    /// Replace the draft with the committed configuration if they differ.
    /// Returns whether the draft changed.
    ///
    /// Validation results are cleared either way, since the committed
    /// configuration is what the draft now holds.
    pub async fn reload_from_committed(&mut self) -> Result<bool> {
        let committed = self.ctx.channel.current_configuration().await?;
        self.capabilities = self.ctx.channel.capabilities().await?;
        self.results = UpdateResults::default();
        if committed == self.draft {
            return Ok(false);
        }
        self.draft = committed;
        Ok(true)
    }

    // =========================================================================
    // PRESETS
    // =========================================================================

    /// Save the draft as a preset. Returns `None` if a field is invalid.
    /// Does not commit.
    pub async fn save_preset(&self, name: impl Into<String>) -> Result<Option<Preset>> {
        if !self.can_commit() {
            return Ok(None);
        }
        let preset = Preset::new(name, self.draft.clone());
        self.ctx.presets.insert(preset.clone()).await?;
        info!(preset = %preset.id, name = %preset.name, "Preset saved");
        Ok(Some(preset))
    }

    /// Load a preset into the draft, re-validating its SSID and passphrase.
    /// Does not commit.
    pub fn apply_preset(&mut self, preset: &Preset) {
        let cfg = &preset.configuration;
        self.results = UpdateResults {
            ssid_result: validate_ssid(&cfg.ssid),
            passphrase_result: validate_passphrase(&cfg.passphrase, cfg.security_type),
            max_client_limit_empty: false,
        };
        self.draft = cfg.clone();
    }

    /// Delete a preset.
    pub async fn delete_preset(&self, id: Uuid) -> Result<()> {
        self.ctx.presets.delete(id).await
    }

    /// Saved presets, most recent first.
    pub async fn presets(&self) -> Result<Vec<Preset>> {
        self.ctx.presets.list().await
    }

    // =========================================================================
    // PERIPHERAL SELECTION
    // =========================================================================

    /// Choose the peripheral that drives the automation. Takes effect
    /// immediately, independent of commit.
    pub async fn select_peripheral(
        &self,
        mac_address: MacAddress,
        display_name: impl Into<String>,
    ) -> Result<SelectedPeripheral> {
        let peripheral = SelectedPeripheral {
            mac_address,
            display_name: display_name.into(),
        };
        self.ctx.peripherals.set_selected(peripheral.clone()).await?;
        info!(device = %peripheral.mac_address, "Peripheral selected");
        Ok(peripheral)
    }

    /// The selected peripheral, if any.
    pub async fn selected_peripheral(&self) -> Result<Option<SelectedPeripheral>> {
        self.ctx.peripherals.selected().await
    }
}
