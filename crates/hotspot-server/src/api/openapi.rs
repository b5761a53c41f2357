//! OpenAPI specification generation for the hotspot API.
//!
//! The document is served at `/api/openapi.json` and written to disk by the
//! `gen-openapi` binary for client generation.

use axum::Json;
use hotspot_core::{
    AccessPointConfiguration, BackupStatus, Band, Capabilities, ChannelState, ConfigFlag,
    MacAddress, MacRandomization, PairedDevice, PassphraseResult, PeripheralAction, Preset,
    SecurityType, SelectedPeripheral, SessionFlags, SsidResult, TransferStatus, UpdateResults,
};
use utoipa::OpenApi;

use super::automation::AutomationStatusResponse;
use super::backup::{TransferRequest, TransferResponse};
use super::config::{CommitResponse, DraftResponse, ReloadResponse, UpdateConfigRequest};
use super::error::ErrorResponse;
use super::flags::FlagsResponse;
use super::health::HealthResponse;
use super::peripheral::{
    InjectEventRequest, InjectEventResponse, PairedDevicesResponse, PeripheralResponse,
    SelectPeripheralRequest,
};
use super::presets::{PresetsResponse, SavePresetRequest};
use crate::supervisor::AutomationState;

/// Serve the OpenAPI specification as JSON.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Returns the OpenAPI specification as pretty-printed JSON.
#[allow(clippy::missing_panics_doc)]
pub fn get_openapi_json() -> String {
    ApiDoc::openapi()
        .to_pretty_json()
        .expect("Failed to serialize OpenAPI spec")
}

/// Main OpenAPI document structure.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "hotspot API",
        version = "0.1.0",
        description = r#"
# hotspot API

Controls a device's Wi-Fi access point ("hotspot").

## Overview

1. **Draft editing**: Change SSID, passphrase, security, band and the rest on a draft.
   Every edit is validated; invalid drafts cannot be committed.
2. **Commit**: Persist session flags and push the draft to the access point through
   the privileged channel.
3. **Presets**: Save the draft under a name and load it back later.
4. **Bluetooth automation**: Start or stop the access point when a selected
   peripheral connects or disconnects.
5. **Backup**: Export and import flags, presets and the peripheral selection.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local hotspot daemon")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "config", description = "Draft editing, commit and reload"),
        (name = "presets", description = "Named snapshots of the draft"),
        (name = "flags", description = "Persisted feature flags and staged session values"),
        (name = "peripheral", description = "Trusted peripheral selection and event injection"),
        (name = "automation", description = "Bluetooth automation service lifecycle"),
        (name = "backup", description = "Export and import of persisted state")
    ),
    paths(
        super::health::health_check,
        super::config::get_draft,
        super::config::update_draft,
        super::config::commit,
        super::config::reload,
        super::presets::list_presets,
        super::presets::save_preset,
        super::presets::apply_preset,
        super::presets::delete_preset,
        super::flags::get_flags,
        super::flags::stage_flags,
        super::peripheral::get_peripheral,
        super::peripheral::select_peripheral,
        super::peripheral::list_paired,
        super::peripheral::inject_event,
        super::automation::get_status,
        super::automation::start,
        super::backup::get_status,
        super::backup::export,
        super::backup::import,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            ChannelState,
            // Configuration
            AccessPointConfiguration,
            SecurityType,
            Band,
            MacRandomization,
            MacAddress,
            Capabilities,
            SsidResult,
            PassphraseResult,
            UpdateResults,
            SessionFlags,
            DraftResponse,
            UpdateConfigRequest,
            CommitResponse,
            ReloadResponse,
            // Presets
            Preset,
            PresetsResponse,
            SavePresetRequest,
            // Flags
            ConfigFlag,
            FlagsResponse,
            // Peripheral
            SelectedPeripheral,
            PeripheralAction,
            PeripheralResponse,
            SelectPeripheralRequest,
            PairedDevice,
            PairedDevicesResponse,
            InjectEventRequest,
            InjectEventResponse,
            // Automation
            AutomationState,
            AutomationStatusResponse,
            // Backup
            TransferStatus,
            BackupStatus,
            TransferRequest,
            TransferResponse,
        )
    )
)]
pub struct ApiDoc;
