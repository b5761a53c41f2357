//! Access point configuration API endpoints.
//!
//! The draft lives in the daemon between requests. Edits go through `PUT`,
//! nothing reaches the access point until `POST /commit`.

use std::collections::BTreeSet;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use hotspot_core::{
    AccessPointConfiguration, Band, Capabilities, ConfigEngine, MacAddress, MacRandomization,
    SecurityType, SessionFlags, UpdateResults,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the config router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_draft).put(update_draft))
        .route("/commit", post(commit))
        .route("/reload", post(reload))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// The draft and everything needed to edit it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DraftResponse {
    /// Draft configuration, possibly invalid.
    pub configuration: AccessPointConfiguration,

    /// Per-field validation state.
    pub results: UpdateResults,

    /// Whether `POST /config/commit` would be accepted.
    pub can_commit: bool,

    /// Flags that will be written on commit.
    pub session_flags: SessionFlags,

    /// Radio capabilities.
    pub capabilities: Capabilities,
}

impl DraftResponse {
    /// Snapshot the engine.
    pub fn from_engine(engine: &ConfigEngine) -> Self {
        Self {
            configuration: engine.draft().clone(),
            results: *engine.results(),
            can_commit: engine.can_commit(),
            session_flags: engine.session_flags(),
            capabilities: engine.capabilities(),
        }
    }
}

/// Partial update of the draft. Absent fields are left alone.
///
/// Fields are applied in this order: `ssid`, `security_type`, `band`,
/// `passphrase`, then the rest. The passphrase is therefore validated
/// against the security type after this request's own coercions.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[schema(example = json!({
    "ssid": "garage",
    "security_type": "WPA3_SAE",
    "band": "BAND_6GHZ",
    "passphrase": "correct horse battery"
}))]
pub struct UpdateConfigRequest {
    /// Network name.
    pub ssid: Option<String>,
    /// Security mode.
    pub security_type: Option<SecurityType>,
    /// Radio band. 6 GHz forces WPA3-SAE.
    pub band: Option<Band>,
    /// Pre-shared key.
    pub passphrase: Option<String>,
    /// Hide the SSID.
    pub is_hidden: Option<bool>,
    /// Client limit.
    pub max_client_limit: Option<u32>,
    /// Clear the client limit and use the radio's maximum.
    pub use_max_supported_clients: Option<bool>,
    /// BSSID randomization.
    pub mac_randomization: Option<MacRandomization>,
    /// Idle shutdown.
    pub auto_shutdown_enabled: Option<bool>,
    /// Idle shutdown timeout in milliseconds.
    pub auto_shutdown_timeout_ms: Option<u64>,
    /// Replace the block list.
    #[schema(value_type = Option<Vec<String>>)]
    pub blocked_devices: Option<BTreeSet<MacAddress>>,
    /// Replace the allow list.
    #[schema(value_type = Option<Vec<String>>)]
    pub allowed_clients: Option<BTreeSet<MacAddress>>,
}

/// Result of a commit.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommitResponse {
    /// Always `true`; a refused commit is a 409.
    pub committed: bool,
    /// The draft after commit.
    pub draft: DraftResponse,
}

/// Result of a reload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReloadResponse {
    /// Whether the draft differed from the committed configuration.
    pub changed: bool,
    /// The draft after reload.
    pub draft: DraftResponse,
}

// ============================================================================
// Handlers
// ============================================================================

/// Apply `request` to the engine in the documented order.
fn apply_update(engine: &mut ConfigEngine, request: UpdateConfigRequest) {
    if let Some(ssid) = request.ssid {
        engine.update_ssid(ssid);
    }
    if let Some(security_type) = request.security_type {
        engine.update_security_type(security_type);
    }
    if let Some(band) = request.band {
        engine.update_band(band);
    }
    if let Some(passphrase) = request.passphrase {
        engine.update_passphrase(passphrase);
    }
    if let Some(is_hidden) = request.is_hidden {
        engine.update_hidden(is_hidden);
    }
    if request.use_max_supported_clients == Some(true) {
        engine.update_max_client_limit(None);
    } else if let Some(limit) = request.max_client_limit {
        engine.update_max_client_limit(Some(limit));
    }
    if let Some(setting) = request.mac_randomization {
        engine.update_mac_randomization(setting);
    }
    if let Some(enabled) = request.auto_shutdown_enabled {
        engine.update_auto_shutdown(enabled);
    }
    if let Some(timeout) = request.auto_shutdown_timeout_ms {
        engine.update_auto_shutdown_timeout(timeout);
    }
    if let Some(devices) = request.blocked_devices {
        engine.update_blocked_devices(devices);
    }
    if let Some(clients) = request.allowed_clients {
        engine.update_allowed_clients(clients);
    }
}

/// Get the draft.
#[utoipa::path(
    get,
    path = "/config",
    tag = "config",
    operation_id = "getDraft",
    summary = "Get the draft configuration",
    description = "Returns the configuration being edited with its validation state.",
    responses(
        (status = 200, description = "Draft retrieved", body = DraftResponse)
    )
)]
pub async fn get_draft(State(state): State<SharedState>) -> Json<DraftResponse> {
    let guard = state.read().await;
    Json(DraftResponse::from_engine(&guard.engine))
}

/// Edit the draft.
#[utoipa::path(
    put,
    path = "/config",
    tag = "config",
    operation_id = "updateDraft",
    summary = "Edit the draft configuration",
    description = "Applies field edits to the draft. Invalid values are stored and \
        reported in `results`; they only block commit. Selecting 6 GHz switches \
        security to WPA3-SAE, and leaving WPA3-SAE on 6 GHz switches the band to 5 GHz.",
    request_body = UpdateConfigRequest,
    responses(
        (status = 200, description = "Draft updated", body = DraftResponse),
        (status = 422, description = "Malformed request body")
    )
)]
pub async fn update_draft(
    State(state): State<SharedState>,
    Json(request): Json<UpdateConfigRequest>,
) -> Json<DraftResponse> {
    let mut guard = state.write().await;
    apply_update(&mut guard.engine, request);
    Json(DraftResponse::from_engine(&guard.engine))
}

/// Commit the draft.
#[utoipa::path(
    post,
    path = "/config/commit",
    tag = "config",
    operation_id = "commitDraft",
    summary = "Commit the draft",
    description = "Writes the session flags and applies the draft to the access point. \
        An empty passphrase is replaced by the committed one.",
    responses(
        (status = 200, description = "Committed", body = CommitResponse),
        (status = 409, description = "Draft has invalid fields", body = crate::api::ErrorResponse),
        (status = 422, description = "Access point rejected the configuration", body = crate::api::ErrorResponse),
        (status = 503, description = "Privileged channel unavailable", body = crate::api::ErrorResponse)
    )
)]
pub async fn commit(State(state): State<SharedState>) -> ApiResult<Json<CommitResponse>> {
    let mut guard = state.write().await;
    if !guard.engine.commit().await? {
        return Err(ApiError::Conflict {
            error_code: "DRAFT_INVALID".to_string(),
            message: "The draft has invalid fields".to_string(),
            details: serde_json::to_value(guard.engine.results()).ok(),
        });
    }

    if guard.engine.session_flags().auto_enable_on_bt {
        guard.automation.ensure_running();
    }
    info!("Draft committed via API");

    Ok(Json(CommitResponse {
        committed: true,
        draft: DraftResponse::from_engine(&guard.engine),
    }))
}

/// Discard edits by reloading the committed configuration.
#[utoipa::path(
    post,
    path = "/config/reload",
    tag = "config",
    operation_id = "reloadDraft",
    summary = "Reload the committed configuration",
    description = "Replaces the draft with the configuration the access point is running.",
    responses(
        (status = 200, description = "Reloaded", body = ReloadResponse),
        (status = 503, description = "Privileged channel unavailable", body = crate::api::ErrorResponse)
    )
)]
pub async fn reload(State(state): State<SharedState>) -> ApiResult<Json<ReloadResponse>> {
    let mut guard = state.write().await;
    let changed = guard.engine.reload_from_committed().await?;
    Ok(Json(ReloadResponse {
        changed,
        draft: DraftResponse::from_engine(&guard.engine),
    }))
}
