//! Preset API endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use hotspot_core::Preset;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::config::DraftResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the presets router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_presets).post(save_preset))
        .route("/{id}", delete(delete_preset))
        .route("/{id}/apply", post(apply_preset))
}

/// Request to save the draft as a preset.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({ "name": "Travel" }))]
pub struct SavePresetRequest {
    /// Name shown in the list.
    pub name: String,
}

/// All presets.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PresetsResponse {
    /// Most recent first.
    pub presets: Vec<Preset>,
}

/// List presets.
#[utoipa::path(
    get,
    path = "/presets",
    tag = "presets",
    operation_id = "listPresets",
    summary = "List presets",
    responses(
        (status = 200, description = "Presets, most recent first", body = PresetsResponse)
    )
)]
pub async fn list_presets(State(state): State<SharedState>) -> ApiResult<Json<PresetsResponse>> {
    let guard = state.read().await;
    let presets = guard.engine.presets().await?;
    Ok(Json(PresetsResponse { presets }))
}

/// Save the draft as a preset.
#[utoipa::path(
    post,
    path = "/presets",
    tag = "presets",
    operation_id = "savePreset",
    summary = "Save the draft as a preset",
    description = "Snapshots the draft. Refused while any field is invalid. Does not commit.",
    request_body = SavePresetRequest,
    responses(
        (status = 201, description = "Preset saved", body = Preset),
        (status = 400, description = "Empty name", body = crate::api::ErrorResponse),
        (status = 409, description = "Draft has invalid fields", body = crate::api::ErrorResponse)
    )
)]
pub async fn save_preset(
    State(state): State<SharedState>,
    Json(request): Json<SavePresetRequest>,
) -> ApiResult<(StatusCode, Json<Preset>)> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest {
            error_code: "EMPTY_PRESET_NAME".to_string(),
            message: "Preset name must not be empty".to_string(),
        });
    }

    let guard = state.read().await;
    match guard.engine.save_preset(name).await? {
        Some(preset) => Ok((StatusCode::CREATED, Json(preset))),
        None => Err(ApiError::Conflict {
            error_code: "DRAFT_INVALID".to_string(),
            message: "The draft has invalid fields".to_string(),
            details: serde_json::to_value(guard.engine.results()).ok(),
        }),
    }
}

/// Load a preset into the draft.
#[utoipa::path(
    post,
    path = "/presets/{id}/apply",
    tag = "presets",
    operation_id = "applyPreset",
    summary = "Load a preset into the draft",
    description = "Replaces the draft and re-validates its SSID and passphrase. Does not commit.",
    params(("id" = Uuid, Path, description = "Preset id")),
    responses(
        (status = 200, description = "Preset loaded", body = DraftResponse),
        (status = 404, description = "No such preset", body = crate::api::ErrorResponse)
    )
)]
pub async fn apply_preset(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DraftResponse>> {
    let mut guard = state.write().await;
    let preset = guard
        .engine
        .presets()
        .await?
        .into_iter()
        .find(|p| p.id == id)
        .ok_or(hotspot_core::HotspotError::PresetNotFound(id))?;
    guard.engine.apply_preset(&preset);
    Ok(Json(DraftResponse::from_engine(&guard.engine)))
}

/// Delete a preset.
#[utoipa::path(
    delete,
    path = "/presets/{id}",
    tag = "presets",
    operation_id = "deletePreset",
    summary = "Delete a preset",
    params(("id" = Uuid, Path, description = "Preset id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such preset", body = crate::api::ErrorResponse)
    )
)]
pub async fn delete_preset(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let guard = state.read().await;
    guard.engine.delete_preset(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
