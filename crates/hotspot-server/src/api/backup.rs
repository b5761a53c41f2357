//! Backup export/import API endpoints.
//!
//! Transfers run inside the request. Only one runs at a time; a second
//! request gets 409 while the first is in flight. Paths are resolved
//! against `storage.backup_dir` and anything that lands outside it is
//! refused with 400.

use std::path::PathBuf;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use hotspot_core::BackupStatus;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::ApiResult;
use crate::state::SharedState;

/// Creates the backup router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_status))
        .route("/export", post(export))
        .route("/import", post(import))
}

/// Where to export to or import from, inside the backup directory.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({ "path": "hotspot.json" }))]
pub struct TransferRequest {
    /// File name relative to the backup directory.
    #[schema(value_type = String)]
    pub path: PathBuf,
}

/// Outcome of a finished transfer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransferResponse {
    /// The file that was written or read.
    #[schema(value_type = String)]
    pub path: PathBuf,
    /// Status of both directions after the transfer.
    pub status: BackupStatus,
}

/// Transfer status.
#[utoipa::path(
    get,
    path = "/backup",
    tag = "backup",
    operation_id = "getBackupStatus",
    summary = "Get export and import status",
    responses(
        (status = 200, description = "Status of both directions", body = BackupStatus)
    )
)]
pub async fn get_status(State(state): State<SharedState>) -> Json<BackupStatus> {
    Json(state.read().await.backup.status())
}

/// Export the persisted store.
#[utoipa::path(
    post,
    path = "/backup/export",
    tag = "backup",
    operation_id = "exportBackup",
    summary = "Export flags, presets and peripheral selection",
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Exported", body = TransferResponse),
        (status = 400, description = "Path outside the backup directory", body = crate::api::ErrorResponse),
        (status = 409, description = "Another transfer is running", body = crate::api::ErrorResponse),
        (status = 500, description = "Write failed", body = crate::api::ErrorResponse)
    )
)]
pub async fn export(
    State(state): State<SharedState>,
    Json(request): Json<TransferRequest>,
) -> ApiResult<Json<TransferResponse>> {
    let backup = state.read().await.backup.clone();
    let path = backup.export(&request.path).await?;
    Ok(Json(TransferResponse {
        path,
        status: backup.status(),
    }))
}

/// Replace the persisted store with a backup.
#[utoipa::path(
    post,
    path = "/backup/import",
    tag = "backup",
    operation_id = "importBackup",
    summary = "Import flags, presets and peripheral selection",
    description = "Atomically replaces the persisted store. The draft is not touched.",
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Imported", body = TransferResponse),
        (status = 400, description = "Path outside the backup directory", body = crate::api::ErrorResponse),
        (status = 409, description = "Another transfer is running", body = crate::api::ErrorResponse),
        (status = 500, description = "Backup unreadable", body = crate::api::ErrorResponse)
    )
)]
pub async fn import(
    State(state): State<SharedState>,
    Json(request): Json<TransferRequest>,
) -> ApiResult<Json<TransferResponse>> {
    let backup = state.read().await.backup.clone();
    let path = backup.import(&request.path).await?;
    Ok(Json(TransferResponse {
        path,
        status: backup.status(),
    }))
}
