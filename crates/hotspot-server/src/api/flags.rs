//! Feature flag API endpoints.
//!
//! `GET` shows what is persisted. `PUT` only stages values in the editing
//! session; they are written by `POST /config/commit`.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use hotspot_core::{ConfigFlag, SessionFlags};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::ApiResult;
use crate::state::SharedState;

/// Creates the flags router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(get_flags).put(stage_flags))
}

/// Persisted and staged flags.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "persisted": { "NOT_FIRST_RUN": true, "AUTO_ENABLE_ON_BT": false },
    "session": {
        "insecure_receiver_enabled": false,
        "auto_enable_on_bt": true,
        "auto_enable_on_bt_debug_toasts": false
    }
}))]
pub struct FlagsResponse {
    /// Every known flag that has been written.
    #[schema(value_type = Object)]
    pub persisted: BTreeMap<ConfigFlag, bool>,

    /// Values that the next commit will write.
    pub session: SessionFlags,
}

/// Show flags.
#[utoipa::path(
    get,
    path = "/flags",
    tag = "flags",
    operation_id = "getFlags",
    summary = "Show persisted and staged flags",
    responses(
        (status = 200, description = "Flags", body = FlagsResponse)
    )
)]
pub async fn get_flags(State(state): State<SharedState>) -> ApiResult<Json<FlagsResponse>> {
    let guard = state.read().await;
    Ok(Json(FlagsResponse {
        persisted: guard.flags.dump().await?,
        session: guard.engine.session_flags(),
    }))
}

/// Stage flags for the next commit.
#[utoipa::path(
    put,
    path = "/flags",
    tag = "flags",
    operation_id = "stageFlags",
    summary = "Stage flags for the next commit",
    request_body = SessionFlags,
    responses(
        (status = 200, description = "Flags staged", body = SessionFlags)
    )
)]
pub async fn stage_flags(
    State(state): State<SharedState>,
    Json(flags): Json<SessionFlags>,
) -> Json<SessionFlags> {
    let mut guard = state.write().await;
    guard
        .engine
        .set_insecure_receiver_enabled(flags.insecure_receiver_enabled);
    guard.engine.set_auto_enable_on_bt(flags.auto_enable_on_bt);
    guard
        .engine
        .set_auto_enable_on_bt_debug_toasts(flags.auto_enable_on_bt_debug_toasts);
    Json(guard.engine.session_flags())
}
