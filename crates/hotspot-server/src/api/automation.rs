//! Automation service API endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::SharedState;
use crate::supervisor::AutomationState;

/// Creates the automation router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_status))
        .route("/start", post(start))
}

/// Automation service status.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "state": "monitoring",
    "listeners": 1,
    "ready_signals": 2
}))]
pub struct AutomationStatusResponse {
    /// Lifecycle state.
    pub state: AutomationState,
    /// Registered connectivity listeners.
    pub listeners: usize,
    /// How many times the service has started.
    pub ready_signals: u64,
}

/// Automation status.
#[utoipa::path(
    get,
    path = "/automation",
    tag = "automation",
    operation_id = "getAutomationStatus",
    summary = "Get automation service status",
    responses(
        (status = 200, description = "Status", body = AutomationStatusResponse)
    )
)]
pub async fn get_status(State(state): State<SharedState>) -> Json<AutomationStatusResponse> {
    let guard = state.read().await;
    Json(AutomationStatusResponse {
        state: guard.automation.state(),
        listeners: guard.hub.listener_count(),
        ready_signals: guard.automation.ready_signals(),
    })
}

/// Start or restart the service.
#[utoipa::path(
    post,
    path = "/automation/start",
    tag = "automation",
    operation_id = "startAutomation",
    summary = "Start or restart the automation service",
    description = "The service stops itself again if automation is disabled in the \
        persisted flags.",
    responses(
        (status = 202, description = "Start requested")
    )
)]
pub async fn start(State(state): State<SharedState>) -> StatusCode {
    state.read().await.automation.request_start();
    StatusCode::ACCEPTED
}
