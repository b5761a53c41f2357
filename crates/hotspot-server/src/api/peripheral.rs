//! Peripheral selection, paired device listing and connectivity event
//! injection.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use hotspot_core::{
    HotspotError, MacAddress, PairedDevice, PeripheralAction, PeripheralEvent, SelectedPeripheral,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the peripheral router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_peripheral).put(select_peripheral))
        .route("/paired", get(list_paired))
        .route("/events", post(inject_event))
}

/// The current selection.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PeripheralResponse {
    /// `null` when nothing is selected.
    #[schema(nullable)]
    pub selected: Option<SelectedPeripheral>,
}

/// Request to select a peripheral.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "mac_address": "AA:BB:CC:DD:EE:FF",
    "display_name": "Car stereo"
}))]
pub struct SelectPeripheralRequest {
    /// Bluetooth address (XX:XX:XX:XX:XX:XX).
    pub mac_address: String,
    /// Name shown to the user.
    pub display_name: String,
}

/// Devices a peripheral can be selected from.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PairedDevicesResponse {
    /// Sorted by name.
    pub devices: Vec<PairedDevice>,
}

/// A connectivity event to feed to the automation.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "mac_address": "AA:BB:CC:DD:EE:FF",
    "action": "connected"
}))]
pub struct InjectEventRequest {
    /// Device the event is about.
    pub mac_address: String,
    /// Link change.
    pub action: PeripheralAction,
}

/// Result of an injected event.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InjectEventResponse {
    /// Listeners that received the event. Zero when automation is stopped.
    pub delivered: usize,
}

fn parse_mac(raw: &str) -> ApiResult<MacAddress> {
    raw.parse().map_err(|e: HotspotError| ApiError::BadRequest {
        error_code: e.error_code().to_string(),
        message: e.to_string(),
    })
}

/// Get the selected peripheral.
#[utoipa::path(
    get,
    path = "/peripheral",
    tag = "peripheral",
    operation_id = "getPeripheral",
    summary = "Get the selected peripheral",
    responses(
        (status = 200, description = "Selection", body = PeripheralResponse)
    )
)]
pub async fn get_peripheral(
    State(state): State<SharedState>,
) -> ApiResult<Json<PeripheralResponse>> {
    let guard = state.read().await;
    Ok(Json(PeripheralResponse {
        selected: guard.engine.selected_peripheral().await?,
    }))
}

/// Select the peripheral that drives the automation.
#[utoipa::path(
    put,
    path = "/peripheral",
    tag = "peripheral",
    operation_id = "selectPeripheral",
    summary = "Select the trusted peripheral",
    description = "Takes effect immediately; it is not part of the draft.",
    request_body = SelectPeripheralRequest,
    responses(
        (status = 200, description = "Selection stored", body = SelectedPeripheral),
        (status = 400, description = "Invalid MAC address", body = crate::api::ErrorResponse)
    )
)]
pub async fn select_peripheral(
    State(state): State<SharedState>,
    Json(request): Json<SelectPeripheralRequest>,
) -> ApiResult<Json<SelectedPeripheral>> {
    let mac = parse_mac(&request.mac_address)?;
    let guard = state.read().await;
    let selected = guard
        .engine
        .select_peripheral(mac, request.display_name)
        .await?;
    Ok(Json(selected))
}

/// List paired devices.
#[utoipa::path(
    get,
    path = "/peripheral/paired",
    tag = "peripheral",
    operation_id = "listPairedDevices",
    summary = "List paired Bluetooth devices",
    description = "The candidates for `PUT /peripheral`. Requires a build with Bluetooth support.",
    responses(
        (status = 200, description = "Paired devices", body = PairedDevicesResponse),
        (status = 503, description = "Bluetooth unavailable", body = crate::api::ErrorResponse)
    )
)]
pub async fn list_paired(
    State(state): State<SharedState>,
) -> ApiResult<Json<PairedDevicesResponse>> {
    let source = state.read().await.paired.clone().ok_or_else(|| {
        HotspotError::BluetoothUnavailable("built without Bluetooth support".into())
    })?;
    let devices = source.paired_devices().await?;
    Ok(Json(PairedDevicesResponse { devices }))
}

/// Inject a connectivity event.
#[utoipa::path(
    post,
    path = "/peripheral/events",
    tag = "peripheral",
    operation_id = "injectPeripheralEvent",
    summary = "Inject a connectivity event",
    description = "Publishes the event to the automation service as if the Bluetooth \
        stack had reported it. Useful where BlueZ is not available.",
    request_body = InjectEventRequest,
    responses(
        (status = 200, description = "Event published", body = InjectEventResponse),
        (status = 400, description = "Invalid MAC address", body = crate::api::ErrorResponse)
    )
)]
pub async fn inject_event(
    State(state): State<SharedState>,
    Json(request): Json<InjectEventRequest>,
) -> ApiResult<Json<InjectEventResponse>> {
    let event = PeripheralEvent::new(request.action, parse_mac(&request.mac_address)?);
    let hub = state.read().await.hub.clone();
    let delivered = hub.publish(&event);
    debug!(%event, delivered, "Injected connectivity event");
    Ok(Json(InjectEventResponse { delivered }))
}
