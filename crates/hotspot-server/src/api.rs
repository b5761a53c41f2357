//! HTTP API routes and handlers.
//!
//! Handlers are grouped by domain:
//! - `config` - Draft editing, commit and reload
//! - `presets` - Named snapshots of the draft
//! - `flags` - Persisted flags and staged session values
//! - `peripheral` - Trusted peripheral selection and event injection
//! - `automation` - Automation service lifecycle
//! - `backup` - Export and import of persisted state
//! - `health` - Service health checks
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub mod automation;
pub mod backup;
pub mod config;
pub mod error;
pub mod flags;
pub mod health;
pub mod openapi;
pub mod peripheral;
pub mod presets;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                - Health check
/// /api
/// ├── /config            - Draft, commit, reload
/// ├── /presets           - Save, list, apply, delete presets
/// ├── /flags             - Persisted and staged flags
/// ├── /peripheral        - Trusted peripheral and event injection
/// ├── /automation        - Automation service status and start
/// ├── /backup            - Export and import
/// └── /openapi.json      - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .route("/openapi.json", get(openapi::get_openapi_spec))
                .nest("/config", config::router())
                .nest("/presets", presets::router())
                .nest("/flags", flags::router())
                .nest("/peripheral", peripheral::router())
                .nest("/automation", automation::router())
                .nest("/backup", backup::router()),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use hotspot_core::testing::{
        ChannelCall, MemoryFlagStore, MemoryPeripheralStore, MemoryPresetStore, MockChannel,
        RecordingNotices, StaticPairedDevices,
    };
    use hotspot_core::{JsonStore, PairedDevice, PairedDeviceSource};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::state::{AppState, Collaborators};

    fn paired_devices() -> Arc<dyn PairedDeviceSource> {
        Arc::new(StaticPairedDevices::new(vec![
            PairedDevice::new("AA:BB:CC:DD:EE:FF".parse().unwrap(), Some("Car".into())),
            PairedDevice::new("01:02:03:04:05:06".parse().unwrap(), None),
        ]))
    }

    async fn test_router() -> (Router, Arc<MockChannel>, tempfile::TempDir) {
        router_with_paired(Some(paired_devices())).await
    }

    async fn router_with_paired(
        paired: Option<Arc<dyn PairedDeviceSource>>,
    ) -> (Router, Arc<MockChannel>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let channel = Arc::new(MockChannel::default());
        let collaborators = Collaborators {
            flags: Arc::new(MemoryFlagStore::default()),
            presets: Arc::new(MemoryPresetStore::default()),
            peripherals: Arc::new(MemoryPeripheralStore::default()),
            backup: Arc::new(JsonStore::open(dir.path()).await.unwrap()),
            backup_dir: dir.path().join("backups"),
            channel: channel.clone(),
            notices: Arc::new(RecordingNotices::default()),
            paired,
        };
        let state = AppState::with_collaborators(collaborators).await.unwrap();
        (create_router(state.shared()), channel, dir)
    }

    async fn send(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health_reports_channel() {
        let (router, _, _dir) = test_router().await;
        let (status, body) = send(&router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["channel"], "CONNECTED");
    }

    #[tokio::test]
    async fn test_selecting_6ghz_switches_security() {
        let (router, _, _dir) = test_router().await;
        let (status, body) = send(
            &router,
            Method::PUT,
            "/api/config",
            Some(json!({ "band": "BAND_6GHZ" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["configuration"]["band"], "BAND_6GHZ");
        assert_eq!(body["configuration"]["security_type"], "WPA3_SAE");
    }

    #[tokio::test]
    async fn test_commit_refused_for_short_passphrase() {
        let (router, channel, _dir) = test_router().await;
        let (_, draft) = send(
            &router,
            Method::PUT,
            "/api/config",
            Some(json!({ "passphrase": "short" })),
        )
        .await;
        assert_eq!(draft["results"]["passphrase_result"], "too_short");
        assert_eq!(draft["can_commit"], false);

        let (status, body) = send(&router, Method::POST, "/api/config/commit", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "DRAFT_INVALID");
        assert!(channel.calls().is_empty());
    }

    #[tokio::test]
    async fn test_commit_applies_draft() {
        let (router, channel, _dir) = test_router().await;
        send(
            &router,
            Method::PUT,
            "/api/config",
            Some(json!({ "ssid": "garage", "passphrase": "correct horse" })),
        )
        .await;

        let (status, body) = send(&router, Method::POST, "/api/config/commit", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["committed"], true);
        assert!(channel
            .calls()
            .iter()
            .any(|call| matches!(call, ChannelCall::Apply(cfg) if cfg.ssid == "garage")));
    }

    #[tokio::test]
    async fn test_commit_rejected_by_access_point() {
        let (router, channel, _dir) = test_router().await;
        channel.set_reject_configurations(true);
        send(
            &router,
            Method::PUT,
            "/api/config",
            Some(json!({ "passphrase": "correct horse" })),
        )
        .await;

        let (status, body) = send(&router, Method::POST, "/api/config/commit", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "CONFIGURATION_REJECTED");
    }

    #[tokio::test]
    async fn test_preset_lifecycle() {
        let (router, _, _dir) = test_router().await;
        send(
            &router,
            Method::PUT,
            "/api/config",
            Some(json!({ "ssid": "travel", "passphrase": "correct horse" })),
        )
        .await;

        let (status, preset) = send(
            &router,
            Method::POST,
            "/api/presets",
            Some(json!({ "name": "Travel" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = preset["id"].as_str().unwrap().to_string();

        send(&router, Method::PUT, "/api/config", Some(json!({ "ssid": "home" }))).await;
        let (status, draft) =
            send(&router, Method::POST, &format!("/api/presets/{id}/apply"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(draft["configuration"]["ssid"], "travel");

        let (status, _) = send(&router, Method::DELETE, &format!("/api/presets/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, list) = send(&router, Method::GET, "/api/presets", None).await;
        assert_eq!(list["presets"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_save_preset_rejects_empty_name() {
        let (router, _, _dir) = test_router().await;
        let (status, body) = send(
            &router,
            Method::POST,
            "/api/presets",
            Some(json!({ "name": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "EMPTY_PRESET_NAME");
    }

    #[tokio::test]
    async fn test_unknown_preset_is_not_found() {
        let (router, _, _dir) = test_router().await;
        let id = uuid::Uuid::new_v4();
        let (status, body) =
            send(&router, Method::POST, &format!("/api/presets/{id}/apply"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "PRESET_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_flags_are_staged_until_commit() {
        let (router, _, _dir) = test_router().await;
        let (status, _) = send(
            &router,
            Method::PUT,
            "/api/flags",
            Some(json!({
                "insecure_receiver_enabled": false,
                "auto_enable_on_bt": true,
                "auto_enable_on_bt_debug_toasts": false
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, flags) = send(&router, Method::GET, "/api/flags", None).await;
        assert_eq!(flags["session"]["auto_enable_on_bt"], true);
        assert_ne!(flags["persisted"]["AUTO_ENABLE_ON_BT"], true);
    }

    #[tokio::test]
    async fn test_select_peripheral_validates_mac() {
        let (router, _, _dir) = test_router().await;
        let (status, body) = send(
            &router,
            Method::PUT,
            "/api/peripheral",
            Some(json!({ "mac_address": "not-a-mac", "display_name": "Car" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_MAC_ADDRESS");

        let (status, _) = send(
            &router,
            Method::PUT,
            "/api/peripheral",
            Some(json!({ "mac_address": "AA:BB:CC:DD:EE:FF", "display_name": "Car" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&router, Method::GET, "/api/peripheral", None).await;
        assert_eq!(body["selected"]["display_name"], "Car");
    }

    #[tokio::test]
    async fn test_injected_event_without_listeners() {
        let (router, _, _dir) = test_router().await;
        let (status, body) = send(
            &router,
            Method::POST,
            "/api/peripheral/events",
            Some(json!({ "mac_address": "AA:BB:CC:DD:EE:FF", "action": "connected" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["delivered"], 0);
    }

    #[tokio::test]
    async fn test_automation_start_is_accepted() {
        let (router, _, _dir) = test_router().await;
        let (status, _) = send(&router, Method::POST, "/api/automation/start", None).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let (status, body) = send(&router, Method::GET, "/api/automation", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["listeners"], 0);
    }

    #[tokio::test]
    async fn test_backup_export_then_import() {
        let (router, _, dir) = test_router().await;
        let target = dir.path().join("backups").join("backup.json");

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/backup/export",
            Some(json!({ "path": "backup.json" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"]["export"], "success");
        assert!(target.exists());

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/backup/import",
            Some(json!({ "path": "backup.json" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"]["import"], "success");
    }

    #[tokio::test]
    async fn test_backup_refuses_paths_outside_backup_dir() {
        let (router, _, dir) = test_router().await;
        for path in ["../state.json", "/etc/passwd"] {
            let (status, body) = send(
                &router,
                Method::POST,
                "/api/backup/export",
                Some(json!({ "path": path })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
            assert_eq!(body["error"], "BACKUP_PATH_REJECTED");
        }
        assert!(!dir.path().join("state.json").exists());

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/backup/import",
            Some(json!({ "path": "/etc/passwd" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "BACKUP_PATH_REJECTED");
    }

    #[tokio::test]
    async fn test_paired_devices_listed() {
        let (router, _, _dir) = test_router().await;
        let (status, body) = send(&router, Method::GET, "/api/peripheral/paired", None).await;
        assert_eq!(status, StatusCode::OK);
        let devices = body["devices"].as_array().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0]["name"], "01:02:03:04:05:06");
        assert_eq!(devices[1]["mac_address"], "AA:BB:CC:DD:EE:FF");
    }

    #[tokio::test]
    async fn test_paired_devices_need_bluetooth() {
        let (router, _, _dir) = router_with_paired(None).await;
        let (status, body) = send(&router, Method::GET, "/api/peripheral/paired", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "BLUETOOTH_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_openapi_served() {
        let (router, _, _dir) = test_router().await;
        let (status, body) = send(&router, Method::GET, "/api/openapi.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["info"]["title"], "hotspot API");
    }
}
