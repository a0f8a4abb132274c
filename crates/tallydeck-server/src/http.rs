//! HTTP request handlers
//!
//! Device-facing endpoints are public (the protocol itself authenticates
//! the device); pairing and listing require a forwarded user identity.
//! Auth failures map to the original firmware contract: 404 unknown
//! device, 410 expired challenge, 400 mismatch, 401 bad signature.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tallydeck_auth::{AuthError, VerifyRequest, CHALLENGE_LENGTH, CODE_LENGTH};
use tallydeck_store::DeviceSummary;
use tower_http::cors::CorsLayer;
use tracing::error;
use uuid::Uuid;

use crate::extract::AuthenticatedUser;
use crate::state::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Device authentication (public, called by firmware)
        .route("/api/devices/auth/challenge", post(auth_challenge_handler))
        .route("/api/devices/auth/verify", post(auth_verify_handler))
        // User-facing device management
        .route("/api/devices/pair", post(pair_handler))
        .route("/api/devices", get(list_devices_handler))
        .route(
            "/api/devices/:device_uuid/integrations",
            post(link_integration_handler).get(list_integrations_handler),
        )
        .route(
            "/api/devices/:device_uuid/integrations/:id",
            delete(unlink_integration_handler),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn validation_error(message: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": { "message": message } })),
    )
        .into_response()
}

/// Map auth errors onto the firmware wire contract
fn auth_error_response(err: AuthError) -> Response {
    let status = match &err {
        AuthError::DeviceUnknown => StatusCode::NOT_FOUND,
        AuthError::ChallengeExpired => StatusCode::GONE,
        AuthError::ChallengeMismatch => StatusCode::BAD_REQUEST,
        AuthError::InvalidSignature => StatusCode::UNAUTHORIZED,
        AuthError::Store(e) => {
            error!("Store failure during device auth: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let message = match &err {
        AuthError::Store(_) => "Internal server error".to_string(),
        other => other.to_string(),
    };
    (status, Json(json!({ "error": { "message": message } }))).into_response()
}

// ============================================================================
// Device Authentication Handlers
// ============================================================================

/// Request body for a challenge
#[derive(Debug, Deserialize)]
pub struct ChallengeRequest {
    pub device_uuid: String,
}

/// Issue an authentication challenge for a provisioned device
async fn auth_challenge_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChallengeRequest>,
) -> Response {
    let Ok(uuid) = request.device_uuid.parse::<Uuid>() else {
        return validation_error("Device UUID must be a valid UUID");
    };

    match state.auth.issue_challenge(uuid).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => auth_error_response(err),
    }
}

/// Raw verification body, validated field by field before dispatch
#[derive(Debug, Deserialize)]
pub struct RawVerifyRequest {
    pub device_uuid: String,
    pub challenge: String,
    pub signature: String,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
}

fn is_valid_mac(mac: &str) -> bool {
    let parts: Vec<&str> = mac.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Verify a signed challenge; answers with pairing code and MQTT config
async fn auth_verify_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RawVerifyRequest>,
) -> Response {
    let Ok(device_uuid) = request.device_uuid.parse::<Uuid>() else {
        return validation_error("Device UUID must be a valid UUID");
    };
    if request.challenge.len() != CHALLENGE_LENGTH {
        return validation_error("Challenge must be 64 characters (32 bytes hex)");
    }
    if let Some(mac) = &request.mac_address {
        if !is_valid_mac(mac) {
            return validation_error("MAC address must be in format XX:XX:XX:XX:XX:XX");
        }
    }
    if let Some(ip) = &request.ip_address {
        if ip.parse::<std::net::IpAddr>().is_err() {
            return validation_error("IP address must be a valid address");
        }
    }
    if let Some(fw) = &request.firmware_version {
        if fw.len() > 50 {
            return validation_error("Firmware version must be at most 50 characters");
        }
    }

    let verify = VerifyRequest {
        device_uuid,
        challenge: request.challenge,
        signature: request.signature,
        mac_address: request.mac_address,
        ip_address: request.ip_address,
        firmware_version: request.firmware_version,
    };

    match state.auth.verify_and_pair(verify).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => auth_error_response(err),
    }
}

// ============================================================================
// User-Facing Handlers
// ============================================================================

/// Request body for pairing-code redemption
#[derive(Debug, Deserialize)]
pub struct PairRequest {
    pub pairing_code: String,
}

/// Response after a successful pairing
#[derive(Debug, Serialize)]
pub struct PairedDevice {
    pub id: u64,
    pub uuid: Uuid,
    pub name: Option<String>,
    pub status: String,
}

/// Redeem a pairing code for the authenticated user
async fn pair_handler(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(request): Json<PairRequest>,
) -> Response {
    let code = &request.pairing_code;
    if code.len() != CODE_LENGTH || !code.chars().all(|c| c.is_ascii_digit()) {
        return validation_error("The pairing code must be exactly 6 digits");
    }

    match state.auth.redeem(code, user.user_id).await {
        Ok(Some(device)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "device": PairedDevice {
                    id: device.id,
                    uuid: device.uuid,
                    name: device.name,
                    status: device.status.to_string(),
                },
            })),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "success": false,
                "message": "Invalid or expired pairing code",
            })),
        )
            .into_response(),
        Err(err) => auth_error_response(err),
    }
}

/// List the authenticated user's devices
async fn list_devices_handler(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Json<Vec<DeviceSummary>> {
    let devices = state.devices.list_for_user(user.user_id).await;
    Json(devices.iter().map(DeviceSummary::from).collect())
}

// ============================================================================
// Integration Handlers
// ============================================================================

/// Request body for linking a metric to a device
#[derive(Debug, Deserialize)]
pub struct LinkIntegrationRequest {
    pub metric_type: String,
    pub label: String,
    pub color: String,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

fn default_refresh_interval() -> u64 {
    300
}

/// Whether the device exists and belongs to the user
async fn is_owned(state: &AppState, device_uuid: &Uuid, user_id: u64) -> bool {
    state
        .devices
        .find_by_uuid(device_uuid)
        .await
        .is_some_and(|d| d.user_id == Some(user_id))
}

fn device_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": { "message": "Device not found" } })),
    )
        .into_response()
}

/// Link a metric to one of the user's devices
async fn link_integration_handler(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(device_uuid): Path<Uuid>,
    Json(request): Json<LinkIntegrationRequest>,
) -> Response {
    if request.metric_type.is_empty() || request.label.is_empty() {
        return validation_error("Metric type and label are required");
    }
    if !is_owned(&state, &device_uuid, user.user_id).await {
        return device_not_found();
    }

    let integration = state
        .integrations
        .link(
            device_uuid,
            request.metric_type,
            request.label,
            request.color,
            request.refresh_interval_secs,
        )
        .await;
    (StatusCode::CREATED, Json(integration)).into_response()
}

/// List the integrations linked to one of the user's devices
async fn list_integrations_handler(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(device_uuid): Path<Uuid>,
) -> Response {
    if !is_owned(&state, &device_uuid, user.user_id).await {
        return device_not_found();
    }
    let integrations = state.integrations.list_for_device(&device_uuid).await;
    (StatusCode::OK, Json(integrations)).into_response()
}

/// Unlink an integration from one of the user's devices
async fn unlink_integration_handler(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path((device_uuid, id)): Path<(Uuid, u64)>,
) -> Response {
    if !is_owned(&state, &device_uuid, user.user_id).await {
        return device_not_found();
    }
    match state.integrations.get(id).await {
        Some(integration) if integration.device_uuid == device_uuid => {
            state.integrations.unlink(id).await;
            (StatusCode::OK, Json(json!({ "success": true }))).into_response()
        }
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": { "message": "Integration not found" } })),
        )
            .into_response(),
    }
}
