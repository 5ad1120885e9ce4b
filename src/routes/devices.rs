//! Device registry API routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::models::{self, Device, DeviceCreate, DeviceUpdate, MessageResponse};
use crate::state::AppState;
use crate::store::now_timestamp;

/// Create the devices router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_devices))
        .route("/", post(register_device))
        .route("/:device_id", get(get_device))
        .route("/:device_id", put(update_device))
        .route("/:device_id", delete(deactivate_device))
        .route("/:device_id/sync", post(ping_device))
}

/// All devices for the current user, most recently synced first
async fn list_devices(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Device>>> {
    let devices = state.sync().registry().list(&user.user_id).await?;
    Ok(Json(devices))
}

/// Register a device, or refresh it if the id is already known
async fn register_device(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(data): Json<DeviceCreate>,
) -> Result<(StatusCode, Json<Device>)> {
    let device = state
        .sync()
        .registry()
        .register_or_touch(
            &user.user_id,
            &data.device_id,
            data.device_name.as_deref(),
            data.device_type.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(device)))
}

/// Get a specific device
async fn get_device(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(device_id): Path<String>,
) -> Result<Json<Device>> {
    let device = state
        .sync()
        .registry()
        .get(&user.user_id, &device_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Device not found".to_string()))?;
    Ok(Json(device))
}

/// Update device metadata; counts as contact, so `last_sync` advances too
async fn update_device(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(device_id): Path<String>,
    Json(update): Json<DeviceUpdate>,
) -> Result<Json<Device>> {
    let mut changes = models::to_row(&update)?;
    changes.insert("last_sync".to_string(), Value::String(now_timestamp()));

    let device = state
        .sync()
        .registry()
        .update(&user.user_id, &device_id, changes)
        .await?;
    Ok(Json(device))
}

#[derive(Serialize)]
struct SyncPingResponse {
    message: &'static str,
    last_sync: Option<DateTime<Utc>>,
}

/// Record an explicit sync ping for a device
async fn ping_device(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(device_id): Path<String>,
) -> Result<Json<SyncPingResponse>> {
    let device = state
        .sync()
        .registry()
        .touch(&user.user_id, &device_id)
        .await?;
    Ok(Json(SyncPingResponse {
        message: "Device sync updated",
        last_sync: device.last_sync,
    }))
}

/// Deactivate a device; its row and sync history are kept
async fn deactivate_device(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(device_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    state
        .sync()
        .registry()
        .deactivate(&user.user_id, &device_id)
        .await?;
    Ok(Json(MessageResponse {
        message: "Device deactivated successfully",
    }))
}
