//! Sync API routes
//!
//! Thin HTTP shims over [`SyncEngine`]: pull (body-driven), push (table and
//! device in the query string, record batch in the body), and status.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::state::AppState;
use crate::store::Row;
use crate::sync::{PullRequest, PullResponse, PushParams, PushResponse, StatusParams, StatusResponse};

/// Create the sync router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pull", post(pull_changes))
        .route("/push", post(push_changes))
        .route("/status", get(sync_status))
}

/// Download rows changed since the device's watermark
async fn pull_changes(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<PullRequest>,
) -> Result<Json<PullResponse>> {
    let response = state.sync().pull(&user.user_id, &request).await?;
    Ok(Json(response))
}

/// Upload a batch of local edits for one table
async fn push_changes(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<PushParams>,
    Json(records): Json<Vec<Row>>,
) -> Result<Json<PushResponse>> {
    let response = state
        .sync()
        .push(&user.user_id, &params.device_id, &params.table_name, records)
        .await?;
    Ok(Json(response))
}

/// Registry entry and recent sync history for one device
async fn sync_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<StatusParams>,
) -> Result<Json<StatusResponse>> {
    let response = state.sync().status(&user.user_id, &params.device_id).await?;
    Ok(Json(response))
}
