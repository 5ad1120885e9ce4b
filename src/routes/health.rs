//! Service endpoints, reachable without authentication

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Create the service router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
}

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "StudyVault API is running",
    })
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "StudyVault API",
    })
}
