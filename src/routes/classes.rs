//! Classes API routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde_json::Value;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::models::{self, Class, ClassCreate, ClassUpdate, MessageResponse};
use crate::state::AppState;
use crate::store::{Filter, Query};

/// Create the classes router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_classes))
        .route("/", post(create_class))
        .route("/:class_id", get(get_class))
        .route("/:class_id", put(update_class))
        .route("/:class_id", delete(delete_class))
}

/// All classes for the current user
async fn list_classes(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Class>>> {
    let rows = state
        .store()
        .select("classes", Query::new().eq("user_id", user.user_id.as_str()))
        .await?;
    let classes = rows.into_iter().map(models::from_row).collect::<Result<_>>()?;
    Ok(Json(classes))
}

/// Create a new class
async fn create_class(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(data): Json<ClassCreate>,
) -> Result<(StatusCode, Json<Class>)> {
    data.validate()?;

    let mut row = models::to_row(&data)?;
    row.insert("user_id".to_string(), Value::String(user.user_id.clone()));

    let stored = state.store().insert("classes", vec![row]).await?;
    let class = stored
        .into_iter()
        .next()
        .map(models::from_row)
        .transpose()?
        .ok_or_else(|| AppError::Internal("insert returned no row".to_string()))?;
    Ok((StatusCode::CREATED, Json(class)))
}

/// Get a specific class
async fn get_class(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(class_id): Path<String>,
) -> Result<Json<Class>> {
    let class = find_class(&state, &user.user_id, &class_id).await?;
    Ok(Json(class))
}

/// Partially update a class
async fn update_class(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(class_id): Path<String>,
    Json(update): Json<ClassUpdate>,
) -> Result<Json<Class>> {
    let changes = models::to_row(&update)?;
    if changes.is_empty() {
        return Err(AppError::BadRequest(
            "No fields provided for update".to_string(),
        ));
    }

    let affected = state
        .store()
        .update(
            "classes",
            changes,
            vec![
                Filter::eq("id", class_id.as_str()),
                Filter::eq("user_id", user.user_id.as_str()),
            ],
        )
        .await?;
    if affected == 0 {
        return Err(AppError::NotFound("Class not found".to_string()));
    }

    let class = find_class(&state, &user.user_id, &class_id).await?;
    Ok(Json(class))
}

/// Delete a class
async fn delete_class(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(class_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let removed = state
        .store()
        .delete(
            "classes",
            vec![
                Filter::eq("id", class_id.as_str()),
                Filter::eq("user_id", user.user_id.as_str()),
            ],
        )
        .await?;
    if removed == 0 {
        return Err(AppError::NotFound("Class not found".to_string()));
    }
    Ok(Json(MessageResponse {
        message: "Class deleted successfully",
    }))
}

async fn find_class(state: &AppState, user_id: &str, class_id: &str) -> Result<Class> {
    let rows = state
        .store()
        .select(
            "classes",
            Query::new().eq("id", class_id).eq("user_id", user_id),
        )
        .await?;
    rows.into_iter()
        .next()
        .map(models::from_row)
        .transpose()?
        .ok_or_else(|| AppError::NotFound("Class not found".to_string()))
}
