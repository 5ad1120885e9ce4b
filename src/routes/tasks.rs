//! Tasks API routes

use axum::{
    extract::{Path, Query as QueryParams, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::models::{self, MessageResponse, Task, TaskCreate, TaskUpdate};
use crate::state::AppState;
use crate::store::{now_timestamp, Filter, Query, Row};

const MAX_LIST_LIMIT: u32 = 1000;

/// Create the tasks router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tasks))
        .route("/", post(create_task))
        .route("/:task_id", get(get_task))
        .route("/:task_id", put(update_task))
        .route("/:task_id", delete(delete_task))
        .route("/:task_id/complete", post(complete_task))
}

/// Query parameters for task listing
#[derive(Debug, Deserialize)]
struct TaskListQuery {
    class_id: Option<String>,
    status: Option<String>,
    priority: Option<i32>,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_limit() -> u32 {
    100
}

/// Tasks for the current user with optional filters, newest first
async fn list_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    QueryParams(params): QueryParams<TaskListQuery>,
) -> Result<Json<Vec<Task>>> {
    if params.limit > MAX_LIST_LIMIT {
        return Err(AppError::BadRequest(format!(
            "limit must be at most {}",
            MAX_LIST_LIMIT
        )));
    }

    let mut query = Query::new().eq("user_id", user.user_id.as_str());
    if let Some(class_id) = &params.class_id {
        query = query.eq("class_id", class_id.as_str());
    }
    if let Some(status) = &params.status {
        query = query.eq("status", status.as_str());
    }
    if let Some(priority) = params.priority {
        query = query.eq("priority", priority);
    }
    query = query.order("created_at", true).limit(params.limit);

    let rows = state.store().select("tasks", query).await?;
    let tasks = rows.into_iter().map(models::from_row).collect::<Result<_>>()?;
    Ok(Json(tasks))
}

/// Create a new task
async fn create_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(data): Json<TaskCreate>,
) -> Result<(StatusCode, Json<Task>)> {
    data.validate()?;

    let mut row = models::to_row(&data)?;
    row.insert("user_id".to_string(), Value::String(user.user_id.clone()));

    let stored = state.store().insert("tasks", vec![row]).await?;
    let task = stored
        .into_iter()
        .next()
        .map(models::from_row)
        .transpose()?
        .ok_or_else(|| AppError::Internal("insert returned no row".to_string()))?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// Get a specific task
async fn get_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<String>,
) -> Result<Json<Task>> {
    let task = find_task(&state, &user.user_id, &task_id).await?;
    Ok(Json(task))
}

/// Partially update a task
async fn update_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<String>,
    Json(update): Json<TaskUpdate>,
) -> Result<Json<Task>> {
    update.validate()?;

    let mut changes = models::to_row(&update)?;
    if changes.is_empty() {
        return Err(AppError::BadRequest(
            "No fields provided for update".to_string(),
        ));
    }

    // Completing a task by status alone still records when it finished.
    if changes.get("status") == Some(&Value::String("completed".to_string()))
        && !changes.contains_key("completed_at")
    {
        changes.insert(
            "completed_at".to_string(),
            Value::String(now_timestamp()),
        );
    }

    let affected = state
        .store()
        .update("tasks", changes, owner_filters(&task_id, &user.user_id))
        .await?;
    if affected == 0 {
        return Err(AppError::NotFound("Task not found".to_string()));
    }

    let task = find_task(&state, &user.user_id, &task_id).await?;
    Ok(Json(task))
}

/// Delete a task
async fn delete_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let removed = state
        .store()
        .delete("tasks", owner_filters(&task_id, &user.user_id))
        .await?;
    if removed == 0 {
        return Err(AppError::NotFound("Task not found".to_string()));
    }
    Ok(Json(MessageResponse {
        message: "Task deleted successfully",
    }))
}

/// Mark a task as completed
async fn complete_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<String>,
) -> Result<Json<Task>> {
    let mut changes = Row::new();
    changes.insert("status".to_string(), Value::String("completed".to_string()));
    changes.insert("completion_percentage".to_string(), Value::from(100));
    changes.insert(
        "completed_at".to_string(),
        Value::String(now_timestamp()),
    );

    let affected = state
        .store()
        .update("tasks", changes, owner_filters(&task_id, &user.user_id))
        .await?;
    if affected == 0 {
        return Err(AppError::NotFound("Task not found".to_string()));
    }

    let task = find_task(&state, &user.user_id, &task_id).await?;
    Ok(Json(task))
}

fn owner_filters(task_id: &str, user_id: &str) -> Vec<Filter> {
    vec![Filter::eq("id", task_id), Filter::eq("user_id", user_id)]
}

async fn find_task(state: &AppState, user_id: &str, task_id: &str) -> Result<Task> {
    let rows = state
        .store()
        .select("tasks", Query::new().eq("id", task_id).eq("user_id", user_id))
        .await?;
    rows.into_iter()
        .next()
        .map(models::from_row)
        .transpose()?
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
}
