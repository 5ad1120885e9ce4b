//! Habits API routes, including per-habit completion logs

use axum::{
    extract::{Path, Query as QueryParams, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::models::{self, Habit, HabitCreate, HabitLog, HabitLogCreate, HabitUpdate, MessageResponse};
use crate::state::AppState;
use crate::store::{Filter, Query};

/// Create the habits router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_habits))
        .route("/", post(create_habit))
        .route("/:habit_id", get(get_habit))
        .route("/:habit_id", put(update_habit))
        .route("/:habit_id", delete(delete_habit))
        .route("/:habit_id/logs", get(list_habit_logs))
        .route("/:habit_id/logs", post(create_habit_log))
}

/// Query parameters for habit listing
#[derive(Debug, Deserialize)]
struct HabitListQuery {
    is_active: Option<bool>,
}

/// Habits for the current user, newest first
async fn list_habits(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    QueryParams(params): QueryParams<HabitListQuery>,
) -> Result<Json<Vec<Habit>>> {
    let mut query = Query::new().eq("user_id", user.user_id.as_str());
    if let Some(is_active) = params.is_active {
        query = query.eq("is_active", is_active);
    }
    query = query.order("created_at", true);

    let rows = state.store().select("habits", query).await?;
    let habits = rows.into_iter().map(models::from_row).collect::<Result<_>>()?;
    Ok(Json(habits))
}

/// Create a new habit
async fn create_habit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(data): Json<HabitCreate>,
) -> Result<(StatusCode, Json<Habit>)> {
    data.validate()?;

    let mut row = models::to_row(&data)?;
    row.insert("user_id".to_string(), Value::String(user.user_id.clone()));

    let stored = state.store().insert("habits", vec![row]).await?;
    let habit = stored
        .into_iter()
        .next()
        .map(models::from_row)
        .transpose()?
        .ok_or_else(|| AppError::Internal("insert returned no row".to_string()))?;
    Ok((StatusCode::CREATED, Json(habit)))
}

/// Get a specific habit
async fn get_habit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(habit_id): Path<String>,
) -> Result<Json<Habit>> {
    let habit = find_habit(&state, &user.user_id, &habit_id).await?;
    Ok(Json(habit))
}

/// Partially update a habit
async fn update_habit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(habit_id): Path<String>,
    Json(update): Json<HabitUpdate>,
) -> Result<Json<Habit>> {
    let changes = models::to_row(&update)?;
    if changes.is_empty() {
        return Err(AppError::BadRequest(
            "No fields provided for update".to_string(),
        ));
    }

    let affected = state
        .store()
        .update("habits", changes, owner_filters(&habit_id, &user.user_id))
        .await?;
    if affected == 0 {
        return Err(AppError::NotFound("Habit not found".to_string()));
    }

    let habit = find_habit(&state, &user.user_id, &habit_id).await?;
    Ok(Json(habit))
}

/// Delete a habit
async fn delete_habit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(habit_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let removed = state
        .store()
        .delete("habits", owner_filters(&habit_id, &user.user_id))
        .await?;
    if removed == 0 {
        return Err(AppError::NotFound("Habit not found".to_string()));
    }
    Ok(Json(MessageResponse {
        message: "Habit deleted successfully",
    }))
}

/// Query parameters for habit log listing
#[derive(Debug, Deserialize)]
struct HabitLogQuery {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

/// Completion logs for one habit, most recent date first
async fn list_habit_logs(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(habit_id): Path<String>,
    QueryParams(params): QueryParams<HabitLogQuery>,
) -> Result<Json<Vec<HabitLog>>> {
    let mut query = Query::new()
        .eq("habit_id", habit_id.as_str())
        .eq("user_id", user.user_id.as_str());
    if let Some(start) = params.start_date {
        query = query.gte("completed_date", start.to_string());
    }
    if let Some(end) = params.end_date {
        query = query.lte("completed_date", end.to_string());
    }
    query = query.order("completed_date", true);

    let rows = state.store().select("habit_logs", query).await?;
    let logs = rows.into_iter().map(models::from_row).collect::<Result<_>>()?;
    Ok(Json(logs))
}

/// Record a completion for one habit
async fn create_habit_log(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(habit_id): Path<String>,
    Json(data): Json<HabitLogCreate>,
) -> Result<(StatusCode, Json<HabitLog>)> {
    data.validate()?;

    let mut row = models::to_row(&data)?;
    row.insert("user_id".to_string(), Value::String(user.user_id.clone()));
    row.insert("habit_id".to_string(), Value::String(habit_id));

    let stored = state.store().insert("habit_logs", vec![row]).await?;
    let log = stored
        .into_iter()
        .next()
        .map(models::from_row)
        .transpose()?
        .ok_or_else(|| AppError::Internal("insert returned no row".to_string()))?;
    Ok((StatusCode::CREATED, Json(log)))
}

fn owner_filters(habit_id: &str, user_id: &str) -> Vec<Filter> {
    vec![Filter::eq("id", habit_id), Filter::eq("user_id", user_id)]
}

async fn find_habit(state: &AppState, user_id: &str, habit_id: &str) -> Result<Habit> {
    let rows = state
        .store()
        .select(
            "habits",
            Query::new().eq("id", habit_id).eq("user_id", user_id),
        )
        .await?;
    rows.into_iter()
        .next()
        .map(models::from_row)
        .transpose()?
        .ok_or_else(|| AppError::NotFound("Habit not found".to_string()))
}
