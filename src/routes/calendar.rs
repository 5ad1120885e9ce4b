//! Calendar events API routes

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
use crate::models::{self, CalendarEvent, CalendarEventCreate, CalendarEventUpdate, MessageResponse};
use crate::state::AppState;
use crate::store::{format_timestamp, Filter, Query};

/// Create the calendar router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events))
        .route("/", post(create_event))
        .route("/:event_id", get(get_event))
        .route("/:event_id", put(update_event))
        .route("/:event_id", delete(delete_event))
}

/// Query parameters for event listing
#[derive(Debug, Deserialize)]
struct EventListQuery {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    class_id: Option<String>,
    event_type: Option<String>,
}

/// Events for the current user within an optional date window, earliest first
async fn list_events(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    QueryParams(params): QueryParams<EventListQuery>,
) -> Result<Json<Vec<CalendarEvent>>> {
    let mut query = Query::new().eq("user_id", user.user_id.as_str());
    if let Some(start) = params.start_date {
        query = query.gte("start_datetime", start.to_string());
    }
    if let Some(end) = params.end_date {
        query = query.lte("end_datetime", end.to_string());
    }
    if let Some(class_id) = &params.class_id {
        query = query.eq("class_id", class_id.as_str());
    }
    if let Some(event_type) = &params.event_type {
        query = query.eq("event_type", event_type.as_str());
    }
    query = query.order("start_datetime", false);

    let rows = state.store().select("calendar_events", query).await?;
    let events = rows.into_iter().map(models::from_row).collect::<Result<_>>()?;
    Ok(Json(events))
}

/// Create a new calendar event
async fn create_event(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(data): Json<CalendarEventCreate>,
) -> Result<(StatusCode, Json<CalendarEvent>)> {
    data.validate()?;

    let mut row = models::to_row(&data)?;
    row.insert("user_id".to_string(), Value::String(user.user_id.clone()));
    // Range filters compare these as strings; store them fixed width.
    row.insert(
        "start_datetime".to_string(),
        Value::String(format_timestamp(data.start_datetime)),
    );
    row.insert(
        "end_datetime".to_string(),
        Value::String(format_timestamp(data.end_datetime)),
    );

    let stored = state.store().insert("calendar_events", vec![row]).await?;
    let event = stored
        .into_iter()
        .next()
        .map(models::from_row)
        .transpose()?
        .ok_or_else(|| AppError::Internal("insert returned no row".to_string()))?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// Get a specific event
async fn get_event(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<String>,
) -> Result<Json<CalendarEvent>> {
    let event = find_event(&state, &user.user_id, &event_id).await?;
    Ok(Json(event))
}

/// Partially update an event
async fn update_event(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<String>,
    Json(update): Json<CalendarEventUpdate>,
) -> Result<Json<CalendarEvent>> {
    let mut changes = models::to_row(&update)?;
    if changes.is_empty() {
        return Err(AppError::BadRequest(
            "No fields provided for update".to_string(),
        ));
    }
    if let Some(start) = update.start_datetime {
        changes.insert(
            "start_datetime".to_string(),
            Value::String(format_timestamp(start)),
        );
    }
    if let Some(end) = update.end_datetime {
        changes.insert(
            "end_datetime".to_string(),
            Value::String(format_timestamp(end)),
        );
    }

    let affected = state
        .store()
        .update(
            "calendar_events",
            changes,
            owner_filters(&event_id, &user.user_id),
        )
        .await?;
    if affected == 0 {
        return Err(AppError::NotFound("Event not found".to_string()));
    }

    let event = find_event(&state, &user.user_id, &event_id).await?;
    Ok(Json(event))
}

/// Delete an event
async fn delete_event(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let removed = state
        .store()
        .delete("calendar_events", owner_filters(&event_id, &user.user_id))
        .await?;
    if removed == 0 {
        return Err(AppError::NotFound("Event not found".to_string()));
    }
    Ok(Json(MessageResponse {
        message: "Event deleted successfully",
    }))
}

fn owner_filters(event_id: &str, user_id: &str) -> Vec<Filter> {
    vec![Filter::eq("id", event_id), Filter::eq("user_id", user_id)]
}

async fn find_event(state: &AppState, user_id: &str, event_id: &str) -> Result<CalendarEvent> {
    let rows = state
        .store()
        .select(
            "calendar_events",
            Query::new().eq("id", event_id).eq("user_id", user_id),
        )
        .await?;
    rows.into_iter()
        .next()
        .map(models::from_row)
        .transpose()?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
}
