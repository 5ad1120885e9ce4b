//! API models for device registry and CRUD endpoints
//!
//! Entities deserialize straight from store rows; create models carry the
//! field defaults the clients expect, and update models serialize only the
//! fields the caller actually set.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::store::Row;

/// Decode a store row into a typed entity. Synced rows may carry explicit
/// nulls for fields they never set; those count as absent so the field
/// defaults apply.
pub fn from_row<T: DeserializeOwned>(mut row: Row) -> Result<T> {
    row.retain(|_, value| !value.is_null());
    serde_json::from_value(Value::Object(row))
        .map_err(|e| AppError::Internal(format!("row decode failed: {}", e)))
}

/// Encode a request model into a store row.
pub fn to_row<T: Serialize>(value: &T) -> Result<Row> {
    match serde_json::to_value(value) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(_) => Err(AppError::Internal("model is not a JSON object".to_string())),
        Err(e) => Err(AppError::Internal(format!("model encode failed: {}", e))),
    }
}

/// Plain confirmation body for endpoints that return no entity.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

// ---------------------------------------------------------------------------
// Devices

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub user_id: String,
    pub device_id: String,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceCreate {
    pub device_id: String,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DeviceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

// ---------------------------------------------------------------------------
// Classes

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default = "default_class_color")]
    pub color: String,
    #[serde(default)]
    pub credits: Option<i32>,
    #[serde(default)]
    pub semester: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub syllabus_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ClassCreate {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default = "default_class_color")]
    pub color: String,
    #[serde(default)]
    pub credits: Option<i32>,
    #[serde(default)]
    pub semester: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub syllabus_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl ClassCreate {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ClassUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semester: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syllabus_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

// ---------------------------------------------------------------------------
// Tasks

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_task_status")]
    pub status: String,
    #[serde(default)]
    pub estimated_duration: Option<i32>,
    #[serde(default)]
    pub completion_percentage: i32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub device_created: Option<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TaskCreate {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_task_status")]
    pub status: String,
    #[serde(default)]
    pub estimated_duration: Option<i32>,
    #[serde(default)]
    pub completion_percentage: i32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub device_created: Option<String>,
}

impl TaskCreate {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("title", &self.title)?;
        require_range("priority", self.priority, 1, 3)?;
        require_range("completion_percentage", self.completion_percentage, 0, 100)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_percentage: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskUpdate {
    pub fn validate(&self) -> Result<()> {
        if let Some(priority) = self.priority {
            require_range("priority", priority, 1, 3)?;
        }
        if let Some(pct) = self.completion_percentage {
            require_range("completion_percentage", pct, 0, 100)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Calendar events

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    #[serde(default = "default_event_type")]
    pub event_type: String,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurrence_pattern: serde_json::Map<String, Value>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default = "default_reminder_minutes")]
    pub reminder_minutes: i32,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub google_calendar_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CalendarEventCreate {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    #[serde(default = "default_event_type")]
    pub event_type: String,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurrence_pattern: serde_json::Map<String, Value>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default = "default_reminder_minutes")]
    pub reminder_minutes: i32,
    #[serde(default)]
    pub class_id: Option<String>,
}

impl CalendarEventCreate {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("title", &self.title)?;
        if self.end_datetime < self.start_datetime {
            return Err(AppError::BadRequest(
                "end_datetime must not precede start_datetime".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CalendarEventUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_datetime: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_datetime: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_recurring: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_pattern: Option<serde_json::Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_minutes: Option<i32>,
}

// ---------------------------------------------------------------------------
// Habits

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_target_frequency")]
    pub target_frequency: i32,
    #[serde(default = "default_habit_color")]
    pub color: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default = "default_habit_category")]
    pub category: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct HabitCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_target_frequency")]
    pub target_frequency: i32,
    #[serde(default = "default_habit_color")]
    pub color: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default = "default_habit_category")]
    pub category: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl HabitCreate {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct HabitUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_frequency: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitLog {
    pub id: String,
    pub user_id: String,
    pub habit_id: String,
    pub completed_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub mood_rating: Option<i32>,
    #[serde(default)]
    pub device_logged: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct HabitLogCreate {
    pub completed_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub mood_rating: Option<i32>,
    #[serde(default)]
    pub device_logged: Option<String>,
}

impl HabitLogCreate {
    pub fn validate(&self) -> Result<()> {
        if let Some(rating) = self.mood_rating {
            require_range("mood_rating", rating, 1, 5)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn require_range(field: &str, value: i32, min: i32, max: i32) -> Result<()> {
    if !(min..=max).contains(&value) {
        return Err(AppError::BadRequest(format!(
            "{} must be between {} and {}",
            field, min, max
        )));
    }
    Ok(())
}

fn default_true() -> bool {
    true
}

fn default_class_color() -> String {
    "#3B82F6".to_string()
}

fn default_priority() -> i32 {
    2
}

fn default_task_status() -> String {
    "pending".to_string()
}

fn default_event_type() -> String {
    "class".to_string()
}

fn default_reminder_minutes() -> i32 {
    15
}

fn default_target_frequency() -> i32 {
    7
}

fn default_habit_color() -> String {
    "#10B981".to_string()
}

fn default_habit_category() -> String {
    "study".to_string()
}
