//! HTTP-level integration tests driving the real router over in-memory
//! SQLite with minted bearer tokens.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use studyvault_server::auth::{Claims, JwtVerifier};
use studyvault_server::config::Config;
use studyvault_server::db;
use studyvault_server::routes;
use studyvault_server::state::AppState;
use studyvault_server::store::SqliteStore;

const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";

async fn test_app() -> Router {
    let mut config = Config::default();
    config.auth.jwt_secret = TEST_SECRET.to_string();

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();
    db::initialize_schema(&pool).await.unwrap();

    let store = Arc::new(SqliteStore::new(pool));
    let verifier = Arc::new(JwtVerifier::new(&config.auth));
    routes::app(AppState::new(config, store, verifier))
}

fn token_for(user_id: &str) -> String {
    mint_token(user_id, Utc::now() + Duration::hours(1))
}

fn mint_token(user_id: &str, expires: chrono::DateTime<Utc>) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        email: Some(format!("{}@example.edu", user_id)),
        aud: "authenticated".to_string(),
        exp: expires.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap()
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            panic!("non-JSON body: {}", String::from_utf8_lossy(&bytes))
        })
    };
    (status, value)
}

#[tokio::test]
async fn service_endpoints_are_open() {
    let app = test_app().await;

    let (status, body) = send(&app, Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("StudyVault API is running"));

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));
    assert_eq!(body["service"], json!("StudyVault API"));
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = test_app().await;

    let (status, body) = send(&app, Method::GET, "/tasks", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], json!("Missing authentication token"));

    let (status, body) = send(&app, Method::GET, "/tasks", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], json!("Invalid token"));

    let stale = mint_token("u1", Utc::now() - Duration::hours(2));
    let (status, body) = send(&app, Method::GET, "/tasks", Some(&stale), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], json!("Token has expired"));
}

#[tokio::test]
async fn push_then_pull_roundtrip() {
    let app = test_app().await;
    let token = token_for("u1");

    let records = json!([
        {"id": "t1", "title": "Read chapter 4"},
        {"id": "t2", "title": "Problem set", "priority": 1}
    ]);
    let (status, body) = send(
        &app,
        Method::POST,
        "/sync/push?table_name=tasks&device_id=phone",
        Some(&token),
        Some(records),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["synced_records"], json!(2));

    let (status, body) = send(
        &app,
        Method::POST,
        "/sync/pull",
        Some(&token),
        Some(json!({"device_id": "phone"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert!(body["last_sync"].is_string());
    assert_eq!(body["conflicts"], json!([]));

    let tasks = body["data"]["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    for task in tasks {
        assert_eq!(task["user_id"], json!("u1"));
        assert!(task["updated_at"].is_string());
    }
    assert!(body["data"]["classes"].as_array().unwrap().is_empty());

    let (status, body) = send(
        &app,
        Method::GET,
        "/sync/status?device_id=phone",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["device"]["device_id"], json!("phone"));
    assert!(body["last_sync"].is_string());
    let syncs = body["recent_syncs"].as_array().unwrap();
    assert_eq!(syncs.len(), 2);
    for entry in syncs {
        assert_eq!(entry["success"], json!(true));
    }
}

#[tokio::test]
async fn second_pull_with_watermark_skips_old_rows() {
    let app = test_app().await;
    let token = token_for("u1");

    send(
        &app,
        Method::POST,
        "/sync/push?table_name=habits&device_id=phone",
        Some(&token),
        Some(json!([{"id": "h1", "name": "Flashcards"}])),
    )
    .await;

    let (_, first) = send(
        &app,
        Method::POST,
        "/sync/pull",
        Some(&token),
        Some(json!({"device_id": "phone"})),
    )
    .await;
    assert_eq!(first["data"]["habits"].as_array().unwrap().len(), 1);

    let watermark = first["last_sync"].as_str().unwrap();
    let (_, second) = send(
        &app,
        Method::POST,
        "/sync/pull",
        Some(&token),
        Some(json!({"device_id": "phone", "last_sync": watermark, "tables": ["habits"]})),
    )
    .await;
    assert!(second["data"]["habits"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn push_to_unknown_table_is_rejected() {
    let app = test_app().await;
    let token = token_for("u1");

    let (status, body) = send(
        &app,
        Method::POST,
        "/sync/push?table_name=users&device_id=phone",
        Some(&token),
        Some(json!([{"id": "x"}])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("invalid_table"));
    assert_eq!(body["message"], json!("Table users not allowed for sync"));
}

#[tokio::test]
async fn users_never_see_each_others_rows() {
    let app = test_app().await;
    let alice = token_for("alice");
    let bob = token_for("bob");

    send(
        &app,
        Method::POST,
        "/sync/push?table_name=tasks&device_id=a1",
        Some(&alice),
        Some(json!([{"id": "t1", "title": "Alice's essay"}])),
    )
    .await;

    let (_, body) = send(
        &app,
        Method::POST,
        "/sync/pull",
        Some(&bob),
        Some(json!({"device_id": "b1"})),
    )
    .await;
    assert!(body["data"]["tasks"].as_array().unwrap().is_empty());

    let (status, _) = send(&app, Method::GET, "/tasks/t1", Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn device_lifecycle_over_http() {
    let app = test_app().await;
    let token = token_for("u1");

    let (status, body) = send(
        &app,
        Method::POST,
        "/devices",
        Some(&token),
        Some(json!({"device_id": "tablet", "device_name": "iPad", "device_type": "mobile"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["device_name"], json!("iPad"));
    assert_eq!(body["is_active"], json!(true));

    let (status, body) = send(
        &app,
        Method::PUT,
        "/devices/tablet",
        Some(&token),
        Some(json!({"device_name": "iPad Pro"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["device_name"], json!("iPad Pro"));
    assert_eq!(body["device_type"], json!("mobile"));

    let (status, body) = send(
        &app,
        Method::POST,
        "/devices/tablet/sync",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Device sync updated"));
    assert!(body["last_sync"].is_string());

    let (status, body) = send(&app, Method::DELETE, "/devices/tablet", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Device deactivated successfully"));

    let (status, body) = send(&app, Method::GET, "/devices/tablet", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], json!(false));

    let (status, _) = send(&app, Method::GET, "/devices/ghost", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, Method::GET, "/devices", Some(&token), None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn task_crud_feeds_into_sync() {
    let app = test_app().await;
    let token = token_for("u1");

    let (status, created) = send(
        &app,
        Method::POST,
        "/tasks",
        Some(&token),
        Some(json!({"title": "Lab report", "priority": 3, "tags": ["chem"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], json!("pending"));
    assert_eq!(created["completion_percentage"], json!(0));
    let task_id = created["id"].as_str().unwrap().to_string();

    let (status, completed) = send(
        &app,
        Method::POST,
        &format!("/tasks/{}/complete", task_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], json!("completed"));
    assert_eq!(completed["completion_percentage"], json!(100));
    assert!(completed["completed_at"].is_string());

    let (_, listed) = send(
        &app,
        Method::GET,
        "/tasks?status=completed",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // REST-created rows carry updated_at, so they flow into pull.
    let (_, pulled) = send(
        &app,
        Method::POST,
        "/sync/pull",
        Some(&token),
        Some(json!({"device_id": "phone", "tables": ["tasks"]})),
    )
    .await;
    let tasks = pulled["data"]["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], json!(task_id));
    assert_eq!(tasks[0]["status"], json!("completed"));
}

#[tokio::test]
async fn task_validation_rejects_out_of_range_fields() {
    let app = test_app().await;
    let token = token_for("u1");

    let (status, body) = send(
        &app,
        Method::POST,
        "/tasks",
        Some(&token),
        Some(json!({"title": "Essay", "priority": 9})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("bad_request"));
    assert_eq!(body["message"], json!("priority must be between 1 and 3"));

    let (status, _) = send(
        &app,
        Method::POST,
        "/tasks",
        Some(&token),
        Some(json!({"title": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn habit_logs_are_recorded_and_filtered() {
    let app = test_app().await;
    let token = token_for("u1");

    let (status, habit) = send(
        &app,
        Method::POST,
        "/habits",
        Some(&token),
        Some(json!({"name": "Morning review"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(habit["color"], json!("#10B981"));
    assert_eq!(habit["target_frequency"], json!(7));
    let habit_id = habit["id"].as_str().unwrap().to_string();

    for date in ["2026-02-01", "2026-02-03", "2026-03-01"] {
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/habits/{}/logs", habit_id),
            Some(&token),
            Some(json!({"completed_date": date, "mood_rating": 4})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, logs) = send(
        &app,
        Method::GET,
        &format!(
            "/habits/{}/logs?start_date=2026-02-01&end_date=2026-02-28",
            habit_id
        ),
        Some(&token),
        None,
    )
    .await;
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 2);
    // Most recent completion first.
    assert_eq!(logs[0]["completed_date"], json!("2026-02-03"));

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/habits/{}/logs", habit_id),
        Some(&token),
        Some(json!({"completed_date": "2026-03-02", "mood_rating": 9})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("mood_rating must be between 1 and 5"));
}

#[tokio::test]
async fn calendar_events_filter_by_date_window() {
    let app = test_app().await;
    let token = token_for("u1");

    for (title, start, end) in [
        ("Lecture", "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z"),
        ("Midterm", "2026-04-10T14:00:00Z", "2026-04-10T16:00:00Z"),
    ] {
        let (status, created) = send(
            &app,
            Method::POST,
            "/calendar",
            Some(&token),
            Some(json!({"title": title, "start_datetime": start, "end_datetime": end})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["event_type"], json!("class"));
        assert_eq!(created["reminder_minutes"], json!(15));
    }

    let (_, events) = send(
        &app,
        Method::GET,
        "/calendar?start_date=2026-03-01&end_date=2026-03-31",
        Some(&token),
        None,
    )
    .await;
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["title"], json!("Lecture"));

    let (status, body) = send(
        &app,
        Method::POST,
        "/calendar",
        Some(&token),
        Some(json!({
            "title": "Backwards",
            "start_datetime": "2026-03-02T10:00:00Z",
            "end_datetime": "2026-03-02T09:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        json!("end_datetime must not precede start_datetime")
    );
}

#[tokio::test]
async fn class_update_and_delete() {
    let app = test_app().await;
    let token = token_for("u1");

    let (_, class) = send(
        &app,
        Method::POST,
        "/classes",
        Some(&token),
        Some(json!({"name": "Organic Chemistry", "code": "CHEM 301"})),
    )
    .await;
    assert_eq!(class["color"], json!("#3B82F6"));
    let class_id = class["id"].as_str().unwrap().to_string();

    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/classes/{}", class_id),
        Some(&token),
        Some(json!({"instructor": "Dr. Vance"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["instructor"], json!("Dr. Vance"));
    assert_eq!(updated["code"], json!("CHEM 301"));
    assert!(updated["updated_at"].as_str() >= updated["created_at"].as_str());

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/classes/{}", class_id),
        Some(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("No fields provided for update"));

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/classes/{}", class_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Class deleted successfully"));

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/classes/{}", class_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
