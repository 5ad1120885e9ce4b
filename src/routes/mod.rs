//! Route modules for the StudyVault server

pub mod calendar;
pub mod classes;
pub mod devices;
pub mod habits;
pub mod health;
pub mod sync;
pub mod tasks;

use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::state::AppState;

/// Build the full application router. Everything except the service
/// endpoints sits behind bearer-token auth.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .nest("/sync", sync::router())
        .nest("/devices", devices::router())
        .nest("/classes", classes::router())
        .nest("/tasks", tasks::router())
        .nest("/calendar", calendar::router())
        .nest("/habits", habits::router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .merge(health::router())
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
