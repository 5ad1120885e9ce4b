//! Authentication middleware

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Verify the bearer token and expose the caller as an [`super::AuthUser`]
/// request extension. Routes behind this layer can rely on it being present.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(&request)?.to_string();
    let user = state.verifier().verify(&token).await?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Result<&str> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Auth("Missing authentication token".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authentication token".to_string()))
}
