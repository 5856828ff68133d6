use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};

use crate::error::{AppError, Result};

use super::AppState;

/// API Key authentication middleware.
///
/// Validates the `X-API-Key` header against `api.key`. With no key
/// configured every request passes.
pub async fn api_key_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response> {
    let Some(expected_key) = &state.settings.api.key else {
        return Ok(next.run(req).await);
    };

    let api_key = req
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok());

    match api_key {
        Some(key) if key == expected_key => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!("Invalid API key provided");
            Err(AppError::Auth("Invalid API key".into()))
        }
        None => {
            tracing::warn!("Missing API key header");
            Err(AppError::Auth("Missing X-API-Key header".into()))
        }
    }
}
