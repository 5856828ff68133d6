use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::push::PushChannelError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Push channel error: {0}")]
    Push(#[from] PushChannelError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

/// Detailed message in development, generic one in production.
fn masked(log_message: &str, generic: &str) -> String {
    if is_production() {
        generic.to_string()
    } else {
        log_message.to_string()
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String, String) {
        match self {
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone(), msg.clone()),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                msg.clone(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), msg.clone()),
            AppError::Push(e) => {
                let log_msg = e.to_string();
                let client_msg = masked(&log_msg, "Push channel unavailable");
                (StatusCode::BAD_GATEWAY, "PUSH_CHANNEL_ERROR", client_msg, log_msg)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, client_message, log_message) = self.parts();

        // Always log the detailed error server-side
        tracing::error!(
            code = %code,
            status = %status.as_u16(),
            message = %log_message,
            "API error"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let (status, code, _, _) = AppError::Validation("bad".into()).parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "VALIDATION_ERROR");

        let (status, code, _, _) =
            AppError::Push(PushChannelError::Rejected("UNAUTHENTICATED".into())).parts();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(code, "PUSH_CHANNEL_ERROR");

        let (status, code, _, _) = AppError::NotFound("/nowhere".into()).parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn test_into_response_status() {
        let response = AppError::Auth("missing key".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
