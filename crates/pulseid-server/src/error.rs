use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pulseid_core::AuthError;
use serde_json::json;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_name: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            error_name: error_name.into(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.error_name,
            "message": self.message,
        });
        (self.status, axum::Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match &err {
            // Unexpected internals: log the detail, return a generic message.
            AuthError::Storage(detail) | AuthError::Crypto(detail) | AuthError::Internal(detail) => {
                tracing::error!(%detail, "internal error");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalServerError",
                    "Internal server error",
                )
            }
            AuthError::External(detail) => {
                tracing::warn!(%detail, "external service failure");
                ApiError::new(
                    StatusCode::BAD_GATEWAY,
                    "ExternalServiceError",
                    "An upstream service is unavailable",
                )
            }
            AuthError::Validation(_) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "ValidationError",
                err.to_string(),
            ),
            AuthError::InvalidCredentials => ApiError::new(
                StatusCode::BAD_REQUEST,
                "InvalidCredentials",
                err.to_string(),
            ),
            AuthError::AccountNotFound => ApiError::new(
                StatusCode::NOT_FOUND,
                "NotFound",
                err.to_string(),
            ),
            AuthError::AccountDeleted => ApiError::new(
                StatusCode::BAD_REQUEST,
                "AccountDeleted",
                err.to_string(),
            ),
            AuthError::EmailTaken => ApiError::new(
                StatusCode::BAD_REQUEST,
                "DuplicateEmail",
                err.to_string(),
            ),
            AuthError::DeactivatedAccountExists => ApiError::new(
                StatusCode::BAD_REQUEST,
                "DeactivatedAccountExists",
                err.to_string(),
            ),
            AuthError::TokenExpired => ApiError::new(
                StatusCode::UNAUTHORIZED,
                "ExpiredToken",
                err.to_string(),
            ),
            AuthError::TokenInvalid => ApiError::new(
                StatusCode::UNAUTHORIZED,
                "InvalidToken",
                err.to_string(),
            ),
        }
    }
}
