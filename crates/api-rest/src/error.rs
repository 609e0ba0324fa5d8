//! API error type and its `{success: false, message}` response shape.

use api_shared::AuthError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use curamind_core::CoreError;
use serde::Serialize;
use utoipa::ToSchema;

/// Body of every failed request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Server configuration error")]
    Misconfigured,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Misconfigured | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "API internal error");
                "Internal server error".to_string()
            }
            ApiError::Misconfigured => {
                tracing::error!("request refused: JWT_SECRET is not configured");
                ApiError::Misconfigured.to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                message,
            }),
        )
            .into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(message) => ApiError::BadRequest(message),
            e @ CoreError::NotFound(_) => ApiError::NotFound(e.to_string()),
            CoreError::Conflict(message) => ApiError::Conflict(message),
            e @ CoreError::InvalidTransition { .. } => ApiError::Conflict(e.to_string()),
            e @ CoreError::InvalidCredentials => ApiError::Unauthorized(e.to_string()),
            e @ CoreError::NotOwner(_) => ApiError::Forbidden(e.to_string()),
            e @ (CoreError::InvalidConfig(_)
            | CoreError::Database(_)
            | CoreError::Migration { .. }
            | CoreError::Serialization(_)
            | CoreError::LockPoisoned) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            e @ (AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::Expired
            | AuthError::InvalidCredentials) => ApiError::Unauthorized(e.to_string()),
            e @ AuthError::Forbidden => ApiError::Forbidden(e.to_string()),
            e @ AuthError::InvalidUserType => ApiError::BadRequest(e.to_string()),
            AuthError::Misconfigured => ApiError::Misconfigured,
            e @ (AuthError::InvalidConfig(_) | AuthError::Signing(_)) => {
                ApiError::Internal(e.to_string())
            }
            AuthError::Core(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
