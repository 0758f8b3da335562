//! HTTP error mapping.
//!
//! # Invariants
//! - Every error body is `{"error": <message>}`, plus `field` for
//!   validation failures.
//! - Internal failures are logged with detail but answered generically.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use leornian_core::{DbError, ServiceError};
use log::error;
use serde::Serialize;
use std::fmt::{Display, Formatter};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    /// No authenticated user, or the user lacks access.
    Forbidden(String),
    BadRequest {
        field: Option<String>,
        message: String,
    },
    NotFound(String),
    Conflict(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forbidden(message)
            | Self::NotFound(message)
            | Self::Conflict(message)
            | Self::Internal(message) => write!(f, "{message}"),
            Self::BadRequest { message, .. } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Validation(err) => Self::BadRequest {
                field: Some(err.field.to_string()),
                message: err.message,
            },
            ServiceError::Captcha(err) => Self::BadRequest {
                field: Some("captcha".to_string()),
                message: err.to_string(),
            },
            ServiceError::NotFound { entity, .. } => Self::NotFound(format!("{entity} not found")),
            ServiceError::PermissionDenied(message) => Self::Forbidden(message),
            ServiceError::Conflict(message) => Self::Conflict(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(value: DbError) -> Self {
        Self::Internal(value.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, field) = match &self {
            Self::Internal(detail) => {
                error!("event=api_request module=api status=error error_code=internal error={detail}");
                ("internal server error", None)
            }
            Self::BadRequest { field, message } => (message.as_str(), field.as_deref()),
            Self::Forbidden(message) | Self::NotFound(message) | Self::Conflict(message) => {
                (message.as_str(), None)
            }
        };
        (
            status,
            Json(ErrorBody {
                error: message,
                field,
            }),
        )
            .into_response()
    }
}
