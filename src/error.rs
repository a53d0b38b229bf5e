use std::fmt;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{notify::DispatchError, weather::GatewayError};

/// A single `field: message` validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors raised by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A unique constraint rejected the write.
    #[error("{field} already exists")]
    Conflict { field: &'static str },

    /// A stored row could not be mapped back to a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error returned by every handler and service at the HTTP boundary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: &'static str,
        errors: Vec<FieldError>,
    },

    #[error("{0}")]
    BadRequest(String),

    /// Body missing, not JSON, or not the expected shape.
    #[error("Invalid request body")]
    JsonBody(#[from] JsonRejection),

    /// Deliberately identical for unknown identifiers and wrong passwords.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(&'static str),

    /// Also returned for records owned by someone else.
    #[error("Not found.")]
    NotFound,

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Upstream(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: &'static str, errors: Vec<FieldError>) -> Self {
        Self::Validation { message, errors }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::BadRequest(_) | Self::JsonBody(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidCredentials | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Dispatch(DispatchError::InvalidRecipient) => StatusCode::BAD_REQUEST,
            Self::Upstream(GatewayError::MissingCoordinates) => StatusCode::BAD_REQUEST,
            Self::Dispatch(_) | Self::Upstream(_) | Self::Store(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation { message, errors } => json!({
                "message": message,
                "errors": errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
            }),
            Self::JsonBody(rejection) => json!({
                "message": self.to_string(),
                "errors": [rejection.body_text()],
            }),
            Self::BadRequest(_)
            | Self::InvalidCredentials
            | Self::Unauthorized(_)
            | Self::NotFound => {
                json!({ "detail": self.to_string() })
            }
            Self::Dispatch(DispatchError::InvalidRecipient) => {
                json!({ "error": "User email is required" })
            }
            Self::Dispatch(e) => {
                error!(error = %e, "notification dispatch failed");
                json!({ "error": format!("Failed to send email: {}", e) })
            }
            Self::Upstream(GatewayError::MissingCoordinates) => {
                json!({ "error": "lat and lon required" })
            }
            Self::Upstream(e) => {
                error!(error = %e, "weather gateway failed");
                json!({ "error": "Failed to fetch data from OpenWeatherMap" })
            }
            Self::Store(e) => {
                error!(error = %e, "store failure");
                json!({ "detail": "Internal server error" })
            }
            Self::Internal(e) => {
                error!(error = %e, "internal failure");
                json!({ "detail": "Internal server error" })
            }
        };
        (status, Json(body)).into_response()
    }
}
