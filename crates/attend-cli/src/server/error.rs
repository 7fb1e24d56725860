//! API error type and its HTTP mapping.
//!
//! Every failure is rendered as `{"error": message, "status": code}`.

use attend_core::{AttendanceError, ValidationError};
use attend_db::DbError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Attendance(#[from] AttendanceError),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The request body was missing or malformed.
    #[error("{0}")]
    Body(#[from] JsonRejection),

    #[error("{0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Attendance(err) => match err {
                AttendanceError::EventNotFound(_) | AttendanceError::ParticipantUnknown(_) => {
                    StatusCode::NOT_FOUND
                }
                AttendanceError::EventInactive(_) | AttendanceError::InvalidInput(_) => {
                    StatusCode::BAD_REQUEST
                }
                AttendanceError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::Database(err) => match err {
                DbError::Validation(_) | DbError::EventClosed(_) => StatusCode::BAD_REQUEST,
                DbError::DuplicateParticipant(_) => StatusCode::CONFLICT,
                DbError::Sqlite(_) => StatusCode::SERVICE_UNAVAILABLE,
                DbError::TimestampParse { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Validation(_) | Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
