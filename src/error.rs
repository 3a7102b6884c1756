//! Error taxonomy shared by services and the HTTP layer
//!
//! Database, mail and filesystem code reports failures as `anyhow::Error`;
//! services lift them into `AppError`, which maps onto HTTP status codes.

use crate::schedule::ScheduleError;
use crate::services::PhotoError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,
    #[error("an account with this email already exists")]
    UserExists,
    #[error("authentication required")]
    Unauthorized,
    #[error("email address is not confirmed")]
    EmailNotConfirmed,
    #[error("password does not match")]
    PasswordMismatch,
    #[error("invalid confirmation code")]
    InvalidConfirmation,
    #[error("{0}")]
    Validation(String),
    /// Stored schedule of one drugstore cannot be turned into a view
    #[error("schedule of drugstore {drugstore_id} is corrupt: {source}")]
    Schedule {
        drugstore_id: i64,
        #[source]
        source: ScheduleError,
    },
    #[error(transparent)]
    Photo(#[from] PhotoError),
    #[error("mail delivery failed: {0}")]
    Mail(anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::UserExists => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::EmailNotConfirmed => StatusCode::FORBIDDEN,
            AppError::PasswordMismatch => StatusCode::NOT_ACCEPTABLE,
            AppError::InvalidConfirmation | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Photo(PhotoError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Photo(_) => StatusCode::BAD_REQUEST,
            AppError::Mail(_) => StatusCode::PRECONDITION_FAILED,
            AppError::Schedule { .. } | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(e) => {
                error!("Internal error: {:#}", e);
                "internal error".to_string()
            }
            AppError::Photo(PhotoError::Io(e)) => {
                error!("Photo storage error: {}", e);
                "internal error".to_string()
            }
            AppError::Mail(e) => {
                error!("Mail error: {:#}", e);
                self.to_string()
            }
            AppError::Schedule { .. } => {
                error!("{}", self);
                self.to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
