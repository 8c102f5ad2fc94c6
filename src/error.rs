use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Unique field already taken (email, NIB).
    #[error("{field} already registered")]
    Conflict { field: &'static str },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    /// Malformed or oversized multipart body.
    #[error("{0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Hashing error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("Invalid token")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A server-side failure annotated with what the request was doing.
    #[error("{message}: {detail}")]
    Internal { message: String, detail: String },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    /// Wraps a server-side error with a request-level message. Client errors pass through.
    pub fn during(self, message: &str) -> Self {
        if self.status().is_server_error() {
            let detail = match self {
                AppError::Internal { detail, .. } => detail,
                other => other.to_string(),
            };
            AppError::Internal { message: message.to_string(), detail }
        } else {
            self
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Conflict { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) | AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Multipart(e) => e.status(),
            AppError::Database(_)
            | AppError::Io(_)
            | AppError::Csv(_)
            | AppError::Bcrypt(_)
            | AppError::Task(_)
            | AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Internal { message, detail } => {
                tracing::error!(error = %detail, "{}", message);
                json!({ "success": false, "message": message, "error": detail })
            }
            err if status.is_server_error() => {
                tracing::error!(error = %err, "request failed");
                json!({ "success": false, "message": "Internal server error", "error": err.to_string() })
            }
            err => json!({ "success": false, "message": err.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
