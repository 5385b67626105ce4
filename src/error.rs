use axum::{
    extract::multipart::MultipartRejection,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Every failure a request can end in. Rendered as `{"message": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Processing(String),
    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("file system error: {0}")]
    Io(#[from] std::io::Error),
    #[error("password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("background task failed: {0}")]
    Worker(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Processing(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) | Self::Io(_) | Self::Hash(_) | Self::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text shown to the client; internal failures stay generic.
    fn public_message(&self) -> String {
        match self {
            Self::Storage(_) => "Storage error, nothing was changed.".to_string(),
            Self::Io(_) => "File storage error, nothing was changed.".to_string(),
            Self::Hash(_) | Self::Worker(_) => "Could not process credentials.".to_string(),
            other => other.to_string(),
        }
    }
}

/// Detects a UNIQUE constraint violation so callers can report a duplicate
/// instead of a storage failure.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "request rejected");
        }
        (status, Json(serde_json::json!({ "message": self.public_message() }))).into_response()
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        Self::Validation(format!("Malformed upload: {}", e.body_text()))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::Validation(format!("Malformed request body: {}", e.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        Self::Validation(format!("Malformed path: {}", e.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self::Validation(format!("Malformed query: {}", e.body_text()))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(e: MultipartRejection) -> Self {
        Self::Validation(format!("Malformed upload: {}", e.body_text()))
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Worker(e.to_string())
    }
}
