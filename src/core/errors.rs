use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("path not found: {path}")]
    NotFound { path: String },
    #[error("permission denied: {path}")]
    PermissionDenied { path: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("access denied: {0}")]
    Forbidden(String),
    #[error("filesystem error: {0}")]
    Filesystem(io::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("index error: {0}")]
    Index(#[from] tantivy::TantivyError),
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
    #[error("hash error: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied { path: path.into() }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::PermissionDenied { .. } | Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Filesystem(_)
            | Self::Database(_)
            | Self::Index(_)
            | Self::Archive(_)
            | Self::Watch(_)
            | Self::Hash(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound {
                path: err.to_string(),
            },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: err.to_string(),
            },
            _ => Self::Filesystem(err),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }

        let body = match &self {
            Self::NotFound { path } => json!({
                "error": "not_found",
                "message": self.to_string(),
                "path": path,
            }),
            Self::PermissionDenied { path } => json!({
                "error": "permission_denied",
                "message": self.to_string(),
                "path": path,
            }),
            _ => json!({
                "error": status.canonical_reason().unwrap_or("error"),
                "message": self.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_not_found() {
        let err: Error = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn io_permission_denied_maps_to_forbidden() {
        let err: Error = io::Error::new(io::ErrorKind::PermissionDenied, "nope").into();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn invalid_input_is_bad_request() {
        assert_eq!(
            Error::invalid_input("bad header").status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn unauthorized_is_401() {
        assert_eq!(
            Error::unauthorized("no token").status_code(),
            StatusCode::UNAUTHORIZED
        );
    }
}
