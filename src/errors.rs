//! Error types for GcsUpload
//!
//! Provides structured error handling using thiserror for every failure the
//! provider can report: size validation, descriptor problems, configuration
//! errors and pass-through errors from the object store client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main error type for GcsUpload operations
#[derive(Error, Debug)]
pub enum UploadError {
    /// File is larger than the caller-supplied limit
    #[error("File size {size} exceeds the limit of {limit} bytes")]
    SizeLimitExceeded { size: u64, limit: u64 },

    /// Descriptor has no content hash to build a key from
    #[error("File descriptor has an empty hash")]
    MissingHash,

    /// Computed key cannot be stored verbatim
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Storage backend operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] object_store::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl UploadError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            UploadError::SizeLimitExceeded { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "SizeLimitExceeded")
            }
            UploadError::MissingHash => (StatusCode::BAD_REQUEST, "MissingHash"),
            UploadError::InvalidKey(_) => (StatusCode::BAD_REQUEST, "InvalidKey"),
            UploadError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "InvalidRequest"),
            UploadError::Storage(object_store::Error::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, "NotFound")
            }
            UploadError::Storage(object_store::Error::InvalidPath { .. }) => {
                (StatusCode::BAD_REQUEST, "InvalidKey")
            }
            UploadError::Storage(object_store::Error::NotImplemented) => {
                (StatusCode::NOT_IMPLEMENTED, "NotImplemented")
            }
            UploadError::Storage(_) => (StatusCode::BAD_GATEWAY, "StorageError"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = json!({
            "error": code,
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, UploadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_limit_maps_to_413() {
        let err = UploadError::SizeLimitExceeded { size: 100, limit: 50 };
        assert_eq!(err.to_string(), "File size 100 exceeds the limit of 50 bytes");
        assert_eq!(err.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_storage_not_found_maps_to_404() {
        let err = UploadError::Storage(object_store::Error::NotFound {
            path: "a/b.png".to_string(),
            source: "missing".into(),
        });
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_key_maps_to_400() {
        let err = UploadError::InvalidKey("/sub/h.png".to_string());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_missing_hash_maps_to_400() {
        assert_eq!(
            UploadError::MissingHash.into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
