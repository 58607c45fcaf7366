// crates/backend-lib/src/error.rs

//! Central error types + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;

use crate::validation::ValidationError;

/// Failures of the compress/encrypt pipeline
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("compression failed: {0}")]
    Compress(std::io::Error),

    #[error("decompression failed: {0}")]
    Decompress(std::io::Error),

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed")]
    Decrypt,

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("blob too short: {len} bytes")]
    Truncated { len: usize },

    #[error("decoded text is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Failures of the durable store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt record content: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("storage call timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors surfaced to HTTP and WebSocket clients.
///
/// Storage and codec failures never reach this type; the persistence
/// gateway logs and absorbs them.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("No content to save")]
    NoContent,

    #[error("Server is shutting down")]
    ShuttingDown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(ValidationError::DocumentTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            },
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NoContent => StatusCode::NOT_FOUND,
            AppError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(ValidationError::InvalidSessionId(_)) => "VAL_001",
            AppError::Validation(ValidationError::DocumentTooLarge { .. }) => "VAL_002",
            AppError::NoContent => "DOC_001",
            AppError::ShuttingDown => "SRV_001",
            AppError::Internal(_) => "INT_001",
        }
    }

    /// Code carried by `error` frames on the WebSocket
    pub fn wire_code(&self) -> &'static str {
        match self {
            AppError::Validation(ValidationError::InvalidSessionId(_)) => "INVALID_SESSION_ID",
            AppError::Validation(ValidationError::DocumentTooLarge { .. }) => "DOCUMENT_TOO_LARGE",
            AppError::ShuttingDown => "SHUTTING_DOWN",
            AppError::NoContent | AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::Validation(ValidationError::InvalidSessionId(_)) => {
                "Invalid session identifier".to_string()
            },
            AppError::Validation(ValidationError::DocumentTooLarge { .. }) => {
                "Document too large".to_string()
            },
            AppError::NoContent => "No content to save".to_string(),
            AppError::ShuttingDown => "Server is shutting down".to_string(),
            AppError::Internal(_) => "An internal server error occurred".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_app_error_display() {
        assert_eq!(AppError::NoContent.to_string(), "No content to save");

        let invalid = AppError::from(ValidationError::InvalidSessionId("empty".to_string()));
        assert!(invalid.to_string().contains("Invalid session ID"));
    }

    #[test]
    fn test_storage_error_display() {
        let io = StorageError::from(IoError::new(ErrorKind::NotFound, "File not found"));
        assert!(io.to_string().contains("IO error"));

        let timeout = StorageError::Timeout(Duration::from_millis(250));
        assert!(timeout.to_string().contains("timed out"));
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(AppError::NoContent.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::ShuttingDown.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Validation(ValidationError::InvalidSessionId("".to_string())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Validation(ValidationError::DocumentTooLarge { size: 10, limit: 5 })
                .status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            AppError::Internal("unknown connection".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_app_error_error_codes() {
        assert_eq!(
            AppError::Validation(ValidationError::InvalidSessionId("".to_string())).error_code(),
            "VAL_001"
        );
        assert_eq!(AppError::NoContent.error_code(), "DOC_001");
        assert_eq!(AppError::ShuttingDown.error_code(), "SRV_001");
        assert_eq!(AppError::Internal("x".to_string()).error_code(), "INT_001");
    }

    #[test]
    fn test_wire_codes() {
        assert_eq!(
            AppError::Validation(ValidationError::DocumentTooLarge { size: 10, limit: 5 }).wire_code(),
            "DOCUMENT_TOO_LARGE"
        );
        assert_eq!(AppError::ShuttingDown.wire_code(), "SHUTTING_DOWN");
        assert_eq!(AppError::NoContent.wire_code(), "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn test_error_serialization() {
        let response = AppError::NoContent.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let content_type = response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(content_type.contains("application/json"));
    }
}
