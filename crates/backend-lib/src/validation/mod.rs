// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Edge validation of session ids and document payloads.

use livepad_common::ClientMessage;
use thiserror::Error;

/// Longest session id accepted from clients
const MAX_SESSION_ID_LENGTH: usize = 128;

/// Possible validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid session ID: {0}")]
    InvalidSessionId(String),

    #[error("Document of {size} bytes exceeds the {limit} byte limit")]
    DocumentTooLarge { size: usize, limit: usize },
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate an opaque session id.
///
/// Ids are not interpreted, only bounded: non-empty, at most
/// `MAX_SESSION_ID_LENGTH` characters and free of control characters.
pub fn validate_session_id(session_id: &str) -> ValidationResult<&str> {
    if session_id.is_empty() {
        return Err(ValidationError::InvalidSessionId(
            "Session ID must not be empty".to_string(),
        ));
    }

    if session_id.chars().count() > MAX_SESSION_ID_LENGTH {
        return Err(ValidationError::InvalidSessionId(format!(
            "Session ID cannot exceed {MAX_SESSION_ID_LENGTH} characters"
        )));
    }

    if session_id.chars().any(char::is_control) {
        return Err(ValidationError::InvalidSessionId(
            "Session ID contains control characters".to_string(),
        ));
    }

    Ok(session_id)
}

/// Validate the size of a full document text
pub fn validate_document_size(content: &str, limit: usize) -> ValidationResult<&str> {
    if content.len() > limit {
        return Err(ValidationError::DocumentTooLarge {
            size: content.len(),
            limit,
        });
    }
    Ok(content)
}

/// Validate a client message against the configured document bound
pub fn validate_client_message(message: &ClientMessage, max_document_bytes: usize) -> ValidationResult<()> {
    match message {
        ClientMessage::JoinEditor { session_id } => {
            validate_session_id(session_id)?;
        },
        ClientMessage::ContentChange { content } => {
            validate_document_size(content, max_document_bytes)?;
        },
        ClientMessage::LeaveEditor => {},
    }
    Ok(())
}
