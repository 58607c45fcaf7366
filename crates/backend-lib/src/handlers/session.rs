// ============================
// crates/backend-lib/src/handlers/session.rs
// ============================
//! Load, save and delete of a session by id.
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use livepad_common::{DeleteResponse, LoadResponse, SaveResponse};
use tracing::debug;

use crate::error::AppError;
use crate::persistence::SaveOutcome;
use crate::validation::validate_session_id;
use crate::AppState;

/// `GET /editor/load/{id}`: resident text, hydrated from storage if empty.
/// Creates the session when it is not resident.
pub async fn load_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LoadResponse>, AppError> {
    validate_session_id(&id)?;
    let content = state.cache.load_session(&id).await;
    Ok(Json(LoadResponse {
        success: true,
        content,
    }))
}

/// `POST /editor/save/{id}`: save the resident text now.
///
/// Only an absent or blank session reports failure; storage failures are
/// logged by the gateway and the request still succeeds.
pub async fn save_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SaveResponse>, AppError> {
    validate_session_id(&id)?;
    match state.cache.persist(&id).await {
        Ok(outcome) => {
            if outcome != SaveOutcome::Persisted {
                debug!(session_id = %id, ?outcome, "explicit save not persisted");
            }
            Ok(Json(SaveResponse {
                success: true,
                error: None,
            }))
        },
        Err(AppError::NoContent) => Ok(Json(SaveResponse {
            success: false,
            error: Some(AppError::NoContent.to_string()),
        })),
        Err(e) => Err(e),
    }
}

/// `DELETE /editor/delete/{id}`: drop from memory and storage. Idempotent.
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    validate_session_id(&id)?;
    state.cache.delete(&id).await;
    Ok(Json(DeleteResponse { success: true }))
}
