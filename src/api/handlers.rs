//! Shared API state, error type and service handlers

use crate::question::QuestionMode;
use crate::tree::{NodeManager, TreeError};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// State shared by every handler
pub struct ServerState {
    pub manager: Arc<NodeManager>,
    /// Model of the configured oracle; None means fallback-only
    pub oracle_model: Option<String>,
    pub question_mode: QuestionMode,
}

pub type AppState = Arc<ServerState>;

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oracle: Option<String>,
    pub question_mode: QuestionMode,
}

/// Health check. The service has no hard dependency, so it is always "ok";
/// the response reports whether questions come from an oracle.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        oracle: state.oracle_model.clone(),
        question_mode: state.question_mode,
    })
}

/// `{"ok": true}` acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Json<Self> {
        Json(Self { ok: true })
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Application error type
#[derive(Debug)]
pub enum AppError {
    Internal(anyhow::Error),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<TreeError> for AppError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::InvalidTitle
            | TreeError::InvalidContent
            | TreeError::InvalidLabel
            | TreeError::InvalidOrderIndex(_)
            | TreeError::ParentNotFound(_) => AppError::BadRequest(err.to_string()),
            TreeError::InvalidReorder(_) | TreeError::OrderIndexTaken(_) => {
                AppError::Conflict(err.to_string())
            }
            TreeError::ProjectNotFound(_)
            | TreeError::NodeNotFound(_)
            | TreeError::EdgeNotFound(_) => AppError::NotFound(err.to_string()),
            TreeError::Store(e) => AppError::Internal(e),
        }
    }
}
