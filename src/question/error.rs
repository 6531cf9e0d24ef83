//! Error kinds of the question subsystem

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Failures of one oracle call. All of them are absorbed by the orchestrator.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
    #[error("oracle timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed oracle response: {0}")]
    MalformedResponse(String),
    #[error("oracle call cancelled")]
    Cancelled,
}

/// Errors surfaced to the caller of the question subsystem.
#[derive(Debug, Error)]
pub enum QuestionError {
    /// The caller referenced a parent that is not in the project's tree
    #[error("parent node not found: {0}")]
    ParentNotFound(Uuid),
    /// The tree snapshot could not be read
    #[error("failed to read tree snapshot: {0}")]
    Store(#[from] anyhow::Error),
}
