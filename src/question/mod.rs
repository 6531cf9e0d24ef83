//! Follow-up question subsystem
//!
//! Given the parent a new node is attached to, produce a short question that
//! prompts the user to decompose further:
//! - `validate`: normalization and usability rules (pure)
//! - `prompt`: oracle prompt builders (pure)
//! - `fallback`: deterministic oracle-free chooser
//! - `orchestrator`: context → oracle → validate/repair → fallback

pub mod error;
pub mod fallback;
pub mod orchestrator;
pub mod prompt;
pub mod validate;

pub use error::{OracleError, QuestionError};
pub use fallback::FallbackChooser;
pub use orchestrator::{
    FallbackReason, OrchestratorConfig, QuestionMode, QuestionOrchestrator, QuestionOutcome,
    QuestionSource,
};
