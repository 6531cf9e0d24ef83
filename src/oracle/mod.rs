//! Question oracle module
//!
//! External text generation used to draft follow-up questions.
//!
//! Architecture follows the project pattern (trait + impl + mock):
//! - `QuestionOracle` trait: async generate / select interface
//! - `GeminiOracle`: Gemini `generateContent` over HTTP
//! - `ScriptedOracle`: queued replies for tests

pub mod gemini;
pub mod mock;
pub mod traits;

pub use gemini::GeminiOracle;
pub use mock::ScriptedOracle;
pub use traits::QuestionOracle;
