//! QuestionOracle trait definition
//!
//! Abstract interface for the external text-generation capability that drafts
//! follow-up questions. Same shape as the store traits: async trait +
//! Send + Sync so it can be shared as `Arc<dyn QuestionOracle>`.

use crate::question::validate::normalize;
use crate::question::OracleError;
use async_trait::async_trait;

/// External text-generation capability.
///
/// The oracle is untrusted: its output is always normalized and validated by
/// the caller, and every error is absorbed into the deterministic fallback.
///
/// # Implementations
///
/// - [`GeminiOracle`](super::GeminiOracle): Gemini `generateContent` over HTTP
/// - [`ScriptedOracle`](super::ScriptedOracle): queued replies for tests
#[async_trait]
pub trait QuestionOracle: Send + Sync {
    /// Produce free text for a prompt.
    ///
    /// # Errors
    ///
    /// `Unavailable` for transport and API failures, `MalformedResponse` when
    /// the reply carries no usable text.
    async fn generate(&self, prompt: &str) -> Result<String, OracleError>;

    /// Pick one of `candidates` for a prompt and return it verbatim.
    ///
    /// The default implementation generates free text and accepts it only if
    /// its normalized form equals one of the normalized candidates. An answer
    /// outside the set is a `MalformedResponse`, never coerced.
    async fn select(&self, prompt: &str, candidates: &[String]) -> Result<String, OracleError> {
        if candidates.is_empty() {
            return Err(OracleError::MalformedResponse(
                "no candidates to select from".to_string(),
            ));
        }
        let raw = self.generate(prompt).await?;
        let answer = normalize(strip_enumeration(raw.trim()));
        candidates
            .iter()
            .find(|c| normalize(c) == answer)
            .cloned()
            .ok_or_else(|| {
                OracleError::MalformedResponse(format!("answer outside candidate set: {}", raw))
            })
    }

    /// Model identifier, for logs.
    fn model_name(&self) -> &str;
}

/// Drop a leading "1. " / "2) " that models like to echo from numbered lists
fn strip_enumeration(text: &str) -> &str {
    let digits = text.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return text;
    }
    let rest = &text[digits..];
    match rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
        Some(stripped) => stripped.trim_start(),
        None => text,
    }
}
