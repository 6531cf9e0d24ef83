//! Scripted oracle for tests
//!
//! Replies are consumed in order; an exhausted script answers `Unavailable`.
//! Every prompt is recorded so tests can assert on call counts and contents.

use super::traits::QuestionOracle;
use crate::question::OracleError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Oracle that plays back a fixed list of replies.
///
/// # Example
///
/// ```rust
/// use mokuhyo_server::oracle::{QuestionOracle, ScriptedOracle};
///
/// # tokio_test::block_on(async {
/// let oracle = ScriptedOracle::new().with_reply("なぜ？");
/// assert_eq!(oracle.generate("prompt").await.unwrap(), "なぜ？");
///
/// // Script exhausted
/// assert!(oracle.generate("prompt").await.is_err());
/// assert_eq!(oracle.calls(), 2);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Result<String, OracleError>>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    /// Queue a failure.
    pub fn with_error(self, error: OracleError) -> Self {
        self.push(Err(error));
        self
    }

    /// Sleep this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls received so far
    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Prompts received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn push(&self, reply: Result<String, OracleError>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }
}

#[async_trait]
impl QuestionOracle for ScriptedOracle {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .unwrap_or_else(|| Err(OracleError::Unavailable("script exhausted".to_string())))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
