//! Question orchestration
//!
//! One run per node creation with a parent:
//! gather context → oracle (generate, or select) → normalize/validate →
//! at most one repair call → deterministic fallback.
//!
//! Oracle failures never reach the caller. The only error surfaced is
//! `ParentNotFound` (or a store failure while reading the snapshot).

use crate::oracle::QuestionOracle;
use crate::question::error::{OracleError, QuestionError};
use crate::question::fallback::FallbackChooser;
use crate::question::prompt::{build_question_prompt, build_repair_prompt, build_selection_prompt};
use crate::question::validate::{check_question, normalize};
use crate::tree::context::TreeContext;
use crate::tree::traits::TreeStore;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default budget for all oracle calls of one run
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(8000);

/// How the oracle is asked for a question
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionMode {
    /// Free-text generation with one repair round-trip
    #[default]
    Generate,
    /// Pick one of the fallback candidates, no repair
    Select,
}

impl FromStr for QuestionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "generate" => Ok(Self::Generate),
            "select" => Ok(Self::Select),
            other => Err(format!("unknown question mode: {}", other)),
        }
    }
}

/// Orchestrator settings
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub mode: QuestionMode,
    /// Shared budget for the initial and repair calls
    pub timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mode: QuestionMode::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Why a run ended in the fallback chooser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    NoOracle,
    OracleFailed,
    Rejected,
    Cancelled,
}

/// Where the final question came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum QuestionSource {
    Generated,
    Repaired,
    Selected,
    Fallback(FallbackReason),
}

/// Result of one orchestration run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question: String,
    pub source: QuestionSource,
    /// Oracle calls issued during the run (0..=2)
    pub oracle_calls: usize,
}

/// Coordinates context reading, the oracle and the fallback chooser.
pub struct QuestionOrchestrator {
    store: Arc<dyn TreeStore>,
    oracle: Option<Arc<dyn QuestionOracle>>,
    fallback: FallbackChooser,
    config: OrchestratorConfig,
}

impl QuestionOrchestrator {
    /// Create an orchestrator. `oracle == None` means fallback only.
    pub fn new(
        store: Arc<dyn TreeStore>,
        oracle: Option<Arc<dyn QuestionOracle>>,
        fallback: FallbackChooser,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            oracle,
            fallback,
            config,
        }
    }

    /// Question for a new child of `parent_id` in `project_id`.
    ///
    /// Returns `Ok(None)` when there is no parent (a new root gets no question).
    pub async fn question_for_child(
        &self,
        project_id: Uuid,
        parent_id: Option<Uuid>,
        cancel: &CancellationToken,
    ) -> Result<Option<QuestionOutcome>, QuestionError> {
        let Some(parent_id) = parent_id else {
            return Ok(None);
        };

        let snapshot = self.store.snapshot(project_id).await?;
        let ctx = TreeContext::from_snapshot(&snapshot, parent_id)?;
        Ok(Some(self.resolve(&ctx, cancel).await))
    }

    /// Produce a question for an already gathered context. Never fails.
    pub async fn resolve(&self, ctx: &TreeContext, cancel: &CancellationToken) -> QuestionOutcome {
        let Some(oracle) = self.oracle.as_deref() else {
            return self.fall_back(ctx, FallbackReason::NoOracle, 0);
        };
        if cancel.is_cancelled() {
            return self.fall_back(ctx, FallbackReason::Cancelled, 0);
        }

        let deadline = Instant::now() + self.config.timeout;
        match self.config.mode {
            QuestionMode::Generate => self.generate_with_repair(oracle, ctx, deadline, cancel).await,
            QuestionMode::Select => self.select(oracle, ctx, deadline, cancel).await,
        }
    }

    async fn generate_with_repair(
        &self,
        oracle: &dyn QuestionOracle,
        ctx: &TreeContext,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> QuestionOutcome {
        let prompt = build_question_prompt(ctx);
        let raw = match self.bounded(oracle.generate(&prompt), deadline, cancel).await {
            Ok(raw) => raw,
            Err(e) => return self.oracle_failed(ctx, e, 1),
        };

        let question = normalize(&raw);
        match check_question(&question, &ctx.parent, &ctx.ancestors, &ctx.siblings) {
            Ok(()) => {
                debug!(model = oracle.model_name(), question = %question, "oracle question accepted");
                return QuestionOutcome {
                    question,
                    source: QuestionSource::Generated,
                    oracle_calls: 1,
                };
            }
            Err(rejection) => {
                debug!(raw = %raw, %rejection, "oracle question rejected, repairing");
            }
        }

        let prompt = build_repair_prompt(&raw, ctx);
        let repaired = match self.bounded(oracle.generate(&prompt), deadline, cancel).await {
            Ok(raw) => normalize(&raw),
            Err(e) => return self.oracle_failed(ctx, e, 2),
        };

        match check_question(&repaired, &ctx.parent, &ctx.ancestors, &ctx.siblings) {
            Ok(()) => {
                debug!(question = %repaired, "repaired question accepted");
                QuestionOutcome {
                    question: repaired,
                    source: QuestionSource::Repaired,
                    oracle_calls: 2,
                }
            }
            Err(rejection) => {
                warn!(question = %repaired, %rejection, "repaired question rejected");
                self.fall_back(ctx, FallbackReason::Rejected, 2)
            }
        }
    }

    async fn select(
        &self,
        oracle: &dyn QuestionOracle,
        ctx: &TreeContext,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> QuestionOutcome {
        let candidates = self
            .fallback
            .selection_candidates(&ctx.parent.content, &ctx.siblings);
        let prompt = build_selection_prompt(ctx, &candidates);
        let chosen = match self
            .bounded(oracle.select(&prompt, &candidates), deadline, cancel)
            .await
        {
            Ok(chosen) => normalize(&chosen),
            Err(e) => return self.oracle_failed(ctx, e, 1),
        };

        match check_question(&chosen, &ctx.parent, &ctx.ancestors, &ctx.siblings) {
            Ok(()) => {
                debug!(model = oracle.model_name(), question = %chosen, "oracle selection accepted");
                QuestionOutcome {
                    question: chosen,
                    source: QuestionSource::Selected,
                    oracle_calls: 1,
                }
            }
            Err(rejection) => {
                warn!(question = %chosen, %rejection, "selected question rejected");
                self.fall_back(ctx, FallbackReason::Rejected, 1)
            }
        }
    }

    /// Run one oracle call against the shared deadline and the caller's token.
    async fn bounded<F>(
        &self,
        call: F,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<String, OracleError>
    where
        F: Future<Output = Result<String, OracleError>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(OracleError::Cancelled),
            result = tokio::time::timeout_at(deadline, call) => match result {
                Ok(inner) => inner,
                Err(_) => Err(OracleError::Timeout(self.config.timeout)),
            },
        }
    }

    fn oracle_failed(&self, ctx: &TreeContext, error: OracleError, calls: usize) -> QuestionOutcome {
        let reason = match error {
            OracleError::Cancelled => FallbackReason::Cancelled,
            _ => FallbackReason::OracleFailed,
        };
        warn!(error = %error, calls, "oracle call failed, using fallback");
        self.fall_back(ctx, reason, calls)
    }

    fn fall_back(&self, ctx: &TreeContext, reason: FallbackReason, calls: usize) -> QuestionOutcome {
        let question = self.fallback.choose(&ctx.parent.content, &ctx.siblings);
        debug!(?reason, question = %question, "fallback question chosen");
        QuestionOutcome {
            question,
            source: QuestionSource::Fallback(reason),
            oracle_calls: calls,
        }
    }
}
