//! Remediation strategies: one shared contract, three capability variants.
//!
//! All three variants expose `apply(code, context?, narrative?)`. They are
//! a tagged variant, not subclasses: callers branch on which optional
//! inputs a kind consumes, never on overridden behavior.
//!
//! | Kind         | Level | Consumes            | Semantics preserved |
//! |--------------|-------|---------------------|---------------------|
//! | Conservative | 1     | code only           | yes                 |
//! | SemanticDeep | 2     | code + context      | yes                 |
//! | Aggressive   | 3     | code + context + narrative | no           |

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::collaborators::{ChatModel, PromptBlock};
use crate::error::WorkflowError;
use crate::model::Level;
use crate::prompts;
use crate::retry::{call_with_retry, RetryPolicy};

/// Which strategy variant an invocation used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Conservative,
    SemanticDeep,
    Aggressive,
}

impl StrategyKind {
    pub fn level(self) -> Level {
        match self {
            Self::Conservative => Level::Conservative,
            Self::SemanticDeep => Level::ContextAssisted,
            Self::Aggressive => Level::Aggressive,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::SemanticDeep => "semantic_deep",
            Self::Aggressive => "aggressive",
        }
    }

    /// Level 3 is explicitly permitted to alter behavior.
    pub fn preserves_semantics(self) -> bool {
        !matches!(self, Self::Aggressive)
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one strategy invocation. Ephemeral; consumed immediately by
/// the apply/verify step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Remediation {
    pub annotated_code: String,
    pub strategy: StrategyKind,
    /// Attempts the generative call took, including retries.
    pub attempts: u32,
}

impl Remediation {
    /// Empty or unchanged output signals "no safe annotation found".
    /// Not a failure.
    pub fn is_noop(&self, original: &str) -> bool {
        let out = self.annotated_code.trim();
        out.is_empty() || out == original.trim()
    }
}

/// A remediation strategy: a variant tag, a generative collaborator, and
/// the uniform retry policy for its calls. Stateless per invocation.
pub struct Strategy {
    kind: StrategyKind,
    model: Arc<dyn ChatModel>,
    retry: RetryPolicy,
}

impl Strategy {
    pub fn new(kind: StrategyKind, model: Arc<dyn ChatModel>, retry: RetryPolicy) -> Self {
        Self { kind, model, retry }
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    /// Shared contract across the three variants.
    ///
    /// `context` and `narrative` are optional supporting material; which
    /// of them the variant consumes depends on `kind` (see module docs).
    /// Transient call failures are retried up to the policy bound;
    /// exceeding it surfaces `ExhaustedRetries` to the engine.
    pub async fn apply(
        &self,
        code: &str,
        context: Option<&str>,
        narrative: Option<&str>,
    ) -> Result<Remediation, WorkflowError> {
        let blocks = self.build_blocks(code, context, narrative);
        let attempts = AtomicU32::new(0);
        let raw = call_with_retry(self.retry, self.kind.as_str(), || {
            attempts.fetch_add(1, Ordering::Relaxed);
            let blocks = blocks.clone();
            async move { self.model.respond(&blocks).await }
        })
        .await?;

        Ok(Remediation {
            annotated_code: parse_response(&raw),
            strategy: self.kind,
            attempts: attempts.load(Ordering::Relaxed),
        })
    }

    fn build_blocks(
        &self,
        code: &str,
        context: Option<&str>,
        narrative: Option<&str>,
    ) -> Vec<PromptBlock> {
        match self.kind {
            StrategyKind::Conservative => prompts::conservative_blocks(code),
            StrategyKind::SemanticDeep => prompts::semantic_deep_blocks(code, context),
            StrategyKind::Aggressive => prompts::aggressive_blocks(
                code,
                context.unwrap_or(""),
                narrative.unwrap_or(""),
            ),
        }
    }
}

/// Summarizes oversized code slices before they reach the level 2 strategy.
pub struct Summarizer {
    model: Arc<dyn ChatModel>,
    retry: RetryPolicy,
}

impl Summarizer {
    pub fn new(model: Arc<dyn ChatModel>, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    pub async fn summarize(&self, slice: &str) -> Result<String, WorkflowError> {
        let blocks = prompts::summarize_blocks(slice);
        let raw = call_with_retry(self.retry, "summarizer", || {
            let blocks = blocks.clone();
            async move { self.model.respond(&blocks).await }
        })
        .await?;
        Ok(raw.trim().to_string())
    }
}

/// Extract annotated code from a model response: the first fenced block if
/// present, otherwise the trimmed text.
fn parse_response(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        // Skip an optional language tag line.
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(end) = body.find("```") {
            return body[..end].trim().to_string();
        }
    }
    trimmed.to_string()
}
