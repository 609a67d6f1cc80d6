//! Escalation engine: the level sequencing core.
//!
//! Drives up to three strictly sequential remediation levels, each gated
//! by a fresh verifier run:
//!
//! ```text
//! run(unit)
//!   → Level 1: conservative whole-unit pass        → reverify → gate
//!   → Level 2: per-issue slice (+summary > N)      → reverify → gate
//!   → Level 3: per-issue context + narrative       → reverify → done
//! ```
//!
//! Invariants enforced here:
//! - Level k+1 runs iff the verifier reports outstanding issues
//!   immediately after level k completes; the engine never regresses.
//! - A level's issue list is fetched fresh immediately before its loop
//!   begins, never reused from an earlier capture.
//! - A verifier hard fault aborts the entire run; it is never read as
//!   "no issues".
//! - `ExhaustedRetries` mid-loop aborts the run without touching the
//!   remaining issues in that level (fail-fast, no rollback of already
//!   applied annotations).

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::collaborators::{ContextProvider, Slicer, Verifier};
use crate::error::WorkflowError;
use crate::model::{Level, LevelReport, WorkflowReport};
use crate::prompts;
use crate::strategy::{Strategy, Summarizer};

/// The three strategy variants, one per level.
pub struct StrategySet {
    pub conservative: Strategy,
    pub semantic_deep: Strategy,
    pub aggressive: Strategy,
}

/// The engine's only durable state during a run. Created at workflow
/// start, mutated level-by-level, discarded at completion. Single-shot,
/// not resumable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub current_level: Level,
    pub issues_remain: bool,
}

impl WorkflowState {
    fn new() -> Self {
        Self {
            current_level: Level::Conservative,
            issues_remain: true,
        }
    }
}

/// Drives the escalation sequence over one unit of problematic code.
pub struct EscalationEngine {
    verifier: Arc<dyn Verifier>,
    slicer: Arc<dyn Slicer>,
    context: Arc<dyn ContextProvider>,
    strategies: StrategySet,
    summarizer: Summarizer,
    /// Slice size above which a summary is generated before annotation.
    summary_threshold: usize,
}

impl EscalationEngine {
    pub fn new(
        verifier: Arc<dyn Verifier>,
        slicer: Arc<dyn Slicer>,
        context: Arc<dyn ContextProvider>,
        strategies: StrategySet,
        summarizer: Summarizer,
        summary_threshold: usize,
    ) -> Self {
        Self {
            verifier,
            slicer,
            context,
            strategies,
            summarizer,
            summary_threshold,
        }
    }

    /// Execute the workflow: level 1 unconditionally, levels 2 and 3 only
    /// while the verifier keeps reporting outstanding issues.
    pub async fn run(&self, unit: &str) -> Result<WorkflowReport, WorkflowError> {
        let started_at = Utc::now();
        let mut state = WorkflowState::new();
        let mut levels = Vec::new();

        info!(
            prompt_version = prompts::PROMPT_VERSION,
            unit_len = unit.len(),
            "annotation workflow starting"
        );

        state.issues_remain = self.level_one(unit, &mut levels).await?;

        if state.issues_remain {
            state.current_level = Level::ContextAssisted;
            state.issues_remain = self.level_two(&mut levels).await?;
        }

        if state.issues_remain {
            state.current_level = Level::Aggressive;
            state.issues_remain = self.level_three(&mut levels).await?;
        }

        let report = WorkflowReport {
            levels,
            resolved: !state.issues_remain,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            resolved = report.resolved,
            highest_level = report.highest_level().map(|l| l.number()),
            "annotation workflow completed"
        );
        Ok(report)
    }

    /// Level 1: one conservative whole-unit pass. The current findings are
    /// embedded in the prompt so refactors are driven by reported
    /// diagnostics, not just code shape.
    async fn level_one(
        &self,
        unit: &str,
        levels: &mut Vec<LevelReport>,
    ) -> Result<bool, WorkflowError> {
        info!("level 1: conservative whole-unit annotation pass");
        let mut report = LevelReport::begin(Level::Conservative);

        let findings = self.check_fault(Level::Conservative, self.verifier.enumerate_issues().await)?;
        report.attempted = findings.iter().map(|i| i.id.clone()).collect();

        let task = prompts::unit_with_findings(unit, &findings);
        let remediation = match self.strategies.conservative.apply(&task, None, None).await {
            Ok(r) => r,
            Err(e) => return Self::abort(Level::Conservative, None, e),
        };
        report.strategy_calls = 1;
        if remediation.is_noop(unit) {
            report.no_op_results = 1;
            info!("no safe whole-unit annotation found");
        } else {
            info!(
                attempts = remediation.attempts,
                annotated_len = remediation.annotated_code.len(),
                "whole-unit annotations produced"
            );
        }

        report.issues_remaining = self.gate(Level::Conservative).await?;
        let remaining = report.issues_remaining;
        levels.push(report);
        Ok(remaining)
    }

    /// Level 2: per outstanding issue, slice and annotate with preserved
    /// semantics; oversized slices are summarized first.
    async fn level_two(&self, levels: &mut Vec<LevelReport>) -> Result<bool, WorkflowError> {
        info!("level 2: context-assisted per-issue pass");
        let mut report = LevelReport::begin(Level::ContextAssisted);

        let issues = self.check_fault(
            Level::ContextAssisted,
            self.verifier.enumerate_issues().await,
        )?;
        info!(outstanding = issues.len(), "level 2 issue loop starting");

        for issue in &issues {
            let slice = match self.slicer.slice_around(issue).await {
                Ok(s) => s,
                Err(e) => return Self::abort(Level::ContextAssisted, Some(&issue.id), e),
            };

            let summary = if slice.chars().count() > self.summary_threshold {
                match self.summarizer.summarize(&slice).await {
                    Ok(s) => Some(s),
                    Err(e) => return Self::abort(Level::ContextAssisted, Some(&issue.id), e),
                }
            } else {
                None
            };

            let remediation = match self
                .strategies
                .semantic_deep
                .apply(&slice, summary.as_deref(), None)
                .await
            {
                Ok(r) => r,
                Err(e) => return Self::abort(Level::ContextAssisted, Some(&issue.id), e),
            };
            report.attempted.push(issue.id.clone());
            report.strategy_calls += 1;
            if remediation.is_noop(&slice) {
                report.no_op_results += 1;
                info!(issue = %issue.id, "no safe annotation found for slice");
            } else {
                info!(
                    issue = %issue.id,
                    summarized = summary.is_some(),
                    "annotations applied to code slice"
                );
            }
        }

        report.issues_remaining = self.gate(Level::ContextAssisted).await?;
        let remaining = report.issues_remaining;
        levels.push(report);
        Ok(remaining)
    }

    /// Level 3: per outstanding issue, derive deep context and a solution
    /// narrative, then invoke the aggressive strategy.
    async fn level_three(&self, levels: &mut Vec<LevelReport>) -> Result<bool, WorkflowError> {
        info!("level 3: aggressive search-assisted pass");
        let mut report = LevelReport::begin(Level::Aggressive);

        let issues =
            self.check_fault(Level::Aggressive, self.verifier.enumerate_issues().await)?;
        info!(outstanding = issues.len(), "level 3 issue loop starting");

        for issue in &issues {
            let context = match self.context.derive_context(issue).await {
                Ok(c) => c,
                Err(e) => return Self::abort(Level::Aggressive, Some(&issue.id), e),
            };
            let narrative = match self.context.solutions_for(&context).await {
                Ok(n) => n,
                Err(e) => return Self::abort(Level::Aggressive, Some(&issue.id), e),
            };

            let remediation = match self
                .strategies
                .aggressive
                .apply(
                    &issue.code_segment,
                    Some(&context.narrative),
                    Some(&narrative),
                )
                .await
            {
                Ok(r) => r,
                Err(e) => return Self::abort(Level::Aggressive, Some(&issue.id), e),
            };
            report.attempted.push(issue.id.clone());
            report.strategy_calls += 1;
            if remediation.is_noop(&issue.code_segment) {
                report.no_op_results += 1;
                info!(issue = %issue.id, "aggressive strategy found no fix");
            } else {
                info!(issue = %issue.id, "aggressive annotations applied");
            }
        }

        report.issues_remaining = self.gate(Level::Aggressive).await?;
        let remaining = report.issues_remaining;
        levels.push(report);
        Ok(remaining)
    }

    /// The gating verifier run after a level: reverify, then read whether
    /// issues remain. A fault here aborts the run.
    async fn gate(&self, level: Level) -> Result<bool, WorkflowError> {
        self.check_fault(level, self.verifier.reverify().await)?;
        let remaining = self.check_fault(level, self.verifier.has_outstanding_issues().await)?;
        info!(level = %level, issues_remaining = remaining, "verifier gate");
        Ok(remaining)
    }

    /// Annotate and propagate a verifier fault. The fault is never
    /// interpreted as "no issues".
    fn check_fault<T>(&self, level: Level, result: Result<T, WorkflowError>) -> Result<T, WorkflowError> {
        result.map_err(|e| {
            error!(level = %level, error = %e, "verifier fault, aborting run");
            e
        })
    }

    /// Log a fatal error with the level and issue that triggered it, then
    /// abort. No partial rollback of annotations applied earlier in the
    /// level.
    fn abort<T>(level: Level, issue: Option<&str>, e: WorkflowError) -> Result<T, WorkflowError> {
        error!(
            level = %level,
            issue = issue.unwrap_or("-"),
            error = %e,
            "fatal error, aborting workflow run"
        );
        Err(e)
    }
}
