//! Training feedback loop for the aggressive strategy.
//!
//! Each pass walks the verifier's outstanding issues, invokes the
//! aggressive strategy per issue, reverifies, and records a
//! `(slice, context, output, remaining issues)` sample. The accumulated
//! corpus is handed to the tuner once per pass. Samples are recorded for
//! failed fixes too; negative examples carry signal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info};

use crate::collaborators::{ContextProvider, Slicer, Tuner, Verifier};
use crate::error::WorkflowError;
use crate::model::TrainingSample;
use crate::strategy::Strategy;

/// Stand-in solution narrative during training passes. Training exercises
/// the context-driven path without a per-issue solution search.
const TRAINING_NARRATIVE: &str =
    "Training pass: no prior solution research available for this finding.";

/// Accumulates training samples across passes and drives the tuner.
///
/// The corpus grows monotonically for the lifetime of the session; a
/// sample is never removed once recorded.
pub struct TrainingSession {
    verifier: Arc<dyn Verifier>,
    slicer: Arc<dyn Slicer>,
    context: Arc<dyn ContextProvider>,
    strategy: Strategy,
    tuner: Arc<dyn Tuner>,
    corpus: Vec<TrainingSample>,
}

impl TrainingSession {
    pub fn new(
        verifier: Arc<dyn Verifier>,
        slicer: Arc<dyn Slicer>,
        context: Arc<dyn ContextProvider>,
        strategy: Strategy,
        tuner: Arc<dyn Tuner>,
    ) -> Self {
        Self {
            verifier,
            slicer,
            context,
            strategy,
            tuner,
            corpus: Vec::new(),
        }
    }

    /// One training pass: fix-and-record every outstanding issue, then
    /// fine-tune on the full accumulated corpus. Returns the number of
    /// samples recorded by this pass.
    pub async fn train_once(&mut self) -> Result<usize, WorkflowError> {
        let issues = self.verifier.enumerate_issues().await?;
        info!(outstanding = issues.len(), "training pass starting");

        let mut recorded = 0usize;
        for issue in &issues {
            let result = self.record_sample_for(issue).await;
            if let Err(e) = result {
                error!(issue = %issue.id, error = %e, "training pass aborted");
                return Err(e);
            }
            recorded += 1;
        }

        self.tuner.fine_tune(&self.corpus).await?;
        info!(
            recorded,
            corpus_size = self.corpus.len(),
            "training pass completed"
        );
        Ok(recorded)
    }

    async fn record_sample_for(&mut self, issue: &crate::model::Issue) -> Result<(), WorkflowError> {
        let slice = self.slicer.slice_around(issue).await?;
        let context = self.context.derive_context(issue).await?;

        let remediation = self
            .strategy
            .apply(&slice, Some(&context.narrative), Some(TRAINING_NARRATIVE))
            .await?;

        self.verifier.reverify().await?;
        let remaining = self.verifier.enumerate_issues().await?;

        self.corpus.push(TrainingSample {
            code_slice: slice,
            context: context.narrative,
            annotated_code: remediation.annotated_code,
            remaining_issues: remaining,
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    pub fn corpus(&self) -> &[TrainingSample] {
        &self.corpus
    }
}

/// Tuner that appends the corpus to a JSON file on disk, for offline
/// fine-tuning pipelines that pick the file up later.
pub struct FileTuner {
    path: PathBuf,
}

impl FileTuner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Tuner for FileTuner {
    async fn fine_tune(&self, corpus: &[TrainingSample]) -> Result<(), WorkflowError> {
        let payload = serde_json::to_vec_pretty(corpus)
            .context("serializing training corpus")
            .map_err(WorkflowError::Internal)?;
        tokio::fs::write(&self.path, payload)
            .await
            .with_context(|| format!("writing training corpus to {}", self.path.display()))
            .map_err(WorkflowError::Internal)?;
        info!(path = %self.path.display(), samples = corpus.len(), "training corpus written");
        Ok(())
    }
}
