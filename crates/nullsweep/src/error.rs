//! Workflow error taxonomy with retry classification.
//!
//! Every failure crossing a collaborator boundary is represented here.
//! Callers query `is_transient()` instead of string matching; the retry
//! combinator in [`crate::retry`] recovers transient failures locally and
//! everything else propagates up to the engine, which aborts the run.
//!
//! | Kind                | Retriable | Outcome                                |
//! |---------------------|-----------|----------------------------------------|
//! | Transient           | yes       | retried at the call site               |
//! | ExhaustedRetries    | no        | fatal for the current level            |
//! | VerifierUnavailable | no        | always fatal, never retried implicitly |
//! | Configuration       | no        | fatal before the run starts            |
//! | Internal            | no        | fatal                                  |

use thiserror::Error;

/// Unified error type for all workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A generative or checker call failed for a recoverable reason
    /// (timeout, rate limit, malformed-but-retryable response).
    #[error("transient failure in {call}: {message}")]
    Transient { call: String, message: String },

    /// The fixed retry bound was consumed without a successful call.
    #[error("retries exhausted for {call} after {attempts} attempts: {last_error}")]
    ExhaustedRetries {
        call: String,
        attempts: u32,
        last_error: String,
    },

    /// The external checker cannot run at all (missing binary, unparseable
    /// output, non-zero exit). Never treated as "no issues".
    #[error("verifier unavailable: {0}")]
    VerifierUnavailable(String),

    /// Configuration is invalid or missing required fields.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Any other error that does not fit the above categories.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl WorkflowError {
    /// Build a `Transient` variant conveniently.
    pub fn transient(call: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            call: call.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the call site may retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}
