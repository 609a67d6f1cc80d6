//! Collaborator interfaces consumed by the escalation engine.
//!
//! The core has no wire protocol of its own; its boundary is these traits,
//! each called synchronously (one at a time) from the engine's point of
//! view. Implementations live in [`crate::client`], [`crate::tools`] and
//! [`crate::focus`]; tests substitute mocks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::model::{Issue, NullContext, TrainingSample};

/// Role tag for one block of a structured prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
}

/// One role-tagged text block. A structured prompt is an ordered sequence
/// of these: a fixed system instruction block followed by a user block
/// with the task-specific content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptBlock {
    pub role: Role,
    pub content: String,
}

impl PromptBlock {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Wrapper around the external static checker.
///
/// Must be idempotent given unchanged code: repeated `enumerate_issues`
/// calls without an intervening `reverify` return the same set.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Re-execute the checker against the current code state. Subsequent
    /// queries reflect the new state.
    async fn reverify(&self) -> Result<(), WorkflowError>;

    async fn has_outstanding_issues(&self) -> Result<bool, WorkflowError>;

    async fn enumerate_issues(&self) -> Result<Vec<Issue>, WorkflowError>;
}

/// Extracts the code slice around a checker finding.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Slicer: Send + Sync {
    async fn slice_around(&self, issue: &Issue) -> Result<String, WorkflowError>;
}

/// Derives nullability context and solution narratives for level 3.
///
/// Pure from the engine's perspective: it may consult an external
/// reasoning collaborator internally, but it never mutates issues or
/// workflow state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn derive_context(&self, issue: &Issue) -> Result<NullContext, WorkflowError>;

    /// Search for candidate solutions given derived context.
    async fn solutions_for(&self, context: &NullContext) -> Result<String, WorkflowError>;
}

/// A generative annotation collaborator (one per strategy variant).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn respond(&self, blocks: &[PromptBlock]) -> Result<String, WorkflowError>;
}

/// Underlying model refinement step driven by the training loop.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Tuner: Send + Sync {
    async fn fine_tune(&self, corpus: &[TrainingSample]) -> Result<(), WorkflowError>;
}
