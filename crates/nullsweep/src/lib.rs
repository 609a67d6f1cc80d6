//! Escalating `@Nullable` annotation workflow.
//!
//! Given a unit of code and an external static nullability checker, the
//! [`engine::EscalationEngine`] applies generative annotation strategies in
//! three strictly sequential levels of increasing aggressiveness, escalating
//! only while the checker keeps reporting outstanding issues:
//!
//! 1. conservative whole-unit annotation (semantics preserved)
//! 2. per-issue slice annotation with optional summaries (semantics preserved)
//! 3. per-issue fixes with derived context and solution research (may alter
//!    behavior)
//!
//! The [`feedback::TrainingSession`] records each aggressive fix attempt
//! with its verifier outcome and drives a fine-tuning step over the
//! accumulated corpus.

pub mod client;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod focus;
pub mod model;
pub mod prompts;
pub mod retry;
pub mod strategy;
pub mod tools;

pub use collaborators::{ChatModel, ContextProvider, Slicer, Tuner, Verifier};
pub use engine::{EscalationEngine, StrategySet};
pub use error::WorkflowError;
pub use model::{Issue, Level, LevelReport, WorkflowReport};
pub use retry::RetryPolicy;
