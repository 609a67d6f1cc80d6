//! Context derivation for the aggressive level.
//!
//! `FocusProvider` turns a checker finding into a [`NullContext`]: a
//! lightweight textual dependency scan of the code segment plus a
//! generative analysis narrative, and on request a solution report built
//! from that context.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::collaborators::{ChatModel, ContextProvider};
use crate::error::WorkflowError;
use crate::model::{Issue, NullContext};
use crate::prompts;
use crate::retry::{call_with_retry, RetryPolicy};

pub struct FocusProvider {
    model: Arc<dyn ChatModel>,
    retry: RetryPolicy,
}

impl FocusProvider {
    pub fn new(model: Arc<dyn ChatModel>, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }
}

/// Collect capitalized identifiers from a code segment as a rough
/// dependency list. Textual only; no resolution against the codebase.
fn gather_dependencies(code_segment: &str) -> String {
    let mut names: BTreeSet<&str> = BTreeSet::new();
    for token in code_segment.split(|c: char| !c.is_alphanumeric() && c != '_') {
        let mut chars = token.chars();
        if let Some(first) = chars.next() {
            if first.is_uppercase() && chars.next().is_some() {
                names.insert(token);
            }
        }
    }
    if names.is_empty() {
        "(no named types referenced)".to_string()
    } else {
        let list: Vec<&str> = names.into_iter().collect();
        format!("references: {}", list.join(", "))
    }
}

#[async_trait]
impl ContextProvider for FocusProvider {
    async fn derive_context(&self, issue: &Issue) -> Result<NullContext, WorkflowError> {
        let dependencies = gather_dependencies(&issue.code_segment);
        debug!(issue = %issue.id, %dependencies, "deriving nullability context");

        let blocks = prompts::focus_blocks(&issue.code_segment, &dependencies);
        let narrative = call_with_retry(self.retry, "focus", || {
            let blocks = blocks.clone();
            async move { self.model.respond(&blocks).await }
        })
        .await?;

        Ok(NullContext {
            narrative: narrative.trim().to_string(),
            dependencies,
        })
    }

    async fn solutions_for(&self, context: &NullContext) -> Result<String, WorkflowError> {
        let blocks = prompts::solutions_blocks(&context.narrative);
        let report = call_with_retry(self.retry, "solutions", || {
            let blocks = blocks.clone();
            async move { self.model.respond(&blocks).await }
        })
        .await?;
        Ok(report.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::MockChatModel;
    use crate::model::IssueLocation;

    fn issue(code_segment: &str) -> Issue {
        Issue {
            id: "nw-1".into(),
            location: IssueLocation {
                file: "A.java".into(),
                line: Some(7),
                column: None,
            },
            category: "DEREFERENCE".into(),
            message: "possible null dereference".into(),
            code_segment: code_segment.into(),
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_gather_dependencies_finds_type_names() {
        let deps = gather_dependencies("Map<String, User> users = Registry.lookup();");
        assert!(deps.contains("Map"));
        assert!(deps.contains("String"));
        assert!(deps.contains("User"));
        assert!(deps.contains("Registry"));
    }

    #[test]
    fn test_gather_dependencies_empty_segment() {
        assert!(gather_dependencies("x = y + 1;").contains("no named types"));
    }

    #[tokio::test]
    async fn test_derive_context_feeds_segment_and_dependencies() {
        let mut model = MockChatModel::new();
        model
            .expect_respond()
            .withf(|blocks| {
                let task = &blocks[1].content;
                task.contains("Registry.lookup()") && task.contains("references: Registry")
            })
            .returning(|_| Ok("  lookup may return null  ".to_string()));
        let provider = FocusProvider::new(Arc::new(model), RetryPolicy::once());

        let context = provider
            .derive_context(&issue("User u = Registry.lookup();"))
            .await
            .unwrap();
        assert_eq!(context.narrative, "lookup may return null");
        assert!(context.dependencies.contains("Registry"));
    }

    #[tokio::test]
    async fn test_solutions_for_uses_narrative() {
        let mut model = MockChatModel::new();
        model
            .expect_respond()
            .withf(|blocks| blocks[1].content == "lookup may return null")
            .returning(|_| Ok("guard the call site".to_string()));
        let provider = FocusProvider::new(Arc::new(model), RetryPolicy::once());

        let report = provider
            .solutions_for(&NullContext {
                narrative: "lookup may return null".into(),
                dependencies: String::new(),
            })
            .await
            .unwrap();
        assert_eq!(report, "guard the call site");
    }
}
