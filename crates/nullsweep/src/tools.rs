//! CLI bridges to the external static checker and slice extractor.
//!
//! Both tools are configured as shell command lines and must emit their
//! results on stdout. The checker bridge caches its findings between runs
//! so repeated queries against unchanged code are answered without
//! re-executing the tool; `reverify` invalidates the cache.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::collaborators::{Slicer, Verifier};
use crate::error::WorkflowError;
use crate::model::{Issue, IssueLocation};

/// One finding as the checker emits it. Field names follow the checker's
/// JSON; `id` and `column` are optional because not every checker version
/// emits them.
#[derive(Debug, Deserialize)]
struct CheckerFinding {
    #[serde(default)]
    id: Option<String>,
    file: String,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    column: Option<u32>,
    #[serde(alias = "check")]
    category: String,
    message: String,
    #[serde(default, alias = "code")]
    code_segment: String,
}

impl CheckerFinding {
    fn into_issue(self, raw: serde_json::Value) -> Issue {
        let location = IssueLocation {
            file: self.file,
            line: self.line,
            column: self.column,
        };
        let id = self
            .id
            .unwrap_or_else(|| Issue::fingerprint(&location, &self.message));
        Issue {
            id,
            location,
            category: self.category,
            message: self.message,
            code_segment: self.code_segment,
            raw,
        }
    }
}

/// Split a configured command line and run it, returning stdout.
async fn run_tool(cmd: &str, extra_arg: Option<&str>) -> Result<String, WorkflowError> {
    let mut argv = shlex::split(cmd).ok_or_else(|| {
        WorkflowError::Configuration(format!("unparseable command line: {cmd}"))
    })?;
    if argv.is_empty() {
        return Err(WorkflowError::Configuration("empty command line".into()));
    }
    if let Some(arg) = extra_arg {
        argv.push(arg.to_string());
    }

    debug!(program = %argv[0], args = argv.len() - 1, "running external tool");
    let output = Command::new(&argv[0])
        .args(&argv[1..])
        .output()
        .await
        .map_err(|e| WorkflowError::VerifierUnavailable(format!("{}: {e}", argv[0])))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(WorkflowError::VerifierUnavailable(format!(
            "{} exited with {}: {}",
            argv[0],
            output.status,
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// [`Verifier`] that shells out to the configured checker command.
///
/// The findings cache makes repeated `enumerate_issues` calls idempotent
/// for unchanged code; only `reverify` re-executes the checker.
pub struct CheckerCli {
    cmd: String,
    cache: Mutex<Option<Vec<Issue>>>,
}

impl CheckerCli {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            cache: Mutex::new(None),
        }
    }

    async fn run_checker(&self) -> Result<Vec<Issue>, WorkflowError> {
        let stdout = run_tool(&self.cmd, None).await?;
        let raw_findings: Vec<serde_json::Value> = serde_json::from_str(&stdout)
            .map_err(|e| {
                WorkflowError::VerifierUnavailable(format!("unparseable checker output: {e}"))
            })?;

        let mut issues = Vec::with_capacity(raw_findings.len());
        for raw in raw_findings {
            let finding: CheckerFinding = serde_json::from_value(raw.clone()).map_err(|e| {
                WorkflowError::VerifierUnavailable(format!("malformed checker finding: {e}"))
            })?;
            issues.push(finding.into_issue(raw));
        }
        info!(findings = issues.len(), "checker run completed");
        Ok(issues)
    }

    async fn cached_issues(&self) -> Result<Vec<Issue>, WorkflowError> {
        if let Some(issues) = self.cache.lock().unwrap_or_else(|p| p.into_inner()).clone() {
            return Ok(issues);
        }
        let issues = self.run_checker().await?;
        *self.cache.lock().unwrap_or_else(|p| p.into_inner()) = Some(issues.clone());
        Ok(issues)
    }
}

#[async_trait]
impl Verifier for CheckerCli {
    async fn reverify(&self) -> Result<(), WorkflowError> {
        let issues = self.run_checker().await?;
        *self.cache.lock().unwrap_or_else(|p| p.into_inner()) = Some(issues);
        Ok(())
    }

    async fn has_outstanding_issues(&self) -> Result<bool, WorkflowError> {
        Ok(!self.cached_issues().await?.is_empty())
    }

    async fn enumerate_issues(&self) -> Result<Vec<Issue>, WorkflowError> {
        self.cached_issues().await
    }
}

/// [`Slicer`] that shells out to the configured slice extractor, passing
/// the finding as a JSON argument.
pub struct SlicerCli {
    cmd: String,
}

impl SlicerCli {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

#[async_trait]
impl Slicer for SlicerCli {
    async fn slice_around(&self, issue: &Issue) -> Result<String, WorkflowError> {
        let payload = serde_json::to_string(issue)
            .map_err(|e| WorkflowError::Internal(anyhow::anyhow!("encoding finding: {e}")))?;
        let stdout = run_tool(&self.cmd, Some(&payload)).await?;
        let slice = stdout.trim();
        if slice.is_empty() {
            // Fall back to the checker's own segment rather than sending an
            // empty prompt.
            return Ok(issue.code_segment.clone());
        }
        Ok(slice.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FINDINGS_JSON: &str = r#"[{"file":"A.java","line":3,"check":"RETURN_NULLABLE","message":"may-return-null","code":"return-x;"}]"#;

    fn echo_checker(json: &str) -> CheckerCli {
        CheckerCli::new(format!("echo '{json}'"))
    }

    #[tokio::test]
    async fn test_checker_parses_findings() {
        let checker = echo_checker(FINDINGS_JSON);
        let issues = checker.enumerate_issues().await.unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].location.file, "A.java");
        assert_eq!(issues[0].category, "RETURN_NULLABLE");
        assert_eq!(issues[0].code_segment, "return-x;");
        // No checker-assigned id, so a content fingerprint is used.
        assert_eq!(issues[0].id.len(), 16);
    }

    #[tokio::test]
    async fn test_enumerate_is_idempotent_between_reverifies() {
        let checker = echo_checker(FINDINGS_JSON);
        let first = checker.enumerate_issues().await.unwrap();
        let second = checker.enumerate_issues().await.unwrap();
        assert_eq!(first[0].id, second[0].id);
        assert!(checker.has_outstanding_issues().await.unwrap());

        checker.reverify().await.unwrap();
        let third = checker.enumerate_issues().await.unwrap();
        assert_eq!(first[0].id, third[0].id);
    }

    #[tokio::test]
    async fn test_empty_findings_means_no_outstanding_issues() {
        let checker = echo_checker("[]");
        assert!(!checker.has_outstanding_issues().await.unwrap());
        assert!(checker.enumerate_issues().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_checker_binary_is_unavailable() {
        let checker = CheckerCli::new("/nonexistent/nullaway-check --format json");
        let err = checker.reverify().await.unwrap_err();
        assert!(matches!(err, WorkflowError::VerifierUnavailable(_)));
    }

    #[tokio::test]
    async fn test_garbage_checker_output_is_unavailable_not_clean() {
        let checker = echo_checker("not json at all");
        let err = checker.has_outstanding_issues().await.unwrap_err();
        assert!(matches!(err, WorkflowError::VerifierUnavailable(_)));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_unavailable() {
        let checker = CheckerCli::new("false");
        let err = checker.reverify().await.unwrap_err();
        assert!(matches!(err, WorkflowError::VerifierUnavailable(_)));
    }

    #[tokio::test]
    async fn test_slicer_returns_stdout() {
        let slicer = SlicerCli::new("echo 'String s = lookup(key);'");
        let issue = Issue {
            id: "nw-1".into(),
            location: IssueLocation {
                file: "A.java".into(),
                line: Some(3),
                column: None,
            },
            category: "RETURN_NULLABLE".into(),
            message: "may return null".into(),
            code_segment: "return x;".into(),
            raw: serde_json::Value::Null,
        };
        let slice = slicer.slice_around(&issue).await.unwrap();
        assert!(slice.starts_with("String s = lookup(key);"));
    }

    #[tokio::test]
    async fn test_slicer_falls_back_to_code_segment_on_empty_output() {
        let slicer = SlicerCli::new("true");
        let issue = Issue {
            id: "nw-1".into(),
            location: IssueLocation {
                file: "A.java".into(),
                line: None,
                column: None,
            },
            category: "FIELD_NO_INIT".into(),
            message: "field may be null".into(),
            code_segment: "private String name;".into(),
            raw: serde_json::Value::Null,
        };
        let slice = slicer.slice_around(&issue).await.unwrap();
        assert_eq!(slice, "private String name;");
    }
}
