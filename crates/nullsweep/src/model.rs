//! Core data model for the annotation workflow.
//!
//! Everything here is plain serde-serializable data. `Issue` values are
//! immutable once produced by a verifier run; a fresh `reverify` produces
//! a fresh, independent set.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where in the codebase a checker finding points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLocation {
    pub file: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl fmt::Display for IssueLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(col)) => write!(f, "{}:{}:{}", self.file, line, col),
            (Some(line), None) => write!(f, "{}:{}", self.file, line),
            _ => write!(f, "{}", self.file),
        }
    }
}

/// One checker-reported nullability problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Checker-assigned identifier, or a content fingerprint when the
    /// checker does not provide one.
    pub id: String,
    pub location: IssueLocation,
    /// Opaque severity/category string from the checker.
    pub category: String,
    pub message: String,
    /// The code segment the checker associated with the finding.
    pub code_segment: String,
    /// Raw checker payload, kept for diagnostics.
    pub raw: serde_json::Value,
}

impl Issue {
    /// Stable fingerprint for findings without a checker-assigned id.
    pub fn fingerprint(location: &IssueLocation, message: &str) -> String {
        let digest = blake3::hash(format!("{location}\n{message}").as_bytes());
        digest.to_hex()[..16].to_string()
    }
}

/// Derived supporting information for an issue. Owned by the level that
/// requested it; never persisted across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NullContext {
    /// Free-text analytical narrative about the nullability situation.
    pub narrative: String,
    /// Dependency summary for the code segment.
    pub dependencies: String,
}

/// One stage of the escalation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// Whole-unit conservative annotation plus semantics-preserving refactors.
    Conservative,
    /// Per-issue annotation from slices and summaries, semantics preserved.
    ContextAssisted,
    /// Per-issue annotation with deep context and solution search; may
    /// alter behavior to resolve the finding.
    Aggressive,
}

impl Level {
    pub fn number(self) -> u8 {
        match self {
            Self::Conservative => 1,
            Self::ContextAssisted => 2,
            Self::Aggressive => 3,
        }
    }

    /// The next level in the escalation sequence, if any.
    pub fn next(self) -> Option<Level> {
        match self {
            Self::Conservative => Some(Self::ContextAssisted),
            Self::ContextAssisted => Some(Self::Aggressive),
            Self::Aggressive => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conservative => write!(f, "level 1 (conservative)"),
            Self::ContextAssisted => write!(f, "level 2 (context-assisted)"),
            Self::Aggressive => write!(f, "level 3 (aggressive)"),
        }
    }
}

/// Per-level outcome, reported after the level's gating verifier run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelReport {
    pub level: Level,
    /// Ids of the issues this level attempted.
    pub attempted: Vec<String>,
    /// Strategy invocations issued by this level.
    pub strategy_calls: u32,
    /// Invocations that returned empty/unchanged output ("no safe fix").
    pub no_op_results: u32,
    /// Whether the verifier still reported outstanding issues after this
    /// level completed.
    pub issues_remaining: bool,
}

impl LevelReport {
    pub fn begin(level: Level) -> Self {
        Self {
            level,
            attempted: Vec::new(),
            strategy_calls: 0,
            no_op_results: 0,
            issues_remaining: false,
        }
    }
}

/// Summary of a complete workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub levels: Vec<LevelReport>,
    /// Whether the final verifier run reported zero outstanding issues.
    pub resolved: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl WorkflowReport {
    /// The deepest level the run escalated to.
    pub fn highest_level(&self) -> Option<Level> {
        self.levels.iter().map(|r| r.level).max()
    }
}

/// A recorded (pre-fix slice, context, output, outcome) tuple used to
/// refine the aggressive strategy over time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSample {
    pub code_slice: String,
    pub context: String,
    pub annotated_code: String,
    /// Issue set observed after the fix was applied and reverified.
    pub remaining_issues: Vec<Issue>,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(file: &str, line: Option<u32>) -> IssueLocation {
        IssueLocation {
            file: file.into(),
            line,
            column: None,
        }
    }

    #[test]
    fn test_location_display() {
        assert_eq!(loc("A.java", Some(12)).to_string(), "A.java:12");
        assert_eq!(loc("A.java", None).to_string(), "A.java");
        let full = IssueLocation {
            file: "B.java".into(),
            line: Some(3),
            column: Some(7),
        };
        assert_eq!(full.to_string(), "B.java:3:7");
    }

    #[test]
    fn test_fingerprint_is_stable_and_distinct() {
        let a = Issue::fingerprint(&loc("A.java", Some(1)), "may be null");
        let b = Issue::fingerprint(&loc("A.java", Some(1)), "may be null");
        let c = Issue::fingerprint(&loc("A.java", Some(2)), "may be null");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_level_ordering_and_next() {
        assert!(Level::Conservative < Level::ContextAssisted);
        assert!(Level::ContextAssisted < Level::Aggressive);
        assert_eq!(Level::Conservative.next(), Some(Level::ContextAssisted));
        assert_eq!(Level::Aggressive.next(), None);
        assert_eq!(Level::Aggressive.number(), 3);
    }

    #[test]
    fn test_level_serde_roundtrip() {
        for level in [Level::Conservative, Level::ContextAssisted, Level::Aggressive] {
            let json = serde_json::to_string(&level).unwrap();
            let restored: Level = serde_json::from_str(&json).unwrap();
            assert_eq!(restored, level);
        }
        assert_eq!(
            serde_json::to_string(&Level::ContextAssisted).unwrap(),
            "\"context_assisted\""
        );
    }

    #[test]
    fn test_report_highest_level() {
        let report = WorkflowReport {
            levels: vec![
                LevelReport::begin(Level::Conservative),
                LevelReport::begin(Level::ContextAssisted),
            ],
            resolved: true,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };
        assert_eq!(report.highest_level(), Some(Level::ContextAssisted));
    }

    #[test]
    fn test_issue_serde_roundtrip() {
        let issue = Issue {
            id: "nw-1".into(),
            location: loc("A.java", Some(42)),
            category: "FIELD_NO_INIT".into(),
            message: "field may be null".into(),
            code_segment: "private String name;".into(),
            raw: serde_json::json!({"severity": "warning"}),
        };
        let json = serde_json::to_string(&issue).unwrap();
        let restored: Issue = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, "nw-1");
        assert_eq!(restored.location, issue.location);
    }
}
