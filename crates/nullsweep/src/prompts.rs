//! System prompt constants and prompt builders for each collaborator role.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever preamble content
//! changes, so a logged run can be traced back to the prompt text that
//! produced it.

use crate::collaborators::PromptBlock;
use crate::model::Issue;

/// Prompt version. Bump on any preamble content change.
pub const PROMPT_VERSION: &str = "1.1.0";

/// Level 1 annotator preamble (conservative).
///
/// Places initial `@Nullable` annotations over the whole unit and performs
/// semantics-preserving refactors driven by the checker findings embedded
/// in the task block.
pub const CONSERVATIVE_PREAMBLE: &str = "\
You are a conservative nullability annotator. You receive a complete source \
unit followed by the static checker's current findings.

## Rules
- Add @Nullable annotations only where the code demonstrably permits null.
- You may refactor to resolve a listed finding, but ONLY with refactors that \
preserve observable behavior exactly (extract local, early return, guard clause).
- Never change public signatures beyond adding annotations.
- Return the complete annotated unit inside a single code fence.
- If no safe annotation or refactor exists, return the unit unchanged.
";

/// Level 2 annotator preamble (semantics-preserving, slice-driven).
pub const SEMANTIC_DEEP_PREAMBLE: &str = "\
You are a nullability inference specialist. You receive a code slice around \
one checker finding, and optionally a summary of the surrounding code.

## Rules
- Analyze the slice and place @Nullable annotations where the dataflow \
requires them.
- Preserve the original semantics exactly; annotations only, no refactors.
- Return the annotated slice inside a single code fence.
- If no safe placement exists, return the slice unchanged.
";

/// Level 3 annotator preamble (aggressive).
///
/// Explicitly permitted to alter behavior to resolve the finding;
/// semantics preservation is not guaranteed at this level.
pub const AGGRESSIVE_PREAMBLE: &str = "\
You are an aggressive nullability fixer. You receive problematic code, a \
nullability context narrative, and a solution report from prior research.

## Rules
- Your goal is to make the checker finding go away.
- You MAY alter behavior: introduce null checks, change return values to \
Optional, throw on impossible states.
- Prefer the smallest change that resolves the finding.
- Return the fixed code inside a single code fence.
- If nothing helps, return the code unchanged.
";

/// Summarizer preamble for oversized code slices.
pub const SUMMARIZER_PREAMBLE: &str = "\
Summarize the following code slice for a nullability analysis. Name the \
types, the fields and parameters that can hold null, and the paths on which \
null flows. Be terse; plain text only.
";

/// Context-gathering preamble (level 3 deep context).
pub const FOCUS_PREAMBLE: &str = "\
Analyze the following code segment for nullability context. Describe which \
values may be null, where they originate, and which dereferences are \
unguarded. Plain text only.
";

/// Solution-search preamble (level 3 narrative).
pub const SOLUTIONS_PREAMBLE: &str = "\
Given the following nullability context, propose concrete resolution \
strategies in order of preference. For each: what to change and what the \
behavioral impact is. Plain text only.
";

/// Render the checker findings as a digest suitable for a prompt.
pub fn render_findings(issues: &[Issue]) -> String {
    if issues.is_empty() {
        return "(no findings reported)".to_string();
    }
    let mut out = String::new();
    for issue in issues {
        out.push_str(&format!(
            "- [{}] {} at {}: {}\n",
            issue.id, issue.category, issue.location, issue.message
        ));
    }
    out
}

/// Compose the level 1 task block: the whole unit plus the findings digest
/// that drives the semantics-preserving refactors.
pub fn unit_with_findings(unit: &str, issues: &[Issue]) -> String {
    format!(
        "## Source unit\n{unit}\n\n## Checker findings\n{}",
        render_findings(issues)
    )
}

pub fn conservative_blocks(task: &str) -> Vec<PromptBlock> {
    vec![
        PromptBlock::system(CONSERVATIVE_PREAMBLE),
        PromptBlock::user(task),
    ]
}

pub fn semantic_deep_blocks(slice: &str, summary: Option<&str>) -> Vec<PromptBlock> {
    let mut task = format!("## Code slice\n{slice}\n");
    if let Some(summary) = summary {
        task.push_str(&format!("\n## Summary of the surrounding code\n{summary}\n"));
    }
    vec![
        PromptBlock::system(SEMANTIC_DEEP_PREAMBLE),
        PromptBlock::user(task),
    ]
}

pub fn aggressive_blocks(code: &str, context: &str, narrative: &str) -> Vec<PromptBlock> {
    let task = format!(
        "## Code\n{code}\n\n## Nullability context\n{context}\n\n## Solution report\n{narrative}\n"
    );
    vec![
        PromptBlock::system(AGGRESSIVE_PREAMBLE),
        PromptBlock::user(task),
    ]
}

pub fn summarize_blocks(slice: &str) -> Vec<PromptBlock> {
    vec![
        PromptBlock::system(SUMMARIZER_PREAMBLE),
        PromptBlock::user(slice),
    ]
}

pub fn focus_blocks(code_segment: &str, dependencies: &str) -> Vec<PromptBlock> {
    let task = format!("## Code segment\n{code_segment}\n\n## Dependencies\n{dependencies}\n");
    vec![PromptBlock::system(FOCUS_PREAMBLE), PromptBlock::user(task)]
}

pub fn solutions_blocks(context_narrative: &str) -> Vec<PromptBlock> {
    vec![
        PromptBlock::system(SOLUTIONS_PREAMBLE),
        PromptBlock::user(context_narrative),
    ]
}
