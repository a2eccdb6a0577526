//! Typed request/response records for every agent call in §6's table.
//!
//! Kept as enumerated, named fields rather than opaque maps (§9 Design
//! Notes) — an `extra` bag is only attached where the original genuinely
//! needs one (failure notes riding along on downstream issues, the
//! replanner's new-issue payloads already covered by `Issue::extra`).

use crate::issue::Issue;
use serde::{Deserialize, Serialize};

/// Output of `run_coder`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoderResult {
    #[serde(default)]
    pub files_changed: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub complete: bool,
}

/// Output of `run_qa`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QAResult {
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub failing_checks: Vec<String>,
}

/// Output of `run_code_reviewer`. `blocking` is true only for
/// security/crash/data-loss issues, never mere style nits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeReviewResult {
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub blocking: bool,
    #[serde(default)]
    pub summary: String,
}

/// Output of `run_qa_synthesizer`: the action that drives the coding loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisAction {
    Fix,
    Approve,
    Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QASynthesisResult {
    pub action: SynthesisAction,
    #[serde(default)]
    pub summary: String,
    /// Set when the synthesizer recognizes the same feedback recurring
    /// without progress — escalated to `failed_unrecoverable` rather than
    /// looped on forever.
    #[serde(default)]
    pub stuck: bool,
}

/// One row of the coding loop's history, passed back to the synthesizer
/// each iteration so it can see the trend rather than just the latest
/// result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: u32,
    pub action: String,
    pub summary: String,
    pub qa_passed: bool,
    pub review_approved: bool,
    pub review_blocking: bool,
}

/// Output of `run_retry_advisor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryAdvice {
    pub should_retry: bool,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub modified_context: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

/// Output of `run_issue_writer`: newly authored or revised issues produced
/// while applying a `modify_dag`/`reduce_scope` replan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueWriterResult {
    #[serde(default)]
    pub issues: Vec<Issue>,
}

/// One issue's workspace, as returned by a batched `run_workspace_setup`
/// call covering every issue entering the level at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceEntry {
    pub issue_name: String,
    #[serde(default)]
    pub branch_name: String,
    #[serde(default)]
    pub worktree_path: String,
}

/// Output of `run_workspace_setup`: one call per level, covering every
/// active issue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceSetupResult {
    pub success: bool,
    #[serde(default)]
    pub workspaces: Vec<WorkspaceEntry>,
}

/// Output of `run_workspace_cleanup`: one call per level (or final sweep),
/// covering every branch passed in `branches_to_clean`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceCleanupResult {
    pub success: bool,
    #[serde(default)]
    pub cleaned: Vec<String>,
}

/// Output of `run_merger`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergerResult {
    pub success: bool,
    #[serde(default)]
    pub merged_branches: Vec<String>,
    #[serde(default)]
    pub failed_branches: Vec<String>,
    #[serde(default)]
    pub conflict_resolutions: Vec<String>,
    #[serde(default)]
    pub needs_integration_test: bool,
    #[serde(default)]
    pub summary: String,
}

/// Output of `run_integration_tester`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrationTestOutcome {
    pub passed: bool,
    #[serde(default)]
    pub summary: String,
}
