//! Core data model: `Issue`, `IssueResult`, `LevelResult`.
//!
//! Issues are created by the (external) planner and mutated only by the
//! replanner driver or worktree-setup enrichment — never destroyed.
//! Completed/failed/skipped issues stay in `all_issues` for downstream
//! context (failure notes, replanner visibility).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kebab-case unique issue identifier.
pub type IssueName = String;

/// A unit of planned work.
///
/// Fields the core scheduler does not interpret (arbitrary planner or
/// replanner metadata) are preserved in `extra` rather than dropped, so a
/// round trip through the engine never silently discards forward-compatible
/// data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Issue {
    pub name: IssueName,
    pub sequence_number: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<IssueName>,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub files_to_create: Vec<String>,
    #[serde(default)]
    pub files_to_modify: Vec<String>,
    #[serde(default)]
    pub testing_strategy: String,

    /// Injected by the retry-advisor driver (§4.5) on a retried attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_diagnosis: Option<String>,

    /// Accumulated upstream-failure warnings, appended by the replanner
    /// driver's `continue` path (§4.7) so the next coder agent has
    /// visibility into what upstream dependency went missing.
    #[serde(default)]
    pub failure_notes: Vec<String>,

    /// Populated by worktree setup during level entry (§4.6 step 1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,

    /// Forward-compatible extension point for planner/replanner fields the
    /// scheduler does not itself interpret.
    #[serde(flatten, default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Issue {
    pub fn new(name: impl Into<String>, sequence_number: u32, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sequence_number,
            title: title.into(),
            description: String::new(),
            acceptance_criteria: Vec::new(),
            depends_on: Vec::new(),
            provides: Vec::new(),
            files_to_create: Vec::new(),
            files_to_modify: Vec::new(),
            testing_strategy: String::new(),
            retry_context: None,
            previous_error: None,
            retry_diagnosis: None,
            failure_notes: Vec::new(),
            integration_branch: None,
            worktree_path: None,
            branch_name: None,
            extra: BTreeMap::new(),
        }
    }

    /// Branch name the merge gate uses when no worktree has enriched this
    /// issue yet: `issue/<NN>-<name>` (§6 Branch naming).
    pub fn conventional_branch_name(&self) -> String {
        format!("issue/{:02}-{}", self.sequence_number, self.name)
    }
}

/// Outcome of a single execution attempt for one issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueOutcome {
    Completed,
    FailedRetryable,
    FailedUnrecoverable,
    Skipped,
}

/// Result of executing (or attempting to execute) a single issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueResult {
    pub issue_name: IssueName,
    pub outcome: IssueOutcome,
    #[serde(default)]
    pub result_summary: String,
    #[serde(default)]
    pub error_message: String,
    /// Full traceback/log, kept around for the replanner's diagnosis.
    #[serde(default)]
    pub error_context: String,
    /// 1-based attempt count.
    #[serde(default = "one")]
    pub attempts: u32,
    #[serde(default)]
    pub files_changed: Vec<String>,
    #[serde(default)]
    pub branch_name: String,
}

fn one() -> u32 {
    1
}

impl IssueResult {
    pub fn completed(issue_name: impl Into<String>, attempts: u32) -> Self {
        Self {
            issue_name: issue_name.into(),
            outcome: IssueOutcome::Completed,
            result_summary: String::new(),
            error_message: String::new(),
            error_context: String::new(),
            attempts,
            files_changed: Vec::new(),
            branch_name: String::new(),
        }
    }

    pub fn unrecoverable(issue_name: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            issue_name: issue_name.into(),
            outcome: IssueOutcome::FailedUnrecoverable,
            result_summary: String::new(),
            error_message: error_message.into(),
            error_context: String::new(),
            attempts: 1,
            files_changed: Vec::new(),
            branch_name: String::new(),
        }
    }
}

/// Aggregate outcome for one level: three disjoint groups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelResult {
    pub level_index: usize,
    pub completed: Vec<IssueResult>,
    pub failed: Vec<IssueResult>,
    pub skipped: Vec<IssueResult>,
}

impl LevelResult {
    pub fn new(level_index: usize) -> Self {
        Self {
            level_index,
            completed: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Unrecoverable failures in this level — the set that triggers the
    /// replan gate (§4.7).
    pub fn unrecoverable(&self) -> Vec<&IssueResult> {
        self.failed
            .iter()
            .filter(|r| r.outcome == IssueOutcome::FailedUnrecoverable)
            .collect()
    }
}
