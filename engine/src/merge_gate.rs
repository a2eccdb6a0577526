//! Worktree setup, merge, integration test, and cleanup — the gate that
//! runs once per level, after every issue in it has finished coding.
//!
//! Grounded on the original's `_setup_worktrees`, `_merge_level_branches`,
//! `_run_integration_tests`, and `_cleanup_worktrees` in `dag_executor.py`:
//! each of those makes exactly one batched agent call per level over the
//! full active-issue or branch list, not one call per issue/branch.

use crate::agent::{AgentCallOptions, AgentInvoker, AgentTargets, AgentTransport};
use crate::issue::{Issue, IssueResult};
use crate::schemas::{MergerResult, WorkspaceCleanupResult, WorkspaceSetupResult};
use crate::state::{IntegrationTestResult, MergeResult};
use serde_json::json;
use std::collections::HashSet;
use std::sync::OnceLock;

fn sequence_prefix_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^\d{2}-").expect("static pattern is valid"))
}

/// Strips a leading two-digit sequence prefix (`"01-"`) if present.
///
/// This tolerance is deliberately best-effort: it exists because worktree
/// and branch names sometimes carry the issue's sequence number and
/// sometimes don't, not because the two forms are meant to be
/// interchangeable in general. Do not extend it to fuzzier matching.
pub fn strip_sequence_prefix(name: &str) -> String {
    sequence_prefix_regex().replace(name, "").into_owned()
}

/// True if `candidate` names the same issue as `issue_name`, tolerating a
/// sequence prefix on either side.
pub fn names_match(candidate: &str, issue_name: &str) -> bool {
    candidate == issue_name
        || strip_sequence_prefix(candidate) == issue_name
        || candidate == strip_sequence_prefix(issue_name)
        || strip_sequence_prefix(candidate) == strip_sequence_prefix(issue_name)
}

/// Planning context forwarded to the merger and integration tester so they
/// can judge changes against the original intent, not just the diff.
pub struct PlanContext<'a> {
    pub original_plan_summary: &'a str,
    pub prd_summary: &'a str,
    pub architecture_summary: &'a str,
}

impl PlanContext<'_> {
    fn to_json(&self) -> serde_json::Value {
        json!({
            "original_plan_summary": self.original_plan_summary,
            "prd_summary": self.prd_summary,
            "architecture_summary": self.architecture_summary,
        })
    }
}

/// Calls `run_workspace_setup` once for every issue entering the level,
/// enriching each with `worktree_path`/`branch_name` on success. Response
/// entries are matched back to issues by `names_match` rather than by
/// construction order, since the agent is free to normalize names however
/// it likes. An issue with no matching, successful entry is left without a
/// worktree and executes degraded, in the repo root, rather than blocking
/// the level.
pub async fn setup_worktrees<T: AgentTransport>(
    invoker: &AgentInvoker<T>,
    targets: &AgentTargets,
    options: &AgentCallOptions,
    repo_path: &str,
    issues: &mut [Issue],
    integration_branch: &str,
    worktrees_dir: &str,
) {
    if issues.is_empty() {
        return;
    }

    let kwargs = json!({
        "repo_path": repo_path,
        "integration_branch": integration_branch,
        "issues": issues.iter().collect::<Vec<_>>(),
        "worktrees_dir": worktrees_dir,
    });
    let outcome = invoker
        .call(&targets.run_workspace_setup, kwargs, options)
        .await
        .ok()
        .and_then(|value| serde_json::from_value::<WorkspaceSetupResult>(value).ok());

    let workspaces = match outcome {
        Some(result) if result.success => result.workspaces,
        _ => return,
    };

    for issue in issues.iter_mut() {
        if let Some(entry) = workspaces.iter().find(|w| names_match(&w.issue_name, &issue.name)) {
            let branch_name = if entry.branch_name.is_empty() {
                issue.conventional_branch_name()
            } else {
                entry.branch_name.clone()
            };
            issue.worktree_path = Some(entry.worktree_path.clone());
            issue.branch_name = Some(branch_name);
            issue.integration_branch = Some(integration_branch.to_string());
        }
    }
}

/// Files touched by more than one completed issue this level — passed to
/// the merger so it knows where to expect overlap before it even attempts
/// the merge.
fn detect_file_conflicts(completed: &[IssueResult]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut conflicts = Vec::new();
    for result in completed {
        for file in &result.files_changed {
            if !seen.insert(file.clone()) && !conflicts.contains(file) {
                conflicts.push(file.clone());
            }
        }
    }
    conflicts
}

async fn call_merger<T: AgentTransport>(
    invoker: &AgentInvoker<T>,
    targets: &AgentTargets,
    options: &AgentCallOptions,
    repo_path: &str,
    integration_branch: &str,
    branches_to_merge: &[String],
    file_conflicts: &[String],
    plan: &PlanContext<'_>,
) -> MergerResult {
    let kwargs = json!({
        "repo_path": repo_path,
        "integration_branch": integration_branch,
        "branches_to_merge": branches_to_merge,
        "file_conflicts": file_conflicts,
        "plan_context": plan.to_json(),
    });
    match invoker.call(&targets.run_merger, kwargs, options).await {
        Ok(value) => serde_json::from_value(value).unwrap_or_else(|_| MergerResult {
            success: false,
            failed_branches: branches_to_merge.to_vec(),
            ..Default::default()
        }),
        Err(_) => MergerResult {
            success: false,
            failed_branches: branches_to_merge.to_vec(),
            ..Default::default()
        },
    }
}

async fn call_integration_tester<T: AgentTransport>(
    invoker: &AgentInvoker<T>,
    targets: &AgentTargets,
    options: &AgentCallOptions,
    repo_path: &str,
    integration_branch: &str,
    merged_branches: &[String],
    conflict_resolutions: &[String],
    plan: &PlanContext<'_>,
    level: usize,
    attempt: u32,
) -> (bool, String) {
    let kwargs = json!({
        "repo_path": repo_path,
        "integration_branch": integration_branch,
        "merged_branches": merged_branches,
        "conflict_resolutions": conflict_resolutions,
        "plan_context": plan.to_json(),
        "level": level,
        "attempt": attempt,
    });
    match invoker.call(&targets.run_integration_tester, kwargs, options).await {
        Ok(value) => match serde_json::from_value::<crate::schemas::IntegrationTestOutcome>(value) {
            Ok(outcome) => (outcome.passed, outcome.summary),
            Err(_) => (false, "malformed integration test response".to_string()),
        },
        Err(err) => (false, err.to_string()),
    }
}

pub struct MergeGateOutcome {
    pub merge_result: MergeResult,
    pub integration_test_results: Vec<IntegrationTestResult>,
}

/// Merges every completed issue's branch for this level, retries the
/// merger once if it reports failed branches, and — if the merger asks for
/// one and integration testing is enabled — runs up to
/// `max_integration_test_retries + 1` integration test attempts, stopping
/// at the first pass.
#[allow(clippy::too_many_arguments)]
pub async fn run_merge_gate<T: AgentTransport>(
    invoker: &AgentInvoker<T>,
    targets: &AgentTargets,
    options: &AgentCallOptions,
    repo_path: &str,
    integration_branch: &str,
    plan: &PlanContext<'_>,
    level: usize,
    completed: &[IssueResult],
    enable_integration_testing: bool,
    max_integration_test_retries: u32,
) -> MergeGateOutcome {
    let branches: Vec<String> = completed
        .iter()
        .map(|r| r.branch_name.clone())
        .filter(|b| !b.is_empty())
        .collect();
    let file_conflicts = detect_file_conflicts(completed);

    let mut merged = Vec::new();
    let mut failed = Vec::new();
    let mut needs_integration_test = false;
    let mut conflict_resolutions = Vec::new();

    if !branches.is_empty() {
        let first = call_merger(
            invoker,
            targets,
            options,
            repo_path,
            integration_branch,
            &branches,
            &file_conflicts,
            plan,
        )
        .await;
        merged.extend(first.merged_branches);
        needs_integration_test = first.needs_integration_test;
        conflict_resolutions.extend(first.conflict_resolutions);

        if !first.failed_branches.is_empty() {
            let retry = call_merger(
                invoker,
                targets,
                options,
                repo_path,
                integration_branch,
                &first.failed_branches,
                &file_conflicts,
                plan,
            )
            .await;
            merged.extend(retry.merged_branches);
            failed = retry.failed_branches;
            needs_integration_test = needs_integration_test || retry.needs_integration_test;
            conflict_resolutions.extend(retry.conflict_resolutions);
        }
    }

    let merge_result = MergeResult {
        level,
        merged_branches: merged.clone(),
        failed_branches: failed,
        needs_integration_test,
    };

    let mut integration_test_results = Vec::new();
    if needs_integration_test && enable_integration_testing {
        for attempt in 1..=(max_integration_test_retries + 1) {
            let (passed, summary) = call_integration_tester(
                invoker,
                targets,
                options,
                repo_path,
                integration_branch,
                &merged,
                &conflict_resolutions,
                plan,
                level,
                attempt,
            )
            .await;
            integration_test_results.push(IntegrationTestResult {
                level,
                attempt,
                passed,
                summary,
            });
            if passed {
                break;
            }
        }
    }

    MergeGateOutcome {
        merge_result,
        integration_test_results,
    }
}

async fn cleanup_once<T: AgentTransport>(
    invoker: &AgentInvoker<T>,
    targets: &AgentTargets,
    options: &AgentCallOptions,
    repo_path: &str,
    worktrees_dir: &str,
    branches: &[String],
) -> Vec<String> {
    let kwargs = json!({
        "repo_path": repo_path,
        "worktrees_dir": worktrees_dir,
        "branches_to_clean": branches,
    });
    match invoker.call(&targets.run_workspace_cleanup, kwargs, options).await {
        Ok(value) => serde_json::from_value::<WorkspaceCleanupResult>(value)
            .map(|r| if r.success { r.cleaned } else { Vec::new() })
            .unwrap_or_default(),
        Err(_) => Vec::new(),
    }
}

/// Removes every worktree/branch in one batched call, retrying the whole
/// call once for whatever didn't come back in `cleaned`. Used both
/// per-level and for the final sweep over every branch at executor
/// termination.
pub async fn cleanup_branches<T: AgentTransport>(
    invoker: &AgentInvoker<T>,
    targets: &AgentTargets,
    options: &AgentCallOptions,
    repo_path: &str,
    worktrees_dir: &str,
    branches: &[String],
) -> Vec<(String, bool)> {
    if branches.is_empty() {
        return Vec::new();
    }

    let mut cleaned: HashSet<String> =
        cleanup_once(invoker, targets, options, repo_path, worktrees_dir, branches)
            .await
            .into_iter()
            .collect();

    let remaining: Vec<String> = branches.iter().filter(|b| !cleaned.contains(*b)).cloned().collect();
    if !remaining.is_empty() {
        let retried = cleanup_once(invoker, targets, options, repo_path, worktrees_dir, &remaining).await;
        cleaned.extend(retried);
    }

    branches.iter().map(|b| (b.clone(), cleaned.contains(b))).collect()
}
