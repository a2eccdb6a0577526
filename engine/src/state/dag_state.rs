//! `DAGState` — the single piece of state the executor checkpoints.
//!
//! Mutated only by the driver, only between barriers (§5). Everything else
//! (coding loop iteration history, in-progress agent calls) is scoped to a
//! single issue attempt and never touches this struct.

use crate::dag::{self, ReplanAction, ReplanDecision};
use crate::error::{EngineError, Result};
use crate::issue::{Issue, IssueName, IssueResult};
use serde::{Deserialize, Serialize};

/// One entry per applied replan decision, kept for the replanner's own
/// context on the next invocation and for post-mortem readability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplanHistoryEntry {
    pub level: usize,
    pub action: ReplanAction,
    pub rationale: String,
    pub summary: String,
    pub decided_at: String,
}

/// Result of one merge-gate pass over a level's completed branches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeResult {
    pub level: usize,
    pub merged_branches: Vec<String>,
    pub failed_branches: Vec<String>,
    pub needs_integration_test: bool,
}

/// Result of one integration-test attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationTestResult {
    pub level: usize,
    pub attempt: u32,
    pub passed: bool,
    pub summary: String,
}

/// Git worktree mode: whether the executor is isolating issues into
/// worktrees at all, or running everything in the repo root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitMode {
    Worktrees,
    RepoRoot,
    Disabled,
}

/// The entire checkpointed state of one execution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DAGState {
    pub repo_path: String,
    pub artifacts_dir: String,
    pub prd_path: String,
    pub architecture_path: String,
    pub issues_dir: String,

    pub original_plan_summary: String,
    pub prd_summary: String,
    pub architecture_summary: String,

    pub all_issues: Vec<Issue>,
    pub levels: Vec<Vec<IssueName>>,

    pub completed_issues: Vec<IssueResult>,
    pub failed_issues: Vec<IssueResult>,
    pub skipped_issues: Vec<IssueResult>,
    pub in_flight_issues: Vec<IssueName>,
    pub current_level: usize,

    pub replan_count: u32,
    pub replan_history: Vec<ReplanHistoryEntry>,
    pub max_replans: u32,

    pub git_integration_branch: Option<String>,
    pub git_original_branch: Option<String>,
    pub git_initial_commit: Option<String>,
    pub git_mode: GitMode,
    pub pending_merge_branches: Vec<String>,
    pub merged_branches: Vec<String>,
    pub unmerged_branches: Vec<String>,
    pub worktrees_dir: Option<String>,

    pub merge_results: Vec<MergeResult>,
    pub integration_test_results: Vec<IntegrationTestResult>,
}

impl DAGState {
    pub fn new(
        repo_path: impl Into<String>,
        artifacts_dir: impl Into<String>,
        all_issues: Vec<Issue>,
        max_replans: u32,
    ) -> Result<Self> {
        let levels = dag::compute_levels(&all_issues)?;
        Ok(Self {
            repo_path: repo_path.into(),
            artifacts_dir: artifacts_dir.into(),
            prd_path: String::new(),
            architecture_path: String::new(),
            issues_dir: String::new(),
            original_plan_summary: String::new(),
            prd_summary: String::new(),
            architecture_summary: String::new(),
            all_issues,
            levels,
            completed_issues: Vec::new(),
            failed_issues: Vec::new(),
            skipped_issues: Vec::new(),
            in_flight_issues: Vec::new(),
            current_level: 0,
            replan_count: 0,
            replan_history: Vec::new(),
            max_replans,
            git_integration_branch: None,
            git_original_branch: None,
            git_initial_commit: None,
            git_mode: GitMode::Disabled,
            pending_merge_branches: Vec::new(),
            merged_branches: Vec::new(),
            unmerged_branches: Vec::new(),
            worktrees_dir: None,
            merge_results: Vec::new(),
            integration_test_results: Vec::new(),
        })
    }

    /// Names already accounted for: not eligible to run again.
    pub fn done_names(&self) -> std::collections::HashSet<&str> {
        self.completed_issues
            .iter()
            .chain(&self.failed_issues)
            .chain(&self.skipped_issues)
            .map(|r| r.issue_name.as_str())
            .collect()
    }

    /// Issues still active: not yet completed, failed, or skipped.
    pub fn remaining_issues(&self) -> Vec<Issue> {
        let done = self.done_names();
        self.all_issues
            .iter()
            .filter(|i| !done.contains(i.name.as_str()))
            .cloned()
            .collect()
    }

    pub fn find_downstream(&self, issue_name: &str) -> Vec<IssueName> {
        dag::find_downstream(&self.all_issues, issue_name)
    }

    /// `continue`/`abort` only bump counters — no graph mutation (§4.1).
    pub fn record_trivial_replan(&mut self, decision: &ReplanDecision) {
        debug_assert!(matches!(
            decision.action,
            ReplanAction::Continue | ReplanAction::Abort
        ));
        self.replan_count += 1;
        self.replan_history.push(ReplanHistoryEntry {
            level: self.current_level,
            action: decision.action,
            rationale: decision.rationale.clone(),
            summary: decision.summary.clone(),
            decided_at: chrono::Utc::now().to_rfc3339(),
        });
    }

    /// `modify_dag`/`reduce_scope`: rebuild the remaining set, recompute
    /// levels, reset `current_level` to 0. On `InvalidReplan` the state is
    /// left entirely unchanged — the caller falls back to `continue`
    /// semantics.
    pub fn apply_structural_replan(&mut self, decision: &ReplanDecision) -> Result<()> {
        debug_assert!(matches!(
            decision.action,
            ReplanAction::ModifyDag | ReplanAction::ReduceScope
        ));

        let remaining = self.remaining_issues();
        let applied = dag::apply_replan(&remaining, decision)?;

        for name in &decision.skipped_issue_names {
            self.skipped_issues.push(IssueResult {
                issue_name: name.clone(),
                outcome: crate::issue::IssueOutcome::Skipped,
                result_summary: "skipped by replan".into(),
                error_message: String::new(),
                error_context: String::new(),
                attempts: 0,
                files_changed: Vec::new(),
                branch_name: String::new(),
            });
        }

        let done = self.done_names();
        let mut all_issues: Vec<Issue> = self
            .all_issues
            .iter()
            .filter(|i| done.contains(i.name.as_str()))
            .cloned()
            .collect();
        all_issues.extend(applied.remaining);

        self.all_issues = all_issues;
        self.levels = applied.levels;
        self.current_level = 0;
        self.replan_count += 1;
        self.replan_history.push(ReplanHistoryEntry {
            level: self.current_level,
            action: decision.action,
            rationale: decision.rationale.clone(),
            summary: decision.summary.clone(),
            decided_at: chrono::Utc::now().to_rfc3339(),
        });
        Ok(())
    }

    pub fn can_replan(&self) -> bool {
        self.replan_count < self.max_replans
    }

    /// Checks the invariants spec.md §3 states for `DAGState`. Intended for
    /// tests and debug assertions at barriers, not the hot path.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for r in self
            .completed_issues
            .iter()
            .chain(&self.failed_issues)
            .chain(&self.skipped_issues)
        {
            if !seen.insert(r.issue_name.as_str()) {
                return Err(format!(
                    "issue '{}' appears in more than one outcome set",
                    r.issue_name
                ));
            }
        }
        if self.replan_count > self.max_replans {
            return Err(format!(
                "replan_count {} exceeds max_replans {}",
                self.replan_count, self.max_replans
            ));
        }
        if dag::compute_levels(&self.remaining_issues()).is_err() {
            return Err("remaining issue set contains a cycle".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(name: &str, seq: u32, deps: &[&str]) -> Issue {
        let mut i = Issue::new(name, seq, name);
        i.depends_on = deps.iter().map(|s| s.to_string()).collect();
        i
    }

    #[test]
    fn new_state_computes_initial_levels() {
        let state = DAGState::new(
            "/repo",
            "artifacts",
            vec![issue("a", 1, &[]), issue("b", 2, &["a"])],
            2,
        )
        .unwrap();
        assert_eq!(state.levels, vec![vec!["a".to_string()], vec!["b".to_string()]]);
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn structural_replan_resets_current_level_and_recomputes() {
        let mut state = DAGState::new(
            "/repo",
            "artifacts",
            vec![issue("a", 1, &[]), issue("b", 2, &["a"])],
            2,
        )
        .unwrap();
        state.current_level = 1;
        state.completed_issues.push(IssueResult::completed("a", 1));

        let decision = ReplanDecision {
            action: ReplanAction::ModifyDag,
            rationale: "add follow-up work".into(),
            updated_issues: vec![],
            removed_issue_names: vec![],
            skipped_issue_names: vec![],
            new_issues: vec![issue("c", 0, &["b"])],
            summary: String::new(),
        };
        state.apply_structural_replan(&decision).unwrap();

        assert_eq!(state.current_level, 0);
        assert_eq!(state.replan_count, 1);
        assert!(state.all_issues.iter().any(|i| i.name == "c"));
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn invalid_replan_leaves_state_unchanged() {
        let mut state =
            DAGState::new("/repo", "artifacts", vec![issue("a", 1, &[])], 2).unwrap();
        let before = state.all_issues.clone();

        let decision = ReplanDecision {
            action: ReplanAction::ModifyDag,
            rationale: String::new(),
            updated_issues: vec![issue("a", 1, &["b"])],
            removed_issue_names: vec![],
            skipped_issue_names: vec![],
            new_issues: vec![issue("b", 0, &["a"])],
            summary: String::new(),
        };
        let err = state.apply_structural_replan(&decision).unwrap_err();
        assert!(matches!(err, EngineError::InvalidReplan { .. }));
        assert_eq!(state.all_issues, before);
        assert_eq!(state.replan_count, 0);
    }
}
