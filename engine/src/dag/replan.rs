//! Replan application: folding a `ReplanDecision` into the remaining issue
//! set and recomputing levels.
//!
//! `continue` and `abort` never reach this module — they only bump
//! `replan_count`/`replan_history` on `DAGState` and are handled by the
//! replanner driver directly. Only `modify_dag` and `reduce_scope` rebuild
//! the graph, which is what makes cycle rejection meaningful here.

use super::levels::compute_levels;
use crate::error::{EngineError, Result};
use crate::issue::{Issue, IssueName};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplanAction {
    Continue,
    ModifyDag,
    ReduceScope,
    Abort,
}

/// Decision returned by the replanner agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplanDecision {
    pub action: ReplanAction,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub updated_issues: Vec<Issue>,
    #[serde(default)]
    pub removed_issue_names: Vec<IssueName>,
    #[serde(default)]
    pub skipped_issue_names: Vec<IssueName>,
    #[serde(default)]
    pub new_issues: Vec<Issue>,
    #[serde(default)]
    pub summary: String,
}

/// Result of a successful `modify_dag`/`reduce_scope` application: the new
/// remaining issue set (existing issues folded with updates/removals/new
/// issues, sequence numbers assigned) and its recomputed levels.
#[derive(Debug)]
pub struct AppliedReplan {
    pub remaining: Vec<Issue>,
    pub levels: Vec<Vec<IssueName>>,
}

/// Folds `decision` (must be `modify_dag` or `reduce_scope`) into
/// `remaining` — the issues not yet completed, failed, or skipped.
///
/// `skipped_issue_names` are removed from the remaining set here; moving
/// them into `DAGState::skipped_issues` is the caller's job since this
/// function only knows about the issue graph, not the broader state.
///
/// On a cycle, returns `InvalidReplan` wrapping the underlying
/// `CycleDetected` and leaves `remaining` conceptually untouched — the
/// caller must not apply the returned error's side effects.
pub fn apply_replan(remaining: &[Issue], decision: &ReplanDecision) -> Result<AppliedReplan> {
    debug_assert!(matches!(
        decision.action,
        ReplanAction::ModifyDag | ReplanAction::ReduceScope
    ));

    let removed: HashSet<&str> = decision
        .removed_issue_names
        .iter()
        .map(|s| s.as_str())
        .collect();
    let skipped: HashSet<&str> = decision
        .skipped_issue_names
        .iter()
        .map(|s| s.as_str())
        .collect();
    let updates: BTreeMap<&str, &Issue> = decision
        .updated_issues
        .iter()
        .map(|i| (i.name.as_str(), i))
        .collect();

    let mut next: Vec<Issue> = Vec::with_capacity(remaining.len());
    for issue in remaining {
        let name = issue.name.as_str();
        if removed.contains(name) || skipped.contains(name) {
            continue;
        }
        match updates.get(name) {
            Some(updated) => next.push((*updated).clone()),
            None => next.push(issue.clone()),
        }
    }

    let mut max_seq = next.iter().map(|i| i.sequence_number).max().unwrap_or(0);
    for new_issue in &decision.new_issues {
        max_seq += 1;
        let mut issue = new_issue.clone();
        issue.sequence_number = max_seq;
        next.push(issue);
    }

    let levels = compute_levels(&next).map_err(|source| EngineError::InvalidReplan {
        source: Box::new(source),
    })?;

    Ok(AppliedReplan {
        remaining: next,
        levels,
    })
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
    fn reduce_scope_drops_removed_issues_and_recomputes_levels() {
        let remaining = vec![issue("a", 1, &[]), issue("b", 2, &["a"]), issue("c", 3, &[])];
        let decision = ReplanDecision {
            action: ReplanAction::ReduceScope,
            rationale: "cut scope".into(),
            updated_issues: vec![],
            removed_issue_names: vec!["c".into()],
            skipped_issue_names: vec![],
            new_issues: vec![],
            summary: String::new(),
        };
        let applied = apply_replan(&remaining, &decision).unwrap();
        let names: Vec<_> = applied.remaining.iter().map(|i| i.name.clone()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(applied.levels, vec![vec!["a"], vec!["b"]]);
    }

    #[test]
    fn modify_dag_assigns_new_sequence_numbers_after_max() {
        let remaining = vec![issue("a", 1, &[]), issue("b", 5, &["a"])];
        let decision = ReplanDecision {
            action: ReplanAction::ModifyDag,
            rationale: String::new(),
            updated_issues: vec![],
            removed_issue_names: vec![],
            skipped_issue_names: vec![],
            new_issues: vec![issue("d", 0, &["b"])],
            summary: String::new(),
        };
        let applied = apply_replan(&remaining, &decision).unwrap();
        let d = applied.remaining.iter().find(|i| i.name == "d").unwrap();
        assert_eq!(d.sequence_number, 6);
    }

    #[test]
    fn cycle_introduced_by_replan_is_rejected() {
        let remaining = vec![issue("a", 1, &[])];
        let decision = ReplanDecision {
            action: ReplanAction::ModifyDag,
            rationale: String::new(),
            updated_issues: vec![issue("a", 1, &["b"])],
            removed_issue_names: vec![],
            skipped_issue_names: vec![],
            new_issues: vec![issue("b", 0, &["a"])],
            summary: String::new(),
        };
        let err = apply_replan(&remaining, &decision).unwrap_err();
        assert!(matches!(err, EngineError::InvalidReplan { .. }));
    }
}
