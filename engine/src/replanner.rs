//! Outer driver: invoked at a level barrier when at least one issue
//! failed unrecoverably and replanning is still available. Grounded on
//! the replan-gate section of `dag_executor.py::run_dag` plus
//! `_enrich_downstream_with_failure_notes`/`_skip_downstream`.
//!
//! Deliberately diverges from `_replanner_compat.py`: where the original
//! falls back to `ABORT` on a replanner agent failure, this falls back to
//! `CONTINUE` — a flaky replanner call should degrade to "skip the
//! downstream work and keep going", not end the whole run.

use crate::agent::{AgentCallOptions, AgentInvoker, AgentTargets, AgentTransport};
use crate::dag::{ReplanAction, ReplanDecision};
use crate::issue::{IssueOutcome, IssueResult};
use crate::state::DAGState;
use serde_json::json;
use std::collections::HashSet;

pub enum ReplanOutcome {
    /// `action: abort` — the executor breaks its outer loop.
    Abort,
    /// `action: continue`, or an `InvalidReplan` that fell back to it —
    /// downstream issues are now marked skipped; the executor advances.
    Skipped,
    /// `action: modify_dag`/`reduce_scope` applied successfully;
    /// `current_level` is already reset to 0 by `apply_structural_replan`.
    Applied,
}

/// The message attached to every issue downstream of an unrecoverable
/// failure, whether via an explicit `continue` decision or because
/// replanning was disabled/exhausted (§7 user-visible failure behavior).
pub fn failure_note(failure: &IssueResult, depends_on: &[String]) -> String {
    format!(
        "WARNING: Upstream issue '{}' failed. Error: {}. It was supposed to provide: {:?}. \
         You may need to implement workarounds or stubs for missing functionality.",
        failure.issue_name, failure.error_message, depends_on
    )
}

/// Appends a failure note to, and marks skipped, every issue downstream of
/// each failure in `failures`. Used both by the `continue` decision path
/// here and directly by the executor when replanning is disabled or its
/// budget is exhausted.
pub fn skip_downstream_with_notes(state: &mut DAGState, failures: &[IssueResult]) {
    let mut already_skipped: HashSet<String> = state
        .skipped_issues
        .iter()
        .map(|r| r.issue_name.clone())
        .collect();

    for failure in failures {
        let downstream_names = state.find_downstream(&failure.issue_name);
        for name in downstream_names {
            if already_skipped.contains(&name) {
                continue;
            }
            if let Some(issue) = state.all_issues.iter_mut().find(|i| i.name == name) {
                let note = failure_note(failure, &issue.depends_on);
                issue.failure_notes.push(note);
            }
            state.skipped_issues.push(IssueResult {
                issue_name: name.clone(),
                outcome: IssueOutcome::Skipped,
                result_summary: format!(
                    "skipped: upstream '{}' failed unrecoverably",
                    failure.issue_name
                ),
                error_message: String::new(),
                error_context: String::new(),
                attempts: 0,
                files_changed: Vec::new(),
                branch_name: String::new(),
            });
            already_skipped.insert(name);
        }
    }
}

fn fallback_decision() -> ReplanDecision {
    ReplanDecision {
        action: ReplanAction::Continue,
        rationale: "replanner agent failed; falling back to continue so downstream work is \
                    marked skipped instead of aborting the run"
            .to_string(),
        updated_issues: vec![],
        removed_issue_names: vec![],
        skipped_issue_names: vec![],
        new_issues: vec![],
        summary: "replanner failure fallback".to_string(),
    }
}

async fn fan_out_issue_writers<T: AgentTransport>(
    invoker: &AgentInvoker<T>,
    targets: &AgentTargets,
    options: &AgentCallOptions,
    decision: &ReplanDecision,
) {
    let calls = decision
        .new_issues
        .iter()
        .chain(decision.updated_issues.iter())
        .map(|issue| invoker.call(&targets.run_issue_writer, json!({ "issue": issue }), options));
    let _ = futures::future::join_all(calls).await;
}

/// Runs one replan-gate pass: invokes the replanner, applies its decision,
/// and returns how the executor should proceed.
pub async fn run_replanner<T: AgentTransport>(
    invoker: &AgentInvoker<T>,
    targets: &AgentTargets,
    options: &AgentCallOptions,
    state: &mut DAGState,
    just_failed: &[IssueResult],
) -> ReplanOutcome {
    let kwargs = json!({
        "dag_state": &*state,
        "just_failed": just_failed,
    });

    let decision: ReplanDecision = match invoker.call(&targets.run_replanner, kwargs, options).await
    {
        Ok(value) => serde_json::from_value(value).unwrap_or_else(|_| fallback_decision()),
        Err(_) => fallback_decision(),
    };

    match decision.action {
        ReplanAction::Abort => {
            state.record_trivial_replan(&decision);
            ReplanOutcome::Abort
        }
        ReplanAction::Continue => {
            state.record_trivial_replan(&decision);
            skip_downstream_with_notes(state, just_failed);
            ReplanOutcome::Skipped
        }
        ReplanAction::ModifyDag | ReplanAction::ReduceScope => {
            match state.apply_structural_replan(&decision) {
                Ok(()) => {
                    fan_out_issue_writers(invoker, targets, options, &decision).await;
                    ReplanOutcome::Applied
                }
                Err(_) => {
                    let mut fallback = fallback_decision();
                    fallback.rationale =
                        "replan would introduce a cycle; falling back to continue".to_string();
                    state.record_trivial_replan(&fallback);
                    skip_downstream_with_notes(state, just_failed);
                    ReplanOutcome::Skipped
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Issue;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;

    struct ScriptedReplanner(Mutex<Vec<Value>>);

    #[async_trait]
    impl AgentTransport for ScriptedReplanner {
        async fn send(
            &self,
            _target: &str,
            _kwargs: &Value,
            _options: &AgentCallOptions,
        ) -> std::result::Result<Value, String> {
            let mut responses = self.0.lock().unwrap();
            if responses.is_empty() {
                Err("no scripted replanner response".into())
            } else {
                Ok(responses.remove(0))
            }
        }
    }

    fn state_with(issues: Vec<Issue>) -> DAGState {
        DAGState::new("/repo", "artifacts", issues, 2).unwrap()
    }

    #[tokio::test]
    async fn continue_marks_downstream_skipped_with_notes() {
        let mut issue_b = Issue::new("b", 2, "B");
        issue_b.depends_on = vec!["a".to_string()];
        let mut state = state_with(vec![Issue::new("a", 1, "A"), issue_b]);
        let failure = IssueResult::unrecoverable("a", "compile error");
        state.failed_issues.push(failure.clone());

        let invoker = AgentInvoker::new(ScriptedReplanner(Mutex::new(vec![json!({
            "action": "continue",
            "rationale": "not worth a full replan",
        })])));

        let outcome = run_replanner(
            &invoker,
            &AgentTargets::rooted_at("swe-planner"),
            &AgentCallOptions::default(),
            &mut state,
            &[failure],
        )
        .await;

        assert!(matches!(outcome, ReplanOutcome::Skipped));
        assert_eq!(state.skipped_issues.len(), 1);
        assert_eq!(state.skipped_issues[0].issue_name, "b");
        let b = state.all_issues.iter().find(|i| i.name == "b").unwrap();
        assert_eq!(b.failure_notes.len(), 1);
        assert!(b.failure_notes[0].contains("Upstream issue 'a' failed"));
    }

    #[tokio::test]
    async fn replanner_failure_falls_back_to_continue_not_abort() {
        let mut state = state_with(vec![Issue::new("a", 1, "A")]);
        let failure = IssueResult::unrecoverable("a", "boom");
        state.failed_issues.push(failure.clone());

        let invoker = AgentInvoker::new(ScriptedReplanner(Mutex::new(vec![])));
        let outcome = run_replanner(
            &invoker,
            &AgentTargets::rooted_at("swe-planner"),
            &AgentCallOptions::default(),
            &mut state,
            &[failure],
        )
        .await;

        assert!(matches!(outcome, ReplanOutcome::Skipped));
        assert_eq!(state.replan_count, 1);
    }

    #[tokio::test]
    async fn cycle_inducing_modify_dag_falls_back_to_continue() {
        let mut issue_b = Issue::new("b", 2, "B");
        issue_b.depends_on = vec!["a".to_string()];
        let mut state = state_with(vec![Issue::new("a", 1, "A"), issue_b]);
        let failure = IssueResult::unrecoverable("a", "boom");
        state.failed_issues.push(failure.clone());

        // "a" is already terminal (failed); the replan targets the
        // remaining issue "b" plus a new issue "c", wiring them into a
        // cycle the engine must reject.
        let mut cyclic_b = Issue::new("b", 2, "B");
        cyclic_b.depends_on = vec!["c".to_string()];
        let mut new_c = Issue::new("c", 0, "C");
        new_c.depends_on = vec!["b".to_string()];
        let invoker = AgentInvoker::new(ScriptedReplanner(Mutex::new(vec![json!({
            "action": "modify_dag",
            "updated_issues": [cyclic_b],
            "new_issues": [new_c],
        })])));

        let outcome = run_replanner(
            &invoker,
            &AgentTargets::rooted_at("swe-planner"),
            &AgentCallOptions::default(),
            &mut state,
            &[failure],
        )
        .await;

        assert!(matches!(outcome, ReplanOutcome::Skipped));
    }
}
