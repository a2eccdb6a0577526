//! Top-level executor: drives the DAG level by level through
//! `LEVEL_ACTIVE -> LEVEL_BARRIER -> MERGE_GATE -> REPLAN_GATE`, barrier by
//! barrier, to `DONE`. Grounded on `dag_executor.py::run_dag`'s main loop
//! and styled after `state_machine.rs`'s transition-table approach to
//! naming the stages a run passes through.

use crate::agent::{AgentCallOptions, AgentInvoker, AgentTargets, AgentTransport};
use crate::coding_loop::run_coding_loop;
use crate::config::ExecutionConfig;
use crate::error::EngineError;
use crate::issue::{Issue, IssueOutcome, IssueResult, LevelResult};
use crate::merge_gate::{cleanup_branches, run_merge_gate, setup_worktrees, PlanContext};
use crate::replanner::{run_replanner, skip_downstream_with_notes, ReplanOutcome};
use crate::retry_advisor::run_with_retry_advisor;
use crate::state::{checkpoint, DAGState, GitMode};
use std::sync::Arc;
use std::time::Duration;

/// The stage a run is currently in — purely for logging/observability; the
/// loop in `run` does not branch on this directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorStage {
    Init,
    LevelActive(usize),
    LevelBarrier(usize),
    MergeGate(usize),
    ReplanGate(usize),
    Done,
}

pub struct Executor<T: AgentTransport + 'static> {
    invoker: Arc<AgentInvoker<T>>,
    targets: AgentTargets,
    options: AgentCallOptions,
    config: ExecutionConfig,
}

impl<T: AgentTransport + 'static> Executor<T> {
    pub fn new(invoker: AgentInvoker<T>, targets: AgentTargets, config: ExecutionConfig) -> Self {
        let options = AgentCallOptions {
            timeout: Duration::from_secs(config.agent_timeout_seconds),
            max_turns: config.agent_max_turns,
            max_budget_usd: config.max_budget_usd,
        };
        Self {
            invoker: Arc::new(invoker),
            targets,
            options,
            config,
        }
    }

    /// Runs `state` to completion (`DONE`) or to an `abort` decision,
    /// checkpointing at every barrier and replan, and returns the final
    /// state. Never panics on an individual issue's failure — a panicking
    /// coding-loop task is caught and converted to a
    /// `failed_unrecoverable` result for that issue alone (§4.8).
    pub async fn run(&self, mut state: DAGState) -> DAGState {
        let _ = checkpoint::save(&state.artifacts_dir, &state).await;

        while state.current_level < state.levels.len() {
            let level_idx = state.current_level;
            let span = tracing::info_span!("level", level = level_idx);
            let _enter = span.enter();

            let done = state.done_names();
            let active_names: Vec<String> = state.levels[level_idx]
                .iter()
                .filter(|n| !done.contains(n.as_str()))
                .cloned()
                .collect();

            if active_names.is_empty() {
                state.current_level += 1;
                continue;
            }

            if state.git_mode != GitMode::Disabled {
                self.enrich_with_worktrees(&mut state, &active_names).await;
            }

            state.in_flight_issues = active_names.clone();

            let level_result = self.execute_level(&state, level_idx, &active_names).await;

            state.in_flight_issues.clear();
            state.completed_issues.extend(level_result.completed.clone());
            state.failed_issues.extend(level_result.failed.clone());
            let _ = checkpoint::save(&state.artifacts_dir, &state).await;

            if state.git_mode != GitMode::Disabled {
                self.run_merge_gate_for_level(&mut state, level_idx, &level_result)
                    .await;
            }

            let unrecoverable: Vec<IssueResult> = level_result
                .unrecoverable()
                .into_iter()
                .cloned()
                .collect();

            if unrecoverable.is_empty() {
                state.current_level += 1;
            } else if self.config.enable_replanning && state.can_replan() {
                match run_replanner(
                    &self.invoker,
                    &self.targets,
                    &self.options,
                    &mut state,
                    &unrecoverable,
                )
                .await
                {
                    ReplanOutcome::Abort => {
                        let _ = checkpoint::save(&state.artifacts_dir, &state).await;
                        break;
                    }
                    ReplanOutcome::Skipped => state.current_level += 1,
                    ReplanOutcome::Applied => {
                        // current_level already reset to 0 by the replan.
                    }
                }
            } else {
                skip_downstream_with_notes(&mut state, &unrecoverable);
                state.current_level += 1;
            }

            let _ = checkpoint::save(&state.artifacts_dir, &state).await;
        }

        if state.git_mode != GitMode::Disabled {
            let all_branches: Vec<String> = state
                .all_issues
                .iter()
                .filter_map(|i| i.branch_name.clone())
                .collect();
            let worktrees_dir = state.worktrees_dir.clone().unwrap_or_default();
            let cleaned = cleanup_branches(
                &self.invoker,
                &self.targets,
                &self.options,
                &state.repo_path,
                &worktrees_dir,
                &all_branches,
            )
            .await;
            state.unmerged_branches.retain(|b| {
                !cleaned
                    .iter()
                    .any(|(name, success)| name == b && *success)
            });
        }
        let _ = checkpoint::save(&state.artifacts_dir, &state).await;

        state
    }

    async fn enrich_with_worktrees(&self, state: &mut DAGState, active_names: &[String]) {
        let integration_branch = state.git_integration_branch.clone().unwrap_or_default();
        let worktrees_dir = state.worktrees_dir.clone().unwrap_or_default();
        let mut active_issues: Vec<Issue> = active_names
            .iter()
            .filter_map(|name| state.all_issues.iter().find(|i| &i.name == name).cloned())
            .collect();
        setup_worktrees(
            &self.invoker,
            &self.targets,
            &self.options,
            &state.repo_path,
            &mut active_issues,
            &integration_branch,
            &worktrees_dir,
        )
        .await;
        for issue in active_issues {
            if let Some(existing) = state.all_issues.iter_mut().find(|i| i.name == issue.name) {
                *existing = issue;
            }
        }
    }

    /// Fans out one task per active issue, joins them all, and isolates a
    /// panicking coding-loop attempt so it never aborts its siblings.
    ///
    /// Each task wraps its coding-loop attempts in `run_with_retry_advisor`
    /// (§4.5): the coding loop itself never raises, but a crashed attempt
    /// (an inner task panic) is the "external coder raised an exception"
    /// case that driver exists for, and is retried up to
    /// `max_retries_per_issue` times with advisor-guided context before
    /// becoming unrecoverable.
    async fn execute_level(
        &self,
        state: &DAGState,
        level_idx: usize,
        active_names: &[String],
    ) -> LevelResult {
        let mut handles = Vec::with_capacity(active_names.len());
        for name in active_names {
            let issue = state
                .all_issues
                .iter()
                .find(|i| &i.name == name)
                .cloned()
                .expect("active name always present in all_issues");
            let invoker = Arc::clone(&self.invoker);
            let targets = self.targets.clone();
            let options = self.options.clone();
            let max_iterations = self.config.max_coding_iterations;
            let max_retries = self.config.max_retries_per_issue;
            handles.push((
                name.clone(),
                tokio::spawn(async move {
                    let advisor_invoker = Arc::clone(&invoker);
                    let advisor_targets = targets.clone();
                    let advisor_options = options.clone();
                    run_with_retry_advisor(
                        &advisor_invoker,
                        &advisor_targets,
                        &advisor_options,
                        &issue,
                        max_retries,
                        move |attempt_issue: Issue| {
                            let invoker = Arc::clone(&invoker);
                            let targets = targets.clone();
                            let options = options.clone();
                            async move {
                                let issue_name = attempt_issue.name.clone();
                                let handle = tokio::spawn(async move {
                                    run_coding_loop(&invoker, &targets, &options, &attempt_issue, max_iterations)
                                        .await
                                });
                                handle.await.map_err(|join_err| EngineError::AgentFailed {
                                    label: issue_name,
                                    status: "panicked".into(),
                                    message: join_err.to_string(),
                                })
                            }
                        },
                    )
                    .await
                }),
            ));
        }

        let mut level_result = LevelResult::new(level_idx);
        for (name, handle) in handles {
            match handle.await {
                Ok(result) => match result.outcome {
                    IssueOutcome::Completed => level_result.completed.push(result),
                    IssueOutcome::Skipped => level_result.skipped.push(result),
                    IssueOutcome::FailedRetryable | IssueOutcome::FailedUnrecoverable => {
                        level_result.failed.push(result)
                    }
                },
                Err(join_err) => {
                    level_result.failed.push(IssueResult::unrecoverable(
                        name,
                        format!("issue task panicked: {join_err}"),
                    ));
                }
            }
        }
        level_result
    }

    async fn run_merge_gate_for_level(
        &self,
        state: &mut DAGState,
        level_idx: usize,
        level_result: &LevelResult,
    ) {
        let integration_branch = state.git_integration_branch.clone().unwrap_or_default();
        let plan = PlanContext {
            original_plan_summary: &state.original_plan_summary,
            prd_summary: &state.prd_summary,
            architecture_summary: &state.architecture_summary,
        };
        let outcome = run_merge_gate(
            &self.invoker,
            &self.targets,
            &self.options,
            &state.repo_path,
            &integration_branch,
            &plan,
            level_idx,
            &level_result.completed,
            self.config.enable_integration_testing,
            self.config.max_integration_test_retries,
        )
        .await;
        state
            .merged_branches
            .extend(outcome.merge_result.merged_branches.clone());
        state
            .unmerged_branches
            .extend(outcome.merge_result.failed_branches.clone());
        state.merge_results.push(outcome.merge_result);
        state
            .integration_test_results
            .extend(outcome.integration_test_results);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Issue;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedTransport {
        queues: Mutex<std::collections::HashMap<String, VecDeque<Value>>>,
    }

    impl ScriptedTransport {
        fn new(scripts: Vec<(&str, Vec<Value>)>) -> Self {
            let mut queues = std::collections::HashMap::new();
            for (target, values) in scripts {
                queues.insert(target.to_string(), values.into());
            }
            Self {
                queues: Mutex::new(queues),
            }
        }
    }

    #[async_trait]
    impl AgentTransport for ScriptedTransport {
        async fn send(
            &self,
            target: &str,
            _kwargs: &Value,
            _options: &AgentCallOptions,
        ) -> std::result::Result<Value, String> {
            let mut queues = self.queues.lock().unwrap();
            match queues.get_mut(target).and_then(VecDeque::pop_front) {
                Some(value) => Ok(value),
                None => Err(format!("no scripted response left for {target}")),
            }
        }
    }

    #[tokio::test]
    async fn linear_two_issue_run_completes_both_levels() {
        let mut issue_b = Issue::new("b", 2, "B");
        issue_b.depends_on = vec!["a".to_string()];
        let state = DAGState::new("/repo", "artifacts-linear", vec![Issue::new("a", 1, "A"), issue_b], 2)
            .unwrap();

        let approve = json!({"action": "approve", "summary": "ok"});
        let transport = ScriptedTransport::new(vec![
            ("swe-planner.run_coder", vec![json!({"files_changed": ["a.rs"], "complete": true}); 2]),
            ("swe-planner.run_qa", vec![json!({"passed": true}); 2]),
            (
                "swe-planner.run_code_reviewer",
                vec![json!({"approved": true, "blocking": false}); 2],
            ),
            ("swe-planner.run_qa_synthesizer", vec![approve.clone(), approve]),
        ]);

        let executor = Executor::new(
            AgentInvoker::new(transport),
            AgentTargets::rooted_at("swe-planner"),
            ExecutionConfig::default(),
        );

        let final_state = executor.run(state).await;
        assert_eq!(final_state.completed_issues.len(), 2);
        assert!(final_state.failed_issues.is_empty());
        assert!(final_state.in_flight_issues.is_empty());
        assert_eq!(final_state.current_level, final_state.levels.len());
    }
}
