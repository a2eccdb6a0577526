//! The inner loop: coder, then QA and review in parallel, then a
//! synthesizer decides whether to approve, block, or send the issue back
//! for another fix pass.
//!
//! Grounded on the original's `coding_loop.py::run_coding_loop`, with one
//! addition the original does not have: per-agent failure fallbacks, so a
//! flaky QA or reviewer call degrades the loop instead of crashing it.
//! Raw agent exceptions in the original simply propagate to the level
//! gather; here they're absorbed into a conservative default for each
//! role, matching spec semantics at the boundary instead of the original's.

use crate::agent::{AgentCallOptions, AgentInvoker, AgentTargets, AgentTransport};
use crate::issue::{Issue, IssueResult};
use crate::schemas::{
    CodeReviewResult, CoderResult, IterationRecord, QAResult, QASynthesisResult, SynthesisAction,
};
use serde_json::json;

/// Runs the coding loop for a single issue, up to `max_iterations` rounds.
pub async fn run_coding_loop<T: AgentTransport>(
    invoker: &AgentInvoker<T>,
    targets: &AgentTargets,
    options: &AgentCallOptions,
    issue: &Issue,
    max_iterations: u32,
) -> IssueResult {
    let mut files_changed: Vec<String> = Vec::new();
    let mut history: Vec<IterationRecord> = Vec::new();
    let mut feedback: Option<String> = None;

    for iteration in 1..=max_iterations {
        let iteration_id = uuid::Uuid::new_v4().to_string()[..8].to_string();

        let coder_kwargs = json!({
            "issue": issue,
            "iteration": iteration,
            "iteration_id": iteration_id,
            "feedback": feedback,
        });
        let coder: CoderResult = match invoker.call(&targets.run_coder, coder_kwargs, options).await {
            Ok(value) => serde_json::from_value(value).unwrap_or_default(),
            Err(_) => CoderResult::default(),
        };
        for f in &coder.files_changed {
            if !files_changed.contains(f) {
                files_changed.push(f.clone());
            }
        }

        let qa_kwargs = json!({
            "issue": issue,
            "files_changed": files_changed,
            "iteration": iteration,
        });
        let review_kwargs = qa_kwargs.clone();

        let (qa_outcome, review_outcome) = tokio::join!(
            invoker.call(&targets.run_qa, qa_kwargs, options),
            invoker.call(&targets.run_code_reviewer, review_kwargs, options),
        );

        let qa: QAResult = match qa_outcome {
            Ok(value) => serde_json::from_value(value).unwrap_or_default(),
            Err(_) => QAResult {
                passed: false,
                ..Default::default()
            },
        };
        let review: CodeReviewResult = match review_outcome {
            Ok(value) => serde_json::from_value(value).unwrap_or_default(),
            Err(_) => CodeReviewResult {
                approved: true,
                blocking: false,
                ..Default::default()
            },
        };

        let synth_kwargs = json!({
            "issue": issue,
            "qa": qa,
            "review": review,
            "iteration_history": history,
        });
        let synthesis: QASynthesisResult =
            match invoker.call(&targets.run_qa_synthesizer, synth_kwargs, options).await {
                Ok(value) => serde_json::from_value(value)
                    .unwrap_or_else(|_| fallback_synthesis(&qa, &review)),
                Err(_) => fallback_synthesis(&qa, &review),
            };

        history.push(IterationRecord {
            iteration,
            action: action_label(synthesis.action).to_string(),
            summary: synthesis.summary.clone(),
            qa_passed: qa.passed,
            review_approved: review.approved,
            review_blocking: review.blocking,
        });

        match synthesis.action {
            SynthesisAction::Approve => {
                let mut result = IssueResult::completed(issue.name.clone(), iteration);
                result.result_summary = synthesis.summary;
                result.files_changed = files_changed;
                result.branch_name = issue.branch_name.clone().unwrap_or_default();
                return result;
            }
            SynthesisAction::Block => {
                let mut result =
                    IssueResult::unrecoverable(issue.name.clone(), synthesis.summary);
                result.attempts = iteration;
                result.files_changed = files_changed;
                return result;
            }
            SynthesisAction::Fix if synthesis.stuck => {
                let mut result = IssueResult::unrecoverable(
                    issue.name.clone(),
                    format!("Stuck loop detected: {}", synthesis.summary),
                );
                result.attempts = iteration;
                result.files_changed = files_changed;
                return result;
            }
            SynthesisAction::Fix => {
                feedback = Some(synthesis.summary);
            }
        }
    }

    let mut result = IssueResult::unrecoverable(
        issue.name.clone(),
        format!("Coding loop exhausted after {max_iterations} iterations without approval"),
    );
    result.attempts = max_iterations;
    result.files_changed = files_changed;
    result
}

fn action_label(action: SynthesisAction) -> &'static str {
    match action {
        SynthesisAction::Fix => "fix",
        SynthesisAction::Approve => "approve",
        SynthesisAction::Block => "block",
    }
}

/// Fallback when the synthesizer call itself fails: approve only if QA
/// passed and review approved without a blocking flag, otherwise block if
/// the reviewer raised a blocking concern, otherwise ask for another fix.
fn fallback_synthesis(qa: &QAResult, review: &CodeReviewResult) -> QASynthesisResult {
    if qa.passed && review.approved && !review.blocking {
        QASynthesisResult {
            action: SynthesisAction::Approve,
            summary: "synthesizer unavailable; approved on QA pass and review approval".into(),
            stuck: false,
        }
    } else if review.blocking {
        QASynthesisResult {
            action: SynthesisAction::Block,
            summary: "synthesizer unavailable; blocking per reviewer".into(),
            stuck: false,
        }
    } else {
        QASynthesisResult {
            action: SynthesisAction::Fix,
            summary: "synthesizer unavailable; requesting another fix pass".into(),
            stuck: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::IssueOutcome;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct ScriptedTransport {
        calls: AtomicU32,
        responses: Mutex<Vec<(&'static str, Value)>>,
    }

    #[async_trait]
    impl AgentTransport for ScriptedTransport {
        async fn send(
            &self,
            target: &str,
            _kwargs: &Value,
            _options: &AgentCallOptions,
        ) -> std::result::Result<Value, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            let pos = responses.iter().position(|(t, _)| *t == target);
            match pos {
                Some(idx) => Ok(responses.remove(idx).1),
                None => Err(format!("no scripted response for {target}")),
            }
        }
    }

    fn targets() -> AgentTargets {
        AgentTargets::rooted_at("swe-planner")
    }

    #[tokio::test]
    async fn approves_on_first_clean_iteration() {
        let transport = ScriptedTransport {
            calls: AtomicU32::new(0),
            responses: Mutex::new(vec![
                ("swe-planner.run_coder", json!({"files_changed": ["a.rs"], "complete": true})),
                ("swe-planner.run_qa", json!({"passed": true})),
                ("swe-planner.run_code_reviewer", json!({"approved": true, "blocking": false})),
                ("swe-planner.run_qa_synthesizer", json!({"action": "approve", "summary": "looks good"})),
            ]),
        };
        let invoker = AgentInvoker::new(transport);
        let issue = Issue::new("add-logging", 1, "Add logging");
        let result = run_coding_loop(&invoker, &targets(), &AgentCallOptions::default(), &issue, 5)
            .await;
        assert_eq!(result.outcome, IssueOutcome::Completed);
        assert_eq!(result.files_changed, vec!["a.rs".to_string()]);
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn stuck_fix_loop_becomes_unrecoverable() {
        let transport = ScriptedTransport {
            calls: AtomicU32::new(0),
            responses: Mutex::new(vec![
                ("swe-planner.run_coder", json!({"files_changed": [], "complete": false})),
                ("swe-planner.run_qa", json!({"passed": false})),
                ("swe-planner.run_code_reviewer", json!({"approved": false, "blocking": false})),
                (
                    "swe-planner.run_qa_synthesizer",
                    json!({"action": "fix", "summary": "same failure again", "stuck": true}),
                ),
            ]),
        };
        let invoker = AgentInvoker::new(transport);
        let issue = Issue::new("flaky-issue", 2, "Flaky issue");
        let result = run_coding_loop(&invoker, &targets(), &AgentCallOptions::default(), &issue, 5)
            .await;
        assert_eq!(result.outcome, IssueOutcome::FailedUnrecoverable);
        assert!(result.error_message.starts_with("Stuck loop detected"));
    }

    #[tokio::test]
    async fn synthesizer_failure_falls_back_to_reviewer_and_qa_state() {
        let transport = ScriptedTransport {
            calls: AtomicU32::new(0),
            responses: Mutex::new(vec![
                ("swe-planner.run_coder", json!({"files_changed": ["b.rs"], "complete": true})),
                ("swe-planner.run_qa", json!({"passed": true})),
                ("swe-planner.run_code_reviewer", json!({"approved": true, "blocking": false})),
            ]),
        };
        let invoker = AgentInvoker::new(transport);
        let issue = Issue::new("no-synth", 3, "No synthesizer");
        let result = run_coding_loop(&invoker, &targets(), &AgentCallOptions::default(), &issue, 5)
            .await;
        assert_eq!(result.outcome, IssueOutcome::Completed);
    }
}
