//! Middle loop: retries an issue execution that raised a hard error,
//! consulting a retry-advisor agent between attempts.
//!
//! The coding loop itself never throws — it always resolves to an
//! `IssueResult`, including `failed_unrecoverable` outcomes. What this
//! driver wraps is the coding-loop *attempt* crashing outright (the
//! executor's inner per-attempt task panicking), which surfaces as a
//! `JoinError` turned into an `EngineError`. `execute_level` wires the two
//! together: an outer per-issue task drives this loop, an inner task per
//! attempt runs the coding loop so a panic there is caught and handed back
//! here as a retryable error instead of aborting the whole level (§4.5).

use crate::agent::{AgentCallOptions, AgentInvoker, AgentTargets, AgentTransport};
use crate::error::EngineError;
use crate::issue::{Issue, IssueResult};
use crate::schemas::RetryAdvice;
use serde_json::json;
use std::future::Future;

/// Runs `execute` against `issue`, retrying up to `max_retries` times on
/// error with advisor-guided context injected into a fresh issue copy each
/// time. `execute` itself never sees the advisor — only this driver does.
pub async fn run_with_retry_advisor<T, F, Fut>(
    invoker: &AgentInvoker<T>,
    targets: &AgentTargets,
    options: &AgentCallOptions,
    issue: &Issue,
    max_retries: u32,
    mut execute: F,
) -> IssueResult
where
    T: AgentTransport,
    F: FnMut(Issue) -> Fut,
    Fut: Future<Output = Result<IssueResult, EngineError>>,
{
    let mut attempt_issue = issue.clone();
    let mut attempt_number = 0u32;

    loop {
        attempt_number += 1;
        match execute(attempt_issue.clone()).await {
            Ok(result) => return result,
            Err(err) => {
                if attempt_number > max_retries {
                    return IssueResult::unrecoverable(
                        issue.name.clone(),
                        format!("exhausted {max_retries} retries: {err}"),
                    );
                }

                let advisor_kwargs = json!({
                    "issue": issue,
                    "error_message": err.to_string(),
                    "error_context": format!("{err:?}"),
                    "attempt_number": attempt_number,
                });

                match invoker
                    .call(&targets.run_retry_advisor, advisor_kwargs, options)
                    .await
                    .and_then(|value| {
                        serde_json::from_value::<RetryAdvice>(value).map_err(|e| {
                            EngineError::AgentFailed {
                                label: targets.run_retry_advisor.clone(),
                                status: "malformed_response".into(),
                                message: e.to_string(),
                            }
                        })
                    }) {
                    Ok(advice) if !advice.should_retry => {
                        return IssueResult::unrecoverable(
                            issue.name.clone(),
                            format!("{err} (advisor declined retry: {})", advice.diagnosis),
                        );
                    }
                    Ok(advice) => {
                        attempt_issue = issue.clone();
                        attempt_issue.previous_error = Some(err.to_string());
                        attempt_issue.retry_diagnosis = Some(advice.diagnosis);
                        attempt_issue.retry_context = Some(advice.modified_context);
                    }
                    Err(_) => {
                        // Advisor itself failed: fall back to one more blind
                        // retry rather than giving up immediately.
                        attempt_issue = issue.clone();
                        attempt_issue.previous_error = Some(err.to_string());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::IssueOutcome;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::cell::Cell;
    use std::sync::Mutex;

    struct StubAdvisor(Mutex<Vec<Value>>);

    #[async_trait]
    impl AgentTransport for StubAdvisor {
        async fn send(
            &self,
            _target: &str,
            _kwargs: &Value,
            _options: &AgentCallOptions,
        ) -> std::result::Result<Value, String> {
            let mut responses = self.0.lock().unwrap();
            if responses.is_empty() {
                Err("no more scripted advisor responses".into())
            } else {
                Ok(responses.remove(0))
            }
        }
    }

    #[tokio::test]
    async fn retries_until_execute_succeeds() {
        let invoker = AgentInvoker::new(StubAdvisor(Mutex::new(vec![
            json!({"should_retry": true, "diagnosis": "transient clone failure"}),
        ])));
        let issue = Issue::new("setup-ci", 1, "Set up CI");
        let attempts = Cell::new(0);

        let result = run_with_retry_advisor(
            &invoker,
            &AgentTargets::rooted_at("swe-planner"),
            &AgentCallOptions::default(),
            &issue,
            1,
            |attempt_issue| {
                let n = attempts.get() + 1;
                attempts.set(n);
                async move {
                    if n == 1 {
                        Err(EngineError::AgentFailed {
                            label: "workspace".into(),
                            status: "failed".into(),
                            message: "clone failed".into(),
                        })
                    } else {
                        Ok(IssueResult::completed(attempt_issue.name, n))
                    }
                }
            },
        )
        .await;

        assert_eq!(result.outcome, IssueOutcome::Completed);
        assert_eq!(attempts.get(), 2);
    }

    #[tokio::test]
    async fn advisor_declining_retry_stops_immediately() {
        let invoker = AgentInvoker::new(StubAdvisor(Mutex::new(vec![
            json!({"should_retry": false, "diagnosis": "unrecoverable misconfiguration"}),
        ])));
        let issue = Issue::new("bad-config", 2, "Bad config");

        let result = run_with_retry_advisor(
            &invoker,
            &AgentTargets::rooted_at("swe-planner"),
            &AgentCallOptions::default(),
            &issue,
            3,
            |_issue| async {
                Err(EngineError::AgentFailed {
                    label: "workspace".into(),
                    status: "failed".into(),
                    message: "config error".into(),
                })
            },
        )
        .await;

        assert_eq!(result.outcome, IssueOutcome::FailedUnrecoverable);
        assert!(result.error_message.contains("unrecoverable misconfiguration"));
    }
}
