//! The agent invoker: resolves a `"<node_id>.<function>"` target to an
//! external agent endpoint, applies retry/timeout/envelope handling, and
//! returns the unwrapped JSON result.
//!
//! The actual transport (spawning a subprocess, talking to a queue, a unit
//! test double) is supplied by whoever constructs the executor — per
//! §9 Design Notes the resolver is passed explicitly into the executor
//! constructor, never looked up through a module-level global.

use super::envelope::unwrap_call_result;
use super::retry::{is_transient, RetryConfig};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Per-call resource limits, forwarded to the transport alongside the
/// target and kwargs (§6 configuration table).
#[derive(Debug, Clone)]
pub struct AgentCallOptions {
    pub timeout: Duration,
    pub max_turns: u32,
    pub max_budget_usd: Option<f64>,
}

impl Default for AgentCallOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2700),
            max_turns: 150,
            max_budget_usd: None,
        }
    }
}

/// The raw transport beneath the invoker: one subprocess call, one HTTP
/// request, one in-memory stub for tests. Returns `Err(message)` for any
/// transport-level failure (connection refused, non-zero exit, malformed
/// JSON) — the invoker decides whether that message looks transient.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn send(
        &self,
        target: &str,
        kwargs: &Value,
        options: &AgentCallOptions,
    ) -> std::result::Result<Value, String>;
}

pub struct AgentInvoker<T: AgentTransport> {
    transport: T,
    retry: RetryConfig,
}

impl<T: AgentTransport> AgentInvoker<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry_config(transport: T, retry: RetryConfig) -> Self {
        Self { transport, retry }
    }

    /// Invokes `target` with `kwargs`, retrying on transient failures with
    /// exponential backoff and unwrapping the response envelope. Terminal
    /// agent failures (and exhausted retries) surface as `AgentFailed`.
    pub async fn call(
        &self,
        target: &str,
        kwargs: Value,
        options: &AgentCallOptions,
    ) -> Result<Value> {
        let mut attempt = 0u32;
        loop {
            let outcome = match self.transport.send(target, &kwargs, options).await {
                Ok(raw) => unwrap_call_result(target, raw),
                Err(message) => Err(EngineError::AgentFailed {
                    label: target.to_string(),
                    status: "transport_error".to_string(),
                    message,
                }),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(EngineError::AgentFailed { label, status, message })
                    if attempt < self.retry.max_retries && is_transient(&message) =>
                {
                    attempt += 1;
                    tracing::warn!(
                        target = %label,
                        status = %status,
                        attempt,
                        "transient agent failure, retrying"
                    );
                    tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
                }
                Err(other) => return Err(other),
            }
        }
    }

    pub async fn call_with_defaults(&self, target: &str, kwargs: Value) -> Result<Value> {
        self.call(target, kwargs, &AgentCallOptions::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyThenOk {
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl AgentTransport for FlakyThenOk {
        async fn send(
            &self,
            _target: &str,
            _kwargs: &Value,
            _options: &AgentCallOptions,
        ) -> std::result::Result<Value, String> {
            if self.failures_left.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err("503 Service Unavailable".to_string())
            } else {
                Ok(json!({"action": "approve"}))
            }
        }
    }

    struct AlwaysUnrecoverable;

    #[async_trait]
    impl AgentTransport for AlwaysUnrecoverable {
        async fn send(
            &self,
            _target: &str,
            _kwargs: &Value,
            _options: &AgentCallOptions,
        ) -> std::result::Result<Value, String> {
            Err("invalid schema: missing field 'action'".to_string())
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let invoker = AgentInvoker::new(FlakyThenOk {
            failures_left: AtomicU32::new(2),
        });
        let result = invoker
            .call_with_defaults("swe-planner.run_qa_synthesizer", json!({}))
            .await
            .unwrap();
        assert_eq!(result, json!({"action": "approve"}));
    }

    #[tokio::test]
    async fn non_transient_failure_is_not_retried() {
        let invoker = AgentInvoker::new(AlwaysUnrecoverable);
        let err = invoker
            .call_with_defaults("swe-planner.run_coder", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AgentFailed { .. }));
    }
}
