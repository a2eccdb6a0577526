//! Unwraps the agent-call envelope: `{execution_id, status, duration_ms,
//! result, error_message, ...}`.
//!
//! Ground truth: the original's `envelope.py::unwrap_call_result`. A
//! response that never carried an envelope (a bare result) passes through
//! unchanged; a response that did carry one and finished in a terminal
//! failure status surfaces as `AgentFailed`.

use crate::error::{EngineError, Result};
use serde_json::Value;

const ENVELOPE_KEYS: &[&str] = &[
    "execution_id",
    "run_id",
    "node_id",
    "type",
    "target",
    "status",
    "duration_ms",
    "timestamp",
    "result",
    "error_message",
    "cost",
];

const TERMINAL_STATUSES: &[&str] = &["failed", "error", "cancelled", "timeout"];

fn looks_like_envelope(value: &Value) -> bool {
    match value.as_object() {
        Some(obj) => obj.keys().any(|k| ENVELOPE_KEYS.contains(&k.as_str())),
        None => false,
    }
}

/// Unwraps `value` as described above. `label` identifies the call for
/// error messages (e.g. `"swe-planner.run_coder"`).
pub fn unwrap_call_result(label: &str, value: Value) -> Result<Value> {
    if !looks_like_envelope(&value) {
        return Ok(value);
    }

    let obj = value.as_object().expect("looks_like_envelope checked this");
    let status = obj.get("status").and_then(Value::as_str).unwrap_or("");

    if TERMINAL_STATUSES.contains(&status) {
        let message = obj
            .get("error_message")
            .and_then(Value::as_str)
            .unwrap_or("no error_message in envelope")
            .to_string();
        return Err(EngineError::AgentFailed {
            label: label.to_string(),
            status: status.to_string(),
            message,
        });
    }

    match obj.get("result") {
        Some(result) if !result.is_null() => Ok(result.clone()),
        _ => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_result_passes_through() {
        let value = json!({"should_retry": true, "diagnosis": "flaky test"});
        let out = unwrap_call_result("advisor", value.clone()).unwrap();
        assert_eq!(out, value);
    }

    #[test]
    fn envelope_with_result_unwraps_it() {
        let value = json!({
            "execution_id": "abc123",
            "status": "completed",
            "result": {"action": "approve"},
        });
        let out = unwrap_call_result("synthesizer", value).unwrap();
        assert_eq!(out, json!({"action": "approve"}));
    }

    #[test]
    fn terminal_status_is_agent_failed() {
        let value = json!({
            "execution_id": "abc123",
            "status": "timeout",
            "error_message": "agent exceeded 2700s",
        });
        let err = unwrap_call_result("coder", value).unwrap_err();
        match err {
            EngineError::AgentFailed { label, status, message } => {
                assert_eq!(label, "coder");
                assert_eq!(status, "timeout");
                assert_eq!(message, "agent exceeded 2700s");
            }
            other => panic!("expected AgentFailed, got {other:?}"),
        }
    }

    #[test]
    fn envelope_with_null_result_and_non_terminal_status_returns_envelope() {
        let value = json!({"execution_id": "abc", "status": "running", "result": null});
        let out = unwrap_call_result("coder", value.clone()).unwrap();
        assert_eq!(out, value);
    }
}
