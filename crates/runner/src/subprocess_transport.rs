//! The concrete `AgentTransport`: every agent call is an external
//! subprocess invocation (never an in-process LLM SDK call), matching
//! spec's Non-goal and grounded on the original's
//! `agent_ai/providers/codex/adapter.py` argv-building/JSONL-parsing
//! pattern — here simplified to one JSON request on stdin and one JSON
//! response on stdout.

use async_trait::async_trait;
use dagflow_engine::agent::{AgentCallOptions, AgentTransport};
use serde_json::Value;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub struct SubprocessTransport {
    /// Executable invoked for every agent call, e.g. an `agent-endpoint`
    /// wrapper script that knows how to route `<node_id>.<function>`
    /// targets to the right provider.
    pub command: String,
}

#[async_trait]
impl AgentTransport for SubprocessTransport {
    async fn send(
        &self,
        target: &str,
        kwargs: &Value,
        options: &AgentCallOptions,
    ) -> Result<Value, String> {
        let request = serde_json::json!({
            "target": target,
            "kwargs": kwargs,
            "max_turns": options.max_turns,
            "max_budget_usd": options.max_budget_usd,
        });
        let body = serde_json::to_vec(&request).map_err(|e| e.to_string())?;

        let call = async {
            let mut child = Command::new(&self.command)
                .arg(target)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| format!("failed to spawn agent command '{}': {e}", self.command))?;

            child
                .stdin
                .take()
                .ok_or_else(|| "agent subprocess has no stdin".to_string())?
                .write_all(&body)
                .await
                .map_err(|e| format!("failed to write agent request: {e}"))?;

            let output = child
                .wait_with_output()
                .await
                .map_err(|e| format!("failed to wait for agent subprocess: {e}"))?;

            if !output.status.success() {
                return Err(format!(
                    "agent subprocess exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr)
                ));
            }

            serde_json::from_slice(&output.stdout)
                .map_err(|e| format!("agent subprocess produced invalid JSON: {e}"))
        };

        match tokio::time::timeout(options.timeout, call).await {
            Ok(result) => result,
            // `kill_on_drop` terminates `child` here: tokio doesn't kill on
            // drop by default, so without it this would leak the process.
            Err(_) => Err(format!("agent call to {target} timed out after {:?}", options.timeout)),
        }
    }
}
