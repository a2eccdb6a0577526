//! Execution configuration: defaults match spec.md §6 verbatim, mirrored
//! from the original's `schemas.py::ExecutionConfig`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub max_retries_per_issue: u32,
    pub max_replans: u32,
    pub enable_replanning: bool,
    pub max_coding_iterations: u32,
    pub max_integration_test_retries: u32,
    pub enable_integration_testing: bool,
    pub agent_timeout_seconds: u64,
    pub agent_max_turns: u32,
    pub max_budget_usd: Option<f64>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_retries_per_issue: 1,
            max_replans: 2,
            enable_replanning: true,
            max_coding_iterations: 5,
            max_integration_test_retries: 1,
            enable_integration_testing: true,
            agent_timeout_seconds: 2700,
            agent_max_turns: 150,
            max_budget_usd: None,
        }
    }
}
