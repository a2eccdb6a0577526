//! Resolved endpoint strings for every required agent target (§6).
//!
//! Targets are opaque `"<node_id>.<function>"` strings from the engine's
//! point of view — only the runner crate's config layer knows what they
//! resolve to. Passed in explicitly at executor construction time, never
//! looked up through a global (§9 Design Notes).

#[derive(Debug, Clone)]
pub struct AgentTargets {
    pub run_coder: String,
    pub run_qa: String,
    pub run_code_reviewer: String,
    pub run_qa_synthesizer: String,
    pub run_retry_advisor: String,
    pub run_replanner: String,
    pub run_issue_writer: String,
    pub run_workspace_setup: String,
    pub run_workspace_cleanup: String,
    pub run_merger: String,
    pub run_integration_tester: String,
}

impl AgentTargets {
    /// Targets rooted at a single node id, e.g. `"swe-planner"` yields
    /// `"swe-planner.run_coder"`, `"swe-planner.run_qa"`, and so on — the
    /// common case where one planning node serves every function.
    pub fn rooted_at(node_id: impl AsRef<str>) -> Self {
        let node_id = node_id.as_ref();
        let at = |function: &str| format!("{node_id}.{function}");
        Self {
            run_coder: at("run_coder"),
            run_qa: at("run_qa"),
            run_code_reviewer: at("run_code_reviewer"),
            run_qa_synthesizer: at("run_qa_synthesizer"),
            run_retry_advisor: at("run_retry_advisor"),
            run_replanner: at("run_replanner"),
            run_issue_writer: at("run_issue_writer"),
            run_workspace_setup: at("run_workspace_setup"),
            run_workspace_cleanup: at("run_workspace_cleanup"),
            run_merger: at("run_merger"),
            run_integration_tester: at("run_integration_tester"),
        }
    }
}
