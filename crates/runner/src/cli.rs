use clap::Parser;
use std::path::PathBuf;

/// Runs the DAG execution engine against a planned set of issues.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML config file layered beneath these flags.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Repository root the issues operate on.
    #[arg(long)]
    pub repo_path: Option<PathBuf>,

    /// Directory (relative to repo_path) holding plan/execution/logs state.
    #[arg(long)]
    pub artifacts_dir: Option<String>,

    /// Node id agent targets are rooted at, e.g. "swe-planner".
    #[arg(long)]
    pub agent_node_id: Option<String>,

    /// Command used to invoke each agent call (subprocess entrypoint).
    #[arg(long)]
    pub agent_command: Option<String>,

    /// Parent directory for issue worktrees.
    #[arg(long)]
    pub worktree_base_dir: Option<PathBuf>,

    #[arg(long)]
    pub max_retries_per_issue: Option<u32>,

    #[arg(long)]
    pub max_replans: Option<u32>,

    #[arg(long, default_value_t = false)]
    pub disable_replanning: bool,

    #[arg(long)]
    pub max_coding_iterations: Option<u32>,

    #[arg(long, default_value_t = false)]
    pub disable_integration_testing: bool,

    #[arg(long)]
    pub agent_timeout_seconds: Option<u64>,

    #[arg(long)]
    pub max_budget_usd: Option<f64>,
}

#[cfg(test)]
impl Cli {
    pub fn default_for_test() -> Self {
        Self {
            config: None,
            repo_path: None,
            artifacts_dir: None,
            agent_node_id: None,
            agent_command: None,
            worktree_base_dir: None,
            max_retries_per_issue: None,
            max_replans: None,
            disable_replanning: false,
            max_coding_iterations: None,
            disable_integration_testing: false,
            agent_timeout_seconds: None,
            max_budget_usd: None,
        }
    }
}
