//! Layered configuration: struct defaults < TOML file < CLI flags,
//! mirroring the teacher's `SwarmConfig` (env-populated defaults overridden
//! by explicit settings) but with `toml` + `clap` doing the layering
//! instead of raw env var reads.

use dagflow_engine::ExecutionConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub repo_path: Option<String>,
    pub artifacts_dir: Option<String>,
    pub agent_node_id: Option<String>,
    pub agent_command: Option<String>,
    pub worktree_base_dir: Option<String>,
    pub execution: ExecutionConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            repo_path: None,
            artifacts_dir: None,
            agent_node_id: None,
            agent_command: None,
            worktree_base_dir: None,
            execution: ExecutionConfig::default(),
        }
    }
}

impl FileConfig {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let body = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&body)?)
    }
}

/// Fully resolved settings after folding defaults, an optional TOML file,
/// and CLI flags together.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub repo_path: PathBuf,
    pub artifacts_dir: String,
    pub agent_node_id: String,
    pub agent_command: String,
    pub worktree_base_dir: Option<PathBuf>,
    pub execution: ExecutionConfig,
}

impl RunnerConfig {
    pub fn resolve(file: FileConfig, cli: crate::cli::Cli) -> Self {
        let repo_path = cli
            .repo_path
            .or_else(|| file.repo_path.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));
        let artifacts_dir = cli
            .artifacts_dir
            .or(file.artifacts_dir)
            .unwrap_or_else(|| "artifacts".to_string());
        let agent_node_id = cli
            .agent_node_id
            .or(file.agent_node_id)
            .unwrap_or_else(|| "swe-planner".to_string());
        let agent_command = cli
            .agent_command
            .or(file.agent_command)
            .unwrap_or_else(|| "agent-endpoint".to_string());
        let worktree_base_dir = cli
            .worktree_base_dir
            .or_else(|| file.worktree_base_dir.map(PathBuf::from));

        let mut execution = file.execution;
        if let Some(v) = cli.max_retries_per_issue {
            execution.max_retries_per_issue = v;
        }
        if let Some(v) = cli.max_replans {
            execution.max_replans = v;
        }
        if cli.disable_replanning {
            execution.enable_replanning = false;
        }
        if let Some(v) = cli.max_coding_iterations {
            execution.max_coding_iterations = v;
        }
        if cli.disable_integration_testing {
            execution.enable_integration_testing = false;
        }
        if let Some(v) = cli.agent_timeout_seconds {
            execution.agent_timeout_seconds = v;
        }
        if let Some(v) = cli.max_budget_usd {
            execution.max_budget_usd = Some(v);
        }

        Self {
            repo_path,
            artifacts_dir,
            agent_node_id,
            agent_command,
            worktree_base_dir,
            execution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_else_is_set() {
        let cfg = RunnerConfig::resolve(FileConfig::default(), crate::cli::Cli::default_for_test());
        assert_eq!(cfg.artifacts_dir, "artifacts");
        assert_eq!(cfg.execution.max_replans, 2);
    }

    #[test]
    fn cli_flag_overrides_file_value() {
        let mut file = FileConfig::default();
        file.execution.max_replans = 5;
        let mut cli = crate::cli::Cli::default_for_test();
        cli.max_replans = Some(1);
        let cfg = RunnerConfig::resolve(file, cli);
        assert_eq!(cfg.execution.max_replans, 1);
    }
}
