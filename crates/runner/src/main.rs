//! Binary entrypoint: resolves configuration, wires the subprocess
//! transport and worktree-backed git integration into the engine's
//! `Executor`, and runs one DAG execution to completion or abort.

mod cli;
mod config;
mod issues;
mod logging;
mod subprocess_transport;
mod worktree;

use clap::Parser;
use config::RunnerConfig;
use dagflow_engine::agent::{AgentInvoker, AgentTargets};
use dagflow_engine::state::{load as load_checkpoint, DAGState, GitMode};
use dagflow_engine::Executor;
use std::process::ExitCode;
use subprocess_transport::SubprocessTransport;
use worktree::WorktreeBridge;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    let file_config = match &cli.config {
        Some(path) => match config::FileConfig::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("failed to load config file {}: {e:#}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => config::FileConfig::default(),
    };
    let runner_config = RunnerConfig::resolve(file_config, cli);

    if let Err(e) = logging::init(&runner_config.repo_path.join(&runner_config.artifacts_dir)) {
        eprintln!("failed to initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(runner_config).await {
        Ok(aborted) => {
            if aborted {
                tracing::error!("run ended in abort");
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            tracing::error!("run failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Runs the executor to completion. Returns `Ok(true)` if the run ended via
/// an `abort` replan decision rather than exhausting every level.
async fn run(config: RunnerConfig) -> anyhow::Result<bool> {
    let artifacts_dir = config
        .repo_path
        .join(&config.artifacts_dir)
        .to_string_lossy()
        .to_string();

    let mut state = match load_checkpoint(&artifacts_dir).await? {
        Some(resumed) => {
            tracing::info!(level = resumed.current_level, "resumed from checkpoint");
            resumed
        }
        None => {
            let planned_issues = issues::load(&config.repo_path.join(&config.artifacts_dir))?;
            let mut fresh = DAGState::new(
                config.repo_path.to_string_lossy(),
                artifacts_dir.clone(),
                planned_issues,
                config.execution.max_replans,
            )?;
            setup_git_mode(&config, &mut fresh);
            fresh
        }
    };
    state.check_invariants().map_err(|e| anyhow::anyhow!(e))?;

    let targets = AgentTargets::rooted_at(&config.agent_node_id);
    let transport = SubprocessTransport {
        command: config.agent_command.clone(),
    };
    let invoker = AgentInvoker::new(transport);
    let executor = Executor::new(invoker, targets, config.execution.clone());

    let final_state = executor.run(state).await;

    tracing::info!(
        completed = final_state.completed_issues.len(),
        failed = final_state.failed_issues.len(),
        skipped = final_state.skipped_issues.len(),
        replans = final_state.replan_count,
        "run finished"
    );

    let aborted = final_state.current_level < final_state.levels.len()
        && final_state
            .replan_history
            .last()
            .map(|h| matches!(h.action, dagflow_engine::dag::ReplanAction::Abort))
            .unwrap_or(false);

    Ok(aborted)
}

/// Detects whether `repo_path` is a git repository and, if so, sets up an
/// integration branch for worktree-isolated issue execution. Falls back to
/// `GitMode::Disabled` (issues run directly against the repo root) when the
/// repo isn't under git at all.
fn setup_git_mode(config: &RunnerConfig, state: &mut DAGState) {
    match WorktreeBridge::new(config.worktree_base_dir.clone(), &config.repo_path) {
        Ok(_) => {
            let original_branch = std::process::Command::new("git")
                .args(["rev-parse", "--abbrev-ref", "HEAD"])
                .current_dir(&config.repo_path)
                .output()
                .ok()
                .filter(|o| o.status.success())
                .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string());

            state.git_mode = GitMode::Worktrees;
            state.git_integration_branch = Some("dagflow/integration".to_string());
            state.git_original_branch = original_branch;
            state.worktrees_dir = config
                .worktree_base_dir
                .as_ref()
                .map(|p| p.to_string_lossy().to_string());
        }
        Err(e) => {
            tracing::warn!("git worktrees unavailable, running without isolation: {e:#}");
            state.git_mode = GitMode::Disabled;
        }
    }
}
