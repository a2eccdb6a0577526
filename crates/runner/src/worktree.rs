//! Git repo probe used to decide the execution mode for a run.
//!
//! Worktree creation, branch merging, and cleanup are delegated to the
//! external workspace/merger/cleanup agents (`merge_gate.rs` in the engine
//! crate) per spec.md §4.6 — this module only answers the one question
//! `main.rs` needs before it can hand a run off to those agents: is
//! `repo_root` a git repository at all, and if so, where should worktrees
//! live.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

pub struct WorktreeBridge {
    pub base_dir: PathBuf,
}

impl WorktreeBridge {
    /// Probes `repo_root` for a git repository and ensures `base_dir`
    /// exists. Failure here means the run falls back to `GitMode::Disabled`
    /// rather than worktree-based execution (see `main.rs::setup_git_mode`).
    pub fn new(base_dir: Option<PathBuf>, repo_root: impl AsRef<Path>) -> Result<Self> {
        let repo_root = repo_root.as_ref().to_path_buf();

        let check = Command::new("git")
            .args(["rev-parse", "--git-dir"])
            .current_dir(&repo_root)
            .output()
            .context("failed to check git repo")?;
        if !check.status.success() {
            bail!("not a git repository: {}", repo_root.display());
        }

        let base_dir = base_dir.unwrap_or_else(|| PathBuf::from("/tmp/dagflow-wt"));
        std::fs::create_dir_all(&base_dir)
            .with_context(|| format!("failed to create worktree base dir: {}", base_dir.display()))?;

        Ok(Self { base_dir })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo(dir: &Path) {
        for args in [
            vec!["init"],
            vec!["config", "user.email", "test@test.com"],
            vec!["config", "user.name", "Test"],
        ] {
            Command::new("git").args(&args).current_dir(dir).output().unwrap();
        }
        std::fs::write(dir.join("README.md"), "hello").unwrap();
        Command::new("git").args(["add", "."]).current_dir(dir).output().unwrap();
        Command::new("git")
            .args(["commit", "-m", "init"])
            .current_dir(dir)
            .output()
            .unwrap();
    }

    #[test]
    fn detects_git_repo_and_creates_base_dir() {
        let repo_dir = tempfile::tempdir().unwrap();
        let wt_base = tempfile::tempdir().unwrap();
        init_repo(repo_dir.path());

        let bridge = WorktreeBridge::new(
            Some(wt_base.path().join("nested")),
            repo_dir.path(),
        )
        .expect("bridge creation");
        assert!(bridge.base_dir.is_dir());
    }

    #[test]
    fn non_git_repo_root_is_rejected() {
        let plain_dir = tempfile::tempdir().unwrap();
        assert!(WorktreeBridge::new(None, plain_dir.path()).is_err());
    }
}
