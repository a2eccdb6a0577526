//! Loads the planned issue set the executor will run.
//!
//! The planning pipeline that produces these issues (PRD/architecture/
//! sprint-plan authors) is out of scope here — this crate only consumes
//! its output, a JSON array of issues at
//! `<artifacts_dir>/plan/issues.json`, the structured interface boundary
//! spec.md draws between planning and execution.

use anyhow::{Context, Result};
use dagflow_engine::Issue;
use std::path::Path;

pub fn load(artifacts_dir: &Path) -> Result<Vec<Issue>> {
    let path = artifacts_dir.join("plan").join("issues.json");
    let body = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read issue plan at {}", path.display()))?;
    let issues: Vec<Issue> = serde_json::from_str(&body)
        .with_context(|| format!("failed to parse issue plan at {}", path.display()))?;
    Ok(issues)
}
