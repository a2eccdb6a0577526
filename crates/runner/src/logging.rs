//! Tracing setup: human-readable spans on stdout, gated by `RUST_LOG`
//! (mirrors the teacher's `tracing_subscriber::EnvFilter` usage), plus a
//! JSONL append-only execution log at
//! `<artifacts_dir>/logs/execution.jsonl` satisfying spec.md §6's
//! persisted-state layout for structured event logs.

use std::fs::OpenOptions;
use std::path::Path;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init(artifacts_dir: &Path) -> anyhow::Result<()> {
    let logs_dir = artifacts_dir.join("logs");
    std::fs::create_dir_all(&logs_dir)?;
    let log_path = logs_dir.join("execution.jsonl");
    let file = OpenOptions::new().create(true).append(true).open(&log_path)?;

    let stdout_layer = fmt::layer().with_target(false);
    let jsonl_layer = fmt::layer()
        .json()
        .with_writer(move || file.try_clone().expect("clone execution log handle"));

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(stdout_layer)
        .with(jsonl_layer)
        .init();

    Ok(())
}
