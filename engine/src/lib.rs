//! `dagflow_engine` — the self-healing, checkpointing DAG scheduler that
//! drives a set of issues through level-parallel execute, merge,
//! integration-test, and cleanup phases.
//!
//! This crate owns the pure control flow: dependency graph algorithms,
//! checkpointed state, the agent-call contract, and the four drivers
//! (coding loop, retry advisor, merge gate, replanner) that the top-level
//! executor composes. It does not know how an agent is actually invoked —
//! that's an `agent::AgentTransport` implementation supplied by the
//! binary that wires this crate up to real subprocesses.

pub mod agent;
pub mod coding_loop;
pub mod config;
pub mod dag;
pub mod error;
pub mod executor;
pub mod issue;
pub mod merge_gate;
pub mod replanner;
pub mod retry_advisor;
pub mod schemas;
pub mod state;

pub use config::ExecutionConfig;
pub use error::{EngineError, Result};
pub use executor::{Executor, ExecutorStage};
pub use issue::{Issue, IssueName, IssueOutcome, IssueResult, LevelResult};
pub use state::DAGState;
