//! Checkpointed execution state and its on-disk persistence.

pub mod checkpoint;
mod dag_state;

pub use checkpoint::{checkpoint_path, load, save};
pub use dag_state::{DAGState, GitMode, IntegrationTestResult, MergeResult, ReplanHistoryEntry};
