//! Error taxonomy for the execution engine.
//!
//! These are kinds, not a single monolithic enum per call site — each
//! component surfaces the subset relevant to it, but all of them funnel
//! through `EngineError` at component boundaries so the executor can match
//! on kind rather than string-sniffing.

use crate::issue::IssueName;

/// Errors raised by the pure DAG utilities, the agent invoker, and the
/// checkpoint store.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// `ComputeLevels` found leftover in-degree > 0 after Kahn's algorithm.
    #[error("dependency cycle detected among issues: {nodes:?}")]
    CycleDetected { nodes: Vec<IssueName> },

    /// `ApplyReplan` would have introduced a cycle; the replan is rejected
    /// and the caller falls back to `continue` semantics.
    #[error("replan rejected, would introduce a cycle: {source}")]
    InvalidReplan {
        #[source]
        source: Box<EngineError>,
    },

    /// A non-transient failure returned by an external agent.
    #[error("agent {label} failed (status={status}): {message}")]
    AgentFailed {
        label: String,
        status: String,
        message: String,
    },

    /// The checkpoint file exists but could not be parsed; treated as
    /// absent by the caller, never propagated as a hard failure.
    #[error("checkpoint unreadable at {path}: {source}")]
    CheckpointUnreadable {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// I/O failure writing or renaming the checkpoint file. This is the one
    /// error class allowed to propagate out of the top-level executor.
    #[error("checkpoint io error at {path}: {source}")]
    CheckpointIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
