//! External agent invocation: envelope handling, transient-failure retry,
//! and the transport-agnostic invoker every driver calls through.

mod envelope;
mod invoker;
mod retry;
mod targets;

pub use envelope::unwrap_call_result;
pub use invoker::{AgentCallOptions, AgentInvoker, AgentTransport};
pub use retry::{is_transient, RetryConfig};
pub use targets::AgentTargets;
