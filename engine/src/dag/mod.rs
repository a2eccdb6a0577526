//! Pure DAG utilities operating on issue dependency graphs: level
//! computation, downstream closure, and replan application.

mod downstream;
mod levels;
mod replan;

pub use downstream::find_downstream;
pub use levels::compute_levels;
pub use replan::{apply_replan, AppliedReplan, ReplanAction, ReplanDecision};
