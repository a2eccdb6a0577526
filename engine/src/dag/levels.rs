//! Level computation (Kahn's algorithm) over the issue dependency graph.

use crate::error::{EngineError, Result};
use crate::issue::{Issue, IssueName};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, VecDeque};

/// Groups issues into levels: each level is an antichain (no issue in a
/// level depends on another issue in the same level), levels are in
/// dependency order, and within a level issues are ordered by discovery
/// (the order in which their in-degree hit zero, ties broken by input
/// order). Dependencies pointing outside `issues` (already completed,
/// failed, or skipped) are treated as already satisfied.
///
/// Returns `CycleDetected` listing every issue never reached by the
/// algorithm if the remaining graph has a cycle.
pub fn compute_levels(issues: &[Issue]) -> Result<Vec<Vec<IssueName>>> {
    let mut graph: DiGraph<IssueName, ()> = DiGraph::new();
    let mut index_of: HashMap<&str, NodeIndex> = HashMap::with_capacity(issues.len());
    for issue in issues {
        let idx = graph.add_node(issue.name.clone());
        index_of.insert(issue.name.as_str(), idx);
    }

    let mut indegree: HashMap<NodeIndex, usize> =
        graph.node_indices().map(|idx| (idx, 0)).collect();
    for issue in issues {
        let to = index_of[issue.name.as_str()];
        for dep in &issue.depends_on {
            if let Some(&from) = index_of.get(dep.as_str()) {
                graph.add_edge(from, to, ());
                *indegree.get_mut(&to).unwrap() += 1;
            }
        }
    }

    let mut queue: VecDeque<NodeIndex> = issues
        .iter()
        .map(|issue| index_of[issue.name.as_str()])
        .filter(|idx| indegree[idx] == 0)
        .collect();

    let mut levels = Vec::new();
    let mut visited = 0usize;
    while !queue.is_empty() {
        let round_size = queue.len();
        let mut level_names = Vec::with_capacity(round_size);
        let mut next_ready = Vec::new();
        for _ in 0..round_size {
            let idx = queue.pop_front().expect("round_size matches queue length");
            level_names.push(graph[idx].clone());
            visited += 1;
            for edge in graph.edges(idx) {
                let target = edge.target();
                let deg = indegree.get_mut(&target).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    next_ready.push(target);
                }
            }
        }
        levels.push(level_names);
        queue.extend(next_ready);
    }

    if visited != issues.len() {
        let nodes = issues
            .iter()
            .map(|issue| index_of[issue.name.as_str()])
            .filter(|idx| indegree[idx] > 0)
            .map(|idx| graph[idx].clone())
            .collect();
        return Err(EngineError::CycleDetected { nodes });
    }

    Ok(levels)
}
