//! Downstream dependency closure.

use crate::issue::{Issue, IssueName};
use std::collections::{HashMap, HashSet, VecDeque};

/// Every issue that transitively depends on `start`, via BFS over the
/// reverse-dependency adjacency (`issue -> its dependents`). `start` itself
/// is never included, even if it somehow depends on itself.
pub fn find_downstream(issues: &[Issue], start: &str) -> Vec<IssueName> {
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for issue in issues {
        for dep in &issue.depends_on {
            dependents
                .entry(dep.as_str())
                .or_default()
                .push(issue.name.as_str());
        }
    }

    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(start);
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(start);
    let mut result = Vec::new();

    while let Some(current) = queue.pop_front() {
        if let Some(children) = dependents.get(current) {
            for &child in children {
                if visited.insert(child) {
                    result.push(child.to_string());
                    queue.push_back(child);
                }
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(name: &str, deps: &[&str]) -> Issue {
        let mut i = Issue::new(name, 1, name);
        i.depends_on = deps.iter().map(|s| s.to_string()).collect();
        i
    }

    #[test]
    fn finds_transitive_dependents_excluding_self() {
        let issues = vec![
            issue("a", &[]),
            issue("b", &["a"]),
            issue("c", &["b"]),
            issue("d", &[]),
        ];
        let mut downstream = find_downstream(&issues, "a");
        downstream.sort();
        assert_eq!(downstream, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn leaf_has_no_downstream() {
        let issues = vec![issue("a", &[]), issue("b", &["a"])];
        assert!(find_downstream(&issues, "b").is_empty());
    }

    #[test]
    fn monotonic_under_added_dependent() {
        let base = vec![issue("a", &[]), issue("b", &["a"])];
        let mut extended = base.clone();
        extended.push(issue("c", &["b"]));

        let before = find_downstream(&base, "a");
        let after = find_downstream(&extended, "a");
        assert!(before.iter().all(|n| after.contains(n)));
        assert!(after.len() >= before.len());
    }
}
