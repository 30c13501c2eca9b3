//! Post-scheduling cycle detection.
//!
//! Runs after the scheduler drains and the bubbler finishes, when requested
//! roots remain unfinished. The detector walks only entries that never
//! reached a terminal state, following their already-requested deps in
//! request order, with an explicit stack so key graphs of any depth are
//! safe. A dep found on the current path closes a cycle; multiple paths to
//! the same cycle are collapsed by deduping on the cycle's key set.

use crate::errors::CycleInfo;
use crate::graph::{Graph, Key};
use std::collections::{BTreeSet, HashSet};

struct Frame {
    key: Key,
    children: Vec<Key>,
    next: usize,
}

fn requested_deps(graph: &dyn Graph, key: &Key) -> Vec<Key> {
    match graph.get(key) {
        Some(entry) => entry.flat_deps(),
        None => Vec::new(),
    }
}

/// Depth-first search from one unfinished root, collecting up to `limit`
/// distinct cycles. With `stop_at_first` the search ends at the first cycle
/// (fail-fast reporting).
pub(crate) fn detect_cycles(
    graph: &dyn Graph,
    root: &Key,
    limit: usize,
    stop_at_first: bool,
) -> Vec<CycleInfo> {
    let mut cycles: Vec<CycleInfo> = Vec::new();
    match graph.get(root) {
        Some(entry) if !entry.is_terminal() => {}
        _ => return cycles,
    }

    let mut seen_cycle_sets: HashSet<BTreeSet<Key>> = HashSet::new();
    let mut finished: HashSet<Key> = HashSet::new();
    let mut on_path: HashSet<Key> = HashSet::new();
    let mut path: Vec<Key> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    on_path.insert(root.clone());
    path.push(root.clone());
    stack.push(Frame {
        key: root.clone(),
        children: requested_deps(graph, root),
        next: 0,
    });

    enum Step {
        Visit(Key),
        Retreat,
    }

    'dfs: loop {
        let step = match stack.last_mut() {
            None => break,
            Some(frame) => {
                if frame.next < frame.children.len() {
                    let child = frame.children[frame.next].clone();
                    frame.next += 1;
                    Step::Visit(child)
                } else {
                    Step::Retreat
                }
            }
        };

        match step {
            Step::Visit(child) => {
                if on_path.contains(&child) {
                    // Back edge: the cycle runs from the child's position on
                    // the path to the top of the stack.
                    if let Some(pos) = path.iter().position(|k| *k == child) {
                        let cycle = path[pos..].to_vec();
                        let cycle_set: BTreeSet<Key> = cycle.iter().cloned().collect();
                        if seen_cycle_sets.insert(cycle_set) {
                            cycles.push(CycleInfo {
                                cycle,
                                path_to_cycle: path[..pos].to_vec(),
                            });
                            if stop_at_first || cycles.len() >= limit {
                                break 'dfs;
                            }
                        }
                    }
                } else if !finished.contains(&child) {
                    match graph.get(&child) {
                        Some(entry) if !entry.is_terminal() => {
                            on_path.insert(child.clone());
                            path.push(child.clone());
                            stack.push(Frame {
                                key: child.clone(),
                                children: entry.flat_deps(),
                                next: 0,
                            });
                        }
                        _ => {
                            finished.insert(child);
                        }
                    }
                }
            }
            Step::Retreat => {
                if let Some(frame) = stack.pop() {
                    on_path.remove(&frame.key);
                    path.pop();
                    finished.insert(frame.key);
                }
            }
        }
    }

    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{InMemoryGraph, Value};
    use std::sync::Arc;

    fn key(name: &str) -> Key {
        Key::new("node", name)
    }

    async fn node_with_deps(graph: &Arc<InMemoryGraph>, name: &str, deps: &[&str]) {
        let entry = graph.create_if_absent(&key(name)).await;
        entry.mark_in_progress();
        entry.add_dep_group(deps.iter().map(|d| key(d)).collect());
    }

    #[tokio::test]
    async fn self_edge_yields_single_key_cycle() {
        let graph = Arc::new(InMemoryGraph::new());
        node_with_deps(&graph, "a", &["a"]).await;

        let cycles = detect_cycles(graph.as_ref(), &key("a"), 20, false);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].cycle, vec![key("a")]);
        assert!(cycles[0].path_to_cycle.is_empty());
    }

    #[tokio::test]
    async fn two_disjoint_cycles_under_one_root() {
        let graph = Arc::new(InMemoryGraph::new());
        node_with_deps(&graph, "top", &["a", "c"]).await;
        node_with_deps(&graph, "a", &["b"]).await;
        node_with_deps(&graph, "b", &["a"]).await;
        node_with_deps(&graph, "c", &["d"]).await;
        node_with_deps(&graph, "d", &["c"]).await;

        let cycles = detect_cycles(graph.as_ref(), &key("top"), 20, false);
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].cycle, vec![key("a"), key("b")]);
        assert_eq!(cycles[0].path_to_cycle, vec![key("top")]);
        assert_eq!(cycles[1].cycle, vec![key("c"), key("d")]);
        assert_eq!(cycles[1].path_to_cycle, vec![key("top")]);
    }

    #[tokio::test]
    async fn stop_at_first_reports_one_cycle() {
        let graph = Arc::new(InMemoryGraph::new());
        node_with_deps(&graph, "top", &["a", "c"]).await;
        node_with_deps(&graph, "a", &["b"]).await;
        node_with_deps(&graph, "b", &["a"]).await;
        node_with_deps(&graph, "c", &["d"]).await;
        node_with_deps(&graph, "d", &["c"]).await;

        let cycles = detect_cycles(graph.as_ref(), &key("top"), 20, true);
        assert_eq!(cycles.len(), 1);
    }

    #[tokio::test]
    async fn same_cycle_via_two_children_is_reported_once() {
        // top -> x -> a <-> b, top -> y -> a: one cycle, two paths.
        let graph = Arc::new(InMemoryGraph::new());
        node_with_deps(&graph, "top", &["x", "y"]).await;
        node_with_deps(&graph, "x", &["a"]).await;
        node_with_deps(&graph, "y", &["a"]).await;
        node_with_deps(&graph, "a", &["b"]).await;
        node_with_deps(&graph, "b", &["a"]).await;

        let cycles = detect_cycles(graph.as_ref(), &key("top"), 20, false);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].cycle, vec![key("a"), key("b")]);
    }

    #[tokio::test]
    async fn cycle_count_is_capped() {
        let graph = Arc::new(InMemoryGraph::new());
        let children: Vec<String> = (0..30).map(|i| format!("loop{}", i)).collect();
        let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();
        node_with_deps(&graph, "top", &child_refs).await;
        for child in &children {
            node_with_deps(&graph, child, &[child]).await;
        }

        let cycles = detect_cycles(graph.as_ref(), &key("top"), 20, false);
        assert_eq!(cycles.len(), 20);
    }

    #[tokio::test]
    async fn terminal_deps_are_not_traversed() {
        let graph = Arc::new(InMemoryGraph::new());
        node_with_deps(&graph, "top", &["done", "a"]).await;
        node_with_deps(&graph, "a", &["a"]).await;

        let done = graph.create_if_absent(&key("done")).await;
        done.mark_in_progress();
        done.set_value(Value::from("v"), vec![]);

        let cycles = detect_cycles(graph.as_ref(), &key("top"), 20, false);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].cycle, vec![key("a")]);
        assert_eq!(cycles[0].path_to_cycle, vec![key("top")]);
    }
}
