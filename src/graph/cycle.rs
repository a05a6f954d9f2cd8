//! Cycle detection: iterative Tarjan's SCC over the blocker graph. Any SCC of
//! size greater than one, or a self-loop, is reported as a cycle with a
//! concrete path for the validator/CLI to display.

use super::builder::DependencyGraph;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    /// The node IDs in the strongly connected component, in discovery order,
    /// with the first node repeated at the end to describe a closed path.
    pub path: Vec<String>,
}

struct TarjanState<'a> {
    graph: &'a DependencyGraph,
    index: HashMap<String, usize>,
    lowlink: HashMap<String, usize>,
    on_stack: HashSet<String>,
    stack: Vec<String>,
    next_index: usize,
    sccs: Vec<Vec<String>>,
}

/// Iterative Tarjan over non-`Cancelled` nodes; each SCC with more than one
/// member, or a self-loop, becomes a `Cycle` with a closed-path
/// representation.
pub fn find_cycles(graph: &DependencyGraph, excluded_statuses: &[&str]) -> Vec<Cycle> {
    let active: HashSet<&String> = graph
        .nodes()
        .filter(|n| !excluded_statuses.contains(&n.status.as_str()))
        .map(|n| &n.id)
        .collect();

    let mut state = TarjanState {
        graph,
        index: HashMap::new(),
        lowlink: HashMap::new(),
        on_stack: HashSet::new(),
        stack: Vec::new(),
        next_index: 0,
        sccs: Vec::new(),
    };

    let mut ids: Vec<&String> = active.iter().copied().collect();
    ids.sort();
    for id in ids {
        if !state.index.contains_key(id) {
            strongconnect(&mut state, id, &active);
        }
    }

    state
        .sccs
        .into_iter()
        .filter(|scc| {
            scc.len() > 1 || scc.first().is_some_and(|n| graph.dependents(n).contains(n))
        })
        .map(|mut scc| {
            scc.sort();
            let mut path = scc.clone();
            if let Some(first) = scc.first() {
                path.push(first.clone());
            }
            Cycle { path }
        })
        .collect()
}

enum Frame {
    Enter(String),
    AfterChild { node: String, child: String },
}

/// Explicit-stack DFS equivalent to the recursive Tarjan `strongconnect`,
/// matching the corpus' avoidance of unbounded recursion on unbounded input.
fn strongconnect(state: &mut TarjanState, start: &str, active: &HashSet<&String>) {
    let mut work = vec![Frame::Enter(start.to_string())];

    while let Some(frame) = work.pop() {
        match frame {
            Frame::Enter(node) => {
                if state.index.contains_key(&node) {
                    continue;
                }
                state.index.insert(node.clone(), state.next_index);
                state.lowlink.insert(node.clone(), state.next_index);
                state.next_index += 1;
                state.stack.push(node.clone());
                state.on_stack.insert(node.clone());

                for succ in state.graph.dependents(&node) {
                    if !active.contains(succ) {
                        continue;
                    }
                    if !state.index.contains_key(succ) {
                        work.push(Frame::AfterChild { node: node.clone(), child: succ.clone() });
                        work.push(Frame::Enter(succ.clone()));
                    } else if state.on_stack.contains(succ) {
                        let succ_index = state.index[succ];
                        let entry = state.lowlink.get_mut(&node).unwrap();
                        *entry = (*entry).min(succ_index);
                    }
                }

                maybe_pop_scc(state, &node);
            }
            Frame::AfterChild { node, child } => {
                let child_low = state.lowlink[&child];
                let entry = state.lowlink.get_mut(&node).unwrap();
                *entry = (*entry).min(child_low);
                maybe_pop_scc(state, &node);
            }
        }
    }
}

fn maybe_pop_scc(state: &mut TarjanState, node: &str) {
    if state.lowlink[node] != state.index[node] {
        return;
    }
    let mut scc = Vec::new();
    loop {
        let w = state.stack.pop().expect("node pushed before being closed");
        state.on_stack.remove(&w);
        let is_node = w == node;
        scc.push(w);
        if is_node {
            break;
        }
    }
    state.sccs.push(scc);
}
