//! Readiness, critical-path length, and impact scoring.

use super::builder::DependencyGraph;
use crate::artefact::TaskStatus;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyTask {
    pub id: String,
    pub bottleneck_score: u64,
}

fn is_terminal(status: &str) -> bool {
    matches!(TaskStatus::canonicalize(status), Some(s) if s.is_terminal())
}

/// `t` is ready iff `status == Not Started` and every blocker is absent,
/// `Done`, or `Cancelled`. `include_started` additionally admits
/// `In Progress` blockers.
pub fn ready(graph: &DependencyGraph, include_started: bool) -> Vec<ReadyTask> {
    let mut ready: Vec<ReadyTask> = graph
        .nodes()
        .filter(|n| TaskStatus::canonicalize(&n.status) == Some(TaskStatus::NotStarted))
        .filter(|n| {
            graph.blockers(&n.id).iter().all(|b| match graph.node(b) {
                None => true,
                Some(blocker) => {
                    is_terminal(&blocker.status)
                        || (include_started
                            && TaskStatus::canonicalize(&blocker.status) == Some(TaskStatus::InProgress))
                }
            })
        })
        .map(|n| ReadyTask { id: n.id.clone(), bottleneck_score: bottleneck_score(graph, &n.id) })
        .collect();

    let created_at: HashMap<&str, DateTime<Utc>> =
        graph.nodes().map(|n| (n.id.as_str(), n.created_at)).collect();
    ready.sort_by(|a, b| {
        b.bottleneck_score
            .cmp(&a.bottleneck_score)
            .then_with(|| created_at[a.id.as_str()].cmp(&created_at[b.id.as_str()]))
    });
    ready
}

/// Length of the longest downstream chain (count of distinct descendants on
/// the longest path through the forward graph), memoized DFS over the
/// reverse-of-reverse (i.e. forward) graph. Cyclic subgraphs are treated as
/// contributing zero further length past the point of re-entry — callers are
/// expected to have already run cycle detection and surfaced the cycle
/// separately; this function never panics or loops forever on one.
pub fn longest_downstream_chain(graph: &DependencyGraph, id: &str) -> u64 {
    let mut memo = HashMap::new();
    let mut on_path = std::collections::HashSet::new();
    chain_len(graph, id, &mut memo, &mut on_path)
}

fn chain_len(
    graph: &DependencyGraph,
    id: &str,
    memo: &mut HashMap<String, u64>,
    on_path: &mut std::collections::HashSet<String>,
) -> u64 {
    if let Some(&cached) = memo.get(id) {
        return cached;
    }
    if on_path.contains(id) {
        // cycle re-entry: stop extending the chain here.
        return 0;
    }
    on_path.insert(id.to_string());
    let mut best = 0u64;
    for child in graph.dependents(id) {
        let child_len = 1 + chain_len(graph, child, memo, on_path);
        best = best.max(child_len);
    }
    on_path.remove(id);
    memo.insert(id.to_string(), best);
    best
}

/// `bottleneck_score(t) = |direct_dependents(t)| * longest_downstream_chain(t)`.
pub fn bottleneck_score(graph: &DependencyGraph, id: &str) -> u64 {
    graph.dependents(id).len() as u64 * longest_downstream_chain(graph, id)
}

/// All nodes ranked by `bottleneck_score` descending, ties broken by
/// creation time ascending — independent of task status, used by `deps
/// impact`.
pub fn impact_ranked(graph: &DependencyGraph) -> Vec<ReadyTask> {
    let mut scored: Vec<ReadyTask> = graph
        .nodes()
        .map(|n| ReadyTask { id: n.id.clone(), bottleneck_score: bottleneck_score(graph, &n.id) })
        .collect();
    let created_at: HashMap<&str, DateTime<Utc>> =
        graph.nodes().map(|n| (n.id.as_str(), n.created_at)).collect();
    scored.sort_by(|a, b| {
        b.bottleneck_score
            .cmp(&a.bottleneck_score)
            .then_with(|| created_at[a.id.as_str()].cmp(&created_at[b.id.as_str()]))
    });
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artefact::{ArtefactKind, ArtefactStore, CreateOptions};
    use crate::state::StateStore;
    use std::collections::HashMap as StdHashMap;
    use tempfile::tempdir;

    fn store(dir: &std::path::Path) -> ArtefactStore {
        ArtefactStore::new(
            dir.join("artefacts"),
            dir.join(".sailing/memory"),
            StateStore::new(dir.join(".sailing/state.json")),
        )
    }

    fn set_blocked_by(store: &mut ArtefactStore, id: &str, blockers: Vec<&str>) {
        let mut patch = StdHashMap::new();
        patch.insert(
            "blocked_by".to_string(),
            serde_yaml::Value::Sequence(blockers.into_iter().map(|b| serde_yaml::Value::String(b.to_string())).collect()),
        );
        store.update_frontmatter(ArtefactKind::Task, id, patch).unwrap();
    }

    fn set_status(store: &mut ArtefactStore, id: &str, status: &str) {
        let mut patch = StdHashMap::new();
        patch.insert("status".to_string(), serde_yaml::Value::String(status.to_string()));
        store.update_frontmatter(ArtefactKind::Task, id, patch).unwrap();
    }

    #[test]
    fn readiness_with_mixed_statuses_scenario_3() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path());
        s.create(ArtefactKind::Task, None, "A", CreateOptions::default()).unwrap();
        s.create(ArtefactKind::Task, None, "B", CreateOptions::default()).unwrap();
        s.create(ArtefactKind::Task, None, "C", CreateOptions::default()).unwrap();
        set_status(&mut s, "T001", "Done");
        set_blocked_by(&mut s, "T002", vec!["T001"]);
        set_blocked_by(&mut s, "T003", vec!["T002"]);

        let graph = DependencyGraph::build(&mut s, ArtefactKind::Task).unwrap();
        let r = ready(&graph, false);
        assert_eq!(r.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), vec!["T002"]);

        set_status(&mut s, "T002", "Done");
        let graph = DependencyGraph::build(&mut s, ArtefactKind::Task).unwrap();
        let r = ready(&graph, false);
        assert_eq!(r.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), vec!["T003"]);
    }

    #[test]
    fn cycle_has_no_ready_tasks_scenario_2() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path());
        s.create(ArtefactKind::Task, None, "A", CreateOptions::default()).unwrap();
        s.create(ArtefactKind::Task, None, "B", CreateOptions::default()).unwrap();
        s.create(ArtefactKind::Task, None, "C", CreateOptions::default()).unwrap();
        set_blocked_by(&mut s, "T001", vec!["T002"]);
        set_blocked_by(&mut s, "T002", vec!["T003"]);
        set_blocked_by(&mut s, "T003", vec!["T001"]);

        let graph = DependencyGraph::build(&mut s, ArtefactKind::Task).unwrap();
        assert!(ready(&graph, false).is_empty());
    }

    #[test]
    fn impact_ranking_places_widest_fan_out_first_scenario_4() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path());
        for t in ["01", "02", "03", "04", "05", "06", "07", "08", "09", "10"] {
            s.create(ArtefactKind::Task, None, t, CreateOptions::default()).unwrap();
        }
        for t in ["T002", "T003", "T004", "T005"] {
            set_blocked_by(&mut s, t, vec!["T001"]);
        }
        for t in ["T006", "T007", "T008", "T009", "T010"] {
            set_blocked_by(&mut s, t, vec!["T002"]);
        }

        let graph = DependencyGraph::build(&mut s, ArtefactKind::Task).unwrap();
        let ranked = impact_ranked(&graph);
        assert_eq!(ranked[0].id, "T001");
        assert_eq!(ranked[1].id, "T002");
        assert!(ranked[0].bottleneck_score >= 8);
    }

    #[test]
    fn epic_with_zero_tasks_has_no_ready_entries() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path());
        s.create(ArtefactKind::Epic, None, "Empty", CreateOptions::default()).unwrap();
        let graph = DependencyGraph::build(&mut s, ArtefactKind::Epic).unwrap();
        assert!(ready(&graph, false).is_empty());
    }
}
