//! Effort-aware CPM scheduling: resolves each Task's effort to hours via the
//! configured effort map, then computes a theoretical (ignoring actual
//! timestamps) and a real (actual `started_at`/`done_at`, falling back to
//! theoretical placement) schedule envelope.

use super::builder::DependencyGraph;
use crate::config::SailingToml;
use std::collections::{HashMap, HashSet};

/// Resolves a symbolic effort estimate to hours. A thin adapter over
/// `SailingToml::effort_hours` so the graph engine does not depend on the
/// config module's file-loading machinery, only its resolution rule.
#[derive(Debug, Clone)]
pub struct EffortMap {
    map: HashMap<String, u32>,
    default_hours: u32,
}

impl EffortMap {
    pub fn from_config(toml: &SailingToml) -> Self {
        Self { map: toml.graph.effort_map.clone(), default_hours: toml.graph.default_effort_hours }
    }

    pub fn hours(&self, effort: Option<&str>) -> u32 {
        effort.and_then(|e| self.map.get(e).copied()).unwrap_or(self.default_hours)
    }
}

/// The computed placement window for a single Task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskWindow {
    pub id: String,
    pub start_hour: u64,
    pub end_hour: u64,
    pub on_critical_path: bool,
}

/// Earliest-start-time / summed-effort envelope for a schedule.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    pub windows: Vec<TaskWindow>,
    pub total_effort_hours: u64,
    pub critical_path_hours: u64,
}

/// Earliest-start-time CPM over the DAG, ignoring actual timestamps:
/// `start(t) = max(end(b) for b in blockers)`, `end(t) = start(t) + hours(t)`.
pub fn theoretical_schedule(graph: &DependencyGraph, effort: &EffortMap) -> Schedule {
    let mut end_hour: HashMap<String, u64> = HashMap::new();
    let mut start_hour: HashMap<String, u64> = HashMap::new();
    let order = topo_order(graph);

    for id in &order {
        let node = graph.node(id).expect("topo_order only yields known nodes");
        let start = graph
            .blockers(id)
            .iter()
            .filter_map(|b| end_hour.get(b).copied())
            .max()
            .unwrap_or(0);
        let hours = effort.hours(node.effort.as_deref()) as u64;
        start_hour.insert(id.clone(), start);
        end_hour.insert(id.clone(), start + hours);
    }

    build_schedule(graph, &order, &start_hour, &end_hour)
}

/// Uses actual `started_at`/`done_at` where present; falls back to the
/// theoretical placement for not-yet-started Tasks.
pub fn real_schedule(graph: &DependencyGraph, effort: &EffortMap, reference: chrono::DateTime<chrono::Utc>) -> Schedule {
    let theoretical = theoretical_schedule(graph, effort);
    let theoretical_starts: HashMap<String, u64> =
        theoretical.windows.iter().map(|w| (w.id.clone(), w.start_hour)).collect();
    let theoretical_ends: HashMap<String, u64> =
        theoretical.windows.iter().map(|w| (w.id.clone(), w.end_hour)).collect();

    let order = topo_order(graph);
    let mut start_hour: HashMap<String, u64> = HashMap::new();
    let mut end_hour: HashMap<String, u64> = HashMap::new();

    for id in &order {
        let node = graph.node(id).expect("topo_order only yields known nodes");
        let hours = effort.hours(node.effort.as_deref()) as u64;
        match (node.started_at, node.done_at) {
            (Some(started), Some(done)) => {
                let s = hours_since(reference, started);
                let e = hours_since(reference, done).max(s);
                start_hour.insert(id.clone(), s);
                end_hour.insert(id.clone(), e);
            }
            (Some(started), None) => {
                let s = hours_since(reference, started);
                start_hour.insert(id.clone(), s);
                end_hour.insert(id.clone(), s + hours);
            }
            (None, _) => {
                let fallback_start = theoretical_starts.get(id).copied().unwrap_or(0);
                let fallback_end = theoretical_ends.get(id).copied().unwrap_or(fallback_start + hours);
                start_hour.insert(id.clone(), fallback_start);
                end_hour.insert(id.clone(), fallback_end);
            }
        }
    }

    build_schedule(graph, &order, &start_hour, &end_hour)
}

fn hours_since(reference: chrono::DateTime<chrono::Utc>, at: chrono::DateTime<chrono::Utc>) -> u64 {
    (at - reference).num_hours().max(0) as u64
}

fn build_schedule(
    graph: &DependencyGraph,
    order: &[String],
    start_hour: &HashMap<String, u64>,
    end_hour: &HashMap<String, u64>,
) -> Schedule {
    let critical_path_hours = end_hour.values().copied().max().unwrap_or(0);
    let critical: HashSet<&str> = end_hour
        .iter()
        .filter(|(_, &end)| end == critical_path_hours && critical_path_hours > 0)
        .map(|(id, _)| id.as_str())
        .collect();

    let windows = order
        .iter()
        .map(|id| TaskWindow {
            id: id.clone(),
            start_hour: start_hour.get(id).copied().unwrap_or(0),
            end_hour: end_hour.get(id).copied().unwrap_or(0),
            on_critical_path: critical.contains(id.as_str()),
        })
        .collect();

    let total_effort_hours = order
        .iter()
        .map(|id| end_hour.get(id).copied().unwrap_or(0) - start_hour.get(id).copied().unwrap_or(0))
        .sum();

    let _ = graph;
    Schedule { windows, total_effort_hours, critical_path_hours }
}

/// Kahn's-algorithm topological order. Nodes participating in a cycle are
/// appended at the end in arbitrary order rather than causing a panic — CPM
/// on a cyclic subgraph is meaningless, but scheduling should degrade rather
/// than crash; cycle detection is a separate, authoritative concern.
fn topo_order(graph: &DependencyGraph) -> Vec<String> {
    let mut in_degree: HashMap<String, usize> =
        graph.ids().map(|id| (id.clone(), graph.blockers(id).len())).collect();
    let mut queue: Vec<String> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(id, _)| id.clone())
        .collect();
    queue.sort();

    let mut order = Vec::with_capacity(graph.len());
    let mut i = 0;
    while i < queue.len() {
        let id = queue[i].clone();
        i += 1;
        order.push(id.clone());
        let mut next_ready: Vec<String> = Vec::new();
        for dependent in graph.dependents(&id) {
            if let Some(deg) = in_degree.get_mut(dependent) {
                *deg -= 1;
                if *deg == 0 {
                    next_ready.push(dependent.clone());
                }
            }
        }
        next_ready.sort();
        queue.extend(next_ready);
    }

    if order.len() != graph.len() {
        let mut remaining: Vec<String> = graph.ids().filter(|id| !order.contains(id)).cloned().collect();
        remaining.sort();
        order.extend(remaining);
    }
    order
}
