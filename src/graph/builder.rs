//! Graph construction: resolves `blocked_by` lists through an `IdResolver`
//! built from the artefact index and derives forward/reverse edges in one
//! pass.

use crate::artefact::{ArtefactKind, ArtefactStore, IdResolver};
use crate::errors::CoreResult;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// The subset of an artefact's front-matter the graph needs, independent of
/// whether the node is a Task or an Epic.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub effort: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub done_at: Option<DateTime<Utc>>,
}

/// A DAG over one artefact kind (Task or Epic), built from `blocked_by`.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    pub(crate) nodes: HashMap<String, GraphNode>,
    /// `forward[b]` is every node `t` for which `b` is a blocker (`b -> t`).
    pub(crate) forward: HashMap<String, Vec<String>>,
    /// `reverse[t]` is every blocker of `t`.
    pub(crate) reverse: HashMap<String, Vec<String>>,
    /// `blocked_by` entries that did not resolve to a known artefact,
    /// `(node_id, raw_token)`.
    pub dangling: Vec<(String, String)>,
}

impl DependencyGraph {
    /// Build the graph for `kind` (`Task` or `Epic`) from the current state
    /// of the artefact store's index.
    pub fn build(store: &mut ArtefactStore, kind: ArtefactKind) -> CoreResult<Self> {
        let artefacts = store.all(kind)?;

        let mut resolver = IdResolver::new(kind);
        for artefact in &artefacts {
            resolver.register(&artefact.front_matter.id);
        }

        let mut graph = DependencyGraph::default();
        for artefact in &artefacts {
            let fm = &artefact.front_matter;
            graph.nodes.insert(
                fm.id.clone(),
                GraphNode {
                    id: fm.id.clone(),
                    status: fm.status.clone(),
                    created_at: fm.created_at,
                    effort: fm.effort.clone(),
                    started_at: fm.started_at,
                    done_at: fm.done_at,
                },
            );
            graph.forward.entry(fm.id.clone()).or_default();
            graph.reverse.entry(fm.id.clone()).or_default();
        }

        for artefact in &artefacts {
            let fm = &artefact.front_matter;
            for raw in &fm.blocked_by {
                match resolver.resolve(raw) {
                    Some(blocker) if blocker == fm.id => {
                        // self-reference: reported by the validator, not
                        // represented as a graph edge.
                    }
                    Some(blocker) => {
                        graph.forward.entry(blocker.clone()).or_default().push(fm.id.clone());
                        graph.reverse.entry(fm.id.clone()).or_default().push(blocker);
                    }
                    None => graph.dangling.push((fm.id.clone(), raw.clone())),
                }
            }
        }

        Ok(graph)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.nodes.keys()
    }

    /// Nodes blocked by `id` (forward edges out of `id`).
    pub fn dependents(&self, id: &str) -> &[String] {
        self.forward.get(id).map_or(&[], |v| v.as_slice())
    }

    /// Nodes that block `id` (reverse edges into `id`).
    pub fn blockers(&self, id: &str) -> &[String] {
        self.reverse.get(id).map_or(&[], |v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
