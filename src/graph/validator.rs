//! The eleven-rule validator (spec 4.D) with bounded, per-file-grouped
//! auto-fix.

use super::builder::DependencyGraph;
use super::cycle::find_cycles;
use crate::artefact::{ArtefactKind, ArtefactStore, EpicStatus, IdResolver, TaskStatus};
use crate::errors::CoreResult;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    MissingRef,
    SelfRef,
    Duplicate,
    Format,
    CancelledBlocker,
    InvalidStatus,
    StatusFormat,
    Cycle,
    MissingEpicParent,
    IdMismatch,
    EpicStatusMismatch,
}

impl FindingKind {
    pub fn is_auto_fixable(self) -> bool {
        !matches!(self, FindingKind::InvalidStatus | FindingKind::Cycle | FindingKind::MissingEpicParent)
    }
}

#[derive(Debug, Clone)]
pub struct Finding {
    pub kind: FindingKind,
    /// The artefact this finding is about, e.g. a Task ID; empty for
    /// crate-wide findings such as `Cycle`.
    pub artefact_id: String,
    pub message: String,
    /// Populated only for `Cycle` findings: the closed path through the
    /// graph.
    pub cycle_path: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
    /// Artefact IDs whose files were rewritten by `--fix`.
    pub fixed: Vec<String>,
}

impl ValidationReport {
    pub fn has_cycle(&self) -> bool {
        self.findings.iter().any(|f| f.kind == FindingKind::Cycle)
    }
}

/// Run all eleven rule families against the Task and Epic graphs. When
/// `fix` is set, bounded auto-fixes are applied, grouped per file (every
/// finding on one artefact is applied in a single load-save cycle), and the
/// index is invalidated once at the end.
pub fn validate(store: &mut ArtefactStore, fix: bool) -> CoreResult<ValidationReport> {
    let mut report = ValidationReport::default();

    let task_graph = DependencyGraph::build(store, ArtefactKind::Task)?;
    let epic_graph = DependencyGraph::build(store, ArtefactKind::Epic)?;

    check_blocker_rules(store, &task_graph, ArtefactKind::Task, &mut report)?;
    check_blocker_rules(store, &epic_graph, ArtefactKind::Epic, &mut report)?;
    check_status_rules(store, ArtefactKind::Task, &mut report)?;
    check_status_rules(store, ArtefactKind::Epic, &mut report)?;
    check_cycles(&task_graph, "Task", &mut report);
    check_cycles(&epic_graph, "Epic", &mut report);
    check_missing_epic_parent(store, &mut report)?;
    check_id_mismatch(store, &mut report)?;
    check_epic_status_mismatch(store, &task_graph, &mut report)?;

    if fix {
        apply_fixes(store, &mut report)?;
    }

    Ok(report)
}

fn check_blocker_rules(
    store: &mut ArtefactStore,
    graph: &DependencyGraph,
    kind: ArtefactKind,
    report: &mut ValidationReport,
) -> CoreResult<()> {
    let artefacts = store.all(kind)?;
    let mut resolver = IdResolver::new(kind);
    for a in &artefacts {
        resolver.register(&a.front_matter.id);
    }

    for a in &artefacts {
        let id = &a.front_matter.id;
        let mut seen = std::collections::HashSet::new();
        for raw in &a.front_matter.blocked_by {
            let canonical = resolver.resolve(raw);
            match canonical {
                None => report.findings.push(Finding {
                    kind: FindingKind::MissingRef,
                    artefact_id: id.clone(),
                    message: format!("{id} blocked_by references unknown artefact '{raw}'"),
                    cycle_path: Vec::new(),
                }),
                Some(ref c) if c == id => report.findings.push(Finding {
                    kind: FindingKind::SelfRef,
                    artefact_id: id.clone(),
                    message: format!("{id} lists itself as a blocker"),
                    cycle_path: Vec::new(),
                }),
                Some(ref c) => {
                    if !seen.insert(c.clone()) {
                        report.findings.push(Finding {
                            kind: FindingKind::Duplicate,
                            artefact_id: id.clone(),
                            message: format!("{id} blocked_by lists '{c}' more than once"),
                            cycle_path: Vec::new(),
                        });
                    }
                    if raw != c {
                        report.findings.push(Finding {
                            kind: FindingKind::Format,
                            artefact_id: id.clone(),
                            message: format!("{id} blocker '{raw}' is non-canonical (should be '{c}')"),
                            cycle_path: Vec::new(),
                        });
                    }
                    if let Some(blocker_node) = graph.node(c) {
                        if TaskStatus::canonicalize(&blocker_node.status) == Some(TaskStatus::Cancelled)
                            || EpicStatus::canonicalize(&blocker_node.status) == Some(EpicStatus::Cancelled)
                        {
                            report.findings.push(Finding {
                                kind: FindingKind::CancelledBlocker,
                                artefact_id: id.clone(),
                                message: format!("{id} blocker '{c}' is Cancelled"),
                                cycle_path: Vec::new(),
                            });
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

fn check_status_rules(store: &mut ArtefactStore, kind: ArtefactKind, report: &mut ValidationReport) -> CoreResult<()> {
    for a in store.all(kind)? {
        let id = &a.front_matter.id;
        let canonical = match kind {
            ArtefactKind::Task => TaskStatus::canonicalize(&a.front_matter.status).map(|s| s.canonical_str()),
            ArtefactKind::Epic => EpicStatus::canonicalize(&a.front_matter.status).map(|s| s.canonical_str()),
            _ => Some(a.front_matter.status.as_str()),
        };
        match canonical {
            None => report.findings.push(Finding {
                kind: FindingKind::InvalidStatus,
                artefact_id: id.clone(),
                message: format!("{id} has status '{}' not in the lexicon", a.front_matter.status),
                cycle_path: Vec::new(),
            }),
            Some(c) if c != a.front_matter.status => report.findings.push(Finding {
                kind: FindingKind::StatusFormat,
                artefact_id: id.clone(),
                message: format!("{id} status '{}' should be canonical '{c}'", a.front_matter.status),
                cycle_path: Vec::new(),
            }),
            _ => {}
        }
    }
    Ok(())
}

fn check_cycles(graph: &DependencyGraph, label: &str, report: &mut ValidationReport) {
    for cycle in find_cycles(graph, &["Cancelled"]) {
        report.findings.push(Finding {
            kind: FindingKind::Cycle,
            artefact_id: String::new(),
            message: format!("{label} cycle: {}", cycle.path.join(" -> ")),
            cycle_path: cycle.path,
        });
    }
}

fn check_missing_epic_parent(store: &mut ArtefactStore, report: &mut ValidationReport) -> CoreResult<()> {
    for a in store.all(ArtefactKind::Task)? {
        let id = &a.front_matter.id;
        let has_epic_parent = a
            .front_matter
            .parent
            .as_deref()
            .is_some_and(|p| p.split('/').any(|segment| segment.trim().starts_with('E')));
        if !has_epic_parent {
            report.findings.push(Finding {
                kind: FindingKind::MissingEpicParent,
                artefact_id: id.clone(),
                message: format!("{id} has no Epic ancestor"),
                cycle_path: Vec::new(),
            });
        }
    }
    Ok(())
}

fn check_id_mismatch(store: &mut ArtefactStore, report: &mut ValidationReport) -> CoreResult<()> {
    for kind in [ArtefactKind::Task, ArtefactKind::Epic, ArtefactKind::Product, ArtefactKind::Story] {
        // Walk filename-derived keys, not front-matter ids: a mismatched
        // artefact's front-matter id may not be a resolvable key at all, and
        // `artefact_id` here must stay resolvable for `fix_one_artefact`'s
        // later `rename_to_frontmatter_id` call.
        for key in store.canonical_keys(kind)? {
            let a = store.get(kind, &key)?;
            if a.front_matter.id != key {
                report.findings.push(Finding {
                    kind: FindingKind::IdMismatch,
                    artefact_id: key.clone(),
                    message: format!("filename prefix '{key}' does not match front-matter id '{}'", a.front_matter.id),
                    cycle_path: Vec::new(),
                });
            }
        }
    }
    Ok(())
}

fn check_epic_status_mismatch(
    store: &mut ArtefactStore,
    task_graph: &DependencyGraph,
    report: &mut ValidationReport,
) -> CoreResult<()> {
    let tasks = store.all(ArtefactKind::Task)?;
    let mut by_epic: HashMap<String, Vec<&str>> = HashMap::new();
    for t in &tasks {
        if let Some(parent) = &t.front_matter.parent {
            if let Some(epic_id) = parent.split('/').map(str::trim).find(|s| s.starts_with('E')) {
                by_epic.entry(epic_id.to_string()).or_default().push(&t.front_matter.status);
            }
        }
    }
    let _ = task_graph;

    for epic in store.all(ArtefactKind::Epic)? {
        let id = &epic.front_matter.id;
        let Some(statuses) = by_epic.get(id) else { continue };
        if statuses.is_empty() {
            continue;
        }
        let all_terminal = statuses.iter().all(|s| {
            matches!(TaskStatus::canonicalize(s), Some(st) if st.is_terminal())
        });
        let epic_status = EpicStatus::canonicalize(&epic.front_matter.status);
        if all_terminal && epic_status != Some(EpicStatus::Done) {
            report.findings.push(Finding {
                kind: FindingKind::EpicStatusMismatch,
                artefact_id: id.clone(),
                message: format!("{id}'s Tasks are all Done/Cancelled but the Epic is '{}'", epic.front_matter.status),
                cycle_path: Vec::new(),
            });
        }
    }
    Ok(())
}

/// Apply the bounded set of auto-fixes, grouped per artefact file so that
/// multiple findings on one artefact land in a single load-save cycle.
fn apply_fixes(store: &mut ArtefactStore, report: &mut ValidationReport) -> CoreResult<()> {
    let mut per_artefact: HashMap<String, Vec<&Finding>> = HashMap::new();
    for f in &report.findings {
        if f.kind.is_auto_fixable() && !f.artefact_id.is_empty() {
            per_artefact.entry(f.artefact_id.clone()).or_default().push(f);
        }
    }

    let mut fixed = Vec::new();
    for (artefact_id, findings) in per_artefact {
        if fix_one_artefact(store, &artefact_id, &findings)? {
            fixed.push(artefact_id);
        }
    }
    report.fixed = fixed;
    Ok(())
}

fn fix_one_artefact(store: &mut ArtefactStore, artefact_id: &str, findings: &[&Finding]) -> CoreResult<bool> {
    let kind = kind_from_id(artefact_id);
    let Some(kind) = kind else { return Ok(false) };

    let needs_blocker_fix = findings.iter().any(|f| {
        matches!(
            f.kind,
            FindingKind::MissingRef | FindingKind::SelfRef | FindingKind::Duplicate | FindingKind::Format | FindingKind::CancelledBlocker
        )
    });
    let needs_status_fix = findings.iter().any(|f| f.kind == FindingKind::StatusFormat);
    let needs_epic_status_fix = findings.iter().any(|f| f.kind == FindingKind::EpicStatusMismatch);

    if !needs_blocker_fix && !needs_status_fix && !needs_epic_status_fix {
        return Ok(false);
    }

    let mut patch: HashMap<String, serde_yaml::Value> = HashMap::new();

    if needs_blocker_fix {
        let artefact = store.get(kind, artefact_id)?;
        let mut resolver = IdResolver::new(kind);
        for id in store.canonical_ids(kind)? {
            resolver.register(&id);
        }
        let graph = DependencyGraph::build(store, kind)?;
        let mut seen = std::collections::HashSet::new();
        let mut fixed_blockers = Vec::new();
        for raw in &artefact.front_matter.blocked_by {
            let Some(canonical) = resolver.resolve(raw) else { continue };
            if canonical == artefact_id {
                continue;
            }
            if let Some(node) = graph.node(&canonical) {
                let cancelled = TaskStatus::canonicalize(&node.status) == Some(TaskStatus::Cancelled)
                    || EpicStatus::canonicalize(&node.status) == Some(EpicStatus::Cancelled);
                if cancelled {
                    continue;
                }
            }
            if seen.insert(canonical.clone()) {
                fixed_blockers.push(canonical);
            }
        }
        patch.insert(
            "blocked_by".to_string(),
            serde_yaml::Value::Sequence(fixed_blockers.into_iter().map(serde_yaml::Value::String).collect()),
        );
    }

    if needs_status_fix {
        let artefact = store.get(kind, artefact_id)?;
        let canonical = match kind {
            ArtefactKind::Task => TaskStatus::canonicalize(&artefact.front_matter.status).map(|s| s.canonical_str().to_string()),
            ArtefactKind::Epic => EpicStatus::canonicalize(&artefact.front_matter.status).map(|s| s.canonical_str().to_string()),
            _ => None,
        };
        if let Some(canonical) = canonical {
            patch.insert("status".to_string(), serde_yaml::Value::String(canonical));
        }
    }

    if needs_epic_status_fix {
        patch.insert("status".to_string(), serde_yaml::Value::String(EpicStatus::Done.canonical_str().to_string()));
    }

    let mut fixed = false;
    if !patch.is_empty() {
        store.update_frontmatter(kind, artefact_id, patch)?;
        fixed = true;
    }

    // Rename last: it changes the filename's leading ID token, which would
    // invalidate `artefact_id` for any patch above that still needs to
    // resolve the artefact by its old (mismatched) filename id.
    if findings.iter().any(|f| f.kind == FindingKind::IdMismatch) {
        store.rename_to_frontmatter_id(kind, artefact_id)?;
        fixed = true;
    }

    Ok(fixed)
}

fn kind_from_id(id: &str) -> Option<ArtefactKind> {
    if id.starts_with("PRD") {
        Some(ArtefactKind::Product)
    } else if id.starts_with("ADR") {
        Some(ArtefactKind::DecisionRecord)
    } else if id.starts_with('E') {
        Some(ArtefactKind::Epic)
    } else if id.starts_with('T') {
        Some(ArtefactKind::Task)
    } else if id.starts_with('S') {
        Some(ArtefactKind::Story)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artefact::CreateOptions;
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

    #[test]
    fn cycle_is_reported_and_not_modified_by_fix_scenario_2() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path());
        s.create(ArtefactKind::Task, None, "A", CreateOptions::default()).unwrap();
        s.create(ArtefactKind::Task, None, "B", CreateOptions::default()).unwrap();
        s.create(ArtefactKind::Task, None, "C", CreateOptions::default()).unwrap();
        set_blocked_by(&mut s, "T001", vec!["T002"]);
        set_blocked_by(&mut s, "T002", vec!["T003"]);
        set_blocked_by(&mut s, "T003", vec!["T001"]);

        let report = validate(&mut s, true).unwrap();
        assert!(report.has_cycle());
        let blocked_by_after = s.get(ArtefactKind::Task, "T001").unwrap().front_matter.blocked_by;
        assert_eq!(blocked_by_after, vec!["T002".to_string()]);
    }

    #[test]
    fn missing_ref_is_removed_by_fix() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path());
        s.create(ArtefactKind::Task, None, "A", CreateOptions::default()).unwrap();
        set_blocked_by(&mut s, "T001", vec!["T999"]);

        let report = validate(&mut s, true).unwrap();
        assert!(report.findings.iter().any(|f| f.kind == FindingKind::MissingRef));
        let after = s.get(ArtefactKind::Task, "T001").unwrap();
        assert!(after.front_matter.blocked_by.is_empty());
    }

    #[test]
    fn self_ref_is_removed_by_fix() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path());
        s.create(ArtefactKind::Task, None, "A", CreateOptions::default()).unwrap();
        set_blocked_by(&mut s, "T001", vec!["T001"]);

        validate(&mut s, true).unwrap();
        let after = s.get(ArtefactKind::Task, "T001").unwrap();
        assert!(after.front_matter.blocked_by.is_empty());
    }

    #[test]
    fn duplicate_blocker_is_deduped_preserving_order() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path());
        s.create(ArtefactKind::Task, None, "A", CreateOptions::default()).unwrap();
        s.create(ArtefactKind::Task, None, "B", CreateOptions::default()).unwrap();
        set_blocked_by(&mut s, "T002", vec!["T001", "T001"]);

        validate(&mut s, true).unwrap();
        let after = s.get(ArtefactKind::Task, "T002").unwrap();
        assert_eq!(after.front_matter.blocked_by, vec!["T001".to_string()]);
    }

    #[test]
    fn non_canonical_blocker_form_is_rewritten() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path());
        s.create(ArtefactKind::Task, None, "A", CreateOptions::default()).unwrap();
        s.create(ArtefactKind::Task, None, "B", CreateOptions::default()).unwrap();
        set_blocked_by(&mut s, "T002", vec!["1"]);

        let report = validate(&mut s, true).unwrap();
        assert!(report.findings.iter().any(|f| f.kind == FindingKind::Format));
        let after = s.get(ArtefactKind::Task, "T002").unwrap();
        assert_eq!(after.front_matter.blocked_by, vec!["T001".to_string()]);
    }

    #[test]
    fn id_mismatch_renames_file_to_match_frontmatter_id() {
        use crate::artefact::{load, save};

        let dir = tempdir().unwrap();
        let mut s = store(dir.path());
        s.create(ArtefactKind::Task, None, "A", CreateOptions::default()).unwrap();
        let old_path = dir.path().join("artefacts").join("T001-a.md");
        assert!(old_path.exists());

        let (mut front_matter, body) = load(&old_path).unwrap();
        front_matter.id = "T002".to_string();
        save(&old_path, &front_matter, &body).unwrap();

        let report = validate(&mut s, true).unwrap();
        assert!(report.findings.iter().any(|f| f.kind == FindingKind::IdMismatch));
        assert!(!old_path.exists(), "mismatched file should have been renamed");
        let renamed = s.get(ArtefactKind::Task, "T002").unwrap();
        assert_eq!(renamed.front_matter.id, "T002");
    }

    #[test]
    fn epic_status_mismatch_is_fixed_to_done() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path());
        s.create(ArtefactKind::Epic, None, "Auth", CreateOptions::default()).unwrap();
        s.create(
            ArtefactKind::Task,
            Some("E001"),
            "Only task",
            CreateOptions { parent_dir: None, ..Default::default() },
        )
        .unwrap();
        let mut patch = StdHashMap::new();
        patch.insert("status".to_string(), serde_yaml::Value::String("Done".to_string()));
        s.update_frontmatter(ArtefactKind::Task, "T001", patch).unwrap();

        let report = validate(&mut s, true).unwrap();
        assert!(report.findings.iter().any(|f| f.kind == FindingKind::EpicStatusMismatch));
        let epic = s.get(ArtefactKind::Epic, "E001").unwrap();
        assert_eq!(epic.front_matter.status, "Done");
    }
}
