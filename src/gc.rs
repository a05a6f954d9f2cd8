//! Component H — garbage collector.
//!
//! Three disposition bands over each managed directory (agents, worktrees,
//! havens): `safe` (orphaned with no referencing Task, or a terminal
//! registry record with artefacts still on disk), `unsafe` (orphaned but the
//! Task still exists — kept unless `--unsafe`), `active` (non-terminal
//! registry record — never swept). Cleanup computes the set difference
//! between the filesystem and the agent table, then removes `safe` entries;
//! `unsafe` entries require an explicit opt-in.

use crate::artefact::{ArtefactKind, ArtefactStore};
use crate::errors::{CoreError, CoreResult};
use crate::orchestrator::{AgentStatus, AgentTable};
use crate::tracker::git::GitTracker;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Safe,
    Unsafe,
    Active,
}

#[derive(Debug, Clone)]
pub struct GcEntry {
    pub task_id: String,
    pub path: PathBuf,
    pub disposition: Disposition,
}

#[derive(Debug, Clone, Default)]
pub struct GcReport {
    pub removed: Vec<PathBuf>,
    pub retained_unsafe: Vec<PathBuf>,
    pub retained_active: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct GcOptions {
    pub allow_unsafe: bool,
    pub force_haven: bool,
}

pub struct GarbageCollector {
    agents_dir: PathBuf,
    worktrees_dir: PathBuf,
    havens_root: Option<PathBuf>,
    project_hash: String,
    table: AgentTable,
}

impl GarbageCollector {
    pub fn new(
        agents_dir: PathBuf,
        worktrees_dir: PathBuf,
        havens_root: Option<PathBuf>,
        project_hash: String,
        table: AgentTable,
    ) -> Self {
        Self { agents_dir, worktrees_dir, havens_root, project_hash, table }
    }

    fn classify(&self, store: &mut ArtefactStore, task_id: &str, path: &Path) -> CoreResult<Disposition> {
        let record = self.table.get(task_id)?;
        if let Some(record) = &record {
            if !record.status.is_terminal() {
                return Ok(Disposition::Active);
            }
            let _ = path;
            return Ok(Disposition::Safe);
        }
        // No registry record: orphaned. Safe unless the Task artefact still exists.
        match store.get(ArtefactKind::Task, task_id) {
            Ok(_) => Ok(Disposition::Unsafe),
            Err(CoreError::NotFound { .. }) => Ok(Disposition::Safe),
            Err(e) => Err(e),
        }
    }

    fn scan(&self, store: &mut ArtefactStore, dir: &Path) -> CoreResult<Vec<GcEntry>> {
        let mut entries = Vec::new();
        if !dir.exists() {
            return Ok(entries);
        }
        for entry in std::fs::read_dir(dir).map_err(|e| CoreError::io(dir, e))? {
            let entry = entry.map_err(|e| CoreError::io(dir, e))?;
            let path = entry.path();
            let Some(task_id) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else { continue };
            let disposition = self.classify(store, &task_id, &path)?;
            entries.push(GcEntry { task_id, path, disposition });
        }
        entries.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        Ok(entries)
    }

    /// Reconcile and remove `safe` agent-scratch directory entries.
    pub fn sweep_agents(&self, store: &mut ArtefactStore, options: &GcOptions) -> CoreResult<GcReport> {
        self.sweep_dir(store, &self.agents_dir.clone(), options)
    }

    /// Reconcile worktrees: `git worktree prune` first, then remove `safe`
    /// worktree directories and their backing branches.
    pub fn sweep_worktrees(&self, store: &mut ArtefactStore, project_root: &Path, options: &GcOptions) -> CoreResult<GcReport> {
        if let Ok(git) = GitTracker::new(project_root) {
            git.prune_worktrees()?;
        }

        let mut report = GcReport::default();
        for entry in self.scan(store, &self.worktrees_dir)? {
            match entry.disposition {
                Disposition::Safe => {
                    if let Ok(git) = GitTracker::new(project_root) {
                        git.remove_task_worktree(&entry.task_id)?;
                    }
                    report.removed.push(entry.path);
                }
                Disposition::Unsafe if options.allow_unsafe => {
                    if let Ok(git) = GitTracker::new(project_root) {
                        git.remove_task_worktree(&entry.task_id)?;
                    }
                    report.removed.push(entry.path);
                }
                Disposition::Unsafe => report.retained_unsafe.push(entry.path),
                Disposition::Active => report.retained_active.push(entry.path),
            }
        }
        Ok(report)
    }

    fn sweep_dir(&self, store: &mut ArtefactStore, dir: &Path, options: &GcOptions) -> CoreResult<GcReport> {
        let mut report = GcReport::default();
        for entry in self.scan(store, dir)? {
            match entry.disposition {
                Disposition::Safe => {
                    remove_path(&entry.path)?;
                    report.removed.push(entry.path);
                }
                Disposition::Unsafe if options.allow_unsafe => {
                    remove_path(&entry.path)?;
                    report.removed.push(entry.path);
                }
                Disposition::Unsafe => report.retained_unsafe.push(entry.path),
                Disposition::Active => report.retained_active.push(entry.path),
            }
        }
        Ok(report)
    }

    /// Haven directories are keyed by project hash; a haven belonging to a
    /// different project is only eligible behind `--force`.
    pub fn sweep_havens(&self, options: &GcOptions) -> CoreResult<GcReport> {
        let mut report = GcReport::default();
        let Some(havens_root) = &self.havens_root else { return Ok(report) };
        if !havens_root.exists() {
            return Ok(report);
        }
        for entry in std::fs::read_dir(havens_root).map_err(|e| CoreError::io(havens_root, e))? {
            let entry = entry.map_err(|e| CoreError::io(havens_root, e))?;
            let path = entry.path();
            let Some(hash) = path.file_name().and_then(|n| n.to_str()) else { continue };
            if hash == self.project_hash {
                continue;
            }
            if options.force_haven {
                remove_path(&path)?;
                report.removed.push(path);
            } else {
                report.retained_unsafe.push(path);
            }
        }
        Ok(report)
    }

    pub fn sweep_all(&self, store: &mut ArtefactStore, project_root: &Path, options: &GcOptions) -> CoreResult<GcReport> {
        let mut total = GcReport::default();
        for report in [
            self.sweep_agents(store, options)?,
            self.sweep_worktrees(store, project_root, options)?,
            self.sweep_havens(options)?,
        ] {
            total.removed.extend(report.removed);
            total.retained_unsafe.extend(report.retained_unsafe);
            total.retained_active.extend(report.retained_active);
        }
        Ok(total)
    }
}

fn remove_path(path: &Path) -> CoreResult<()> {
    if path.is_dir() {
        std::fs::remove_dir_all(path).map_err(|e| CoreError::io(path, e))
    } else {
        std::fs::remove_file(path).map_err(|e| CoreError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artefact::CreateOptions;
    use crate::orchestrator::agent_table::AgentTable;
    use crate::state::StateStore;
    use tempfile::tempdir;

    fn store(dir: &Path) -> ArtefactStore {
        ArtefactStore::new(
            dir.join("artefacts"),
            dir.join(".sailing/memory"),
            StateStore::new(dir.join(".sailing/state.json")),
        )
    }

    fn gc(dir: &Path) -> GarbageCollector {
        GarbageCollector::new(
            dir.join("agents"),
            dir.join("worktrees"),
            Some(dir.join("havens")),
            "abc123".to_string(),
            AgentTable::new(dir.join(".sailing/agents.json")),
        )
    }

    #[test]
    fn orphaned_agent_dir_without_task_is_safe_and_removed() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path());
        let collector = gc(dir.path());
        std::fs::create_dir_all(dir.path().join("agents/T999")).unwrap();

        let report = collector.sweep_agents(&mut s, &GcOptions::default()).unwrap();
        assert_eq!(report.removed, vec![dir.path().join("agents/T999")]);
        assert!(!dir.path().join("agents/T999").exists());
    }

    #[test]
    fn orphaned_agent_dir_with_existing_task_is_unsafe_unless_forced() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path());
        s.create(ArtefactKind::Task, None, "Form", CreateOptions::default()).unwrap();
        let collector = gc(dir.path());
        std::fs::create_dir_all(dir.path().join("agents/T001")).unwrap();

        let report = collector.sweep_agents(&mut s, &GcOptions::default()).unwrap();
        assert!(report.retained_unsafe.contains(&dir.path().join("agents/T001")));
        assert!(dir.path().join("agents/T001").exists());

        let forced = collector.sweep_agents(&mut s, &GcOptions { allow_unsafe: true, force_haven: false }).unwrap();
        assert!(forced.removed.contains(&dir.path().join("agents/T001")));
    }

    #[test]
    fn active_agent_record_is_never_swept() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path());
        let collector = gc(dir.path());
        std::fs::create_dir_all(dir.path().join("agents/T001")).unwrap();
        collector.table.upsert("T001", |r| r.status = AgentStatus::Running).unwrap();

        let report = collector.sweep_agents(&mut s, &GcOptions::default()).unwrap();
        assert!(report.retained_active.contains(&dir.path().join("agents/T001")));
        assert!(dir.path().join("agents/T001").exists());
    }

    #[test]
    fn sweep_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path());
        let collector = gc(dir.path());
        std::fs::create_dir_all(dir.path().join("agents/T999")).unwrap();

        collector.sweep_agents(&mut s, &GcOptions::default()).unwrap();
        let second = collector.sweep_agents(&mut s, &GcOptions::default()).unwrap();
        assert!(second.removed.is_empty());
    }

    #[test]
    fn foreign_haven_requires_force() {
        let dir = tempdir().unwrap();
        let collector = gc(dir.path());
        std::fs::create_dir_all(dir.path().join("havens/otherhash")).unwrap();

        let report = collector.sweep_havens(&GcOptions::default()).unwrap();
        assert!(!report.removed.iter().any(|p| p.ends_with("otherhash")));

        let forced = collector.sweep_havens(&GcOptions { allow_unsafe: false, force_haven: true }).unwrap();
        assert!(forced.removed.iter().any(|p| p.ends_with("otherhash")));
    }
}
