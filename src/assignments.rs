//! Component F — assignment registry.
//!
//! One YAML assignment record per Task under the assignments directory, plus
//! one run sentinel per currently-claimed Task under the runs directory.
//! `claim`/`release` gate access so exactly one agent works a Task at a time.

use crate::artefact::{Artefact, ArtefactKind, ArtefactStore};
use crate::errors::{CoreError, CoreResult};
use crate::memory::MemoryPipeline;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Claimed,
    Complete,
}

/// One YAML record per Task under the assignments directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub task_id: String,
    pub epic_id: Option<String>,
    pub operation: String,
    pub status: AssignmentStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub project_hash: String,
}

/// One run sentinel per currently-claimed Task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSentinel {
    pub task_id: String,
    pub operation: String,
    pub started_at: DateTime<Utc>,
    pub pid: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ClaimOptions {
    pub operation: String,
    pub force: bool,
}

const AGENT_CONTRACT: &str = "You are an autonomous worker agent. Work only the assigned Task to completion, \
record TIP-level notes for anything the next agent should know, and stop once the Task's acceptance criteria \
are met.";

pub struct AssignmentRegistry {
    assignments_dir: PathBuf,
    runs_dir: PathBuf,
    project_hash: String,
}

impl AssignmentRegistry {
    pub fn new(assignments_dir: PathBuf, runs_dir: PathBuf, project_hash: String) -> Self {
        Self { assignments_dir, runs_dir, project_hash }
    }

    fn assignment_path(&self, task_id: &str) -> PathBuf {
        self.assignments_dir.join(format!("{task_id}.yaml"))
    }

    fn sentinel_path(&self, task_id: &str) -> PathBuf {
        self.runs_dir.join(format!("{task_id}.run.yaml"))
    }

    fn load_assignment(&self, task_id: &str) -> CoreResult<Option<Assignment>> {
        let path = self.assignment_path(task_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|e| CoreError::io(&path, e))?;
        Ok(Some(serde_yaml::from_str(&content)?))
    }

    fn save_assignment(&self, assignment: &Assignment) -> CoreResult<()> {
        std::fs::create_dir_all(&self.assignments_dir).map_err(|e| CoreError::io(&self.assignments_dir, e))?;
        let path = self.assignment_path(&assignment.task_id);
        let content = serde_yaml::to_string(assignment)?;
        std::fs::write(&path, content).map_err(|e| CoreError::io(&path, e))
    }

    /// Probe every sentinel's recorded PID with the null signal; delete
    /// sentinels whose process no longer exists. Any error from the probe
    /// (including a cross-user permission failure) is treated as dead.
    pub fn sweep_orphans(&self) -> CoreResult<Vec<String>> {
        let mut reclaimed = Vec::new();
        if !self.runs_dir.exists() {
            return Ok(reclaimed);
        }
        for entry in std::fs::read_dir(&self.runs_dir).map_err(|e| CoreError::io(&self.runs_dir, e))? {
            let entry = entry.map_err(|e| CoreError::io(&self.runs_dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let content = std::fs::read_to_string(&path).map_err(|e| CoreError::io(&path, e))?;
            let Ok(sentinel) = serde_yaml::from_str::<RunSentinel>(&content) else { continue };
            if !process_alive(sentinel.pid) {
                std::fs::remove_file(&path).map_err(|e| CoreError::io(&path, e))?;
                if let Some(mut assignment) = self.load_assignment(&sentinel.task_id)? {
                    if assignment.status == AssignmentStatus::Claimed {
                        assignment.status = AssignmentStatus::Pending;
                        assignment.claimed_at = None;
                        self.save_assignment(&assignment)?;
                    }
                }
                reclaimed.push(sentinel.task_id);
            }
        }
        Ok(reclaimed)
    }

    /// Gated claim sequence: orphan sweep, already-claimed/complete check,
    /// pending-memory guard, sentinel write, status stamp, then compose and
    /// return the agent prompt.
    pub fn claim(
        &self,
        store: &mut ArtefactStore,
        memory: &MemoryPipeline,
        task_id: &str,
        options: &ClaimOptions,
    ) -> CoreResult<String> {
        self.sweep_orphans()?;

        let mut assignment = match self.load_assignment(task_id)? {
            Some(a) => a,
            None => {
                let task = store.get(ArtefactKind::Task, task_id)?;
                Assignment {
                    task_id: task_id.to_string(),
                    epic_id: task.front_matter.parent.clone(),
                    operation: options.operation.clone(),
                    status: AssignmentStatus::Pending,
                    created_at: Utc::now(),
                    claimed_at: None,
                    completed_at: None,
                    success: None,
                    project_hash: self.project_hash.clone(),
                }
            }
        };

        if matches!(assignment.status, AssignmentStatus::Claimed | AssignmentStatus::Complete) {
            return Err(CoreError::concurrency_error(format!(
                "task {task_id} is already {:?}",
                assignment.status
            )));
        }

        let task = store.get(ArtefactKind::Task, task_id)?;
        if !options.force {
            if let Some(epic_id) = &task.front_matter.parent {
                if memory.epic_has_pending_memory(store, epic_id)? {
                    return Err(CoreError::validation_failure(format!(
                        "epic {epic_id} has pending memory consolidation; run `sailing memory sync` or pass --force"
                    )));
                }
            }
        }

        std::fs::create_dir_all(&self.runs_dir).map_err(|e| CoreError::io(&self.runs_dir, e))?;
        let sentinel = RunSentinel {
            task_id: task_id.to_string(),
            operation: options.operation.clone(),
            started_at: Utc::now(),
            pid: std::process::id(),
        };
        let sentinel_path = self.sentinel_path(task_id);
        std::fs::write(&sentinel_path, serde_yaml::to_string(&sentinel)?).map_err(|e| CoreError::io(&sentinel_path, e))?;

        assignment.status = AssignmentStatus::Claimed;
        assignment.claimed_at = Some(Utc::now());
        self.save_assignment(&assignment)?;

        compose_prompt(store, &task, &assignment.epic_id)
    }

    /// Requires a run sentinel to exist and at least one `TIP`-level log
    /// entry (soft enforcement — surfaced, not fatal); stamps completion and
    /// deletes the sentinel.
    pub fn release(&self, memory: &MemoryPipeline, task_id: &str, success: bool) -> CoreResult<Option<String>> {
        let sentinel_path = self.sentinel_path(task_id);
        if !sentinel_path.exists() {
            return Err(CoreError::not_found("run sentinel", task_id));
        }

        let mut assignment = self
            .load_assignment(task_id)?
            .ok_or_else(|| CoreError::not_found("assignment", task_id))?;

        let warning = if !memory.has_tip_entry(task_id)? {
            Some(format!("task {task_id} released with no TIP-level log entry"))
        } else {
            None
        };

        assignment.status = AssignmentStatus::Complete;
        assignment.completed_at = Some(Utc::now());
        assignment.success = Some(success);
        self.save_assignment(&assignment)?;
        std::fs::remove_file(&sentinel_path).map_err(|e| CoreError::io(&sentinel_path, e))?;

        Ok(warning)
    }

    pub fn show(&self, task_id: &str) -> CoreResult<Option<Assignment>> {
        self.load_assignment(task_id)
    }

    /// List every assignment under this project's hash.
    pub fn list(&self) -> CoreResult<Vec<Assignment>> {
        if !self.assignments_dir.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.assignments_dir).map_err(|e| CoreError::io(&self.assignments_dir, e))? {
            let entry = entry.map_err(|e| CoreError::io(&self.assignments_dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let content = std::fs::read_to_string(&path).map_err(|e| CoreError::io(&path, e))?;
            if let Ok(assignment) = serde_yaml::from_str::<Assignment>(&content) {
                if assignment.project_hash == self.project_hash {
                    out.push(assignment);
                }
            }
        }
        out.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        Ok(out)
    }

    pub fn delete(&self, task_id: &str) -> CoreResult<()> {
        let path = self.assignment_path(task_id);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| CoreError::io(&path, e))?;
        }
        let sentinel_path = self.sentinel_path(task_id);
        if sentinel_path.exists() {
            std::fs::remove_file(&sentinel_path).map_err(|e| CoreError::io(&sentinel_path, e))?;
        }
        Ok(())
    }

    pub fn complete(&self, task_id: &str, success: bool) -> CoreResult<()> {
        let mut assignment = self
            .load_assignment(task_id)?
            .ok_or_else(|| CoreError::not_found("assignment", task_id))?;
        assignment.status = AssignmentStatus::Complete;
        assignment.completed_at = Some(Utc::now());
        assignment.success = Some(success);
        self.save_assignment(&assignment)
    }
}

fn compose_prompt(store: &mut ArtefactStore, task: &Artefact, epic_id: &Option<String>) -> CoreResult<String> {
    let mut sections = vec![AGENT_CONTRACT.to_string()];

    if let Some(epic_id) = epic_id {
        if let Ok(epic) = store.get(ArtefactKind::Epic, epic_id) {
            let mut epic_section = format!("# Epic: {epic_id}");
            if let Some(context) = extract_agent_context(&epic.body) {
                epic_section.push_str(&format!("\n\n## Agent Context\n\n{context}"));
            }
            epic_section.push_str(&format!("\n\n## Summary\n\n{}", epic.body));
            sections.push(epic_section);
        }
    }

    sections.push(format!("# Task: {}\n\n{}", task.front_matter.id, task.body));
    Ok(sections.join("\n\n---\n\n"))
}

fn extract_agent_context(epic_body: &str) -> Option<String> {
    let header = "## Agent Context";
    let start = epic_body.find(header)? + header.len();
    let rest = &epic_body[start..];
    let end = rest.find("\n## ").unwrap_or(rest.len());
    Some(rest[..end].trim().to_string())
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    // SAFETY: signal 0 sends no signal; it only probes for existence and
    // permission, per POSIX kill(2).
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

fn path_exists(path: &Path) -> bool {
    path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artefact::CreateOptions;
    use crate::state::StateStore;
    use tempfile::tempdir;

    fn store(dir: &Path) -> ArtefactStore {
        ArtefactStore::new(
            dir.join("artefacts"),
            dir.join(".sailing/memory"),
            StateStore::new(dir.join(".sailing/state.json")),
        )
    }

    fn registry(dir: &Path) -> AssignmentRegistry {
        AssignmentRegistry::new(
            dir.join(".sailing/assignments"),
            dir.join(".sailing/runs"),
            "deadbeefcafe0".to_string(),
        )
    }

    #[test]
    fn claim_then_release_round_trips_scenario_6() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path());
        s.create(ArtefactKind::Epic, None, "Auth", CreateOptions::default()).unwrap();
        s.create(ArtefactKind::Task, Some("E001"), "Form", CreateOptions::default()).unwrap();
        let memory = MemoryPipeline::new(dir.path().join(".sailing/memory"));
        let r = registry(dir.path());

        let options = ClaimOptions { operation: "implement".to_string(), force: false };
        let prompt = r.claim(&mut s, &memory, "T001", &options).unwrap();
        assert!(prompt.contains("# Task: T001"));
        assert!(prompt.contains("# Epic: E001"));

        let again = r.claim(&mut s, &memory, "T001", &options);
        assert!(again.is_err());

        memory.append("T001", crate::memory::LogLevel::Tip, "finished the form", &[]).unwrap();
        let warning = r.release(&memory, "T001", true).unwrap();
        assert!(warning.is_none());

        let assignment = r.show("T001").unwrap().unwrap();
        assert_eq!(assignment.status, AssignmentStatus::Complete);
        assert_eq!(assignment.success, Some(true));
    }

    #[test]
    fn release_without_tip_entry_warns_but_succeeds() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path());
        s.create(ArtefactKind::Task, None, "Form", CreateOptions::default()).unwrap();
        let memory = MemoryPipeline::new(dir.path().join(".sailing/memory"));
        let r = registry(dir.path());

        let options = ClaimOptions { operation: "implement".to_string(), force: false };
        r.claim(&mut s, &memory, "T001", &options).unwrap();
        let warning = r.release(&memory, "T001", true).unwrap();
        assert!(warning.is_some());
    }

    #[test]
    fn claim_blocked_by_pending_epic_memory_unless_forced() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path());
        s.create(ArtefactKind::Epic, None, "Auth", CreateOptions::default()).unwrap();
        s.create(ArtefactKind::Task, Some("E001"), "Form", CreateOptions::default()).unwrap();
        s.create(ArtefactKind::Task, Some("E001"), "Validate", CreateOptions::default()).unwrap();
        let memory = MemoryPipeline::new(dir.path().join(".sailing/memory"));
        memory.append("T001", crate::memory::LogLevel::Info, "pending work", &[]).unwrap();
        let r = registry(dir.path());

        let options = ClaimOptions { operation: "implement".to_string(), force: false };
        let blocked = r.claim(&mut s, &memory, "T002", &options);
        assert!(blocked.is_err());

        let forced = ClaimOptions { operation: "implement".to_string(), force: true };
        assert!(r.claim(&mut s, &memory, "T002", &forced).is_ok());
    }

    #[test]
    fn orphan_sentinel_is_reclaimed() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path());
        s.create(ArtefactKind::Task, None, "Form", CreateOptions::default()).unwrap();
        let memory = MemoryPipeline::new(dir.path().join(".sailing/memory"));
        let r = registry(dir.path());
        let options = ClaimOptions { operation: "implement".to_string(), force: false };
        r.claim(&mut s, &memory, "T001", &options).unwrap();

        // rewrite the sentinel with a PID that cannot possibly be alive.
        let sentinel = RunSentinel {
            task_id: "T001".to_string(),
            operation: "implement".to_string(),
            started_at: Utc::now(),
            pid: u32::MAX,
        };
        std::fs::write(r.sentinel_path("T001"), serde_yaml::to_string(&sentinel).unwrap()).unwrap();
        assert!(path_exists(&r.sentinel_path("T001")));

        let reclaimed = r.sweep_orphans().unwrap();
        assert_eq!(reclaimed, vec!["T001".to_string()]);
        assert!(!path_exists(&r.sentinel_path("T001")));
        assert_eq!(r.show("T001").unwrap().unwrap().status, AssignmentStatus::Pending);
    }
}
