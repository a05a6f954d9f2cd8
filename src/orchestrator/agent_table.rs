//! The agent table: one JSON-lines record per Task agent, the persistence
//! layer for Component G's state machine.
//!
//! Mirrors the teacher's `StateManager` discipline of a single append-only
//! log as the canonical recovery source, but records are keyed by `task_id`
//! and superseded records are rewritten (not merely appended) under a file
//! lock, since the agent table must answer "what is the *current* status of
//! this Task's agent" rather than "what is the phase history".

use crate::errors::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Spawned,
    Running,
    Completed,
    Reaped,
    Merged,
    Collected,
    Error,
    Killed,
    Rejected,
    Conflict,
}

impl AgentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AgentStatus::Collected
                | AgentStatus::Merged
                | AgentStatus::Reaped
                | AgentStatus::Completed
                | AgentStatus::Rejected
                | AgentStatus::Killed
                | AgentStatus::Error
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorktreeRef {
    pub path: PathBuf,
    pub branch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub task_id: String,
    pub task_num: u32,
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worktree: Option<WorktreeRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spawned_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub dirty_worktree: bool,
    #[serde(default)]
    pub uncommitted_files: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_usd: Option<f64>,
}

impl AgentRecord {
    pub fn new(task_id: String, task_num: u32) -> Self {
        Self {
            task_id,
            task_num,
            status: AgentStatus::Spawned,
            pid: None,
            worktree: None,
            spawned_at: Some(Utc::now()),
            started_at: None,
            ended_at: None,
            exit_code: None,
            dirty_worktree: false,
            uncommitted_files: Vec::new(),
            log_file: None,
            pr_url: None,
            budget_usd: None,
        }
    }
}

/// Single-writer JSON-lines store, guarded end-to-end by an OS-level
/// exclusive file lock so concurrent `sailing agent` invocations serialize.
pub struct AgentTable {
    path: PathBuf,
}

impl AgentTable {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn lock_file(&self) -> CoreResult<File> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| CoreError::io(&self.path, e))?;
        file.lock_exclusive().map_err(|e| CoreError::io(&self.path, e))?;
        Ok(file)
    }

    fn read_all(file: &mut File) -> CoreResult<HashMap<String, AgentRecord>> {
        file.seek(SeekFrom::Start(0)).ok();
        let mut content = String::new();
        file.read_to_string(&mut content).map_err(|e| CoreError::io("agents.json", e))?;
        let mut records = HashMap::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let record: AgentRecord = serde_json::from_str(line)?;
            records.insert(record.task_id.clone(), record);
        }
        Ok(records)
    }

    fn write_all(file: &mut File, records: &HashMap<String, AgentRecord>) -> CoreResult<()> {
        let mut ids: Vec<&String> = records.keys().collect();
        ids.sort();
        let mut body = String::new();
        for id in ids {
            body.push_str(&serde_json::to_string(&records[id])?);
            body.push('\n');
        }
        file.set_len(0).map_err(|e| CoreError::io("agents.json", e))?;
        file.seek(SeekFrom::Start(0)).map_err(|e| CoreError::io("agents.json", e))?;
        file.write_all(body.as_bytes()).map_err(|e| CoreError::io("agents.json", e))?;
        file.sync_all().map_err(|e| CoreError::io("agents.json", e))
    }

    pub fn get(&self, task_id: &str) -> CoreResult<Option<AgentRecord>> {
        let mut file = self.lock_file()?;
        let records = Self::read_all(&mut file)?;
        file.unlock().ok();
        Ok(records.get(task_id).cloned())
    }

    pub fn all(&self) -> CoreResult<Vec<AgentRecord>> {
        let mut file = self.lock_file()?;
        let records = Self::read_all(&mut file)?;
        file.unlock().ok();
        let mut out: Vec<AgentRecord> = records.into_values().collect();
        out.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        Ok(out)
    }

    /// Read-modify-write a single record under the exclusive lock.
    pub fn upsert(&self, task_id: &str, f: impl FnOnce(&mut AgentRecord)) -> CoreResult<AgentRecord> {
        let mut file = self.lock_file()?;
        let mut records = Self::read_all(&mut file)?;
        let task_num = task_id.trim_start_matches('T').parse().unwrap_or(0);
        let record = records.entry(task_id.to_string()).or_insert_with(|| AgentRecord::new(task_id.to_string(), task_num));
        f(record);
        let result = record.clone();
        Self::write_all(&mut file, &records)?;
        file.unlock().ok();
        Ok(result)
    }

    pub fn remove(&self, task_id: &str) -> CoreResult<()> {
        let mut file = self.lock_file()?;
        let mut records = Self::read_all(&mut file)?;
        records.remove(task_id);
        Self::write_all(&mut file, &records)?;
        file.unlock().ok();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn upsert_creates_then_updates_record() {
        let dir = tempdir().unwrap();
        let table = AgentTable::new(dir.path().join("agents.json"));

        table.upsert("T001", |r| r.status = AgentStatus::Spawned).unwrap();
        let got = table.get("T001").unwrap().unwrap();
        assert_eq!(got.status, AgentStatus::Spawned);
        assert_eq!(got.task_num, 1);

        table.upsert("T001", |r| r.status = AgentStatus::Running).unwrap();
        let got = table.get("T001").unwrap().unwrap();
        assert_eq!(got.status, AgentStatus::Running);
    }

    #[test]
    fn all_returns_sorted_records() {
        let dir = tempdir().unwrap();
        let table = AgentTable::new(dir.path().join("agents.json"));
        table.upsert("T002", |_| {}).unwrap();
        table.upsert("T001", |_| {}).unwrap();
        let all = table.all().unwrap();
        assert_eq!(all.iter().map(|r| r.task_id.as_str()).collect::<Vec<_>>(), vec!["T001", "T002"]);
    }

    #[test]
    fn remove_deletes_a_record() {
        let dir = tempdir().unwrap();
        let table = AgentTable::new(dir.path().join("agents.json"));
        table.upsert("T001", |_| {}).unwrap();
        table.remove("T001").unwrap();
        assert!(table.get("T001").unwrap().is_none());
    }

    #[test]
    fn terminal_statuses_are_classified_correctly() {
        assert!(AgentStatus::Collected.is_terminal());
        assert!(AgentStatus::Error.is_terminal());
        assert!(!AgentStatus::Running.is_terminal());
        assert!(!AgentStatus::Spawned.is_terminal());
    }
}
