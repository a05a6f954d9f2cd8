//! Agent lifecycle state machine: `spawn` / `reap` / `merge` / `cleanup`, the
//! watchdog tick, and preflight checks, grounded on the teacher's
//! `ClaudeRunner::run_iteration` (piped `tokio::process::Command`, stdin
//! prompt write, streaming stdout read, elapsed-time ticker).

use super::agent_table::{AgentStatus, AgentTable, WorktreeRef};
use crate::config::SailingConfig;
use crate::errors::{CoreError, CoreResult};
use crate::tracker::git::{GitTracker, MergeOutcome};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    pub worktree: bool,
    pub prompt: Option<String>,
    pub handshake: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ReapOptions {
    pub wait_timeout: Option<Duration>,
}

/// Drives the `spawned → running → completed/error/killed → reaped → merged
/// → collected` state machine for one Task at a time. Owns no global state
/// beyond the agent table path and the repository root; callers hold
/// whatever child-process handles they spawn.
pub struct AgentOrchestrator {
    table: AgentTable,
    project_root: PathBuf,
    worktrees_dir: PathBuf,
    config: SailingConfig,
}

impl AgentOrchestrator {
    pub fn new(table: AgentTable, project_root: PathBuf, worktrees_dir: PathBuf, config: SailingConfig) -> Self {
        Self { table, project_root, worktrees_dir, config }
    }

    fn git(&self) -> CoreResult<GitTracker> {
        GitTracker::new(&self.project_root).map_err(CoreError::Other)
    }

    /// Preflight assertions before any spawn: main branch clean, at least one
    /// commit, and (by design) no already-running agent for this Task.
    pub fn preflight(&self, task_id: &str) -> CoreResult<()> {
        let git = self.git()?;
        if !git.has_commits() {
            return Err(CoreError::validation_failure("main branch has no commits; cannot create a worktree"));
        }
        if !git.is_clean().map_err(CoreError::Other)? {
            return Err(CoreError::validation_failure("main branch has uncommitted changes"));
        }
        if let Some(existing) = self.table.get(task_id)? {
            if !existing.status.is_terminal() {
                return Err(CoreError::concurrency_error(format!("task {task_id} already has a running agent")));
            }
        }
        Ok(())
    }

    /// Create (optionally) a worktree, spawn the agent's child process with
    /// the prompt piped over stdin, and persist a `spawned`/`running` record.
    pub async fn spawn(&self, task_id: &str, options: &SpawnOptions) -> CoreResult<Child> {
        self.preflight(task_id)?;

        let mut worktree_ref = None;
        let working_dir = if options.worktree {
            let path = self.worktrees_dir.join(task_id);
            let git = self.git()?;
            git.create_task_worktree(task_id, &path)?;
            worktree_ref = Some(WorktreeRef { path: path.clone(), branch: task_id.to_string() });
            path
        } else {
            self.project_root.clone()
        };

        let task_num = task_id.trim_start_matches('T').parse().unwrap_or(0);
        self.table.upsert(task_id, |r| {
            r.task_num = task_num;
            r.status = AgentStatus::Spawned;
            r.worktree = worktree_ref.clone();
            r.spawned_at = Some(chrono::Utc::now());
        })?;

        let command = self.config.toml.agent_command();
        let mut cmd = Command::new(&command);
        for arg in &self.config.toml.agent.args {
            cmd.arg(arg);
        }
        cmd.current_dir(&working_dir);
        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| CoreError::io(&working_dir, e))?;
        let pid = child.id().unwrap_or(0);

        if let Some(prompt) = &options.prompt {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(prompt.as_bytes()).await.map_err(|e| CoreError::io("agent stdin", e))?;
                stdin.shutdown().await.ok();
            }
        }

        let ready = if options.handshake {
            wait_for_handshake(&mut child).await
        } else {
            true
        };

        self.table.upsert(task_id, |r| {
            r.pid = Some(pid);
            r.started_at = Some(chrono::Utc::now());
            r.status = if ready { AgentStatus::Running } else { AgentStatus::Spawned };
        })?;

        Ok(child)
    }

    /// A periodic tick: check `max_budget_usd`/`watchdog_timeout` for every
    /// non-terminal agent and kill breaching ones.
    pub fn watchdog_tick(&self) -> CoreResult<Vec<String>> {
        let mut killed = Vec::new();
        let timeout = Duration::from_secs(self.config.toml.agent.watchdog_timeout_secs);
        for record in self.table.all()? {
            if record.status.is_terminal() {
                continue;
            }
            let over_budget = match (record.budget_usd, self.config.toml.agent.max_budget_usd) {
                (Some(spent), Some(cap)) => spent > cap,
                _ => false,
            };
            let over_time = record
                .spawned_at
                .map(|spawned| chrono::Utc::now().signed_duration_since(spawned).num_seconds() as u64 > timeout.as_secs())
                .unwrap_or(false);

            if over_budget || over_time {
                self.kill(&record.task_id)?;
                killed.push(record.task_id);
            }
        }
        Ok(killed)
    }

    pub fn kill(&self, task_id: &str) -> CoreResult<()> {
        if let Some(record) = self.table.get(task_id)? {
            if let Some(pid) = record.pid {
                terminate_pid(pid);
            }
        }
        self.table.upsert(task_id, |r| {
            r.status = AgentStatus::Killed;
            r.ended_at = Some(chrono::Utc::now());
        })?;
        Ok(())
    }

    /// Wait (bounded) for the child to exit, record its exit status, probe
    /// for a dirty worktree, and transition to `reaped`.
    pub async fn reap(&self, task_id: &str, mut child: Child, options: &ReapOptions) -> CoreResult<()> {
        let status = if let Some(timeout) = options.wait_timeout {
            match tokio::time::timeout(timeout, child.wait()).await {
                Ok(result) => result.map_err(|e| CoreError::io("agent wait", e))?,
                Err(_) => {
                    child.start_kill().ok();
                    self.table.upsert(task_id, |r| r.status = AgentStatus::Killed)?;
                    return Err(CoreError::Timeout { operation: format!("reap {task_id}"), elapsed_ms: timeout.as_millis() as u64 });
                }
            }
        } else {
            child.wait().await.map_err(|e| CoreError::io("agent wait", e))?
        };

        let exit_code = status.code().unwrap_or(-1);
        let record = self.table.get(task_id)?;
        let worktree_path = record.as_ref().and_then(|r| r.worktree.as_ref()).map(|w| w.path.clone());

        let (dirty, files) = if let Some(path) = &worktree_path {
            dirty_worktree_probe(path)
        } else {
            (false, Vec::new())
        };

        self.table.upsert(task_id, |r| {
            r.exit_code = Some(exit_code);
            r.ended_at = Some(chrono::Utc::now());
            r.dirty_worktree = dirty;
            r.uncommitted_files = files;
            r.status = if exit_code == 0 { AgentStatus::Completed } else { AgentStatus::Error };
        })?;

        self.table.upsert(task_id, |r| r.status = AgentStatus::Reaped)?;
        Ok(())
    }

    /// Fast-forward or merge the Task branch back into main.
    pub fn merge(&self, task_id: &str) -> CoreResult<MergeOutcome> {
        let git = self.git()?;
        let outcome = git.merge_branch(task_id)?;
        self.table.upsert(task_id, |r| {
            r.status = match outcome {
                MergeOutcome::FastForwarded | MergeOutcome::Merged => AgentStatus::Merged,
                MergeOutcome::Conflict => AgentStatus::Conflict,
            };
        })?;
        Ok(outcome)
    }

    /// Delete the worktree and branch, then mark `collected`.
    pub fn cleanup(&self, task_id: &str, force: bool) -> CoreResult<()> {
        let record = self.table.get(task_id)?.ok_or_else(|| CoreError::not_found("agent", task_id))?;
        if !force && matches!(record.status, AgentStatus::Conflict) {
            return Err(CoreError::validation_failure(format!(
                "task {task_id} has an unresolved merge conflict; pass --force to discard"
            )));
        }
        let git = self.git()?;
        git.remove_task_worktree(task_id)?;
        self.table.upsert(task_id, |r| r.status = AgentStatus::Collected)?;
        Ok(())
    }

    pub fn status(&self, task_id: &str) -> CoreResult<Option<super::agent_table::AgentRecord>> {
        self.table.get(task_id)
    }

    pub fn all(&self) -> CoreResult<Vec<super::agent_table::AgentRecord>> {
        self.table.all()
    }
}

async fn wait_for_handshake(child: &mut Child) -> bool {
    let Some(stdout) = child.stdout.take() else { return true };
    let mut lines = BufReader::new(stdout).lines();
    let result = tokio::time::timeout(Duration::from_secs(30), lines.next_line()).await;
    matches!(result, Ok(Ok(Some(line))) if line.trim() == "READY")
}

fn dirty_worktree_probe(worktree_path: &std::path::Path) -> (bool, Vec<PathBuf>) {
    let Ok(git) = GitTracker::new(worktree_path) else { return (false, Vec::new()) };
    match git.is_clean() {
        Ok(true) => (false, Vec::new()),
        Ok(false) => (true, Vec::new()),
        Err(_) => (false, Vec::new()),
    }
}

#[cfg(unix)]
fn terminate_pid(pid: u32) {
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn terminate_pid(_pid: u32) {}

/// Used by the watchdog/preflight timing checks so tests can construct a
/// fixed "elapsed" duration without racing the wall clock.
pub fn elapsed_since(instant: Instant) -> Duration {
    instant.elapsed()
}
