//! Component E — memory & log pipeline.
//!
//! Two file genera under the memory directory: a per-Task append-only log
//! (`T<n>.log`) and a per-Epic curated memory file (`E<n>.md`) with an
//! `Agent Context` section. `sync` consolidates logs into memory and reports
//! pending-consolidation counts — the richer of the two historical
//! behaviors named in spec section 9 (see `DESIGN.md`).

use crate::artefact::{ArtefactKind, ArtefactStore};
use crate::errors::{CoreError, CoreResult};
use chrono::Utc;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Severity tag on a single log line, per spec 4.E.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Tip,
    Warn,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Tip => "TIP",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "INFO" => Some(LogLevel::Info),
            "TIP" => Some(LogLevel::Tip),
            "WARN" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            "CRITICAL" => Some(LogLevel::Critical),
            _ => None,
        }
    }
}

/// Report returned by `sync`: how many Task logs were merged, and how many
/// Epics still have pending (unsynced) memory afterward.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub merged_task_logs: Vec<String>,
    pub created_epic_memory: Vec<String>,
    pub still_pending_epics: Vec<String>,
}

/// Owns the per-Task log and per-Epic memory files under the memory
/// directory.
pub struct MemoryPipeline {
    memory_root: PathBuf,
}

impl MemoryPipeline {
    pub fn new(memory_root: PathBuf) -> Self {
        Self { memory_root }
    }

    fn task_log_path(&self, task_id: &str) -> PathBuf {
        self.memory_root.join(format!("{task_id}.log"))
    }

    fn epic_memory_path(&self, epic_id: &str) -> PathBuf {
        self.memory_root.join(format!("{epic_id}.md"))
    }

    /// Append one timestamped, level-tagged line to a Task's log. Optional
    /// metadata (file path, command, code snippet) are rendered as trailing
    /// `key=value` tokens.
    pub fn append(&self, task_id: &str, level: LogLevel, message: &str, metadata: &[(&str, &str)]) -> CoreResult<()> {
        fs::create_dir_all(&self.memory_root).map_err(|e| CoreError::io(&self.memory_root, e))?;
        let path = self.task_log_path(task_id);
        let mut line = format!("{} [{}] {}", Utc::now().to_rfc3339(), level.as_str(), message);
        for (key, value) in metadata {
            line.push_str(&format!(" {key}={value}"));
        }
        line.push('\n');
        use std::io::Write as _;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| CoreError::io(&path, e))?;
        file.write_all(line.as_bytes()).map_err(|e| CoreError::io(&path, e))
    }

    /// A Task log is pending iff it is non-empty.
    pub fn is_task_pending(&self, task_id: &str) -> bool {
        let path = self.task_log_path(task_id);
        fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false)
    }

    pub fn task_log_lines(&self, task_id: &str) -> CoreResult<Vec<String>> {
        let path = self.task_log_path(task_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path).map_err(|e| CoreError::io(&path, e))?;
        Ok(content.lines().map(str::to_string).collect())
    }

    /// Whether the Task's log contains at least one `TIP`-level entry —
    /// used by the assignment registry's soft `release` enforcement.
    pub fn has_tip_entry(&self, task_id: &str) -> CoreResult<bool> {
        Ok(self
            .task_log_lines(task_id)?
            .iter()
            .any(|line| extract_level(line) == Some(LogLevel::Tip)))
    }

    /// An Epic has pending memory iff any of its Tasks (resolved via the
    /// artefact store) has a pending log.
    pub fn epic_has_pending_memory(&self, store: &mut ArtefactStore, epic_id: &str) -> CoreResult<bool> {
        for task in store.all(ArtefactKind::Task)? {
            if task_belongs_to_epic(&task.front_matter.parent, epic_id) && self.is_task_pending(&task.front_matter.id)
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn ensure_epic_memory(&self, epic_id: &str) -> CoreResult<bool> {
        let path = self.epic_memory_path(epic_id);
        if path.exists() {
            return Ok(false);
        }
        fs::create_dir_all(&self.memory_root).map_err(|e| CoreError::io(&self.memory_root, e))?;
        fs::write(&path, "## Agent Context\n\n").map_err(|e| CoreError::io(&path, e))?;
        Ok(true)
    }

    /// `sync(scope?)`: merge every pending Task log under `scope` (an Epic
    /// ID, or `None` for every Epic) into its Epic's `Agent Context` section,
    /// stripping repeated lines and preserving chronological order, then
    /// truncate the Task log. Creates missing Epic memory files unless
    /// `no_create` is set; always reports pending-consolidation counts.
    pub fn sync(&self, store: &mut ArtefactStore, scope: Option<&str>, no_create: bool) -> CoreResult<SyncReport> {
        let mut report = SyncReport::default();
        let tasks = store.all(ArtefactKind::Task)?;

        let mut by_epic: std::collections::HashMap<String, Vec<String>> = std::collections::HashMap::new();
        for task in &tasks {
            let Some(parent) = &task.front_matter.parent else { continue };
            let Some(epic_id) = epic_id_from_parent(parent) else { continue };
            if let Some(scope) = scope {
                if epic_id != scope {
                    continue;
                }
            }
            if self.is_task_pending(&task.front_matter.id) {
                by_epic.entry(epic_id).or_default().push(task.front_matter.id.clone());
            }
        }

        for (epic_id, task_ids) in &by_epic {
            if !self.epic_memory_path(epic_id).exists() {
                if no_create {
                    report.still_pending_epics.push(epic_id.clone());
                    continue;
                }
                if self.ensure_epic_memory(epic_id)? {
                    report.created_epic_memory.push(epic_id.clone());
                }
            }

            let mut new_lines: Vec<String> = Vec::new();
            for task_id in task_ids {
                new_lines.extend(self.task_log_lines(task_id)?);
            }

            self.merge_into_agent_context(epic_id, &new_lines)?;

            for task_id in task_ids {
                self.truncate_task_log(task_id)?;
                report.merged_task_logs.push(task_id.clone());
            }
        }

        // Report Epics that still have pending memory after this sync pass
        // (e.g. because `no_create` skipped them, or `scope` excluded them).
        for task in &tasks {
            let Some(parent) = &task.front_matter.parent else { continue };
            let Some(epic_id) = epic_id_from_parent(parent) else { continue };
            if self.is_task_pending(&task.front_matter.id) && !report.still_pending_epics.contains(&epic_id) {
                report.still_pending_epics.push(epic_id);
            }
        }

        Ok(report)
    }

    fn merge_into_agent_context(&self, epic_id: &str, new_lines: &[String]) -> CoreResult<()> {
        let path = self.epic_memory_path(epic_id);
        let existing = if path.exists() {
            fs::read_to_string(&path).map_err(|e| CoreError::io(&path, e))?
        } else {
            "## Agent Context\n\n".to_string()
        };

        let (before, section_body, after) = split_agent_context(&existing);

        let mut seen: HashSet<&str> = HashSet::new();
        let mut merged_lines: Vec<String> = Vec::new();
        for line in section_body.lines().chain(new_lines.iter().map(String::as_str)) {
            if line.trim().is_empty() {
                continue;
            }
            if seen.insert(line) {
                merged_lines.push(line.to_string());
            }
        }

        let new_content = format!("{before}## Agent Context\n\n{}\n{after}", merged_lines.join("\n"));
        fs::write(&path, new_content).map_err(|e| CoreError::io(&path, e))
    }

    fn truncate_task_log(&self, task_id: &str) -> CoreResult<()> {
        let path = self.task_log_path(task_id);
        if path.exists() {
            fs::write(&path, "").map_err(|e| CoreError::io(&path, e))?;
        }
        Ok(())
    }
}

fn extract_level(line: &str) -> Option<LogLevel> {
    let start = line.find('[')?;
    let end = line.find(']')?;
    LogLevel::parse(&line[start + 1..end])
}

fn epic_id_from_parent(parent: &str) -> Option<String> {
    parent.split('/').map(str::trim).find(|s| s.starts_with('E')).map(str::to_string)
}

fn task_belongs_to_epic(parent: &Option<String>, epic_id: &str) -> bool {
    parent.as_deref().and_then(epic_id_from_parent).as_deref() == Some(epic_id)
}

/// Split an Epic memory document into `(content before "## Agent Context",
/// the section's body only, content after the next H2 header)`.
fn split_agent_context(content: &str) -> (String, String, String) {
    let header = "## Agent Context";
    let Some(start) = content.find(header) else {
        return (content.to_string(), String::new(), String::new());
    };
    let after_header = start + header.len();
    let rest = &content[after_header..];
    let end_offset = rest.find("\n## ").map(|i| i + 1).unwrap_or(rest.len());
    let body = rest[..end_offset].trim_matches('\n').to_string();
    let after = rest[end_offset..].to_string();
    (content[..start].to_string(), body, after)
}

/// A Task log path helper exposed for the CLI's `memory show` command.
pub fn memory_file_path(memory_root: &Path, epic_id: &str) -> PathBuf {
    memory_root.join(format!("{epic_id}.md"))
}
