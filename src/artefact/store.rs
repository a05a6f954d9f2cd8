//! Component C — artefact store.
//!
//! Translates between on-disk artefact files (YAML front-matter plus a
//! markdown body) and typed records, and owns the per-kind indexes that back
//! ID-normalized lookups.

use super::index::KindIndex;
use super::model::{artefact_filename, ArtefactKind, EpicStatus, FrontMatter, ProductStatus, TaskStatus};
use crate::errors::{CoreError, CoreResult};
use crate::paths::PathResolver;
use crate::state::{CounterKind, StateStore};
use chrono::Utc;
use std::collections::HashMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

const MAX_CREATE_RETRIES: usize = 3;

/// An in-memory artefact record: front-matter plus markdown body.
#[derive(Debug, Clone)]
pub struct Artefact {
    pub front_matter: FrontMatter,
    pub body: String,
}

/// How `edit_section`/`edit_multi_section` apply new content to a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Replace,
    Append,
    Prepend,
}

/// Extra fields accepted by `create_<kind>` beyond ID/title/parent.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub parent_dir: Option<PathBuf>,
    pub tags: Vec<String>,
    pub effort: Option<String>,
    pub priority: Option<String>,
    pub milestone: Option<String>,
    pub body: Option<String>,
}

fn counter_kind_for(kind: ArtefactKind) -> CoreResult<CounterKind> {
    match kind {
        ArtefactKind::Product => Ok(CounterKind::Prd),
        ArtefactKind::Epic => Ok(CounterKind::Epic),
        ArtefactKind::Task => Ok(CounterKind::Task),
        ArtefactKind::Story => Ok(CounterKind::Story),
        ArtefactKind::Milestone | ArtefactKind::DecisionRecord => {
            Err(CoreError::invalid_input(format!("{} ids are not counter-backed", kind.label())))
        }
    }
}

fn default_body(kind: ArtefactKind) -> String {
    match kind {
        ArtefactKind::Task | ArtefactKind::Story => "## Description\n\n## Acceptance Criteria\n".to_string(),
        ArtefactKind::Epic => "## Summary\n\n## Agent Context\n".to_string(),
        ArtefactKind::Product => "## Summary\n\n## Goals\n".to_string(),
        ArtefactKind::Milestone => "## Acceptance Criteria\n".to_string(),
        ArtefactKind::DecisionRecord => "## Context\n\n## Decision\n\n## Consequences\n".to_string(),
    }
}

/// Split raw file content into `(front_matter, body)`. Malformed front-matter
/// yields an empty record and the entire content as body, matching the
/// "never fail a read outright" posture named for this component.
fn split_front_matter(content: &str) -> (Option<String>, String) {
    let normalized = content.replace("\r\n", "\n");
    let trimmed = normalized.trim_start();
    let Some(rest) = trimmed.strip_prefix("---\n") else {
        return (None, normalized);
    };
    let Some(end) = rest.find("\n---") else {
        return (None, normalized);
    };
    let yaml = &rest[..end];
    let after_fence = &rest[end + 4..];
    let body = after_fence.strip_prefix('\n').unwrap_or(after_fence);
    (Some(yaml.to_string()), body.to_string())
}

/// Load and parse an artefact file. Never fails on malformed front-matter —
/// callers that need strict validation should check `front_matter.id` is
/// non-empty.
pub fn load(path: &Path) -> CoreResult<(FrontMatter, String)> {
    let content = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
    let (yaml, body) = split_front_matter(&content);
    let front_matter = match yaml {
        Some(yaml) => match serde_yaml::from_str::<FrontMatter>(&yaml) {
            Ok(fm) => fm,
            Err(_) => {
                tracing::warn!(path = %path.display(), "malformed front-matter, treating as empty record");
                return Ok((empty_front_matter(), content));
            }
        },
        None => {
            tracing::warn!(path = %path.display(), "no front-matter fence found, treating as empty record");
            return Ok((empty_front_matter(), content));
        }
    };
    Ok((front_matter, body))
}

fn empty_front_matter() -> FrontMatter {
    FrontMatter::new(ArtefactKind::Task, String::new(), String::new(), None)
}

/// Serialize and atomically write an artefact file: write to a temp file in
/// the same directory, clamp permissions to `0644`, then rename over the
/// destination.
pub fn save(path: &Path, front_matter: &FrontMatter, body: &str) -> CoreResult<()> {
    let yaml = serde_yaml::to_string(front_matter)
        .map_err(|e| CoreError::config_error(format!("failed to serialize front-matter: {e}")))?;
    let body = body.replace("\r\n", "\n");
    let content = format!("---\n{yaml}---\n\n{}", body.trim_start_matches('\n'));

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| CoreError::io(dir, e))?;

    let tmp_path = dir.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("artefact"),
        std::process::id()
    ));
    {
        let mut tmp = fs::File::create(&tmp_path).map_err(|e| CoreError::io(&tmp_path, e))?;
        tmp.write_all(content.as_bytes()).map_err(|e| CoreError::io(&tmp_path, e))?;
    }
    clamp_permissions(&tmp_path)?;
    fs::rename(&tmp_path, path).map_err(|e| CoreError::io(path, e))?;
    Ok(())
}

#[cfg(unix)]
fn clamp_permissions(path: &Path) -> CoreResult<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(0o644);
    fs::set_permissions(path, perms).map_err(|e| CoreError::io(path, e))
}

#[cfg(not(unix))]
fn clamp_permissions(_path: &Path) -> CoreResult<()> {
    Ok(())
}

/// Owns the per-kind indexes and mediates every on-disk artefact mutation.
pub struct ArtefactStore {
    artefacts_root: PathBuf,
    memory_root: PathBuf,
    state: StateStore,
    indexes: HashMap<ArtefactKind, KindIndex>,
}

impl ArtefactStore {
    pub fn new(artefacts_root: PathBuf, memory_root: PathBuf, state: StateStore) -> Self {
        Self { artefacts_root, memory_root, state, indexes: HashMap::new() }
    }

    pub fn from_paths(paths: &mut PathResolver, state: StateStore) -> CoreResult<Self> {
        Ok(Self::new(paths.artefacts_dir()?, paths.memory_dir()?, state))
    }

    pub fn artefacts_root(&self) -> &Path {
        &self.artefacts_root
    }

    fn index_mut(&mut self, kind: ArtefactKind) -> CoreResult<&mut KindIndex> {
        if !self.indexes.contains_key(&kind) {
            self.indexes.insert(kind, KindIndex::default());
        }
        let needs_rebuild = !self.indexes.get(&kind).unwrap().is_valid();
        if needs_rebuild {
            let root = self.artefacts_root.clone();
            let index = self.indexes.get_mut(&kind).unwrap();
            index.rebuild(&root, kind, |path| load(path).map(|(fm, _)| fm))?;
        }
        Ok(self.indexes.get_mut(&kind).unwrap())
    }

    fn invalidate(&mut self, kind: ArtefactKind) {
        self.indexes.entry(kind).or_default().invalidate();
    }

    fn resolve_path(&mut self, kind: ArtefactKind, id_any_form: &str) -> CoreResult<(String, PathBuf)> {
        let index = self.index_mut(kind)?;
        let resolver = index.id_resolver(kind);
        let canonical = resolver
            .resolve(id_any_form)
            .ok_or_else(|| CoreError::not_found(kind.label(), id_any_form))?;
        let path = index
            .get(&canonical)
            .map(|entry| entry.file_path.clone())
            .ok_or_else(|| CoreError::not_found(kind.label(), &canonical))?;
        Ok((canonical, path))
    }

    /// `get_<kind>(id_any_form)`.
    pub fn get(&mut self, kind: ArtefactKind, id_any_form: &str) -> CoreResult<Artefact> {
        let (_, path) = self.resolve_path(kind, id_any_form)?;
        let (front_matter, body) = load(&path)?;
        Ok(Artefact { front_matter, body })
    }

    /// Known canonical IDs for `kind`, for index-backed callers (graph
    /// construction, the validator). This is the front-matter `id`, which
    /// normally agrees with the filename-derived key; use `canonical_keys`
    /// when a lookup must resolve through `get`/`update_frontmatter` even
    /// when the two have drifted apart (an `id_mismatch`).
    pub fn canonical_ids(&mut self, kind: ArtefactKind) -> CoreResult<Vec<String>> {
        let index = self.index_mut(kind)?;
        Ok(index.entries().map(|e| e.id.clone()).collect())
    }

    /// Filename-derived canonical keys for `kind` — always resolvable via
    /// `get`/`update_frontmatter`/`rename_to_frontmatter_id`, unlike
    /// `canonical_ids` when front-matter `id` has drifted from the filename.
    pub fn canonical_keys(&mut self, kind: ArtefactKind) -> CoreResult<Vec<String>> {
        let index = self.index_mut(kind)?;
        Ok(index.entries().map(|e| e.key.clone()).collect())
    }

    pub fn all(&mut self, kind: ArtefactKind) -> CoreResult<Vec<Artefact>> {
        let paths: Vec<PathBuf> = self.index_mut(kind)?.entries().map(|e| e.file_path.clone()).collect();
        paths.into_iter().map(|p| load(&p).map(|(fm, body)| Artefact { front_matter: fm, body })).collect()
    }

    pub fn warnings(&mut self, kind: ArtefactKind) -> CoreResult<Vec<String>> {
        Ok(self.index_mut(kind)?.warnings.clone())
    }

    /// `create_<kind>(parent_id?, title, options)`.
    pub fn create(
        &mut self,
        kind: ArtefactKind,
        parent_id: Option<&str>,
        title: &str,
        options: CreateOptions,
    ) -> CoreResult<Artefact> {
        let counter_kind = counter_kind_for(kind)?;
        let dir = options.parent_dir.clone().unwrap_or_else(|| self.artefacts_root.clone());
        fs::create_dir_all(&dir).map_err(|e| CoreError::io(&dir, e))?;

        let mut last_err = None;
        for _ in 0..MAX_CREATE_RETRIES {
            let n = self.state.allocate(counter_kind)?;
            let id = kind.canonical_id(n);
            let filename = artefact_filename(&id, title);
            let path = dir.join(&filename);
            if path.exists() {
                last_err = Some(CoreError::already_exists(kind.label(), &id));
                continue;
            }

            let mut front_matter = FrontMatter::new(kind, id.clone(), title.to_string(), parent_id.map(str::to_string));
            front_matter.tags = options.tags.iter().cloned().collect();
            front_matter.effort = options.effort.clone();
            front_matter.priority = options.priority.clone();
            front_matter.milestone = options.milestone.clone();
            let body = options.body.clone().unwrap_or_else(|| default_body(kind));

            save(&path, &front_matter, &body)?;
            if kind == ArtefactKind::Epic {
                self.ensure_epic_memory(&id)?;
            }
            self.invalidate(kind);
            return Ok(Artefact { front_matter, body });
        }
        Err(last_err.unwrap_or_else(|| {
            CoreError::corrupted(format!("exhausted {MAX_CREATE_RETRIES} attempts allocating a unique {} id", kind.label()))
        }))
    }

    fn ensure_epic_memory(&self, epic_id: &str) -> CoreResult<()> {
        let path = self.memory_root.join(format!("{epic_id}.md"));
        if path.exists() {
            return Ok(());
        }
        fs::create_dir_all(&self.memory_root).map_err(|e| CoreError::io(&self.memory_root, e))?;
        fs::write(&path, "## Agent Context\n\n").map_err(|e| CoreError::io(&path, e))
    }

    /// `update_frontmatter(id, patch)`.
    pub fn update_frontmatter(
        &mut self,
        kind: ArtefactKind,
        id_any_form: &str,
        patch: HashMap<String, serde_yaml::Value>,
    ) -> CoreResult<Artefact> {
        let (_, path) = self.resolve_path(kind, id_any_form)?;
        let (mut front_matter, body) = load(&path)?;
        let previous_status = front_matter.status.clone();

        for (field, value) in patch {
            apply_field(&mut front_matter, &field, value)?;
        }
        front_matter.updated_at = Utc::now();

        if front_matter.status != previous_status {
            stamp_status_transition(kind, &mut front_matter, &previous_status);
        }

        save(&path, &front_matter, &body)?;
        self.invalidate(kind);
        Ok(Artefact { front_matter, body })
    }

    /// Renames an artefact's file so its filename's leading ID token matches
    /// its front-matter `id`, fixing a detected `id_mismatch` finding (spec
    /// 4.D rule table: "rename file"). No-op if they already agree.
    pub fn rename_to_frontmatter_id(&mut self, kind: ArtefactKind, filename_id: &str) -> CoreResult<String> {
        let (canonical, path) = self.resolve_path(kind, filename_id)?;
        let (front_matter, _) = load(&path)?;
        let new_id = front_matter.id.clone();
        if new_id.is_empty() || new_id.eq_ignore_ascii_case(&canonical) {
            return Ok(new_id);
        }

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let old_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let rest = if old_name.len() >= canonical.len() && old_name[..canonical.len()].eq_ignore_ascii_case(&canonical) {
            &old_name[canonical.len()..]
        } else {
            old_name
        };
        let new_path = dir.join(format!("{new_id}{rest}"));
        fs::rename(&path, &new_path).map_err(|e| CoreError::io(&path, e))?;
        self.invalidate(kind);
        Ok(new_id)
    }

    /// `edit_section(id, section_name, new_content, mode)`.
    pub fn edit_section(
        &mut self,
        kind: ArtefactKind,
        id_any_form: &str,
        section_name: &str,
        new_content: &str,
        mode: EditMode,
    ) -> CoreResult<Artefact> {
        let (_, path) = self.resolve_path(kind, id_any_form)?;
        let (mut front_matter, body) = load(&path)?;
        let new_body = apply_section_edit(&body, section_name, new_content, mode);
        front_matter.updated_at = Utc::now();
        save(&path, &front_matter, &new_body)?;
        self.invalidate(kind);
        Ok(Artefact { front_matter, body: new_body })
    }

    /// `edit_multi_section(id, content, default_mode)`: `content` is a series
    /// of `## <section>[ op]` headed regions, each applied with its own
    /// operation (falling back to `default_mode`).
    pub fn edit_multi_section(
        &mut self,
        kind: ArtefactKind,
        id_any_form: &str,
        content: &str,
        default_mode: EditMode,
    ) -> CoreResult<Artefact> {
        let (_, path) = self.resolve_path(kind, id_any_form)?;
        let (mut front_matter, mut body) = load(&path)?;

        for (section, mode, region_body) in parse_multi_section(content, default_mode) {
            body = apply_section_edit(&body, &section, &region_body, mode);
        }
        front_matter.updated_at = Utc::now();
        save(&path, &front_matter, &body)?;
        self.invalidate(kind);
        Ok(Artefact { front_matter, body })
    }

    /// `patch(id, old_string, new_string, {section?, regexp?})`. Fails if
    /// `old_string` is not uniquely present within scope.
    pub fn patch(
        &mut self,
        kind: ArtefactKind,
        id_any_form: &str,
        old_string: &str,
        new_string: &str,
        section: Option<&str>,
        regexp: bool,
    ) -> CoreResult<Artefact> {
        let (_, path) = self.resolve_path(kind, id_any_form)?;
        let (mut front_matter, body) = load(&path)?;

        let new_body = if let Some(section) = section {
            let (before, scoped, after) = extract_section(&body, section)
                .ok_or_else(|| CoreError::not_found("section", section))?;
            let patched = patch_scope(&scoped, old_string, new_string, regexp)?;
            format!("{before}{patched}{after}")
        } else {
            patch_scope(&body, old_string, new_string, regexp)?
        };

        front_matter.updated_at = Utc::now();
        save(&path, &front_matter, &new_body)?;
        self.invalidate(kind);
        Ok(Artefact { front_matter, body: new_body })
    }
}

fn patch_scope(scope: &str, old_string: &str, new_string: &str, regexp: bool) -> CoreResult<String> {
    if regexp {
        let re = regex::Regex::new(old_string)
            .map_err(|e| CoreError::invalid_input(format!("invalid regexp: {e}")))?;
        let count = re.find_iter(scope).count();
        if count != 1 {
            return Err(CoreError::validation_failure(format!(
                "pattern matched {count} times, expected exactly 1"
            )));
        }
        Ok(re.replace(scope, new_string).into_owned())
    } else {
        let count = scope.matches(old_string).count();
        if count != 1 {
            return Err(CoreError::validation_failure(format!(
                "'{old_string}' matched {count} times, expected exactly 1"
            )));
        }
        Ok(scope.replacen(old_string, new_string, 1))
    }
}

fn section_header(name: &str) -> String {
    format!("## {name}")
}

/// Find a named H2 section, returning `(content before, section content
/// including its header, content after)`.
fn extract_section<'a>(body: &'a str, name: &str) -> Option<(&'a str, &'a str, &'a str)> {
    let header = section_header(name);
    let start = body.find(&header)?;
    let after_header = start + header.len();
    let rest = &body[after_header..];
    let end_offset = rest.find("\n## ").map(|i| after_header + i + 1).unwrap_or(body.len());
    Some((&body[..start], &body[start..end_offset], &body[end_offset..]))
}

fn apply_section_edit(body: &str, section_name: &str, new_content: &str, mode: EditMode) -> String {
    let header = section_header(section_name);
    match extract_section(body, section_name) {
        Some((before, section, after)) => {
            let existing_body = section.strip_prefix(&header).unwrap_or("").trim_start_matches('\n');
            let replaced = match mode {
                EditMode::Replace => format!("{header}\n\n{}\n", new_content.trim_end()),
                EditMode::Append => format!("{header}\n\n{}\n{}\n", existing_body.trim_end(), new_content.trim_end()),
                EditMode::Prepend => format!("{header}\n\n{}\n{}\n", new_content.trim_end(), existing_body.trim_end()),
            };
            format!("{before}{replaced}{after}")
        }
        None => {
            let mut out = body.trim_end().to_string();
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(&header);
            out.push_str("\n\n");
            out.push_str(new_content.trim_end());
            out.push('\n');
            out
        }
    }
}

/// Parse a composite edit payload: lines of the form `## <section>[ op]`
/// start a new region; `op` is one of `replace|append|prepend`, defaulting
/// to `default_mode`.
fn parse_multi_section(content: &str, default_mode: EditMode) -> Vec<(String, EditMode, String)> {
    let mut regions = Vec::new();
    let mut current: Option<(String, EditMode, String)> = None;

    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("## ") {
            if let Some(region) = current.take() {
                regions.push(region);
            }
            let mut parts = rest.splitn(2, char::is_whitespace);
            let name = parts.next().unwrap_or("").to_string();
            let op = parts.next().map(str::trim).unwrap_or("");
            let mode = match op {
                "replace" => EditMode::Replace,
                "append" => EditMode::Append,
                "prepend" => EditMode::Prepend,
                _ => default_mode,
            };
            current = Some((name, mode, String::new()));
        } else if let Some((_, _, body)) = current.as_mut() {
            body.push_str(line);
            body.push('\n');
        }
    }
    if let Some(region) = current.take() {
        regions.push(region);
    }
    regions
}

fn apply_field(front_matter: &mut FrontMatter, field: &str, value: serde_yaml::Value) -> CoreResult<()> {
    match field {
        "title" => front_matter.title = value_to_string(&value)?,
        "status" => front_matter.status = value_to_string(&value)?,
        "parent" => front_matter.parent = Some(value_to_string(&value)?),
        "assignee" => front_matter.assignee = Some(value_to_string(&value)?),
        "effort" => front_matter.effort = Some(value_to_string(&value)?),
        "priority" => front_matter.priority = Some(value_to_string(&value)?),
        "milestone" => front_matter.milestone = Some(value_to_string(&value)?),
        "branching" => front_matter.branching = Some(value_to_string(&value)?),
        "blocked_by" => front_matter.blocked_by = value_to_string_vec(&value)?,
        "stories" => front_matter.stories = value_to_string_vec(&value)?,
        "tags" => front_matter.tags = value_to_string_vec(&value)?.into_iter().collect(),
        other => {
            front_matter.extra.insert(other.to_string(), value);
        }
    }
    Ok(())
}

fn value_to_string(value: &serde_yaml::Value) -> CoreResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .or_else(|| value.as_i64().map(|n| n.to_string()))
        .or_else(|| value.as_f64().map(|n| n.to_string()))
        .or_else(|| value.as_bool().map(|b| b.to_string()))
        .ok_or_else(|| CoreError::invalid_input("expected a scalar value"))
}

fn value_to_string_vec(value: &serde_yaml::Value) -> CoreResult<Vec<String>> {
    let seq = value
        .as_sequence()
        .ok_or_else(|| CoreError::invalid_input("expected a list value"))?;
    seq.iter().map(value_to_string).collect()
}

/// Stamp `started_at`/`done_at` per lexicon-defined status transitions.
fn stamp_status_transition(kind: ArtefactKind, front_matter: &mut FrontMatter, previous: &str) {
    let now = Utc::now();
    match kind {
        ArtefactKind::Task | ArtefactKind::Story => {
            let new_status = TaskStatus::canonicalize(&front_matter.status);
            let was_not_started = TaskStatus::canonicalize(previous) == Some(TaskStatus::NotStarted);
            if was_not_started && matches!(new_status, Some(TaskStatus::InProgress)) && front_matter.started_at.is_none() {
                front_matter.started_at = Some(now);
            }
            if matches!(new_status, Some(TaskStatus::Done)) && front_matter.done_at.is_none() {
                front_matter.done_at = Some(now);
            }
        }
        ArtefactKind::Epic => {
            let new_status = EpicStatus::canonicalize(&front_matter.status);
            if matches!(new_status, Some(EpicStatus::InProgress)) && front_matter.started_at.is_none() {
                front_matter.started_at = Some(now);
            }
            if matches!(new_status, Some(EpicStatus::Done)) && front_matter.done_at.is_none() {
                front_matter.done_at = Some(now);
            }
        }
        ArtefactKind::Product => {
            let new_status = ProductStatus::canonicalize(&front_matter.status);
            if matches!(new_status, Some(ProductStatus::Done)) && front_matter.done_at.is_none() {
                front_matter.done_at = Some(now);
            }
        }
        ArtefactKind::Milestone | ArtefactKind::DecisionRecord => {}
    }
}
