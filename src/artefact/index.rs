//! Lazy, invalidation-driven indexes over the on-disk artefact tree.

use super::model::{ArtefactKind, FrontMatter, IdResolver};
use crate::errors::CoreResult;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// A single indexed artefact: non-owning reference (path + cached
/// front-matter) plus bookkeeping timestamps.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: String,
    pub key: String,
    pub file_path: PathBuf,
    pub parent_dir: PathBuf,
    pub cached_front_matter: FrontMatter,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

fn filename_pattern(kind: ArtefactKind) -> &'static Regex {
    static PATTERNS: OnceLock<HashMap<&'static str, Regex>> = OnceLock::new();
    let map = PATTERNS.get_or_init(|| {
        let mut m = HashMap::new();
        m.insert("PRD", Regex::new(r"^(?i)(PRD-\d+)").unwrap());
        m.insert("E", Regex::new(r"^(?i)(E\d+)").unwrap());
        m.insert("T", Regex::new(r"^(?i)(T\d+[a-z]?)").unwrap());
        m.insert("S", Regex::new(r"^(?i)(S\d+)").unwrap());
        m.insert("m", Regex::new(r"^(?i)(m\d+)").unwrap());
        m.insert("ADR", Regex::new(r"^(?i)(ADR-\d+)").unwrap());
        m
    });
    map.get(kind.prefix()).expect("pattern registered for every ArtefactKind")
}

/// A per-kind `Map<canonical_id, IndexEntry>`, rebuilt lazily on first read
/// after invalidation.
#[derive(Debug, Default)]
pub struct KindIndex {
    entries: HashMap<String, IndexEntry>,
    valid: bool,
    /// non-fatal duplicate-ID warnings collected on the last rebuild
    pub warnings: Vec<String>,
}

impl KindIndex {
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    pub fn get(&self, canonical_id: &str) -> Option<&IndexEntry> {
        self.entries.get(canonical_id)
    }

    pub fn key_set(&self) -> std::collections::HashSet<String> {
        self.entries.keys().cloned().collect()
    }

    /// Rebuild by scanning `root` for files matching `kind`'s filename
    /// pattern. `load_front_matter` is injected so the index has no direct
    /// dependency on the store's file-format details.
    pub fn rebuild<F>(&mut self, root: &Path, kind: ArtefactKind, load_front_matter: F) -> CoreResult<()>
    where
        F: Fn(&Path) -> CoreResult<FrontMatter>,
    {
        self.entries.clear();
        self.warnings.clear();
        let pattern = filename_pattern(kind);

        if root.exists() {
            for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let Some(name) = entry.file_name().to_str() else { continue };
                if !name.ends_with(".md") {
                    continue;
                }
                let Some(caps) = pattern.captures(name) else { continue };
                let canonical_key = caps.get(1).unwrap().as_str().to_uppercase();

                let path = entry.path();
                let front_matter = match load_front_matter(path) {
                    Ok(fm) => fm,
                    Err(_) => continue,
                };

                let metadata = entry.metadata().ok();
                let modified_at = metadata
                    .and_then(|m| m.modified().ok())
                    .map(DateTime::<Utc>::from)
                    .unwrap_or(front_matter.updated_at);

                let new_entry = IndexEntry {
                    id: front_matter.id.clone(),
                    key: canonical_key.clone(),
                    file_path: path.to_path_buf(),
                    parent_dir: path.parent().unwrap_or(root).to_path_buf(),
                    created_at: front_matter.created_at,
                    cached_front_matter: front_matter.clone(),
                    modified_at,
                };

                if let Some(existing) = self.entries.get(&canonical_key) {
                    let both_done = existing.cached_front_matter.status == "Done"
                        && front_matter.status == "Done";
                    if !both_done {
                        self.warnings.push(format!(
                            "duplicate key '{canonical_key}': {} and {}",
                            existing.file_path.display(),
                            path.display()
                        ));
                    }
                }
                self.entries.insert(canonical_key, new_entry);
            }
        }

        self.valid = true;
        Ok(())
    }

    /// Build an `IdResolver` from the currently indexed canonical IDs.
    pub fn id_resolver(&self, kind: ArtefactKind) -> IdResolver {
        let mut resolver = IdResolver::new(kind);
        for key in self.entries.keys() {
            resolver.register(key);
        }
        resolver
    }
}
