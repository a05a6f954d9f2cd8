//! Component A — path resolver.
//!
//! Resolves placeholder-bearing path templates (`%project_hash%`, `%haven%`,
//! …) against a layered configuration and exposes the canonical location of
//! every on-disk collection the rest of the crate needs.

use crate::errors::{CoreError, CoreResult};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const MAX_EXPANSION_DEPTH: usize = 16;

/// A resolver built once per process from the project root and an optional
/// set of user overrides loaded from `paths.yaml`.
#[derive(Debug, Clone)]
pub struct PathResolver {
    project_root: PathBuf,
    placeholders: HashMap<String, String>,
    cache: HashMap<String, PathBuf>,
}

impl PathResolver {
    /// Build a resolver for `project_root`. `overrides` are additional or
    /// replacing placeholders loaded from an optional `paths.yaml`.
    pub fn new(project_root: &Path, overrides: HashMap<String, String>) -> CoreResult<Self> {
        let project_root = std::fs::canonicalize(project_root)
            .map_err(|e| CoreError::io(project_root, e))?;
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::config_error("could not determine home directory"))?;
        let project_hash = project_hash(&project_root);
        let haven = home.join(".sailing").join("havens").join(&project_hash);

        let mut placeholders = HashMap::new();
        placeholders.insert("project_root".to_string(), project_root.display().to_string());
        placeholders.insert("project_hash".to_string(), project_hash);
        placeholders.insert("home".to_string(), home.display().to_string());
        placeholders.insert("haven".to_string(), haven.display().to_string());
        // user overrides extend/replace built-ins
        placeholders.extend(overrides);

        Ok(Self { project_root, placeholders, cache: HashMap::new() })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// The twelve-hex-char project hash used to key haven directories.
    pub fn project_hash(&self) -> &str {
        self.placeholders.get("project_hash").map(String::as_str).unwrap_or_default()
    }

    /// Resolve a `%name%`-bearing template into an absolute path.
    ///
    /// Pure and cached per process: identical templates return the cached
    /// result without re-expanding.
    pub fn resolve(&mut self, template: &str) -> CoreResult<PathBuf> {
        if let Some(cached) = self.cache.get(template) {
            return Ok(cached.clone());
        }
        let expanded = self.expand(template, 0, &mut Vec::new())?;
        let resolved = if Path::new(&expanded).is_absolute() {
            PathBuf::from(expanded)
        } else {
            self.project_root.join(expanded)
        };
        self.cache.insert(template.to_string(), resolved.clone());
        Ok(resolved)
    }

    fn expand(&self, template: &str, depth: usize, stack: &mut Vec<String>) -> CoreResult<String> {
        if depth > MAX_EXPANSION_DEPTH {
            return Err(CoreError::config_error(format!(
                "circular placeholder expansion detected while resolving '{template}'"
            )));
        }

        let mut out = String::with_capacity(template.len());
        let mut chars = template.char_indices().peekable();
        while let Some((_, c)) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            let rest = &template[chars.peek().map(|(i, _)| *i).unwrap_or(template.len())..];
            let Some(end) = rest.find('%') else {
                return Err(CoreError::config_error(format!(
                    "unterminated placeholder in template '{template}'"
                )));
            };
            let name = &rest[..end];
            for _ in 0..=end {
                chars.next();
            }
            if stack.contains(&name.to_string()) {
                return Err(CoreError::config_error(format!(
                    "circular placeholder expansion: {} -> {name}",
                    stack.join(" -> ")
                )));
            }
            let value = self
                .placeholders
                .get(name)
                .ok_or_else(|| CoreError::config_error(format!("unknown placeholder '%{name}%'")))?;
            stack.push(name.to_string());
            let expanded_value = self.expand(value, depth + 1, stack)?;
            stack.pop();
            out.push_str(&expanded_value);
        }
        Ok(out)
    }

    pub fn artefacts_dir(&mut self) -> CoreResult<PathBuf> {
        self.resolve("%project_root%/artefacts")
    }

    pub fn memory_dir(&mut self) -> CoreResult<PathBuf> {
        self.resolve("%project_root%/.sailing/memory")
    }

    pub fn runs_dir(&mut self) -> CoreResult<PathBuf> {
        self.resolve("%haven%/runs")
    }

    pub fn assignments_dir(&mut self) -> CoreResult<PathBuf> {
        self.resolve("%haven%/assignments")
    }

    pub fn worktrees_dir(&mut self) -> CoreResult<PathBuf> {
        self.resolve("%haven%/worktrees")
    }

    pub fn agents_dir(&mut self) -> CoreResult<PathBuf> {
        self.resolve("%haven%/agents")
    }

    pub fn agents_table_file(&mut self) -> CoreResult<PathBuf> {
        self.resolve("%haven%/agents.json")
    }

    pub fn templates_dir(&mut self) -> CoreResult<PathBuf> {
        self.resolve("%project_root%/.sailing/templates")
    }

    pub fn state_file(&mut self) -> CoreResult<PathBuf> {
        self.resolve("%project_root%/.sailing/state.json")
    }

    pub fn haven_dir(&mut self) -> CoreResult<PathBuf> {
        self.resolve("%haven%")
    }
}

/// Digest the canonicalized project root and keep the first 12 hex chars.
fn project_hash(project_root: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(project_root.display().to_string().as_bytes());
    let digest = hasher.finalize();
    hex_encode(&digest)[..12].to_string()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn resolver(dir: &Path) -> PathResolver {
        PathResolver::new(dir, HashMap::new()).unwrap()
    }

    #[test]
    fn resolves_builtin_placeholders() {
        let dir = tempdir().unwrap();
        let mut r = resolver(dir.path());
        let resolved = r.resolve("%project_root%/artefacts").unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap().join("artefacts"));
    }

    #[test]
    fn project_hash_is_twelve_hex_chars_and_stable() {
        let dir = tempdir().unwrap();
        let r1 = resolver(dir.path());
        let r2 = resolver(dir.path());
        let h1 = r1.placeholders.get("project_hash").unwrap();
        let h2 = r2.placeholders.get("project_hash").unwrap();
        assert_eq!(h1.len(), 12);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(h1, h2);
    }

    #[test]
    fn unknown_placeholder_fails_with_config_error() {
        let dir = tempdir().unwrap();
        let mut r = resolver(dir.path());
        let err = r.resolve("%nonexistent%/foo").unwrap_err();
        assert!(matches!(err, CoreError::ConfigError { .. }));
    }

    #[test]
    fn circular_override_fails_with_config_error() {
        let dir = tempdir().unwrap();
        let mut overrides = HashMap::new();
        overrides.insert("a".to_string(), "%b%".to_string());
        overrides.insert("b".to_string(), "%a%".to_string());
        let mut r = PathResolver::new(dir.path(), overrides).unwrap();
        let err = r.resolve("%a%").unwrap_err();
        assert!(matches!(err, CoreError::ConfigError { .. }));
    }

    #[test]
    fn absolute_path_passes_through_unchanged() {
        let dir = tempdir().unwrap();
        let mut r = resolver(dir.path());
        let resolved = r.resolve("/etc/hosts").unwrap();
        assert_eq!(resolved, PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn relative_path_resolves_under_project_root() {
        let dir = tempdir().unwrap();
        let mut r = resolver(dir.path());
        let resolved = r.resolve("relative/dir").unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap().join("relative/dir"));
    }

    #[test]
    fn user_override_extends_builtins() {
        let dir = tempdir().unwrap();
        let mut overrides = HashMap::new();
        overrides.insert("templates".to_string(), "/custom/templates".to_string());
        let mut r = PathResolver::new(dir.path(), overrides).unwrap();
        let resolved = r.resolve("%templates%").unwrap();
        assert_eq!(resolved, PathBuf::from("/custom/templates"));
    }

    #[test]
    fn resolve_is_cached() {
        let dir = tempdir().unwrap();
        let mut r = resolver(dir.path());
        let first = r.resolve("%project_root%/artefacts").unwrap();
        assert!(r.cache.contains_key("%project_root%/artefacts"));
        let second = r.resolve("%project_root%/artefacts").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn well_known_collections_resolve_under_expected_roots() {
        let dir = tempdir().unwrap();
        let mut r = resolver(dir.path());
        let artefacts = r.artefacts_dir().unwrap();
        let memory = r.memory_dir().unwrap();
        let worktrees = r.worktrees_dir().unwrap();
        assert!(artefacts.ends_with("artefacts"));
        assert!(memory.ends_with(".sailing/memory"));
        assert!(worktrees.starts_with(dirs::home_dir().unwrap().join(".sailing/havens")));
    }
}
