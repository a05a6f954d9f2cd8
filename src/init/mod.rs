//! Project initialization: creates the `.sailing/` control directory and the
//! sibling `artefacts/` tree.
//!
//! ```text
//! .sailing/
//!   state.json       counters { prd, epic, task, story }
//!   config.yaml       user configuration
//!   core/             static contract docs (read-only to core)
//!   templates/        markdown templates for new artefacts
//!   memory/           E<n>.md, T<n>.log
//! artefacts/
//!   prds/ epics/ tasks/ stories/
//! ```

use crate::config::SailingToml;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const SAILING_DIR: &str = ".sailing";

#[derive(Debug)]
pub struct InitResult {
    pub sailing_dir: PathBuf,
    pub created: bool,
}

/// Initialize a sailing project in `project_dir`. Idempotent: an existing
/// `.sailing/` directory is completed rather than overwritten, and existing
/// files are left untouched.
pub fn init_project(project_dir: &Path, from_pattern: Option<&str>) -> Result<InitResult> {
    if let Some(pattern) = from_pattern {
        anyhow::bail!("Pattern templates not yet implemented. Cannot use --from '{}'", pattern);
    }

    let sailing_dir = project_dir.join(SAILING_DIR);
    let created = !sailing_dir.exists();
    ensure_directory_structure(project_dir, &sailing_dir)?;

    Ok(InitResult { sailing_dir, created })
}

fn ensure_directory_structure(project_dir: &Path, sailing_dir: &Path) -> Result<()> {
    for dir in ["core", "templates", "memory"] {
        let path = sailing_dir.join(dir);
        std::fs::create_dir_all(&path).with_context(|| format!("failed to create directory: {}", path.display()))?;
    }

    for dir in ["prds", "epics", "tasks", "stories"] {
        let path = project_dir.join("artefacts").join(dir);
        std::fs::create_dir_all(&path).with_context(|| format!("failed to create directory: {}", path.display()))?;
    }

    let state_file = sailing_dir.join("state.json");
    if !state_file.exists() {
        std::fs::write(&state_file, "{\"prd\":0,\"epic\":0,\"task\":0,\"story\":0}\n")
            .with_context(|| format!("failed to create state file: {}", state_file.display()))?;
    }

    let config_file = sailing_dir.join("config.yaml");
    if !config_file.exists() {
        SailingToml::default()
            .save(&config_file)
            .with_context(|| format!("failed to create config file: {}", config_file.display()))?;
    }

    Ok(())
}

pub fn is_initialized(project_dir: &Path) -> bool {
    project_dir.join(SAILING_DIR).exists()
}

pub fn sailing_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(SAILING_DIR)
}

/// Walk upward from `start` looking for the nearest ancestor containing
/// `.sailing/`, honoring `SAILING_PROJECT_ROOT` first.
pub fn discover_project_root(start: &Path) -> Option<PathBuf> {
    if let Ok(override_root) = std::env::var("SAILING_PROJECT_ROOT") {
        return Some(PathBuf::from(override_root));
    }
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(SAILING_DIR).exists() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}
