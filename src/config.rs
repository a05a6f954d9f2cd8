//! Layered configuration for the coordination core.
//!
//! Settings are read from `.sailing/config.yaml` (optional — all fields have
//! defaults), then overridden by environment variables, matching the
//! file → environment → CLI layering from the teacher's `ForgeConfig`.
//!
//! # Configuration file format
//!
//! ```yaml
//! agent:
//!   command: claude
//!   args: ["--print"]
//!   max_budget_usd: 5.0
//!   watchdog_timeout_secs: 1800
//!   spawn_grace_period_secs: 10
//! graph:
//!   default_effort_hours: 4
//!   effort_map:
//!     1h: 1
//!     2h: 2
//!     1d: 8
//!     1w: 40
//! watch:
//!   debounce_ms: 200
//! ```

use crate::errors::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn default_agent_command() -> String {
    "claude".to_string()
}

fn default_watchdog_timeout_secs() -> u64 {
    1800
}

fn default_spawn_grace_period_secs() -> u64 {
    10
}

fn default_effort_hours() -> u32 {
    4
}

fn default_effort_map() -> HashMap<String, u32> {
    HashMap::from([
        ("1h".to_string(), 1),
        ("2h".to_string(), 2),
        ("1d".to_string(), 8),
        ("1w".to_string(), 40),
    ])
}

fn default_debounce_ms() -> u64 {
    200
}

/// Settings governing how worker agents are spawned and supervised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_agent_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub max_budget_usd: Option<f64>,
    #[serde(default = "default_watchdog_timeout_secs")]
    pub watchdog_timeout_secs: u64,
    #[serde(default = "default_spawn_grace_period_secs")]
    pub spawn_grace_period_secs: u64,
    #[serde(default)]
    pub worktree_enabled: bool,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            command: default_agent_command(),
            args: Vec::new(),
            max_budget_usd: None,
            watchdog_timeout_secs: default_watchdog_timeout_secs(),
            spawn_grace_period_secs: default_spawn_grace_period_secs(),
            worktree_enabled: true,
        }
    }
}

/// Settings governing the dependency graph engine's effort resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSection {
    #[serde(default = "default_effort_hours")]
    pub default_effort_hours: u32,
    #[serde(default = "default_effort_map")]
    pub effort_map: HashMap<String, u32>,
}

impl Default for GraphSection {
    fn default() -> Self {
        Self {
            default_effort_hours: default_effort_hours(),
            effort_map: default_effort_map(),
        }
    }
}

/// Settings governing the change-notification bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchSection {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms() }
    }
}

/// The complete `.sailing/config.yaml` structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SailingToml {
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub graph: GraphSection,
    #[serde(default)]
    pub watch: WatchSection,
}

impl SailingToml {
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> CoreResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| CoreError::config_error(format!("failed to parse config.yaml: {e}")))
    }

    /// Load from `<project_root>/.sailing/config.yaml`, falling back to
    /// defaults if the file does not exist.
    pub fn load_or_default(project_root: &Path) -> CoreResult<Self> {
        let path = project_root.join(".sailing").join("config.yaml");
        if path.exists() { Self::load(&path) } else { Ok(Self::default()) }
    }

    pub fn save(&self, path: &Path) -> CoreResult<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| CoreError::config_error(format!("failed to serialize config.yaml: {e}")))?;
        std::fs::write(path, content).map_err(|e| CoreError::io(path, e))
    }

    /// Resolve the agent command, honoring the `SAILING_AGENT_CMD` environment
    /// override ahead of the file value.
    pub fn agent_command(&self) -> String {
        std::env::var("SAILING_AGENT_CMD").unwrap_or_else(|_| self.agent.command.clone())
    }

    /// Resolve hours for a symbolic effort estimate (`"1h"`, `"2h"`, `"1d"`, …),
    /// falling back to `graph.default_effort_hours` when absent or unknown.
    pub fn effort_hours(&self, effort: Option<&str>) -> u32 {
        effort
            .and_then(|e| self.graph.effort_map.get(e).copied())
            .unwrap_or(self.graph.default_effort_hours)
    }
}

/// Runtime-merged configuration: the parsed file plus project paths.
///
/// Bridges `SailingToml` with the rest of the crate the way the teacher's
/// `Config` bridged `ForgeConfig` with orchestrator runtime needs.
#[derive(Debug, Clone)]
pub struct SailingConfig {
    pub project_root: PathBuf,
    pub toml: SailingToml,
}

impl SailingConfig {
    pub fn load(project_root: PathBuf) -> CoreResult<Self> {
        let project_root = std::fs::canonicalize(&project_root)
            .map_err(|e| CoreError::io(&project_root, e))?;
        let toml = SailingToml::load_or_default(&project_root)?;
        Ok(Self { project_root, toml })
    }

    pub fn sailing_dir(&self) -> PathBuf {
        self.project_root.join(".sailing")
    }

    pub fn config_path(&self) -> PathBuf {
        self.sailing_dir().join("config.yaml")
    }
}
