//! Artefact kinds, the status lexicon, and ID normalization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The four primary artefact variants, plus the two secondary entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtefactKind {
    Product,
    Epic,
    Task,
    Story,
    Milestone,
    DecisionRecord,
}

impl ArtefactKind {
    /// The canonical ID prefix for this kind.
    pub fn prefix(self) -> &'static str {
        match self {
            ArtefactKind::Product => "PRD",
            ArtefactKind::Epic => "E",
            ArtefactKind::Task => "T",
            ArtefactKind::Story => "S",
            ArtefactKind::Milestone => "m",
            ArtefactKind::DecisionRecord => "ADR",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ArtefactKind::Product => "Product",
            ArtefactKind::Epic => "Epic",
            ArtefactKind::Task => "Task",
            ArtefactKind::Story => "Story",
            ArtefactKind::Milestone => "Milestone",
            ArtefactKind::DecisionRecord => "Decision Record",
        }
    }

    /// The separator between prefix and digits in the canonical ID
    /// (`PRD-001`, `ADR-001`; no separator for `E001`/`T001`/`S001`).
    fn id_separator(self) -> &'static str {
        match self {
            ArtefactKind::Product | ArtefactKind::DecisionRecord => "-",
            _ => "",
        }
    }

    /// Formats a zero-padded (to 3 digits, widening as needed) canonical ID
    /// for the given counter value, e.g. `(Product, 1) -> "PRD-001"`,
    /// `(Task, 1) -> "T001"`.
    pub fn canonical_id(self, n: u64) -> String {
        format!("{}{}{n:03}", self.prefix(), self.id_separator())
    }
}

/// Task status lexicon (section 3): `Not Started`, `In Progress`, `Done`,
/// `Blocked`, `Cancelled`, with aliases `wip`, `todo`, `done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Done,
    Blocked,
    Cancelled,
}

impl TaskStatus {
    pub fn canonical_str(self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "Not Started",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
            TaskStatus::Blocked => "Blocked",
            TaskStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }

    /// Canonicalize a raw status string, honoring the lexicon's aliases.
    /// Returns `None` if the string does not match any known status.
    pub fn canonicalize(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "not started" | "todo" | "not_started" => Some(TaskStatus::NotStarted),
            "in progress" | "wip" | "in_progress" => Some(TaskStatus::InProgress),
            "done" => Some(TaskStatus::Done),
            "blocked" => Some(TaskStatus::Blocked),
            "cancelled" | "canceled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }
}

/// Epic status lexicon: `Draft`, `In Progress`, `Done`, `Blocked`, `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpicStatus {
    Draft,
    InProgress,
    Done,
    Blocked,
    Cancelled,
}

impl EpicStatus {
    pub fn canonical_str(self) -> &'static str {
        match self {
            EpicStatus::Draft => "Draft",
            EpicStatus::InProgress => "In Progress",
            EpicStatus::Done => "Done",
            EpicStatus::Blocked => "Blocked",
            EpicStatus::Cancelled => "Cancelled",
        }
    }

    pub fn canonicalize(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "draft" => Some(EpicStatus::Draft),
            "in progress" | "wip" | "in_progress" => Some(EpicStatus::InProgress),
            "done" => Some(EpicStatus::Done),
            "blocked" => Some(EpicStatus::Blocked),
            "cancelled" | "canceled" => Some(EpicStatus::Cancelled),
            _ => None,
        }
    }
}

/// Product status lexicon: `Draft`, `Approved`, `In Progress`, `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStatus {
    Draft,
    Approved,
    InProgress,
    Done,
}

impl ProductStatus {
    pub fn canonical_str(self) -> &'static str {
        match self {
            ProductStatus::Draft => "Draft",
            ProductStatus::Approved => "Approved",
            ProductStatus::InProgress => "In Progress",
            ProductStatus::Done => "Done",
        }
    }

    pub fn canonicalize(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "draft" => Some(ProductStatus::Draft),
            "approved" => Some(ProductStatus::Approved),
            "in progress" | "wip" | "in_progress" => Some(ProductStatus::InProgress),
            "done" => Some(ProductStatus::Done),
            _ => None,
        }
    }
}

/// Front-matter shared by every artefact kind, plus the type-specific fields
/// from section 3's attribute table. Fields unused by a given kind are left
/// `None`/empty; `save` only emits fields that are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontMatter {
    pub id: String,
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub tags: HashSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub blocked_by: Vec<String>,
    #[serde(default)]
    pub stories: Vec<String>,
    #[serde(default)]
    pub effort: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub done_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub milestone: Option<String>,
    #[serde(default)]
    pub branching: Option<String>,
    #[serde(default)]
    pub target_versions: HashMap<String, String>,

    /// Fields not named by the canonical schema survive round-trips here.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl FrontMatter {
    pub fn new(kind: ArtefactKind, id: String, title: String, parent: Option<String>) -> Self {
        let now = Utc::now();
        let status = default_status_for(kind).to_string();
        Self {
            id,
            title,
            status,
            parent,
            tags: HashSet::new(),
            created_at: now,
            updated_at: now,
            blocked_by: Vec::new(),
            stories: Vec::new(),
            effort: None,
            priority: None,
            assignee: None,
            started_at: None,
            done_at: None,
            milestone: None,
            branching: None,
            target_versions: HashMap::new(),
            extra: HashMap::new(),
        }
    }
}

fn default_status_for(kind: ArtefactKind) -> &'static str {
    match kind {
        ArtefactKind::Task => TaskStatus::NotStarted.canonical_str(),
        ArtefactKind::Epic => EpicStatus::Draft.canonical_str(),
        ArtefactKind::Product => ProductStatus::Draft.canonical_str(),
        _ => "",
    }
}

/// Converts kebab-case-ready slugs from arbitrary titles.
pub fn kebab(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut prev_dash = false;
    for c in title.chars() {
        if c.is_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            prev_dash = false;
        } else if !prev_dash && !out.is_empty() {
            out.push('-');
            prev_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Builds the canonical filename for a newly created artefact.
pub fn artefact_filename(id: &str, title: &str) -> String {
    format!("{id}-{}.md", kebab(title))
}

/// Resolves any accepted ID form (`<n>`, `<prefix><n>`, `<prefix>0*<n>`, with
/// an optional lowercase Task suffix letter) against a known canonical-ID
/// universe for one artefact kind, returning the canonical form or `None`.
#[derive(Debug)]
pub struct IdResolver {
    prefix: &'static str,
    /// (number, suffix) -> canonical id string, e.g. (1, "") -> "T001"
    known: HashMap<(u64, String), String>,
}

impl IdResolver {
    pub fn new(kind: ArtefactKind) -> Self {
        Self { prefix: kind.prefix(), known: HashMap::new() }
    }

    /// Register a canonical ID (e.g. `"T001"`, `"PRD-001"`) so that later
    /// variant forms resolve to it.
    pub fn register(&mut self, canonical_id: &str) {
        if let Some((number, suffix)) = self.parse(canonical_id) {
            self.known.insert((number, suffix), canonical_id.to_string());
        }
    }

    /// Resolve `raw` (any accepted form) to the canonical ID, or `None` if it
    /// does not match a registered artefact.
    pub fn resolve(&self, raw: &str) -> Option<String> {
        let (number, suffix) = self.parse(raw)?;
        self.known.get(&(number, suffix)).cloned()
    }

    /// Strip an optional prefix (with `-` separator for `PRD`/`ADR`), then
    /// split the remaining digits from an optional trailing lowercase letter.
    fn parse(&self, raw: &str) -> Option<(u64, String)> {
        let raw = raw.trim();
        let separator = matches!(self.prefix, "PRD" | "ADR");
        let without_prefix = if separator {
            let dashed = format!("{}-", self.prefix);
            raw.strip_prefix(&dashed)
                .or_else(|| raw.strip_prefix(self.prefix))
                .unwrap_or(raw)
        } else {
            raw.strip_prefix(self.prefix).unwrap_or(raw)
        };

        let digit_end = without_prefix
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(without_prefix.len());
        let (digits, rest) = without_prefix.split_at(digit_end);
        if digits.is_empty() {
            return None;
        }
        let number: u64 = digits.parse().ok()?;

        let suffix = if rest.is_empty() {
            String::new()
        } else if rest.len() == 1 && rest.chars().next().unwrap().is_ascii_lowercase() {
            rest.to_string()
        } else {
            return None;
        };

        Some((number, suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kebab_converts_title_to_slug() {
        assert_eq!(kebab("Login Form"), "login-form");
        assert_eq!(kebab("Auth & Session!"), "auth-session");
    }

    #[test]
    fn canonical_id_dashes_product_and_decision_record_only() {
        assert_eq!(ArtefactKind::Product.canonical_id(1), "PRD-001");
        assert_eq!(ArtefactKind::DecisionRecord.canonical_id(7), "ADR-007");
        assert_eq!(ArtefactKind::Epic.canonical_id(1), "E001");
        assert_eq!(ArtefactKind::Task.canonical_id(1), "T001");
        assert_eq!(ArtefactKind::Story.canonical_id(1), "S001");
    }

    #[test]
    fn artefact_filename_combines_id_and_slug() {
        assert_eq!(artefact_filename("T001", "Login Form"), "T001-login-form.md");
    }

    #[test]
    fn task_status_canonicalizes_aliases() {
        assert_eq!(TaskStatus::canonicalize("wip"), Some(TaskStatus::InProgress));
        assert_eq!(TaskStatus::canonicalize("todo"), Some(TaskStatus::NotStarted));
        assert_eq!(TaskStatus::canonicalize("done"), Some(TaskStatus::Done));
        assert_eq!(TaskStatus::canonicalize("nonsense"), None);
    }

    #[test]
    fn task_status_terminal_classification() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
    }

    #[test]
    fn id_resolver_accepts_all_task_variant_forms() {
        let mut r = IdResolver::new(ArtefactKind::Task);
        r.register("T001");
        for variant in ["1", "01", "001", "T1", "T001"] {
            assert_eq!(r.resolve(variant), Some("T001".to_string()), "variant {variant}");
        }
    }

    #[test]
    fn id_resolver_preserves_task_suffix_letter() {
        let mut r = IdResolver::new(ArtefactKind::Task);
        r.register("T001a");
        assert_eq!(r.resolve("T1a"), Some("T001a".to_string()));
        assert_eq!(r.resolve("T1"), None);
    }

    #[test]
    fn id_resolver_handles_prd_dash_prefix() {
        let mut r = IdResolver::new(ArtefactKind::Product);
        r.register("PRD-001");
        assert_eq!(r.resolve("PRD-1"), Some("PRD-001".to_string()));
        assert_eq!(r.resolve("1"), Some("PRD-001".to_string()));
    }

    #[test]
    fn id_resolver_returns_none_for_unregistered_or_malformed() {
        let mut r = IdResolver::new(ArtefactKind::Task);
        r.register("T001");
        assert_eq!(r.resolve("T002"), None);
        assert_eq!(r.resolve("not-an-id"), None);
        assert_eq!(r.resolve("T1AB"), None);
    }

    #[test]
    fn boundary_ten_thousandth_task_id_accepted_with_wider_padding() {
        let mut r = IdResolver::new(ArtefactKind::Task);
        r.register("T10000");
        for variant in ["10000", "T10000", "T010000"] {
            assert_eq!(r.resolve(variant), Some("T10000".to_string()), "variant {variant}");
        }
    }
}
