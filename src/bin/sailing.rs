//! `sailing`: a thin demonstration CLI exercising the coordination core's
//! public API end to end (init, artefact CRUD, dependency graph queries,
//! claim/release, agent spawn/reap, memory sync, gc) — living documentation
//! of the library contract, grounded on the teacher's clap-derive `Cli`/
//! `Commands` structure and `cmd_*` dispatch functions.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sailing_core::artefact::{ArtefactKind, CreateOptions, EditMode};
use sailing_core::assignments::{AssignmentRegistry, ClaimOptions};
use sailing_core::config::SailingConfig;
use sailing_core::gc::{GarbageCollector, GcOptions};
use sailing_core::graph::{self, DependencyGraph, EffortMap};
use sailing_core::init::{discover_project_root, init_project, is_initialized};
use sailing_core::memory::{LogLevel, MemoryPipeline};
use sailing_core::orchestrator::{AgentOrchestrator, AgentTable, ReapOptions, SpawnOptions};
use sailing_core::paths::PathResolver;
use sailing_core::state::StateStore;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sailing")]
#[command(version, about = "Governance engine for agent-driven software development")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true)]
    pub json: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new sailing project
    Init {
        #[arg(long)]
        from: Option<String>,
    },
    /// Show project/initialization status
    Status,
    /// Product artefacts
    Prd {
        #[command(subcommand)]
        command: ArtefactCommands,
    },
    /// Epic artefacts
    Epic {
        #[command(subcommand)]
        command: ArtefactCommands,
    },
    /// Task artefacts
    Task {
        #[command(subcommand)]
        command: ArtefactCommands,
    },
    /// Story artefacts
    Story {
        #[command(subcommand)]
        command: ArtefactCommands,
    },
    /// Dependency graph queries
    Deps {
        #[command(subcommand)]
        command: DepsCommands,
    },
    /// Assignment registry (claim/release Tasks)
    Assign {
        #[command(subcommand)]
        command: AssignCommands,
    },
    /// Agent lifecycle (spawn/kill/status)
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },
    /// Memory & log pipeline
    Memory {
        #[command(subcommand)]
        command: MemoryCommands,
    },
    /// Garbage collection
    Gc {
        #[command(subcommand)]
        command: GcCommands,
    },
    /// Show resolved paths for this project
    Paths,
    /// Show state counters
    State,
}

#[derive(Subcommand)]
pub enum ArtefactCommands {
    List,
    Show { id: String },
    Create {
        title: String,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        effort: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        tags: Vec<String>,
    },
    Update {
        id: String,
        /// field=value pairs, e.g. status="In Progress"
        #[arg(long = "set", value_parser = parse_field)]
        set: Vec<(String, String)>,
    },
    Edit {
        id: String,
        section: String,
        content: String,
        #[arg(long, value_enum, default_value = "replace")]
        mode: EditModeArg,
    },
    Patch {
        id: String,
        old: String,
        new: String,
        #[arg(long)]
        section: Option<String>,
        #[arg(long)]
        regexp: bool,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum EditModeArg {
    Replace,
    Append,
    Prepend,
}

impl From<EditModeArg> for EditMode {
    fn from(mode: EditModeArg) -> Self {
        match mode {
            EditModeArg::Replace => EditMode::Replace,
            EditModeArg::Append => EditMode::Append,
            EditModeArg::Prepend => EditMode::Prepend,
        }
    }
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (field, value) = raw.split_once('=').ok_or_else(|| format!("expected field=value, got '{raw}'"))?;
    Ok((field.to_string(), value.to_string()))
}

#[derive(Subcommand)]
pub enum DepsCommands {
    /// Print the blocker tree for a Task
    Tree { id: String },
    /// Run the eleven-rule validator
    Validate {
        #[arg(long)]
        fix: bool,
    },
    /// List ready Tasks, sorted by impact
    Ready {
        #[arg(long)]
        include_started: bool,
    },
    /// Print the effort-aware critical path
    Critical {
        #[arg(long)]
        real: bool,
    },
    /// Rank Tasks by bottleneck impact
    Impact,
    /// Add a blocker to a Task's `blocked_by` list
    Add { task_id: String, blocker_id: String },
}

#[derive(Subcommand)]
pub enum AssignCommands {
    Claim {
        task_id: String,
        #[arg(long, default_value = "work")]
        operation: String,
        #[arg(long)]
        force: bool,
    },
    Release {
        task_id: String,
        #[arg(long)]
        success: bool,
    },
    Show { task_id: String },
    List,
    Complete {
        task_id: String,
        #[arg(long)]
        success: bool,
    },
    Delete { task_id: String },
}

#[derive(Subcommand)]
pub enum AgentCommands {
    /// Spawn an agent for a Task and wait for it to exit (reaps inline)
    Spawn {
        task_id: String,
        #[arg(long)]
        worktree: bool,
        #[arg(long)]
        handshake: bool,
    },
    Kill { task_id: String },
    Status { task_id: String },
    List,
    /// Print the task's append-only log
    Log { task_id: String },
    /// Fast-forward or merge the task's branch back into main
    Pr { task_id: String },
    /// Sweep for watchdog violations (budget/timeout) and kill offenders
    Sync,
    Cleanup {
        task_id: String,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum MemoryCommands {
    Sync {
        scope: Option<String>,
        #[arg(long)]
        no_create: bool,
    },
    Show { epic_id: String },
    Write {
        task_id: String,
        message: String,
        #[arg(long, default_value = "info")]
        level: String,
    },
}

#[derive(Subcommand)]
pub enum GcCommands {
    Agents {
        #[arg(long)]
        unsafe_too: bool,
    },
    Worktrees {
        #[arg(long)]
        unsafe_too: bool,
    },
    Havens {
        #[arg(long)]
        force: bool,
    },
    All {
        #[arg(long)]
        unsafe_too: bool,
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => discover_project_root(&std::env::current_dir().context("failed to get current directory")?)
            .unwrap_or(std::env::current_dir()?),
    };

    match &cli.command {
        Commands::Init { from } => cmd_init(&project_dir, from.as_deref())?,
        Commands::Status => cmd_status(&project_dir)?,
        Commands::Prd { command } => cmd_artefact(&project_dir, ArtefactKind::Product, command, cli.json)?,
        Commands::Epic { command } => cmd_artefact(&project_dir, ArtefactKind::Epic, command, cli.json)?,
        Commands::Task { command } => cmd_artefact(&project_dir, ArtefactKind::Task, command, cli.json)?,
        Commands::Story { command } => cmd_artefact(&project_dir, ArtefactKind::Story, command, cli.json)?,
        Commands::Deps { command } => cmd_deps(&project_dir, command, cli.json)?,
        Commands::Assign { command } => cmd_assign(&project_dir, command)?,
        Commands::Agent { command } => cmd_agent(&project_dir, command).await?,
        Commands::Memory { command } => cmd_memory(&project_dir, command)?,
        Commands::Gc { command } => cmd_gc(&project_dir, command)?,
        Commands::Paths => cmd_paths(&project_dir)?,
        Commands::State => cmd_state(&project_dir)?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "debug" } else { "info" })
    });
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

fn require_initialized(project_dir: &std::path::Path) -> Result<()> {
    if !is_initialized(project_dir) {
        bail!("project not initialized. Run 'sailing init' first.");
    }
    Ok(())
}

/// Build the core collaborators a command needs: path resolver, artefact
/// store, and memory pipeline, all rooted at `project_dir`.
fn open_store(project_dir: &std::path::Path) -> Result<(PathResolver, sailing_core::artefact::ArtefactStore, MemoryPipeline)> {
    require_initialized(project_dir)?;
    let mut paths = PathResolver::new(project_dir, HashMap::new())?;
    let state = StateStore::new(paths.state_file()?);
    let store = sailing_core::artefact::ArtefactStore::from_paths(&mut paths, state)?;
    let memory = MemoryPipeline::new(paths.memory_dir()?);
    Ok((paths, store, memory))
}

fn cmd_init(project_dir: &std::path::Path, from_pattern: Option<&str>) -> Result<()> {
    let was_initialized = is_initialized(project_dir);
    let result = init_project(project_dir, from_pattern)?;

    if result.created {
        println!("Initialized sailing project at {}", result.sailing_dir.display());
        println!();
        println!("Created directory structure:");
        println!("  .sailing/    control directory (state, config, templates, memory)");
        println!("  artefacts/   prds/ epics/ tasks/ stories/");
    } else if was_initialized {
        println!("Sailing project already initialized at {}", result.sailing_dir.display());
    } else {
        println!("Completed sailing initialization at {}", result.sailing_dir.display());
    }
    Ok(())
}

fn cmd_status(project_dir: &std::path::Path) -> Result<()> {
    println!();
    println!("Sailing Project Status");
    println!("=======================");
    println!();

    if !is_initialized(project_dir) {
        println!("Project: Not initialized");
        println!();
        println!("Run 'sailing init' to initialize the project.");
        println!();
        return Ok(());
    }
    println!("Project: Initialized at {}", project_dir.display());

    let (_paths, mut store, _memory) = open_store(project_dir)?;
    for kind in [ArtefactKind::Product, ArtefactKind::Epic, ArtefactKind::Task, ArtefactKind::Story] {
        let count = store.canonical_ids(kind)?.len();
        println!("  {:<8} {}", format!("{}s:", kind.label()), count);
    }
    println!();
    Ok(())
}

fn cmd_artefact(project_dir: &std::path::Path, kind: ArtefactKind, command: &ArtefactCommands, json: bool) -> Result<()> {
    let (_paths, mut store, _memory) = open_store(project_dir)?;

    match command {
        ArtefactCommands::List => {
            let ids = store.canonical_ids(kind)?;
            if ids.is_empty() {
                println!("No {}s found.", kind.label().to_lowercase());
                return Ok(());
            }
            for id in ids {
                let artefact = store.get(kind, &id)?;
                println!("{:<10} [{:<12}] {}", artefact.front_matter.id, artefact.front_matter.status, artefact.front_matter.title);
            }
        }
        ArtefactCommands::Show { id } => {
            let artefact = store.get(kind, id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&artefact.front_matter)?);
            } else {
                println!("{}: {}", artefact.front_matter.id, artefact.front_matter.title);
                println!("status: {}", artefact.front_matter.status);
                if let Some(parent) = &artefact.front_matter.parent {
                    println!("parent: {parent}");
                }
                if !artefact.front_matter.blocked_by.is_empty() {
                    println!("blocked_by: {}", artefact.front_matter.blocked_by.join(", "));
                }
                println!();
                println!("{}", artefact.body);
            }
        }
        ArtefactCommands::Create { title, parent, effort, priority, tags } => {
            let options = CreateOptions {
                parent_dir: None,
                tags: tags.clone(),
                effort: effort.clone(),
                priority: priority.clone(),
                milestone: None,
                body: None,
            };
            let artefact = store.create(kind, parent.as_deref(), title, options)?;
            println!("Created {} {}", kind.label(), artefact.front_matter.id);
        }
        ArtefactCommands::Update { id, set } => {
            let mut patch = HashMap::new();
            for (field, value) in set {
                patch.insert(field.clone(), serde_yaml::Value::String(value.clone()));
            }
            let artefact = store.update_frontmatter(kind, id, patch)?;
            println!("Updated {} (status: {})", artefact.front_matter.id, artefact.front_matter.status);
        }
        ArtefactCommands::Edit { id, section, content, mode } => {
            let artefact = store.edit_section(kind, id, section, content, (*mode).into())?;
            println!("Edited section '{section}' on {}", artefact.front_matter.id);
        }
        ArtefactCommands::Patch { id, old, new, section, regexp } => {
            let artefact = store.patch(kind, id, old, new, section.as_deref(), *regexp)?;
            println!("Patched {}", artefact.front_matter.id);
        }
    }
    Ok(())
}

fn cmd_deps(project_dir: &std::path::Path, command: &DepsCommands, json: bool) -> Result<()> {
    let (_paths, mut store, _memory) = open_store(project_dir)?;

    match command {
        DepsCommands::Tree { id } => {
            let graph = DependencyGraph::build(&mut store, ArtefactKind::Task)?;
            let Some(node) = graph.node(id) else { bail!("task {id} not in the dependency graph") };
            println!("{id} [{}]", node.status);
            for blocker in graph.blockers(id) {
                println!("  blocked by {blocker}");
            }
            for dependent in graph.dependents(id) {
                println!("  blocks {dependent}");
            }
        }
        DepsCommands::Validate { fix } => {
            let report = graph::validate(&mut store, *fix)?;
            if json {
                #[derive(serde::Serialize)]
                struct FindingOut<'a> {
                    kind: String,
                    artefact_id: &'a str,
                    message: &'a str,
                }
                let out: Vec<_> = report
                    .findings
                    .iter()
                    .map(|f| FindingOut { kind: format!("{:?}", f.kind), artefact_id: &f.artefact_id, message: &f.message })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else if report.findings.is_empty() {
                println!("No validation findings.");
            } else {
                for finding in &report.findings {
                    println!("[{:?}] {}: {}", finding.kind, finding.artefact_id, finding.message);
                }
                println!();
                println!("{} finding(s), {} fixed.", report.findings.len(), report.fixed.len());
            }
            if report.has_cycle() {
                std::process::exit(1);
            }
        }
        DepsCommands::Ready { include_started } => {
            let graph = DependencyGraph::build(&mut store, ArtefactKind::Task)?;
            let ready = graph::ready(&graph, *include_started);
            if ready.is_empty() {
                println!("No ready tasks.");
            }
            for task in ready {
                println!("{:<10} bottleneck={}", task.id, task.bottleneck_score);
            }
        }
        DepsCommands::Critical { real } => {
            let graph = DependencyGraph::build(&mut store, ArtefactKind::Task)?;
            let config = SailingConfig::load(project_dir.to_path_buf())?;
            let effort = EffortMap::from_config(&config.toml);
            let schedule =
                if *real { graph::real_schedule(&graph, &effort, chrono::Utc::now()) } else { graph::theoretical_schedule(&graph, &effort) };
            println!("total effort: {}h, critical path: {}h", schedule.total_effort_hours, schedule.critical_path_hours);
            for window in &schedule.windows {
                let marker = if window.on_critical_path { "*" } else { " " };
                println!("{marker} {:<10} [{:>4}h .. {:>4}h]", window.id, window.start_hour, window.end_hour);
            }
        }
        DepsCommands::Impact => {
            let graph = DependencyGraph::build(&mut store, ArtefactKind::Task)?;
            for task in graph::impact_ranked(&graph) {
                println!("{:<10} bottleneck={}", task.id, task.bottleneck_score);
            }
        }
        DepsCommands::Add { task_id, blocker_id } => {
            let task = store.get(ArtefactKind::Task, task_id)?;
            let mut blocked_by = task.front_matter.blocked_by.clone();
            if !blocked_by.contains(blocker_id) {
                blocked_by.push(blocker_id.clone());
            }
            let mut patch = HashMap::new();
            let seq: Vec<serde_yaml::Value> = blocked_by.into_iter().map(serde_yaml::Value::String).collect();
            patch.insert("blocked_by".to_string(), serde_yaml::Value::Sequence(seq));
            store.update_frontmatter(ArtefactKind::Task, task_id, patch)?;
            println!("{task_id} now blocked by {blocker_id}");
        }
    }
    Ok(())
}

fn assignment_registry(paths: &mut PathResolver) -> Result<AssignmentRegistry> {
    let project_hash = paths.project_hash().to_string();
    Ok(AssignmentRegistry::new(paths.assignments_dir()?, paths.runs_dir()?, project_hash))
}

fn cmd_assign(project_dir: &std::path::Path, command: &AssignCommands) -> Result<()> {
    let (mut paths, mut store, memory) = open_store(project_dir)?;
    let registry = assignment_registry(&mut paths)?;

    match command {
        AssignCommands::Claim { task_id, operation, force } => {
            let options = ClaimOptions { operation: operation.clone(), force: *force };
            let prompt = registry.claim(&mut store, &memory, task_id, &options)?;
            println!("Claimed {task_id}. Composed prompt ({} bytes):", prompt.len());
            println!("{prompt}");
        }
        AssignCommands::Release { task_id, success } => {
            let warning = registry.release(&memory, task_id, *success)?;
            println!("Released {task_id} (success={success})");
            if let Some(warning) = warning {
                println!("warning: {warning}");
            }
        }
        AssignCommands::Show { task_id } => match registry.show(task_id)? {
            Some(assignment) => println!("{}", serde_yaml::to_string(&assignment)?),
            None => println!("No assignment found for {task_id}"),
        },
        AssignCommands::List => {
            for assignment in registry.list()? {
                println!("{:<10} {:?} operation={}", assignment.task_id, assignment.status, assignment.operation);
            }
        }
        AssignCommands::Complete { task_id, success } => {
            registry.complete(task_id, *success)?;
            println!("Completed {task_id} (success={success})");
        }
        AssignCommands::Delete { task_id } => {
            registry.delete(task_id)?;
            println!("Deleted assignment for {task_id}");
        }
    }
    Ok(())
}

async fn cmd_agent(project_dir: &std::path::Path, command: &AgentCommands) -> Result<()> {
    let mut paths = PathResolver::new(project_dir, HashMap::new())?;
    require_initialized(project_dir)?;
    let table = AgentTable::new(paths.agents_table_file()?);
    let config = SailingConfig::load(project_dir.to_path_buf())?;
    let orchestrator = AgentOrchestrator::new(table, project_dir.to_path_buf(), paths.worktrees_dir()?, config);

    match command {
        AgentCommands::Spawn { task_id, worktree, handshake } => {
            let options = SpawnOptions { worktree: *worktree, prompt: None, handshake: *handshake };
            let child = orchestrator.spawn(task_id, &options).await?;
            println!("Spawned agent for {task_id}");
            orchestrator.reap(task_id, child, &ReapOptions::default()).await?;
            println!("Reaped agent for {task_id}");
        }
        AgentCommands::Kill { task_id } => {
            orchestrator.kill(task_id)?;
            println!("Killed agent for {task_id}");
        }
        AgentCommands::Status { task_id } => match orchestrator.status(task_id)? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => println!("No agent record for {task_id}"),
        },
        AgentCommands::List => {
            for record in orchestrator.all()? {
                println!("{:<10} {:?}", record.task_id, record.status);
            }
        }
        AgentCommands::Log { task_id } => {
            let memory = MemoryPipeline::new(paths.memory_dir()?);
            for line in memory.task_log_lines(task_id)? {
                println!("{line}");
            }
        }
        AgentCommands::Pr { task_id } => {
            let outcome = orchestrator.merge(task_id)?;
            println!("{task_id}: {outcome:?}");
        }
        AgentCommands::Sync => {
            let killed = orchestrator.watchdog_tick()?;
            if killed.is_empty() {
                println!("No watchdog violations.");
            } else {
                println!("Killed {} agent(s) for budget/timeout violations: {}", killed.len(), killed.join(", "));
            }
        }
        AgentCommands::Cleanup { task_id, force } => {
            orchestrator.cleanup(task_id, *force)?;
            println!("Cleaned up {task_id}");
        }
    }
    Ok(())
}

fn cmd_memory(project_dir: &std::path::Path, command: &MemoryCommands) -> Result<()> {
    let (mut paths, mut store, memory) = open_store(project_dir)?;

    match command {
        MemoryCommands::Sync { scope, no_create } => {
            let report = memory.sync(&mut store, scope.as_deref(), *no_create)?;
            println!(
                "merged {} task log(s), created {} epic memory file(s), {} epic(s) still pending",
                report.merged_task_logs.len(),
                report.created_epic_memory.len(),
                report.still_pending_epics.len()
            );
        }
        MemoryCommands::Show { epic_id } => {
            let path = sailing_core::memory::memory_file_path(&paths.memory_dir()?, epic_id);
            let content = std::fs::read_to_string(&path).with_context(|| format!("no memory file for {epic_id}"))?;
            println!("{content}");
        }
        MemoryCommands::Write { task_id, message, level } => {
            let level = LogLevel::parse(level).ok_or_else(|| anyhow::anyhow!("unknown log level '{level}'"))?;
            memory.append(task_id, level, message, &[])?;
            println!("Logged {level:?} entry for {task_id}");
        }
    }
    Ok(())
}

fn cmd_gc(project_dir: &std::path::Path, command: &GcCommands) -> Result<()> {
    let (mut paths, mut store, _memory) = open_store(project_dir)?;
    let project_hash = paths.project_hash().to_string();
    let table = AgentTable::new(paths.agents_table_file()?);
    let haven = paths.haven_dir()?;
    let havens_root = haven.parent().map(std::path::Path::to_path_buf);
    let collector = GarbageCollector::new(paths.agents_dir()?, paths.worktrees_dir()?, havens_root, project_hash, table);

    let report = match command {
        GcCommands::Agents { unsafe_too } => {
            collector.sweep_agents(&mut store, &GcOptions { allow_unsafe: *unsafe_too, force_haven: false })?
        }
        GcCommands::Worktrees { unsafe_too } => collector.sweep_worktrees(
            &mut store,
            project_dir,
            &GcOptions { allow_unsafe: *unsafe_too, force_haven: false },
        )?,
        GcCommands::Havens { force } => collector.sweep_havens(&GcOptions { allow_unsafe: false, force_haven: *force })?,
        GcCommands::All { unsafe_too, force } => {
            collector.sweep_all(&mut store, project_dir, &GcOptions { allow_unsafe: *unsafe_too, force_haven: *force })?
        }
    };

    println!("removed: {}", report.removed.len());
    for path in &report.removed {
        println!("  - {}", path.display());
    }
    if !report.retained_unsafe.is_empty() {
        println!("retained (unsafe, pass --unsafe-too to remove): {}", report.retained_unsafe.len());
    }
    if !report.retained_active.is_empty() {
        println!("retained (active): {}", report.retained_active.len());
    }
    Ok(())
}

fn cmd_paths(project_dir: &std::path::Path) -> Result<()> {
    require_initialized(project_dir)?;
    let mut paths = PathResolver::new(project_dir, HashMap::new())?;
    println!("project_root:  {}", paths.project_root().display());
    println!("artefacts_dir: {}", paths.artefacts_dir()?.display());
    println!("memory_dir:    {}", paths.memory_dir()?.display());
    println!("haven_dir:     {}", paths.haven_dir()?.display());
    println!("worktrees_dir: {}", paths.worktrees_dir()?.display());
    println!("agents_dir:    {}", paths.agents_dir()?.display());
    println!("assignments:   {}", paths.assignments_dir()?.display());
    println!("runs_dir:      {}", paths.runs_dir()?.display());
    Ok(())
}

fn cmd_state(project_dir: &std::path::Path) -> Result<()> {
    require_initialized(project_dir)?;
    let mut paths = PathResolver::new(project_dir, HashMap::new())?;
    let state = StateStore::new(paths.state_file()?);
    for kind in [
        sailing_core::state::CounterKind::Prd,
        sailing_core::state::CounterKind::Epic,
        sailing_core::state::CounterKind::Task,
        sailing_core::state::CounterKind::Story,
    ] {
        println!("{:<6} current={}", kind.prefix(), state.current(kind)?);
    }
    Ok(())
}
