//! Component G — agent lifecycle orchestrator.
//!
//! Owns the `spawned → running → completed → reaped → merged → collected`
//! state machine for Task-scoped worker agents. Persistence is a single
//! JSON-lines agent table (`agent_table.rs`); the state machine itself,
//! along with preflight checks and the watchdog tick, lives in
//! `lifecycle.rs`.
//!
//! Grounded on the teacher's phase-oriented `ClaudeRunner`/`StateManager`
//! pair: the piped-subprocess spawn discipline and single-writer state
//! persistence both carry over, generalized from "one phase at a time" to
//! "one Task-scoped agent, possibly several running concurrently".

pub mod agent_table;
pub mod lifecycle;

pub use agent_table::{AgentRecord, AgentStatus, AgentTable, WorktreeRef};
pub use lifecycle::{AgentOrchestrator, ReapOptions, SpawnOptions};
