//! Component D — dependency graph engine.
//!
//! Builds a DAG over Tasks (and, independently, Epics) from `blocked_by`
//! lists read through the artefact index, and derives every view the rest of
//! the crate needs on demand: readiness, critical path / impact scoring,
//! effort-aware CPM scheduling, cycle detection, and the eleven-rule
//! validator with grouped auto-fix.

mod builder;
mod cycle;
mod readiness;
mod schedule;
mod validator;

pub use builder::{DependencyGraph, GraphNode};
pub use cycle::{find_cycles, Cycle};
pub use readiness::{bottleneck_score, impact_ranked, longest_downstream_chain, ready, ReadyTask};
pub use schedule::{theoretical_schedule, real_schedule, EffortMap, Schedule, TaskWindow};
pub use validator::{validate, Finding, FindingKind, ValidationReport};
