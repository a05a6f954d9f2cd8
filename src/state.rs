//! Component B — state store.
//!
//! Persistent integer counters (next PRD/Epic/Task/Story ID) under
//! `.sailing/state.json`, guarded for concurrent-process safety by an
//! OS-level advisory file lock held for the duration of a read-modify-write
//! allocation.

use crate::errors::{CoreError, CoreResult};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// The kind of counter to allocate. Matches the four artefact ID prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKind {
    Prd,
    Epic,
    Task,
    Story,
}

impl CounterKind {
    pub fn prefix(self) -> &'static str {
        match self {
            CounterKind::Prd => "PRD",
            CounterKind::Epic => "E",
            CounterKind::Task => "T",
            CounterKind::Story => "S",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Counters {
    #[serde(default)]
    prd: u64,
    #[serde(default)]
    epic: u64,
    #[serde(default)]
    task: u64,
    #[serde(default)]
    story: u64,
}

impl Counters {
    fn get(&self, kind: CounterKind) -> u64 {
        match kind {
            CounterKind::Prd => self.prd,
            CounterKind::Epic => self.epic,
            CounterKind::Task => self.task,
            CounterKind::Story => self.story,
        }
    }

    fn set(&mut self, kind: CounterKind, value: u64) {
        match kind {
            CounterKind::Prd => self.prd = value,
            CounterKind::Epic => self.epic = value,
            CounterKind::Task => self.task = value,
            CounterKind::Story => self.story = value,
        }
    }
}

/// Handle to the `.sailing/state.json` counters file.
#[derive(Debug, Clone)]
pub struct StateStore {
    state_file: PathBuf,
}

impl StateStore {
    pub fn new(state_file: PathBuf) -> Self {
        Self { state_file }
    }

    /// Allocate the next value for `kind`, persisting the increment under an
    /// exclusive advisory file lock.
    pub fn allocate(&self, kind: CounterKind) -> CoreResult<u64> {
        if let Some(parent) = self.state_file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&self.state_file)
            .map_err(|e| CoreError::io(&self.state_file, e))?;

        file.lock_exclusive()
            .map_err(|e| CoreError::concurrency_error(format!("failed to lock state file: {e}")))?;

        let result = (|| -> CoreResult<u64> {
            let mut contents = String::new();
            file.read_to_string(&mut contents)
                .map_err(|e| CoreError::io(&self.state_file, e))?;
            let mut counters: Counters = if contents.trim().is_empty() {
                Counters::default()
            } else {
                serde_json::from_str(&contents)?
            };

            let next = counters.get(kind) + 1;
            counters.set(kind, next);

            let serialized = serde_json::to_string_pretty(&counters)?;
            file.set_len(0).map_err(|e| CoreError::io(&self.state_file, e))?;
            file.seek(SeekFrom::Start(0)).map_err(|e| CoreError::io(&self.state_file, e))?;
            file.write_all(serialized.as_bytes()).map_err(|e| CoreError::io(&self.state_file, e))?;
            Ok(next)
        })();

        fs2::FileExt::unlock(&file).ok();
        result
    }

    /// Read the current value for `kind` without mutating it.
    pub fn current(&self, kind: CounterKind) -> CoreResult<u64> {
        if !self.state_file.exists() {
            return Ok(0);
        }
        let contents = std::fs::read_to_string(&self.state_file)
            .map_err(|e| CoreError::io(&self.state_file, e))?;
        if contents.trim().is_empty() {
            return Ok(0);
        }
        let counters: Counters = serde_json::from_str(&contents)?;
        Ok(counters.get(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn allocate_starts_at_one_and_increments() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        assert_eq!(store.allocate(CounterKind::Task).unwrap(), 1);
        assert_eq!(store.allocate(CounterKind::Task).unwrap(), 2);
        assert_eq!(store.allocate(CounterKind::Task).unwrap(), 3);
    }

    #[test]
    fn counters_are_independent_per_kind() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        store.allocate(CounterKind::Task).unwrap();
        store.allocate(CounterKind::Task).unwrap();
        assert_eq!(store.allocate(CounterKind::Epic).unwrap(), 1);
        assert_eq!(store.current(CounterKind::Task).unwrap(), 2);
    }

    #[test]
    fn current_without_prior_allocation_is_zero() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        assert_eq!(store.current(CounterKind::Prd).unwrap(), 0);
    }

    #[test]
    fn state_survives_across_store_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        StateStore::new(path.clone()).allocate(CounterKind::Story).unwrap();
        let reopened = StateStore::new(path);
        assert_eq!(reopened.current(CounterKind::Story).unwrap(), 1);
    }

    #[test]
    fn boundary_ten_thousandth_task_allocates_10000() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let mut last = 0;
        for _ in 0..10_000 {
            last = store.allocate(CounterKind::Task).unwrap();
        }
        assert_eq!(last, 10_000);
    }
}
