//! Typed error hierarchy for the coordination core.
//!
//! A single discriminated enum, `CoreError`, covers every subsystem (paths,
//! state, artefacts, graph, memory, assignments, orchestrator, gc, watch).
//! Internal code may use `anyhow::Result` for `?`-convenience while calling
//! into third-party crates, but every public API boundary returns
//! `Result<T, CoreError>`.

use std::path::PathBuf;
use thiserror::Error;

/// The discriminated error taxonomy exposed to callers.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} {id} already exists")]
    AlreadyExists { kind: &'static str, id: String },

    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("config error: {message}")]
    ConfigError { message: String },

    #[error("concurrency error: {message}")]
    ConcurrencyError { message: String },

    #[error("timed out after {elapsed_ms}ms waiting on {operation}")]
    Timeout { operation: String, elapsed_ms: u64 },

    #[error("validation failure: {message}")]
    ValidationFailure { message: String },

    #[error("io error at {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupted state: {message}")]
    Corrupted { message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound { kind, id: id.into() }
    }

    pub fn already_exists(kind: &'static str, id: impl Into<String>) -> Self {
        CoreError::AlreadyExists { kind, id: id.into() }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        CoreError::InvalidInput { message: message.into() }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        CoreError::ConfigError { message: message.into() }
    }

    pub fn concurrency_error(message: impl Into<String>) -> Self {
        CoreError::ConcurrencyError { message: message.into() }
    }

    pub fn validation_failure(message: impl Into<String>) -> Self {
        CoreError::ValidationFailure { message: message.into() }
    }

    pub fn corrupted(message: impl Into<String>) -> Self {
        CoreError::Corrupted { message: message.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::IoError { path: path.into(), source }
    }
}

impl From<serde_yaml::Error> for CoreError {
    fn from(e: serde_yaml::Error) -> Self {
        CoreError::Corrupted { message: e.to_string() }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Corrupted { message: e.to_string() }
    }
}

impl From<git2::Error> for CoreError {
    fn from(e: git2::Error) -> Self {
        CoreError::Other(anyhow::anyhow!("git error: {e}"))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_carries_kind_and_id() {
        let err = CoreError::not_found("Task", "T001");
        match &err {
            CoreError::NotFound { kind, id } => {
                assert_eq!(*kind, "Task");
                assert_eq!(id, "T001");
            }
            _ => panic!("expected NotFound"),
        }
        assert!(err.to_string().contains("T001"));
    }

    #[test]
    fn already_exists_matches() {
        let err = CoreError::already_exists("Task", "T001");
        assert!(matches!(err, CoreError::AlreadyExists { .. }));
    }

    #[test]
    fn io_error_carries_path_and_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = CoreError::io("/sailing/state.json", io);
        match &err {
            CoreError::IoError { path, source } => {
                assert_eq!(path, &PathBuf::from("/sailing/state.json"));
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            _ => panic!("expected IoError"),
        }
    }

    #[test]
    fn timeout_message_includes_operation_and_elapsed() {
        let err = CoreError::Timeout { operation: "spawn wait".into(), elapsed_ms: 30_000 };
        let msg = err.to_string();
        assert!(msg.contains("spawn wait"));
        assert!(msg.contains("30000"));
    }

    #[test]
    fn anyhow_converts_via_from() {
        let anyhow_err = anyhow::anyhow!("boom");
        let err: CoreError = anyhow_err.into();
        assert!(matches!(err, CoreError::Other(_)));
    }

    #[test]
    fn implements_std_error() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        let err = CoreError::corrupted("bad state");
        assert_std_error(&err);
    }
}
