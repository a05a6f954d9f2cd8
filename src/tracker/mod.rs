pub mod git;

pub use git::{ChangeType, FileChangeSummary, FileDiff, GitTracker, MergeOutcome};
