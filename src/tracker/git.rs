use crate::errors::{CoreError, CoreResult};
use anyhow::{Context, Result};
use git2::{Delta, DiffOptions, Repository, Signature, WorktreeAddOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A single file's change classification within a diff.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
    Renamed,
}

/// A unified diff for one file, for display or logging purposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDiff {
    pub path: PathBuf,
    pub change_type: ChangeType,
    pub lines_added: usize,
    pub lines_removed: usize,
    pub diff_content: String,
}

/// Aggregate file-change counts since a snapshot, used by the garbage
/// collector's dirty-worktree probe and by `reap`'s summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileChangeSummary {
    pub files_added: Vec<PathBuf>,
    pub files_modified: Vec<PathBuf>,
    pub files_deleted: Vec<PathBuf>,
    pub total_lines_added: usize,
    pub total_lines_removed: usize,
}

impl FileChangeSummary {
    pub fn total_files(&self) -> usize {
        self.files_added.len() + self.files_modified.len() + self.files_deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_files() == 0
    }
}

/// Outcome of `GitTracker::merge_branch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    FastForwarded,
    Merged,
    Conflict,
}

pub struct GitTracker {
    repo: Repository,
}

impl GitTracker {
    pub fn new(project_dir: &Path) -> Result<Self> {
        let repo = Repository::open(project_dir).context("Failed to open git repository")?;
        Ok(Self { repo })
    }

    /// Create a snapshot commit before an operation starts.
    pub fn snapshot_before(&self, label: &str) -> Result<String> {
        let mut index = self.repo.index()?;

        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;

        let sig = Signature::now("sailing", "sailing@localhost")?;

        let commit_id = if let Some(parent) = self.get_head_commit() {
            self.repo.commit(
                Some("HEAD"),
                &sig,
                &sig,
                &format!("[sailing] snapshot before {label}"),
                &tree,
                &[&parent],
            )?
        } else {
            self.repo.commit(
                Some("HEAD"),
                &sig,
                &sig,
                &format!("[sailing] snapshot before {label}"),
                &tree,
                &[],
            )?
        };

        Ok(commit_id.to_string())
    }

    fn get_head_commit(&self) -> Option<git2::Commit<'_>> {
        self.repo.head().ok().and_then(|head| head.peel_to_commit().ok())
    }

    /// Whether `HEAD` has at least one commit. Worktree creation requires it.
    pub fn has_commits(&self) -> bool {
        self.get_head_commit().is_some()
    }

    /// Whether the working tree has any uncommitted changes (tracked or
    /// untracked), used by preflight's "main branch is clean" assertion.
    pub fn is_clean(&self) -> Result<bool> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        Ok(statuses.is_empty())
    }

    pub fn compute_changes(&self, before_sha: &str) -> Result<FileChangeSummary> {
        let before_oid = git2::Oid::from_str(before_sha)?;
        let before_commit = self.repo.find_commit(before_oid)?;
        let before_tree = before_commit.tree()?;

        let mut opts = DiffOptions::new();
        opts.include_untracked(true);

        let diff = self.repo.diff_tree_to_workdir_with_index(Some(&before_tree), Some(&mut opts))?;

        let mut summary = FileChangeSummary::default();

        diff.foreach(
            &mut |delta, _progress| {
                if let Some(path) = delta.new_file().path() {
                    let path_buf = path.to_path_buf();
                    match delta.status() {
                        Delta::Added | Delta::Untracked => {
                            summary.files_added.push(path_buf);
                        }
                        Delta::Modified => {
                            summary.files_modified.push(path_buf);
                        }
                        Delta::Deleted => {
                            summary.files_deleted.push(path_buf);
                        }
                        _ => {}
                    }
                }
                true
            },
            None,
            None,
            Some(&mut |_delta, _hunk, line| {
                match line.origin() {
                    '+' => summary.total_lines_added += 1,
                    '-' => summary.total_lines_removed += 1,
                    _ => {}
                }
                true
            }),
        )?;

        Ok(summary)
    }

    pub fn get_full_diffs(&self, before_sha: &str) -> Result<Vec<FileDiff>> {
        let before_oid = git2::Oid::from_str(before_sha)?;
        let before_commit = self.repo.find_commit(before_oid)?;
        let before_tree = before_commit.tree()?;

        let mut opts = DiffOptions::new();
        opts.include_untracked(true);

        let diff = self.repo.diff_tree_to_workdir_with_index(Some(&before_tree), Some(&mut opts))?;

        let mut file_diffs = Vec::new();

        for delta_idx in 0..diff.deltas().len() {
            let Some(delta) = diff.get_delta(delta_idx) else {
                continue;
            };
            let Some(path) = delta.new_file().path() else {
                continue;
            };
            let path = path.to_path_buf();

            let change_type = match delta.status() {
                Delta::Added | Delta::Untracked => ChangeType::Added,
                Delta::Modified => ChangeType::Modified,
                Delta::Deleted => ChangeType::Deleted,
                Delta::Renamed => ChangeType::Renamed,
                _ => continue,
            };

            let mut lines_added = 0;
            let mut lines_removed = 0;
            let mut diff_content = String::new();

            if let Ok(patch) = git2::Patch::from_diff(&diff, delta_idx)
                && let Some(mut patch) = patch
            {
                let mut buf = Vec::new();
                patch
                    .print(&mut |_delta, _hunk, line| {
                        match line.origin() {
                            '+' => lines_added += 1,
                            '-' => lines_removed += 1,
                            _ => {}
                        }
                        buf.extend_from_slice(line.content());
                        true
                    })
                    .ok();
                diff_content = String::from_utf8_lossy(&buf).to_string();
            }

            file_diffs.push(FileDiff { path, change_type, lines_added, lines_removed, diff_content });
        }

        Ok(file_diffs)
    }

    pub fn head_sha(&self) -> Option<String> {
        self.get_head_commit().map(|c| c.id().to_string())
    }

    fn main_branch_name(&self) -> Result<String> {
        let head = self.repo.head()?;
        Ok(head.shorthand().unwrap_or("main").to_string())
    }

    /// Create a branch named `task_id` off the current `HEAD`, and a git
    /// worktree for it at `worktree_path`. Requires at least one commit.
    pub fn create_task_worktree(&self, task_id: &str, worktree_path: &Path) -> CoreResult<()> {
        let head_commit = self
            .get_head_commit()
            .ok_or_else(|| CoreError::validation_failure("repository has no commits; cannot create a worktree"))?;

        if self.repo.find_branch(task_id, git2::BranchType::Local).is_err() {
            self.repo.branch(task_id, &head_commit, false)?;
        }

        let mut opts = WorktreeAddOptions::new();
        let reference = self.repo.find_branch(task_id, git2::BranchType::Local)?.into_reference();
        opts.reference(Some(&reference));

        self.repo.worktree(task_id, worktree_path, Some(&opts))?;
        Ok(())
    }

    /// Fast-forward or merge the Task branch back into the main branch.
    /// Returns `Conflict` rather than erroring when the merge cannot proceed
    /// cleanly; the caller decides how to surface that (agent `conflict`
    /// state).
    pub fn merge_branch(&self, task_id: &str) -> CoreResult<MergeOutcome> {
        let main_name = self.main_branch_name()?;
        let branch = self.repo.find_branch(task_id, git2::BranchType::Local)?;
        let branch_commit = branch.get().peel_to_commit()?;
        let annotated = self.repo.find_annotated_commit(branch_commit.id())?;

        let (merge_analysis, _) = self.repo.merge_analysis(&[&annotated])?;

        if merge_analysis.is_up_to_date() {
            return Ok(MergeOutcome::FastForwarded);
        }

        if merge_analysis.is_fast_forward() {
            let mut reference = self.repo.find_reference(&format!("refs/heads/{main_name}"))?;
            reference.set_target(branch_commit.id(), "sailing: fast-forward merge")?;
            self.repo.set_head(&format!("refs/heads/{main_name}"))?;
            let mut checkout = git2::build::CheckoutBuilder::new();
            checkout.force();
            self.repo.checkout_head(Some(&mut checkout))?;
            return Ok(MergeOutcome::FastForwarded);
        }

        self.repo.merge(&[&annotated], None, None)?;
        let mut index = self.repo.index()?;
        if index.has_conflicts() {
            self.repo.cleanup_state()?;
            return Ok(MergeOutcome::Conflict);
        }

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let sig = Signature::now("sailing", "sailing@localhost")?;
        let head_commit = self
            .get_head_commit()
            .ok_or_else(|| CoreError::validation_failure("main branch has no commits"))?;
        self.repo.commit(
            Some("HEAD"),
            &sig,
            &sig,
            &format!("[sailing] merge {task_id}"),
            &tree,
            &[&head_commit, &branch_commit],
        )?;
        self.repo.cleanup_state()?;
        Ok(MergeOutcome::Merged)
    }

    /// Delete the worktree directory and its backing branch. Idempotent —
    /// missing worktree/branch entries are not an error.
    pub fn remove_task_worktree(&self, task_id: &str) -> CoreResult<()> {
        if let Ok(worktree) = self.repo.find_worktree(task_id) {
            let mut opts = git2::WorktreePruneOptions::new();
            opts.working_tree(true);
            worktree.prune(Some(&mut opts))?;
        }
        if let Ok(mut branch) = self.repo.find_branch(task_id, git2::BranchType::Local) {
            branch.delete()?;
        }
        Ok(())
    }

    /// `git worktree prune`, dropping administrative files for worktrees
    /// whose directories have already been removed out-of-band.
    pub fn prune_worktrees(&self) -> CoreResult<()> {
        for name in self.repo.worktrees()?.iter().flatten() {
            if let Ok(worktree) = self.repo.find_worktree(name) {
                let mut opts = git2::WorktreePruneOptions::new();
                opts.working_tree(true);
                worktree.prune(Some(&mut opts))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Repository;
    use std::fs;
    use tempfile::tempdir;

    fn setup_repo() -> (GitTracker, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "test").unwrap();
        config.set_str("user.email", "test@test.com").unwrap();
        drop(config);
        let tracker = GitTracker::new(dir.path()).unwrap();
        (tracker, dir)
    }

    fn commit_file(dir: &std::path::Path, name: &str, content: &str, msg: &str) {
        let repo = Repository::open(dir).unwrap();
        let file_path = dir.join(name);
        fs::write(&file_path, content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("test", "test@test.com").unwrap();
        if let Ok(head) = repo.head() {
            let parent = head.peel_to_commit().unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, msg, &tree, &[&parent]).unwrap();
        } else {
            repo.commit(Some("HEAD"), &sig, &sig, msg, &tree, &[]).unwrap();
        }
    }

    #[test]
    fn test_head_sha_unborn_then_populated() {
        let (tracker, dir) = setup_repo();
        assert!(tracker.head_sha().is_none());
        commit_file(dir.path(), "a.txt", "hello", "init");
        let sha = tracker.head_sha();
        assert!(sha.is_some());
        assert_eq!(sha.unwrap().len(), 40);
    }

    #[test]
    fn test_snapshot_before_returns_valid_sha() {
        let (tracker, dir) = setup_repo();
        commit_file(dir.path(), "readme.txt", "hello", "init");
        let sha = tracker.snapshot_before("op1").unwrap();
        assert_eq!(sha.len(), 40);
    }

    #[test]
    fn test_compute_changes_detects_added_file() {
        let (tracker, dir) = setup_repo();
        commit_file(dir.path(), "existing.txt", "original", "init");
        let sha = tracker.snapshot_before("op2").unwrap();
        fs::write(dir.path().join("new_file.rs"), "fn main() {}").unwrap();
        let summary = tracker.compute_changes(&sha).unwrap();
        assert!(summary.files_added.iter().any(|p| p.ends_with("new_file.rs")));
    }

    #[test]
    fn test_compute_changes_detects_modified_file() {
        let (tracker, dir) = setup_repo();
        commit_file(dir.path(), "existing.txt", "line one\n", "init");
        let sha = tracker.snapshot_before("op3").unwrap();
        fs::write(dir.path().join("existing.txt"), "line one\nline two\n").unwrap();
        let summary = tracker.compute_changes(&sha).unwrap();
        assert!(summary.files_modified.iter().any(|p| p.ends_with("existing.txt")));
    }

    #[test]
    fn test_compute_changes_no_changes() {
        let (tracker, dir) = setup_repo();
        commit_file(dir.path(), "stable.txt", "unchanged\n", "init");
        let sha = tracker.snapshot_before("op7").unwrap();
        let summary = tracker.compute_changes(&sha).unwrap();
        assert!(summary.files_modified.is_empty());
        assert_eq!(summary.total_lines_added, 0);
        assert_eq!(summary.total_lines_removed, 0);
    }

    #[test]
    fn test_get_full_diffs_content() {
        let (tracker, dir) = setup_repo();
        commit_file(dir.path(), "src.rs", "fn old() {}\n", "init");
        let sha = tracker.snapshot_before("op5").unwrap();
        fs::write(dir.path().join("src.rs"), "fn new() {}\nfn extra() {}\n").unwrap();
        let diffs = tracker.get_full_diffs(&sha).unwrap();
        assert!(!diffs.is_empty());
        let diff = diffs.iter().find(|d| d.path.ends_with("src.rs")).unwrap();
        assert!(!diff.diff_content.is_empty());
    }

    #[test]
    fn create_task_worktree_checks_out_a_branch() {
        let (tracker, dir) = setup_repo();
        commit_file(dir.path(), "a.txt", "hello", "init");
        let worktree_path = dir.path().join("worktrees").join("T001");
        tracker.create_task_worktree("T001", &worktree_path).unwrap();
        assert!(worktree_path.join("a.txt").exists());
    }

    #[test]
    fn create_task_worktree_without_commits_is_rejected() {
        let (tracker, dir) = setup_repo();
        let worktree_path = dir.path().join("worktrees").join("T001");
        assert!(tracker.create_task_worktree("T001", &worktree_path).is_err());
    }

    #[test]
    fn merge_branch_fast_forwards_a_clean_branch() {
        let (tracker, dir) = setup_repo();
        commit_file(dir.path(), "a.txt", "hello", "init");
        let worktree_path = dir.path().join("worktrees").join("T001");
        tracker.create_task_worktree("T001", &worktree_path).unwrap();
        commit_file(&worktree_path, "b.txt", "more", "work");

        let outcome = tracker.merge_branch("T001").unwrap();
        assert_eq!(outcome, MergeOutcome::FastForwarded);
    }

    #[test]
    fn remove_task_worktree_is_idempotent() {
        let (tracker, dir) = setup_repo();
        commit_file(dir.path(), "a.txt", "hello", "init");
        let worktree_path = dir.path().join("worktrees").join("T001");
        tracker.create_task_worktree("T001", &worktree_path).unwrap();
        tracker.remove_task_worktree("T001").unwrap();
        tracker.remove_task_worktree("T001").unwrap();
    }

    #[test]
    fn is_clean_reflects_uncommitted_changes() {
        let (tracker, dir) = setup_repo();
        commit_file(dir.path(), "a.txt", "hello", "init");
        assert!(tracker.is_clean().unwrap());
        fs::write(dir.path().join("a.txt"), "changed").unwrap();
        assert!(!tracker.is_clean().unwrap());
    }
}
