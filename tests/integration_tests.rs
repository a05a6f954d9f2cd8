//! Integration tests for the `sailing` CLI.
//!
//! These drive the compiled binary end to end against a temp project
//! directory, the way the teacher pack's own integration suite drives its
//! binary — real process, real filesystem, no mocked core.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn sailing() -> Command {
    cargo_bin_cmd!("sailing")
}

fn init_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    sailing().current_dir(dir.path()).arg("init").assert().success();
    dir
}

mod cli_basics {
    use super::*;

    #[test]
    fn help_succeeds() {
        sailing().arg("--help").assert().success();
    }

    #[test]
    fn version_succeeds() {
        sailing().arg("--version").assert().success();
    }

    #[test]
    fn commands_fail_before_init() {
        let dir = TempDir::new().unwrap();
        sailing()
            .current_dir(dir.path())
            .args(["task", "list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not initialized"));
    }
}

mod init {
    use super::*;

    #[test]
    fn creates_sailing_and_artefacts_trees() {
        let dir = TempDir::new().unwrap();

        sailing()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized sailing project"));

        assert!(dir.path().join(".sailing/state.json").is_file());
        assert!(dir.path().join(".sailing/config.yaml").is_file());
        assert!(dir.path().join(".sailing/memory").is_dir());
        assert!(dir.path().join("artefacts/tasks").is_dir());
        assert!(dir.path().join("artefacts/epics").is_dir());
    }

    #[test]
    fn is_idempotent() {
        let dir = init_project();

        sailing()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("already initialized"));
    }

    #[test]
    fn status_reports_zero_counts_on_a_fresh_project() {
        let dir = init_project();

        sailing()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Task").and(predicate::str::contains("0")));
    }
}

mod artefacts {
    use super::*;

    #[test]
    fn task_create_then_show_round_trips_title_and_status() {
        let dir = init_project();

        let create = sailing()
            .current_dir(dir.path())
            .args(["task", "create", "Wire up the login form"])
            .assert()
            .success();
        let stdout = String::from_utf8_lossy(&create.get_output().stdout).to_string();
        let task_id = stdout
            .split_whitespace()
            .last()
            .expect("create prints the new task id")
            .trim()
            .to_string();

        sailing()
            .current_dir(dir.path())
            .args(["task", "show", &task_id])
            .assert()
            .success()
            .stdout(predicate::str::contains("Wire up the login form"))
            .stdout(predicate::str::contains("Not Started"));
    }

    #[test]
    fn task_list_is_empty_before_any_create() {
        let dir = init_project();

        sailing()
            .current_dir(dir.path())
            .args(["task", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No task"));
    }

    #[test]
    fn epic_create_then_child_task_shows_parent_link() {
        let dir = init_project();

        let epic = sailing().current_dir(dir.path()).args(["epic", "create", "Auth overhaul"]).assert().success();
        let epic_id = String::from_utf8_lossy(&epic.get_output().stdout).trim().split_whitespace().last().unwrap().to_string();

        let task = sailing()
            .current_dir(dir.path())
            .args(["task", "create", "Add password reset", "--parent", &epic_id])
            .assert()
            .success();
        let task_id = String::from_utf8_lossy(&task.get_output().stdout).trim().split_whitespace().last().unwrap().to_string();

        sailing()
            .current_dir(dir.path())
            .args(["task", "show", &task_id])
            .assert()
            .success()
            .stdout(predicate::str::contains(&epic_id));
    }

    #[test]
    fn update_sets_status_field() {
        let dir = init_project();

        let task = sailing().current_dir(dir.path()).args(["task", "create", "Ship it"]).assert().success();
        let task_id = String::from_utf8_lossy(&task.get_output().stdout).trim().split_whitespace().last().unwrap().to_string();

        sailing()
            .current_dir(dir.path())
            .args(["task", "update", &task_id, "--set", "status=In Progress"])
            .assert()
            .success()
            .stdout(predicate::str::contains("In Progress"));
    }

    #[test]
    fn showing_an_unknown_id_fails() {
        let dir = init_project();

        sailing().current_dir(dir.path()).args(["task", "show", "T999"]).assert().failure();
    }
}

mod deps {
    use super::*;

    #[test]
    fn validate_reports_no_findings_on_an_empty_project() {
        let dir = init_project();

        sailing()
            .current_dir(dir.path())
            .args(["deps", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No validation findings"));
    }

    #[test]
    fn newly_created_task_with_no_blockers_is_ready() {
        let dir = init_project();

        let task = sailing().current_dir(dir.path()).args(["task", "create", "Unblocked work"]).assert().success();
        let task_id = String::from_utf8_lossy(&task.get_output().stdout).trim().split_whitespace().last().unwrap().to_string();

        sailing()
            .current_dir(dir.path())
            .args(["deps", "ready"])
            .assert()
            .success()
            .stdout(predicate::str::contains(&task_id));
    }

    #[test]
    fn add_blocker_removes_task_from_ready_list() {
        let dir = init_project();

        let blocker = sailing().current_dir(dir.path()).args(["task", "create", "Design the schema"]).assert().success();
        let blocker_id = String::from_utf8_lossy(&blocker.get_output().stdout).trim().split_whitespace().last().unwrap().to_string();

        let blocked = sailing().current_dir(dir.path()).args(["task", "create", "Migrate the table"]).assert().success();
        let blocked_id = String::from_utf8_lossy(&blocked.get_output().stdout).trim().split_whitespace().last().unwrap().to_string();

        sailing()
            .current_dir(dir.path())
            .args(["deps", "add", &blocked_id, &blocker_id])
            .assert()
            .success();

        sailing()
            .current_dir(dir.path())
            .args(["deps", "ready"])
            .assert()
            .success()
            .stdout(predicate::str::contains(&blocker_id).and(predicate::str::contains(&blocked_id).not()));
    }
}

mod assign {
    use super::*;

    #[test]
    fn claim_then_release_round_trips_through_list() {
        let dir = init_project();

        let task = sailing().current_dir(dir.path()).args(["task", "create", "Investigate flaky test"]).assert().success();
        let task_id = String::from_utf8_lossy(&task.get_output().stdout).trim().split_whitespace().last().unwrap().to_string();

        sailing().current_dir(dir.path()).args(["assign", "claim", &task_id]).assert().success();

        sailing()
            .current_dir(dir.path())
            .args(["assign", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains(&task_id).and(predicate::str::contains("Claimed")));

        sailing().current_dir(dir.path()).args(["assign", "release", &task_id, "--success"]).assert().success();
    }

    #[test]
    fn claiming_an_already_claimed_task_fails_without_force() {
        let dir = init_project();

        let task = sailing().current_dir(dir.path()).args(["task", "create", "Flaky build"]).assert().success();
        let task_id = String::from_utf8_lossy(&task.get_output().stdout).trim().split_whitespace().last().unwrap().to_string();

        sailing().current_dir(dir.path()).args(["assign", "claim", &task_id]).assert().success();
        sailing().current_dir(dir.path()).args(["assign", "claim", &task_id]).assert().failure();
    }
}

mod agent {
    use super::*;

    #[test]
    fn status_for_unknown_task_reports_no_record() {
        let dir = init_project();

        sailing()
            .current_dir(dir.path())
            .args(["agent", "status", "T001"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No agent record"));
    }

    #[test]
    fn list_is_empty_before_any_spawn() {
        let dir = init_project();

        sailing().current_dir(dir.path()).args(["agent", "list"]).assert().success();
    }
}

mod gc {
    use super::*;

    #[test]
    fn all_is_a_no_op_on_a_fresh_project() {
        let dir = init_project();

        sailing()
            .current_dir(dir.path())
            .args(["gc", "all"])
            .assert()
            .success()
            .stdout(predicate::str::contains("removed: 0"));
    }
}

mod paths_and_state {
    use super::*;

    #[test]
    fn paths_prints_every_well_known_location() {
        let dir = init_project();

        sailing()
            .current_dir(dir.path())
            .arg("paths")
            .assert()
            .success()
            .stdout(predicate::str::contains("artefacts_dir"))
            .stdout(predicate::str::contains("haven_dir"));
    }

    #[test]
    fn state_counters_advance_as_artefacts_are_created() {
        let dir = init_project();

        sailing().current_dir(dir.path()).args(["task", "create", "First task"]).assert().success();

        sailing()
            .current_dir(dir.path())
            .arg("state")
            .assert()
            .success()
            .stdout(predicate::str::contains("T").and(predicate::str::contains("current=1")));
    }
}
