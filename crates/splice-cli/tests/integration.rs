//! Integration tests for the splice CLI.
//!
//! These tests verify the CLI commands work correctly end-to-end.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::process::Command as StdCommand;
use tempfile::TempDir;

/// Run git in `dir` and return trimmed stdout.
fn git(dir: &TempDir, args: &[&str]) -> String {
    let output = StdCommand::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Helper to create a git repository on `main` in a temp directory.
fn setup_git_repo() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp dir");

    git(&temp, &["init", "-q"]);
    git(&temp, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(&temp, &["config", "user.email", "test@example.com"]);
    git(&temp, &["config", "user.name", "Test User"]);
    git(&temp, &["config", "commit.gpgsign", "false"]);

    git_commit(&temp, "README.md", "# Test Repo\n", "Initial commit");
    temp
}

/// Helper to write a file and commit it.
fn git_commit(dir: &TempDir, path: &str, content: &str, msg: &str) {
    fs::write(dir.path().join(path), content).expect("Failed to write file");
    git(dir, &["add", "--", path]);
    git(dir, &["commit", "-q", "-m", msg]);
}

/// `feature` and `main` both rewrite `shared.txt`; `feature` is checked out.
fn setup_conflict() -> TempDir {
    let temp = setup_git_repo();
    git_commit(&temp, "shared.txt", "base\n", "Add shared");
    git(&temp, &["checkout", "-q", "-b", "feature"]);
    git_commit(&temp, "shared.txt", "feature\n", "Feature change");
    git(&temp, &["checkout", "-q", "main"]);
    git_commit(&temp, "shared.txt", "main\n", "Main change");
    git(&temp, &["checkout", "-q", "feature"]);
    temp
}

/// Helper to get splice command.
fn splice() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_splice"));
    cmd.env_remove("SPLICE_LOG");
    cmd
}

// ============================================================================
// Basic CLI tests
// ============================================================================

#[test]
fn test_version_flag() {
    splice()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("splice"));
}

#[test]
fn test_help_flag() {
    splice()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("rebase"))
        .stdout(predicate::str::contains("cherry-pick"))
        .stdout(predicate::str::contains("merge"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_no_subcommand_shows_help() {
    splice()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_not_in_git_repo() {
    let temp = TempDir::new().unwrap();
    // Only meaningful when no parent directory is a repository.
    if inside_repository(&temp) {
        return;
    }

    splice()
        .arg("status")
        .current_dir(&temp)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not inside a git repository"));
}

fn inside_repository(dir: &TempDir) -> bool {
    StdCommand::new("git")
        .args(["rev-parse", "--git-dir"])
        .current_dir(dir)
        .output()
        .is_ok_and(|o| o.status.success())
}

// ============================================================================
// Status command tests
// ============================================================================

#[test]
fn test_status_idle() {
    let temp = setup_git_repo();

    splice()
        .arg("status")
        .current_dir(&temp)
        .assert()
        .success()
        .stdout(predicate::str::contains("main"))
        .stdout(predicate::str::contains("No operation in progress"));
}

#[test]
fn test_status_json_during_rebase() {
    let temp = setup_conflict();

    splice()
        .args(["rebase", "main"])
        .current_dir(&temp)
        .assert()
        .failure();

    let output = splice()
        .args(["status", "--json"])
        .current_dir(&temp)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["operation"]["kind"], "rebase");
    assert_eq!(json["operation"]["branch"], "feature");
    assert_eq!(json["operation"]["remaining"], 0);
    assert_eq!(json["conflicts"][0], "shared.txt");
    assert!(json["branch"].is_null());
}

// ============================================================================
// Rebase command tests
// ============================================================================

#[test]
fn test_rebase_clean() {
    let temp = setup_git_repo();
    git(&temp, &["checkout", "-q", "-b", "feature"]);
    git_commit(&temp, "a.txt", "a\n", "Add a");
    git(&temp, &["checkout", "-q", "main"]);
    git_commit(&temp, "b.txt", "b\n", "Add b");
    git(&temp, &["checkout", "-q", "feature"]);

    splice()
        .args(["rebase", "main"])
        .current_dir(&temp)
        .assert()
        .success()
        .stdout(predicate::str::contains("Rebase complete"));

    assert_eq!(git(&temp, &["rev-parse", "feature~1"]), git(&temp, &["rev-parse", "main"]));
    assert_eq!(git(&temp, &["symbolic-ref", "HEAD"]), "refs/heads/feature");
}

#[test]
fn test_rebase_todo_only_prints_picks() {
    let temp = setup_git_repo();
    git(&temp, &["checkout", "-q", "-b", "feature"]);
    git_commit(&temp, "a.txt", "a\n", "Add a");
    git_commit(&temp, "b.txt", "b\n", "Add b");
    let a = git(&temp, &["rev-parse", "HEAD~1"]);

    splice()
        .args(["rebase", "--todo-only", "main"])
        .current_dir(&temp)
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("pick {a} Add a\npick ")))
        .stdout(predicate::str::contains("Add b"));

    assert!(!temp.path().join(".git/rebase-merge").exists());
}

#[test]
fn test_rebase_with_todo_file() {
    let temp = setup_git_repo();
    git(&temp, &["checkout", "-q", "-b", "feature"]);
    git_commit(&temp, "a.txt", "a\n", "Add a");
    git_commit(&temp, "a.txt", "a\nmore\n", "More a");
    git(&temp, &["checkout", "-q", "main"]);
    git_commit(&temp, "b.txt", "b\n", "Add b");
    git(&temp, &["checkout", "-q", "feature"]);

    let a = git(&temp, &["rev-parse", "--short", "HEAD~1"]);
    let more = git(&temp, &["rev-parse", "--short", "HEAD"]);
    let todo = temp.path().join("todo.txt");
    fs::write(&todo, format!("# squash everything\np {a} Add a\nf {more} More a\n")).unwrap();

    splice()
        .args(["rebase", "main", "--todo"])
        .arg(&todo)
        .current_dir(&temp)
        .assert()
        .success();

    assert_eq!(git(&temp, &["rev-list", "--count", "main..feature"]), "1");
    assert_eq!(git(&temp, &["log", "-1", "--format=%s"]), "Add a");
    assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "a\nmore\n");
}

#[test]
fn test_rebase_conflict_continue() {
    let temp = setup_conflict();

    splice()
        .args(["rebase", "main"])
        .current_dir(&temp)
        .assert()
        .failure()
        .stderr(predicate::str::contains("shared.txt"))
        .stdout(predicate::str::contains("splice rebase --continue"));

    // A second operation is refused while the rebase is stopped.
    splice()
        .args(["merge", "main"])
        .current_dir(&temp)
        .assert()
        .failure()
        .stderr(predicate::str::contains("A rebase is in progress"));

    fs::write(temp.path().join("shared.txt"), "resolved\n").unwrap();
    git(&temp, &["add", "shared.txt"]);

    splice()
        .args(["rebase", "--continue"])
        .current_dir(&temp)
        .assert()
        .success()
        .stdout(predicate::str::contains("Rebase complete"));

    assert_eq!(git(&temp, &["log", "-1", "--format=%s", "feature"]), "Feature change");
}

#[test]
fn test_rebase_abort() {
    let temp = setup_conflict();
    let before = git(&temp, &["rev-parse", "feature"]);

    splice()
        .args(["rebase", "main"])
        .current_dir(&temp)
        .assert()
        .failure();

    splice()
        .args(["rebase", "--abort"])
        .current_dir(&temp)
        .assert()
        .success()
        .stdout(predicate::str::contains("Rebase aborted"));

    assert_eq!(git(&temp, &["rev-parse", "feature"]), before);
    assert_eq!(fs::read_to_string(temp.path().join("shared.txt")).unwrap(), "feature\n");

    splice()
        .args(["rebase", "--abort"])
        .current_dir(&temp)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No rebase in progress"));
}

#[test]
fn test_rebase_continue_and_abort_conflict() {
    let temp = setup_git_repo();

    splice()
        .args(["rebase", "--continue", "--abort"])
        .current_dir(&temp)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot use --continue and --abort together"));
}

// ============================================================================
// Cherry-pick command tests
// ============================================================================

#[test]
fn test_cherry_pick() {
    let temp = setup_git_repo();
    git(&temp, &["checkout", "-q", "-b", "topic"]);
    git_commit(&temp, "topic.txt", "topic\n", "Add topic");
    git(&temp, &["checkout", "-q", "main"]);

    splice()
        .args(["cherry-pick", "topic"])
        .current_dir(&temp)
        .assert()
        .success()
        .stdout(predicate::str::contains("Committed"));

    assert_eq!(git(&temp, &["log", "-1", "--format=%s", "main"]), "Add topic");
}

#[test]
fn test_cherry_pick_empty_then_commit_empty() {
    let temp = setup_git_repo();
    git(&temp, &["checkout", "-q", "-b", "topic"]);
    git(&temp, &["commit", "-q", "--allow-empty", "-m", "Nothing"]);
    git(&temp, &["checkout", "-q", "main"]);

    splice()
        .args(["cherry-pick", "topic"])
        .current_dir(&temp)
        .assert()
        .failure()
        .stderr(predicate::str::contains("is empty"));
    assert!(temp.path().join(".git/CHERRY_PICK_HEAD").exists());

    splice()
        .args(["cherry-pick", "--commit-empty"])
        .current_dir(&temp)
        .assert()
        .success();
    assert_eq!(git(&temp, &["log", "-1", "--format=%s"]), "Nothing");
    assert!(!temp.path().join(".git/CHERRY_PICK_HEAD").exists());
}

#[test]
fn test_cherry_pick_empty_drop_flag() {
    let temp = setup_git_repo();
    git(&temp, &["checkout", "-q", "-b", "topic"]);
    git(&temp, &["commit", "-q", "--allow-empty", "-m", "Nothing"]);
    git(&temp, &["checkout", "-q", "main"]);
    let before = git(&temp, &["rev-parse", "HEAD"]);

    splice()
        .args(["cherry-pick", "topic", "--empty", "drop"])
        .current_dir(&temp)
        .assert()
        .success()
        .stdout(predicate::str::contains("dropped"));
    assert_eq!(git(&temp, &["rev-parse", "HEAD"]), before);
}

#[test]
fn test_cherry_pick_empty_strategy_from_config() {
    let temp = setup_git_repo();
    git(&temp, &["checkout", "-q", "-b", "topic"]);
    git(&temp, &["commit", "-q", "--allow-empty", "-m", "Nothing"]);
    git(&temp, &["checkout", "-q", "main"]);

    fs::create_dir_all(temp.path().join(".git/splice")).unwrap();
    fs::write(
        temp.path().join(".git/splice/config.toml"),
        "[cherry_pick]\nempty = \"keep\"\n",
    )
    .unwrap();

    splice()
        .args(["cherry-pick", "topic"])
        .current_dir(&temp)
        .assert()
        .success();
    assert_eq!(git(&temp, &["log", "-1", "--format=%s"]), "Nothing");
}

#[test]
fn test_cherry_pick_invalid_empty_strategy() {
    let temp = setup_git_repo();

    splice()
        .args(["cherry-pick", "HEAD", "--empty", "sometimes"])
        .current_dir(&temp)
        .assert()
        .failure()
        .stderr(predicate::str::contains("sometimes"));
}

// ============================================================================
// Merge command tests
// ============================================================================

#[test]
fn test_merge_fast_forward() {
    let temp = setup_git_repo();
    git(&temp, &["checkout", "-q", "-b", "topic"]);
    git_commit(&temp, "topic.txt", "topic\n", "Add topic");
    git(&temp, &["checkout", "-q", "main"]);

    splice()
        .args(["merge", "topic"])
        .current_dir(&temp)
        .assert()
        .success()
        .stdout(predicate::str::contains("Fast-forwarded"));

    assert_eq!(git(&temp, &["rev-parse", "main"]), git(&temp, &["rev-parse", "topic"]));
}

#[test]
fn test_merge_ff_only_refuses_divergence() {
    let temp = setup_conflict();
    git(&temp, &["checkout", "-q", "main"]);

    splice()
        .args(["merge", "feature", "--ff-only"])
        .current_dir(&temp)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not possible to fast-forward"));
}

#[test]
fn test_merge_conflict_continue() {
    let temp = setup_conflict();
    git(&temp, &["checkout", "-q", "main"]);

    splice()
        .args(["merge", "feature", "--no-ff", "-m", "Bring in feature"])
        .current_dir(&temp)
        .assert()
        .failure()
        .stderr(predicate::str::contains("shared.txt"));
    assert!(temp.path().join(".git/MERGE_HEAD").exists());

    fs::write(temp.path().join("shared.txt"), "both\n").unwrap();
    git(&temp, &["add", "shared.txt"]);

    splice()
        .args(["merge", "--continue"])
        .current_dir(&temp)
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged"));

    assert_eq!(git(&temp, &["log", "-1", "--format=%s"]), "Bring in feature");
    assert_eq!(git(&temp, &["rev-parse", "HEAD^2"]), git(&temp, &["rev-parse", "feature"]));
}

#[test]
fn test_merge_default_message_from_config() {
    let temp = setup_git_repo();
    git(&temp, &["checkout", "-q", "-b", "topic"]);
    git_commit(&temp, "topic.txt", "topic\n", "Add topic");
    git(&temp, &["checkout", "-q", "main"]);

    fs::create_dir_all(temp.path().join(".git/splice")).unwrap();
    fs::write(
        temp.path().join(".git/splice/config.toml"),
        "[merge]\nmessage = \"Integrate {source}\"\n",
    )
    .unwrap();

    splice()
        .args(["merge", "topic", "--no-ff"])
        .current_dir(&temp)
        .assert()
        .success();
    assert_eq!(git(&temp, &["log", "-1", "--format=%s"]), "Integrate topic");
}

#[test]
fn test_merge_repeated_message_adds_body() {
    let temp = setup_git_repo();
    git(&temp, &["checkout", "-q", "-b", "topic"]);
    git_commit(&temp, "topic.txt", "topic\n", "Add topic");
    git(&temp, &["checkout", "-q", "main"]);

    splice()
        .args(["merge", "topic", "--no-ff", "-m", "Bring in topic", "-m", "Adds topic.txt."])
        .current_dir(&temp)
        .assert()
        .success();

    assert_eq!(
        git(&temp, &["log", "-1", "--format=%B"]),
        "Bring in topic\n\nAdds topic.txt."
    );
}

#[test]
fn test_merge_refuses_dirty_worktree() {
    let temp = setup_git_repo();
    git(&temp, &["checkout", "-q", "-b", "topic"]);
    git_commit(&temp, "topic.txt", "topic\n", "Add topic");
    git(&temp, &["checkout", "-q", "main"]);
    fs::write(temp.path().join("README.md"), "# Edited\n").unwrap();
    let before = git(&temp, &["rev-parse", "main"]);

    splice()
        .args(["merge", "topic"])
        .current_dir(&temp)
        .assert()
        .failure()
        .stderr(predicate::str::contains("local changes"));

    assert_eq!(git(&temp, &["rev-parse", "main"]), before);
    assert_eq!(
        fs::read_to_string(temp.path().join("README.md")).unwrap(),
        "# Edited\n"
    );
}

#[test]
fn test_merge_abort() {
    let temp = setup_conflict();
    git(&temp, &["checkout", "-q", "main"]);

    splice()
        .args(["merge", "feature"])
        .current_dir(&temp)
        .assert()
        .failure();

    splice()
        .args(["merge", "--abort"])
        .current_dir(&temp)
        .assert()
        .success();

    assert!(!temp.path().join(".git/MERGE_HEAD").exists());
    assert_eq!(fs::read_to_string(temp.path().join("shared.txt")).unwrap(), "main\n");
}

// ============================================================================
// Completions
// ============================================================================

#[test]
fn test_completions_bash() {
    splice()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("splice"));
}
