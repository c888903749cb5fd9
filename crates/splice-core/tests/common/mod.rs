//! Shared fixtures: throwaway repositories driven with the `git` binary.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::fs;
use std::process::Command;

use splice_core::FileStore;
use splice_git::{Oid, RefStore, Repository};
use tempfile::TempDir;

pub struct TestRepo {
    pub dir: TempDir,
    pub repo: Repository,
}

impl TestRepo {
    /// A repository on `main` with one commit holding `README.md`.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        run_git(&dir, &["init", "-q"]);
        run_git(&dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        run_git(&dir, &["config", "user.name", "Test User"]);
        run_git(&dir, &["config", "user.email", "test@example.com"]);
        run_git(&dir, &["config", "commit.gpgsign", "false"]);

        let repo = Repository::open(dir.path()).expect("Failed to open repository");
        let test_repo = Self { dir, repo };
        test_repo.commit("README.md", "# Test Repo\n", "Initial commit");
        test_repo
    }

    /// Run git and return trimmed stdout, panicking on failure.
    pub fn git(&self, args: &[&str]) -> String {
        run_git(&self.dir, args)
    }

    /// Write a file, stage it and commit.
    pub fn commit(&self, path: &str, content: &str, message: &str) -> Oid {
        self.write(path, content);
        self.git(&["add", "--", path]);
        self.git(&["commit", "-q", "-m", message]);
        self.head()
    }

    /// Commit as a different author.
    pub fn commit_as(&self, author: &str, path: &str, content: &str, message: &str) -> Oid {
        self.write(path, content);
        self.git(&["add", "--", path]);
        self.git(&["commit", "-q", "--author", author, "-m", message]);
        self.head()
    }

    pub fn write(&self, path: &str, content: &str) {
        let full = self.dir.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }

    pub fn read(&self, path: &str) -> String {
        fs::read_to_string(self.dir.path().join(path)).unwrap()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.dir.path().join(path).exists()
    }

    pub fn head(&self) -> Oid {
        self.rev("HEAD")
    }

    pub fn rev(&self, spec: &str) -> Oid {
        Oid::from_str(&self.git(&["rev-parse", spec])).unwrap()
    }

    /// Full message of a commit as git stores it, without the trailing newline.
    pub fn message(&self, spec: &str) -> String {
        self.git(&["log", "-1", "--format=%B", spec])
    }

    pub fn checkout(&self, branch: &str) {
        self.git(&["checkout", "-q", branch]);
    }

    pub fn branch(&self, name: &str) {
        self.git(&["branch", name]);
    }

    pub fn git_path(&self, name: &str) -> std::path::PathBuf {
        self.repo.git_dir().join(name)
    }

    pub fn store(&self) -> FileStore {
        FileStore::new(self.repo.git_dir())
    }
}

fn run_git(dir: &TempDir, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir.path())
        .env("LC_ALL", "C")
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
