//! Repository wrapper implementing the git primitives.
//!
//! Object and reference access goes through git2. Everything that mutates
//! the index or the working tree shells out to the `git` binary so that the
//! on-disk index is always the single source of truth.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use git2::{ErrorCode, Oid, Sort};

use crate::commit::{CommitRecord, Signature};
use crate::error::{Error, Result};
use crate::index::{CommandOutput, ConflictEntry, parse_unmerged_entries};
use crate::traits::{CommandRunner, ObjectAccess, RefStore, WorktreeSync};

/// High-level wrapper around a non-bare git repository.
pub struct Repository {
    inner: git2::Repository,
    workdir: PathBuf,
}

impl Repository {
    /// Open the repository containing `path`.
    ///
    /// # Errors
    /// Returns `NotARepository` if no repository is found at path or any
    /// parent, `BareRepository` if it has no working tree.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let inner = git2::Repository::discover(path).map_err(|e| match e.code() {
            ErrorCode::NotFound => Error::NotARepository,
            _ => Error::Git2(e),
        })?;
        let workdir = inner.workdir().ok_or(Error::BareRepository)?.to_path_buf();
        Ok(Self { inner, workdir })
    }

    /// Open the repository containing the current directory.
    ///
    /// # Errors
    /// Returns error if not inside a git repository.
    pub fn open_current() -> Result<Self> {
        Self::open(".")
    }

    /// Get a reference to the underlying git2 repository.
    ///
    /// Use sparingly - prefer the trait methods.
    #[must_use]
    pub const fn inner(&self) -> &git2::Repository {
        &self.inner
    }

    /// Run git and fail unless it exits successfully.
    fn run_checked(&self, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run_git(args)?;
        if output.success() {
            Ok(output)
        } else {
            Err(Error::CommandFailed {
                command: args.join(" "),
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    fn parse_oid(text: &str) -> Result<Oid> {
        Oid::from_str(text.trim()).map_err(|_| Error::UnexpectedOutput(text.to_string()))
    }
}

impl CommandRunner for Repository {
    fn run_git(&self, args: &[&str]) -> Result<CommandOutput> {
        tracing::debug!(command = %args.join(" "), "running git");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            // Output is parsed, keep it untranslated.
            .env("LC_ALL", "C")
            .output()
            .map_err(Error::Spawn)?;

        let output = CommandOutput::from(output);
        if !output.success() {
            tracing::debug!(status = output.status, stderr = %output.stderr.trim(), "git exited non-zero");
        }
        Ok(output)
    }
}

impl ObjectAccess for Repository {
    fn find_commit(&self, oid: Oid) -> Result<CommitRecord> {
        let commit = self
            .inner
            .find_commit(oid)
            .map_err(|_| Error::RefNotFound(oid.to_string()))?;
        CommitRecord::from_git2(&commit)
    }

    fn write_tree(&self) -> Result<Oid> {
        let output = self.run_checked(&["write-tree"])?;
        Self::parse_oid(&output.stdout)
    }

    fn create_commit(
        &self,
        tree: Oid,
        parents: &[Oid],
        author: &Signature,
        message: &str,
    ) -> Result<Oid> {
        let tree = self.inner.find_tree(tree)?;
        let parents = parents
            .iter()
            .map(|oid| self.inner.find_commit(*oid))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

        let author = author.to_git2()?;
        let committer = self.inner.signature()?;

        let oid = self
            .inner
            .commit(None, &author, &committer, message, &tree, &parent_refs)?;
        tracing::debug!(commit = %oid, parents = parents.len(), "created commit");
        Ok(oid)
    }

    fn commit_diff(&self, oid: Oid) -> Result<String> {
        let commit = self.find_commit(oid)?;
        let target = oid.to_string();
        let output = match commit.first_parent() {
            Some(parent) => {
                let parent = parent.to_string();
                self.run_checked(&["diff-tree", "--patch", "--binary", "--full-index", &parent, &target])?
            }
            None => self.run_checked(&[
                "diff-tree",
                "--patch",
                "--binary",
                "--full-index",
                "--no-commit-id",
                "--root",
                &target,
            ])?,
        };
        Ok(output.stdout)
    }

    fn merge_base(&self, one: Oid, two: Oid) -> Result<Oid> {
        Ok(self.inner.merge_base(one, two)?)
    }

    fn commits_between(&self, base: Oid, tip: Oid) -> Result<Vec<CommitRecord>> {
        let mut revwalk = self.inner.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        revwalk.push(tip)?;
        revwalk.hide(base)?;

        revwalk
            .map(|oid| {
                let commit = self.inner.find_commit(oid?)?;
                CommitRecord::from_git2(&commit)
            })
            .collect()
    }

    fn read_blob(&self, oid: Oid) -> Result<Vec<u8>> {
        Ok(self.inner.find_blob(oid)?.content().to_vec())
    }

    fn default_signature(&self) -> Result<Signature> {
        Signature::from_git2(&self.inner.signature()?)
    }
}

impl RefStore for Repository {
    fn git_dir(&self) -> &Path {
        self.inner.path()
    }

    fn workdir(&self) -> Result<&Path> {
        Ok(&self.workdir)
    }

    fn resolve(&self, spec: &str) -> Result<Oid> {
        let object = self
            .inner
            .revparse_single(spec)
            .map_err(|_| Error::RefNotFound(spec.to_string()))?;
        let commit = object
            .peel_to_commit()
            .map_err(|_| Error::RefNotFound(spec.to_string()))?;
        Ok(commit.id())
    }

    fn head_commit(&self) -> Result<Oid> {
        match self.inner.head() {
            Ok(head) => Ok(head.peel_to_commit()?.id()),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                Err(Error::UnbornHead)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn has_commits(&self) -> bool {
        self.head_commit().is_ok()
    }

    fn current_branch_ref(&self) -> Result<String> {
        let head = self.inner.find_reference("HEAD")?;
        head.symbolic_target()
            .map(String::from)
            .ok_or(Error::DetachedHead)
    }

    fn update_head(&self, oid: Oid) -> Result<()> {
        match self.current_branch_ref() {
            Ok(branch) => self.update_ref(&branch, oid),
            Err(Error::DetachedHead) => self.detach_head(oid),
            Err(e) => Err(e),
        }
    }

    fn update_ref(&self, name: &str, oid: Oid) -> Result<()> {
        self.inner
            .reference(name, oid, true, &format!("splice: update {name}"))?;
        tracing::debug!(reference = name, target = %oid, "updated reference");
        Ok(())
    }

    fn attach_head(&self, ref_name: &str) -> Result<()> {
        self.inner.set_head(ref_name)?;
        Ok(())
    }

    fn detach_head(&self, oid: Oid) -> Result<()> {
        self.inner.set_head_detached(oid)?;
        Ok(())
    }

    fn set_orig_head(&self, oid: Oid) -> Result<()> {
        fs::write(self.git_dir().join("ORIG_HEAD"), format!("{oid}\n"))?;
        Ok(())
    }
}

impl WorktreeSync for Repository {
    fn reset_index_to_tree(&self, commit: Oid) -> Result<()> {
        self.run_checked(&["read-tree", "--reset", "-u", &commit.to_string()])?;
        Ok(())
    }

    fn checkout_index(&self, force: bool) -> Result<()> {
        if force {
            self.run_checked(&["checkout-index", "--all", "--force"])?;
        } else {
            self.run_checked(&["checkout-index", "--all"])?;
        }
        Ok(())
    }

    fn stage_path(&self, path: &str) -> Result<()> {
        self.run_checked(&["add", "--", path])?;
        Ok(())
    }

    fn apply_patch_to_index(&self, patch: &Path) -> Result<CommandOutput> {
        let patch = patch.to_string_lossy();
        self.run_git(&["apply", "--cached", "--3way", &patch])
    }

    fn merge_trees_into_index(&self, base: Oid, ours: Oid, theirs: Oid) -> Result<()> {
        self.run_checked(&[
            "read-tree",
            "-m",
            &base.to_string(),
            &ours.to_string(),
            &theirs.to_string(),
        ])?;
        Ok(())
    }

    fn unmerged_entries(&self) -> Result<Vec<ConflictEntry>> {
        let output = self.run_checked(&["ls-files", "--unmerged", "-z"])?;
        parse_unmerged_entries(&output.stdout)
    }

    fn has_staged_changes(&self) -> Result<bool> {
        if !self.has_commits() {
            let output = self.run_checked(&["ls-files", "--cached"])?;
            return Ok(!output.stdout.trim().is_empty());
        }

        let output = self.run_checked(&["diff", "--cached", "--name-only"])?;
        Ok(!output.stdout.trim().is_empty())
    }

    fn is_dirty(&self) -> Result<bool> {
        let output = self.run_checked(&["status", "--porcelain", "--untracked-files=no"])?;
        Ok(!output.stdout.trim().is_empty())
    }

    fn clear_index(&self) -> Result<()> {
        self.run_checked(&["read-tree", "--empty"])?;
        Ok(())
    }

    fn merge_file(
        &self,
        ours: &Path,
        base: &Path,
        theirs: &Path,
        labels: [&str; 3],
    ) -> Result<usize> {
        let [ours_label, base_label, theirs_label] = labels;
        let (ours, base, theirs) = (
            ours.to_string_lossy(),
            base.to_string_lossy(),
            theirs.to_string_lossy(),
        );
        let args = [
            "merge-file",
            "-L",
            ours_label,
            "-L",
            base_label,
            "-L",
            theirs_label,
            &ours,
            &base,
            &theirs,
        ];

        // Exit status is the number of conflicts; negative values wrap above 127.
        let output = self.run_git(&args)?;
        match usize::try_from(output.status) {
            Ok(conflicts) if conflicts < 128 => Ok(conflicts),
            _ => Err(Error::CommandFailed {
                command: args.join(" "),
                stderr: output.stderr.trim().to_string(),
            }),
        }
    }

    fn hard_reset(&self, oid: Oid) -> Result<()> {
        self.run_checked(&["reset", "--hard", "--quiet", &oid.to_string()])?;
        Ok(())
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("path", &self.git_dir())
            .finish()
    }
}
