//! Trait abstractions for git primitives.
//!
//! The sequencers never talk to git directly. They go through these four
//! narrow collaborators, which keeps every primitive a single command with
//! no state of its own and lets callers substitute implementations.

use std::path::Path;

use git2::Oid;

use crate::Result;
use crate::commit::{CommitRecord, Signature};
use crate::index::{CommandOutput, ConflictEntry};

/// Opaque execution of git subprocesses.
#[allow(clippy::missing_errors_doc)]
pub trait CommandRunner {
    /// Run `git <args>` in the working directory and capture its output.
    ///
    /// A non-zero exit status is not an error; callers inspect
    /// [`CommandOutput::status`]. Only a failure to spawn is reported as `Err`.
    fn run_git(&self, args: &[&str]) -> Result<CommandOutput>;
}

/// Object database access: commits, trees, blobs and diffs.
#[allow(clippy::missing_errors_doc)]
pub trait ObjectAccess {
    /// Read a commit's metadata.
    fn find_commit(&self, oid: Oid) -> Result<CommitRecord>;

    /// Write the current index as a tree object.
    ///
    /// Fails while the index holds unmerged entries.
    fn write_tree(&self) -> Result<Oid>;

    /// Create a commit object without moving any reference.
    ///
    /// The committer identity comes from the repository configuration.
    fn create_commit(
        &self,
        tree: Oid,
        parents: &[Oid],
        author: &Signature,
        message: &str,
    ) -> Result<Oid>;

    /// Patch text introduced by a commit relative to its first parent.
    ///
    /// Empty when the commit does not change any file.
    fn commit_diff(&self, oid: Oid) -> Result<String>;

    /// Best common ancestor of two commits.
    fn merge_base(&self, one: Oid, two: Oid) -> Result<Oid>;

    /// Commits reachable from `tip` but not from `base`, oldest first.
    fn commits_between(&self, base: Oid, tip: Oid) -> Result<Vec<CommitRecord>>;

    /// Raw content of a blob.
    fn read_blob(&self, oid: Oid) -> Result<Vec<u8>>;

    /// Identity from the repository configuration, stamped with the
    /// current time.
    fn default_signature(&self) -> Result<Signature>;
}

/// Named pointers: branches, HEAD and friends.
#[allow(clippy::missing_errors_doc)]
pub trait RefStore {
    /// Path to the repository metadata directory (`.git`).
    fn git_dir(&self) -> &Path;

    /// Path to the working tree root.
    fn workdir(&self) -> Result<&Path>;

    /// Resolve a branch name, full ref name, `HEAD` or hash to a commit.
    fn resolve(&self, spec: &str) -> Result<Oid>;

    /// Commit HEAD points at.
    fn head_commit(&self) -> Result<Oid>;

    /// Whether HEAD points at a commit at all (false on an unborn branch).
    fn has_commits(&self) -> bool;

    /// Full ref name of the checked-out branch (`refs/heads/...`).
    fn current_branch_ref(&self) -> Result<String>;

    /// Move whatever HEAD points at: the checked-out branch, or HEAD itself
    /// when detached.
    fn update_head(&self, oid: Oid) -> Result<()>;

    /// Point a reference at a commit, creating it if needed.
    fn update_ref(&self, name: &str, oid: Oid) -> Result<()>;

    /// Make HEAD a symbolic reference to `ref_name`.
    fn attach_head(&self, ref_name: &str) -> Result<()>;

    /// Detach HEAD at a commit. Index and working tree are left alone.
    fn detach_head(&self, oid: Oid) -> Result<()>;

    /// Record the commit HEAD pointed at before a history-changing operation.
    fn set_orig_head(&self, oid: Oid) -> Result<()>;
}

/// Index and working tree synchronization.
#[allow(clippy::missing_errors_doc)]
pub trait WorktreeSync {
    /// Load a commit's tree into the index and update the working tree,
    /// discarding unmerged entries.
    fn reset_index_to_tree(&self, commit: Oid) -> Result<()>;

    /// Copy index content into the working tree.
    fn checkout_index(&self, force: bool) -> Result<()>;

    /// Stage a path from the working tree.
    fn stage_path(&self, path: &str) -> Result<()>;

    /// Apply a patch file to the index, falling back to a three-way merge.
    ///
    /// The raw output is returned so the caller can classify the result.
    fn apply_patch_to_index(&self, patch: &Path) -> Result<CommandOutput>;

    /// Three-way merge of trees into the index (`read-tree -m`).
    fn merge_trees_into_index(&self, base: Oid, ours: Oid, theirs: Oid) -> Result<()>;

    /// Unmerged index entries, all stages.
    fn unmerged_entries(&self) -> Result<Vec<ConflictEntry>>;

    /// Whether the index differs from the HEAD tree.
    fn has_staged_changes(&self) -> Result<bool>;

    /// Whether tracked files differ from HEAD in the index or the working
    /// tree. Untracked files don't count.
    fn is_dirty(&self) -> Result<bool>;

    /// Empty the index. Used on a branch with no commits, where there is no
    /// tree to reset to.
    fn clear_index(&self) -> Result<()>;

    /// Three-way textual merge of files, rewriting `ours` in place with
    /// conflict markers labelled by `labels` (ours, ancestor, theirs).
    ///
    /// Returns the number of conflicting hunks.
    fn merge_file(
        &self,
        ours: &Path,
        base: &Path,
        theirs: &Path,
        labels: [&str; 3],
    ) -> Result<usize>;

    /// Reset index, working tree and HEAD to a commit, recording `ORIG_HEAD`.
    fn hard_reset(&self, oid: Oid) -> Result<()>;
}

/// Everything a sequencer needs from git.
pub trait GitOps: CommandRunner + ObjectAccess + RefStore + WorktreeSync {}

impl<T> GitOps for T where T: CommandRunner + ObjectAccess + RefStore + WorktreeSync {}
