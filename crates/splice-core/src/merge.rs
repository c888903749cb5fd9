//! Two-branch merges: fast-forward or a real merge commit.

use splice_git::{GitOps, Oid, join_message};

use crate::apply::HEAD_LABEL;
use crate::conflict::{ConflictMaterializer, conflicted_paths};
use crate::error::{Error, Result};
use crate::state::MergeState;
use crate::store::SequenceStore;

/// Mode tag written to `MERGE_MODE`.
const NO_FF_MODE: &str = "no-ff";

/// Result of a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The source is already contained in the target; carries the
    /// unchanged target tip.
    NothingToMerge(Oid),
    /// The target moved to the source tip.
    FastForward(Oid),
    /// A two-parent merge commit was created.
    Merged(Oid),
    /// A fast-forward was requested but the branches have diverged.
    Diverged,
    /// Tracked files have uncommitted changes; nothing was touched.
    DirtyWorktree,
    /// The merge stopped on conflicts; `MERGE_HEAD` is set.
    Conflict { paths: Vec<String> },
}

/// Merges branches on top of the index primitives.
pub struct MergeSequencer<'a, G: GitOps, S: SequenceStore> {
    git: &'a G,
    store: &'a S,
}

impl<'a, G: GitOps, S: SequenceStore> MergeSequencer<'a, G, S> {
    /// Create a new merge sequencer.
    #[must_use]
    pub const fn new(git: &'a G, store: &'a S) -> Self {
        Self { git, store }
    }

    /// Whether a merge stopped on conflicts.
    ///
    /// # Errors
    /// Returns error if the markers can't be read.
    pub fn is_in_progress(&self) -> Result<bool> {
        Ok(self.store.merge_state()?.is_some())
    }

    /// Whether the index holds unmerged entries.
    ///
    /// # Errors
    /// Returns error if the index can't be read.
    pub fn has_conflicts(&self) -> Result<bool> {
        Ok(!self.git.unmerged_entries()?.is_empty())
    }

    /// Whether `target` can be fast-forwarded to `source`.
    ///
    /// # Errors
    /// Returns error if either name does not resolve.
    pub fn can_fast_forward(&self, source: &str, target: Option<&str>) -> Result<bool> {
        let (source_tip, target_tip, base) = self.tips(source, target)?;
        Ok(base == target_tip && base != source_tip)
    }

    /// Whether `source` has commits that `target` lacks.
    ///
    /// # Errors
    /// Returns error if either name does not resolve.
    pub fn is_anything_to_merge(&self, source: &str, target: Option<&str>) -> Result<bool> {
        let (source_tip, _, base) = self.tips(source, target)?;
        Ok(base != source_tip)
    }

    /// Fast-forward `target` (HEAD when `None`) to `source`.
    ///
    /// When the target is the checked-out branch the index and working tree
    /// are hard-reset; any other branch only has its ref moved.
    ///
    /// # Errors
    /// Returns error if either name does not resolve or the reset fails.
    pub fn merge_fast_forward(&self, source: &str, target: Option<&str>) -> Result<MergeOutcome> {
        if self.git.is_dirty()? {
            return Ok(MergeOutcome::DirtyWorktree);
        }

        let (source_tip, target_tip, base) = self.tips(source, target)?;

        if base == source_tip {
            return Ok(MergeOutcome::NothingToMerge(target_tip));
        }
        if base != target_tip {
            tracing::info!(source, "cannot fast-forward, branches diverged");
            return Ok(MergeOutcome::Diverged);
        }

        match self.branch_ref(target)? {
            Some(reference) => self.git.update_ref(&reference, source_tip)?,
            None => {
                self.git.set_orig_head(target_tip)?;
                self.git.hard_reset(source_tip)?;
            }
        }

        tracing::info!(source, target = %source_tip, "fast-forwarded");
        Ok(MergeOutcome::FastForward(source_tip))
    }

    /// Merge `source` into HEAD with a merge commit, even when a
    /// fast-forward would be possible.
    ///
    /// A non-blank `description` becomes the message body.
    ///
    /// # Errors
    /// Returns error if `source` does not resolve or a git operation fails.
    pub fn merge_no_fast_forward(
        &self,
        source: &str,
        message: &str,
        description: Option<&str>,
    ) -> Result<MergeOutcome> {
        if self.git.is_dirty()? {
            return Ok(MergeOutcome::DirtyWorktree);
        }

        let message = join_message(message.trim(), description.map_or("", str::trim));
        let head = self.git.head_commit()?;
        let source_tip = self.git.resolve(source)?;
        let base = self.git.merge_base(head, source_tip)?;

        if base == source_tip {
            return Ok(MergeOutcome::NothingToMerge(head));
        }

        self.git.set_orig_head(head)?;
        self.git.merge_trees_into_index(base, head, source_tip)?;
        self.git.checkout_index(true)?;

        let entries = self.git.unmerged_entries()?;
        if !entries.is_empty() {
            self.store.save_merge_state(&MergeState {
                head: source_tip,
                mode: NO_FF_MODE.to_string(),
                message: message.clone(),
            })?;

            let files =
                ConflictMaterializer::new(self.git).materialize(&entries, HEAD_LABEL, source)?;

            // Both sides touched these paths but the textual merge is clean.
            let mut paths = Vec::new();
            for file in files {
                if file.conflicts == 0 {
                    self.git.stage_path(&file.path)?;
                } else {
                    paths.push(file.path);
                }
            }

            if !paths.is_empty() {
                tracing::info!(source, files = paths.len(), "merge stopped on conflicts");
                return Ok(MergeOutcome::Conflict { paths });
            }
            self.store.clear_merge_state()?;
        }

        let merged = self.commit_merge(head, source_tip, &message)?;
        Ok(MergeOutcome::Merged(merged))
    }

    /// Create the merge commit once every conflict is resolved.
    ///
    /// # Errors
    /// Returns `NoSequenceInProgress` without a stopped merge.
    pub fn continue_merge(&self) -> Result<MergeOutcome> {
        let state = self
            .store
            .merge_state()?
            .ok_or(Error::NoSequenceInProgress("merge"))?;

        let entries = self.git.unmerged_entries()?;
        if !entries.is_empty() {
            return Ok(MergeOutcome::Conflict {
                paths: conflicted_paths(&entries),
            });
        }

        let head = self.git.head_commit()?;
        let merged = self.commit_merge(head, state.head, &state.message)?;
        self.store.clear_merge_state()?;
        Ok(MergeOutcome::Merged(merged))
    }

    /// Reset index and working tree to HEAD and forget the stopped merge.
    ///
    /// Does nothing when no merge is in progress.
    ///
    /// # Errors
    /// Returns error if the reset fails.
    pub fn abort_merge(&self) -> Result<()> {
        if self.store.merge_state()?.is_none() {
            return Ok(());
        }

        let head = self.git.head_commit()?;
        self.git.reset_index_to_tree(head)?;
        self.git.checkout_index(true)?;
        self.store.clear_merge_state()?;
        tracing::info!("merge aborted");
        Ok(())
    }

    fn commit_merge(&self, head: Oid, source_tip: Oid, message: &str) -> Result<Oid> {
        let tree = self.git.write_tree()?;
        let author = self.git.default_signature()?;
        let merged = self
            .git
            .create_commit(tree, &[head, source_tip], &author, message)?;
        self.git.update_head(merged)?;
        tracing::debug!(%merged, "created merge commit");
        Ok(merged)
    }

    /// Source tip, target tip and their merge base.
    fn tips(&self, source: &str, target: Option<&str>) -> Result<(Oid, Oid, Oid)> {
        let source_tip = self.git.resolve(source)?;
        let target_tip = self.git.resolve(target.unwrap_or("HEAD"))?;
        let base = self.git.merge_base(source_tip, target_tip)?;
        Ok((source_tip, target_tip, base))
    }

    /// Full ref name of a target branch that is not checked out. `None`
    /// means the target is HEAD.
    fn branch_ref(&self, target: Option<&str>) -> Result<Option<String>> {
        let Some(target) = target.filter(|t| *t != "HEAD") else {
            return Ok(None);
        };

        let reference = if target.starts_with("refs/") {
            target.to_string()
        } else {
            format!("refs/heads/{target}")
        };

        match self.git.current_branch_ref() {
            Ok(current) if current == reference => Ok(None),
            Ok(_) | Err(splice_git::Error::DetachedHead) => Ok(Some(reference)),
            Err(e) => Err(e.into()),
        }
    }
}
