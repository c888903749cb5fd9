//! Standalone replay of a single commit onto HEAD.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use splice_git::{CommitRecord, GitOps, Oid};

use crate::apply::{ApplyOutcome, DiffApplier};
use crate::conflict::conflicted_paths;
use crate::error::{Error, Result};
use crate::store::SequenceStore;

/// What to do with a picked commit that brings no changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyStrategy {
    /// Leave `CHERRY_PICK_HEAD` behind and let the caller decide.
    #[default]
    Stop,
    /// Skip the commit.
    Drop,
    /// Record an empty commit.
    Keep,
}

impl EmptyStrategy {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Drop => "drop",
            Self::Keep => "keep",
        }
    }
}

impl FromStr for EmptyStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stop" => Ok(Self::Stop),
            "drop" => Ok(Self::Drop),
            "keep" => Ok(Self::Keep),
            _ => Err(Error::InvalidSetting {
                name: "empty",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for EmptyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a cherry-pick step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CherryPickOutcome {
    /// A new commit was created and HEAD moved to it.
    Committed(Oid),
    /// The commit brought no changes and was skipped.
    Dropped,
    /// The commit brought no changes; `CHERRY_PICK_HEAD` names it.
    Empty(Oid),
    /// The replay stopped on conflicts.
    Conflict { commit: Oid, paths: Vec<String> },
}

/// Cherry-picks commits using the diff applier.
pub struct CherryPickSequencer<'a, G: GitOps, S: SequenceStore> {
    git: &'a G,
    store: &'a S,
}

impl<'a, G: GitOps, S: SequenceStore> CherryPickSequencer<'a, G, S> {
    /// Create a new cherry-pick sequencer.
    #[must_use]
    pub const fn new(git: &'a G, store: &'a S) -> Self {
        Self { git, store }
    }

    /// Whether a cherry-pick is waiting to be committed.
    ///
    /// # Errors
    /// Returns error if the marker can't be read.
    pub fn is_in_progress(&self) -> Result<bool> {
        Ok(self.store.cherry_pick_head()?.is_some())
    }

    /// Apply `commit` on top of HEAD and commit the result with the original
    /// author.
    ///
    /// # Errors
    /// Returns error if the commit can't be read, the patch is rejected, or
    /// any git operation fails.
    pub fn cherry_pick(&self, commit: Oid, empty: EmptyStrategy) -> Result<CherryPickOutcome> {
        let record = self.git.find_commit(commit)?;
        if let Ok(head) = self.git.head_commit() {
            self.git.set_orig_head(head)?;
        }
        tracing::debug!(%commit, %empty, "cherry-picking");

        match DiffApplier::new(self.git).apply(commit)? {
            ApplyOutcome::Applied => Ok(CherryPickOutcome::Committed(self.commit_picked(&record)?)),
            ApplyOutcome::EmptyDiff | ApplyOutcome::NoChanges => match empty {
                EmptyStrategy::Drop => {
                    tracing::info!(%commit, "dropped empty cherry-pick");
                    Ok(CherryPickOutcome::Dropped)
                }
                EmptyStrategy::Keep => {
                    Ok(CherryPickOutcome::Committed(self.commit_picked(&record)?))
                }
                EmptyStrategy::Stop => {
                    self.store.set_cherry_pick_head(commit)?;
                    tracing::info!(%commit, "cherry-pick is empty");
                    Ok(CherryPickOutcome::Empty(commit))
                }
            },
            ApplyOutcome::Conflict(files) => {
                self.store.set_cherry_pick_head(commit)?;
                Ok(CherryPickOutcome::Conflict {
                    commit,
                    paths: files.into_iter().map(|file| file.path).collect(),
                })
            }
        }
    }

    /// Commit the resolved cherry-pick.
    ///
    /// # Errors
    /// Returns `NoSequenceInProgress` without a pending cherry-pick.
    pub fn continue_cherry_pick(&self) -> Result<CherryPickOutcome> {
        self.finalize()
    }

    /// Commit a cherry-pick that stopped because it was empty, keeping the
    /// original author and message.
    ///
    /// # Errors
    /// Returns `NoSequenceInProgress` without a pending cherry-pick.
    pub fn commit_empty(&self) -> Result<CherryPickOutcome> {
        self.finalize()
    }

    /// Throw away the pending cherry-pick and reset to HEAD.
    ///
    /// Does nothing when no cherry-pick is pending.
    ///
    /// # Errors
    /// Returns error if the reset fails.
    pub fn abort_cherry_pick(&self) -> Result<()> {
        if self.store.cherry_pick_head()?.is_none() {
            return Ok(());
        }

        if let Ok(head) = self.git.head_commit() {
            self.git.hard_reset(head)?;
        } else {
            self.git.clear_index()?;
        }

        self.store.clear_cherry_pick_head()?;
        tracing::info!("cherry-pick aborted");
        Ok(())
    }

    fn finalize(&self) -> Result<CherryPickOutcome> {
        let commit = self
            .store
            .cherry_pick_head()?
            .ok_or(Error::NoSequenceInProgress("cherry-pick"))?;

        let entries = self.git.unmerged_entries()?;
        if !entries.is_empty() {
            return Ok(CherryPickOutcome::Conflict {
                commit,
                paths: conflicted_paths(&entries),
            });
        }

        let record = self.git.find_commit(commit)?;
        let new = self.commit_picked(&record)?;
        self.store.clear_cherry_pick_head()?;
        Ok(CherryPickOutcome::Committed(new))
    }

    /// Commit the index on top of HEAD (or as a root commit) with the
    /// original author and message, and move HEAD.
    fn commit_picked(&self, record: &CommitRecord) -> Result<Oid> {
        let tree = self.git.write_tree()?;
        let parents: Vec<Oid> = self.git.head_commit().ok().into_iter().collect();
        let new = self
            .git
            .create_commit(tree, &parents, &record.author, &record.full_message())?;
        self.git.update_head(new)?;
        tracing::debug!(original = %record.id, %new, "committed cherry-pick");
        Ok(new)
    }
}
