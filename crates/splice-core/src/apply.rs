//! Applying one commit's diff onto the current index and working tree.

use std::fs;
use std::io::Write;

use splice_git::{GitOps, Oid};

use crate::conflict::{ConflictMaterializer, ConflictedFile};
use crate::diff::parse_diff;
use crate::error::{Error, Result};

/// Label used for the current side of a replay conflict.
pub const HEAD_LABEL: &str = "HEAD";

/// Result of replaying a commit's diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Changes applied and staged.
    Applied,
    /// The commit itself changes nothing.
    EmptyDiff,
    /// The diff applied but the index still matches HEAD.
    NoChanges,
    /// Some paths conflict; they have been materialized in the working tree.
    Conflict(Vec<ConflictedFile>),
}

/// Replays commit diffs with a three-way fallback.
pub struct DiffApplier<'a, G: GitOps> {
    git: &'a G,
}

impl<'a, G: GitOps> DiffApplier<'a, G> {
    /// Create an applier over a repository.
    #[must_use]
    pub const fn new(git: &'a G) -> Self {
        Self { git }
    }

    /// Apply the changes introduced by `commit` on top of the current index.
    ///
    /// # Errors
    /// Returns `DiffApplyFailed` if git rejects the patch for a reason other
    /// than conflicts, or any git error.
    pub fn apply(&self, commit: Oid) -> Result<ApplyOutcome> {
        let mut diff = self.git.commit_diff(commit)?;
        if diff.trim().is_empty() {
            return Ok(ApplyOutcome::EmptyDiff);
        }
        if !diff.ends_with('\n') {
            diff.push('\n');
        }

        self.create_missing_files(&diff)?;

        let output = {
            let mut patch = tempfile::Builder::new()
                .prefix("splice-patch")
                .suffix(".diff")
                .tempfile_in(self.git.git_dir())?;
            patch.write_all(diff.as_bytes())?;
            patch.flush()?;
            self.git.apply_patch_to_index(patch.path())?
        };
        self.git.checkout_index(true)?;

        if output.success() {
            if self.git.has_staged_changes()? {
                return Ok(ApplyOutcome::Applied);
            }
            return Ok(ApplyOutcome::NoChanges);
        }

        if output.status == 1 && output.stderr.contains("conflicts") {
            let entries = self.git.unmerged_entries()?;
            if !entries.is_empty() {
                let files = ConflictMaterializer::new(self.git).materialize(
                    &entries,
                    HEAD_LABEL,
                    &commit.to_string(),
                )?;
                tracing::info!(%commit, files = files.len(), "replay stopped on conflicts");
                return Ok(ApplyOutcome::Conflict(files));
            }
        }

        tracing::warn!(%commit, status = output.status, "patch did not apply");
        Err(Error::DiffApplyFailed {
            commit: commit.to_string(),
            stderr: output.stderr.trim().to_string(),
        })
    }

    /// `git apply` needs every preimage path to exist; create and stage an
    /// empty placeholder for paths missing from the working tree.
    fn create_missing_files(&self, diff: &str) -> Result<()> {
        let workdir = self.git.workdir()?;

        for file in parse_diff(diff).iter().filter(|f| f.has_before_path()) {
            let path = workdir.join(&file.path_before);
            if path.exists() {
                continue;
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, "")?;
            self.git.stage_path(&file.path_before)?;
            tracing::debug!(path = %file.path_before, "created placeholder");
        }

        Ok(())
    }
}
