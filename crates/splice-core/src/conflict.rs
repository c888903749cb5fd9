//! Conflict materialization.
//!
//! Given the unmerged stages of the index, writes a conflict-marked version
//! of every path into the working tree. The index is left unmerged.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use splice_git::{ConflictEntry, GitOps, Oid, Stage};
use tempfile::NamedTempFile;

use crate::error::Result;

/// The stages of one conflicted path. A missing stage means that side added
/// or deleted the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictedFile {
    pub path: String,
    pub ancestor: Option<Oid>,
    pub ours: Option<Oid>,
    pub theirs: Option<Oid>,
    /// Conflicting hunks left in the working tree file after materializing.
    pub conflicts: usize,
}

impl ConflictedFile {
    /// Group index rows by path, sorted by path.
    #[must_use]
    pub fn group(entries: &[ConflictEntry]) -> Vec<Self> {
        let mut by_path: BTreeMap<&str, Self> = BTreeMap::new();

        for entry in entries {
            let file = by_path.entry(&entry.path).or_insert_with(|| Self {
                path: entry.path.clone(),
                ancestor: None,
                ours: None,
                theirs: None,
                conflicts: 0,
            });
            match entry.stage {
                Stage::Ancestor => file.ancestor = Some(entry.blob),
                Stage::Ours => file.ours = Some(entry.blob),
                Stage::Theirs => file.theirs = Some(entry.blob),
            }
        }

        by_path.into_values().collect()
    }
}

/// Distinct paths among unmerged entries, sorted.
#[must_use]
pub fn conflicted_paths(entries: &[ConflictEntry]) -> Vec<String> {
    ConflictedFile::group(entries)
        .into_iter()
        .map(|file| file.path)
        .collect()
}

/// Writes human-editable merged content for conflicted paths.
pub struct ConflictMaterializer<'a, G: GitOps> {
    git: &'a G,
}

impl<'a, G: GitOps> ConflictMaterializer<'a, G> {
    /// Create a materializer over a repository.
    #[must_use]
    pub const fn new(git: &'a G) -> Self {
        Self { git }
    }

    /// Merge every conflicted path with conflict markers labelled
    /// `ours_label` / `theirs_label` and write the result to the working tree.
    ///
    /// # Errors
    /// Returns error if blobs can't be read or files can't be written.
    pub fn materialize(
        &self,
        entries: &[ConflictEntry],
        ours_label: &str,
        theirs_label: &str,
    ) -> Result<Vec<ConflictedFile>> {
        let workdir = self.git.workdir()?;
        let mut files = ConflictedFile::group(entries);

        for file in &mut files {
            file.conflicts = self.merge_one(file, workdir, ours_label, theirs_label)?;
            tracing::debug!(path = %file.path, conflicts = file.conflicts, "materialized conflict");
        }

        Ok(files)
    }

    fn merge_one(
        &self,
        file: &ConflictedFile,
        workdir: &Path,
        ours_label: &str,
        theirs_label: &str,
    ) -> Result<usize> {
        let ours = self.unpack(file.ours)?;
        let base = self.unpack(file.ancestor)?;
        let theirs = self.unpack(file.theirs)?;

        let conflicts = match self.git.merge_file(
            ours.path(),
            base.path(),
            theirs.path(),
            [ours_label, "ancestor", theirs_label],
        ) {
            Ok(conflicts) => conflicts,
            Err(e) => {
                // Binary content: keep our side untouched and report it conflicted.
                tracing::warn!(path = %file.path, error = %e, "textual merge failed");
                1
            }
        };

        let target = workdir.join(&file.path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(ours.path(), &target)?;

        Ok(conflicts)
    }

    /// Write a blob (or nothing, for a missing stage) to a scratch file in
    /// the git directory.
    fn unpack(&self, blob: Option<Oid>) -> Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix(".merge_file_")
            .tempfile_in(self.git.git_dir())?;
        if let Some(blob) = blob {
            file.write_all(&self.git.read_blob(blob)?)?;
            file.flush()?;
        }
        Ok(file)
    }
}
