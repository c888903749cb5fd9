//! Error types for splice-core.

use std::path::PathBuf;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in splice-core operations.
///
/// Expected stops (conflicts, empty diffs, breaks) are not errors; they are
/// reported through each sequencer's outcome type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A persisted state file is missing a field or holds garbage.
    #[error("failed to parse {file}: {message}")]
    StateParseError { file: PathBuf, message: String },

    /// `continue` or `abort` called with nothing to continue.
    #[error("no {0} in progress")]
    NoSequenceInProgress(&'static str),

    /// A todo line could not be understood.
    #[error("invalid todo instruction: '{0}'")]
    InvalidInstruction(String),

    /// The patch primitive failed for a reason other than conflicts.
    #[error("failed to apply {commit}: {stderr}")]
    DiffApplyFailed { commit: String, stderr: String },

    /// An instruction that needs a target commit has none.
    #[error("{0} instruction has no target commit")]
    EmptyTodoTarget(&'static str),

    /// A fixup or squash with no previous commit to fold into.
    #[error("cannot {0} without a previous commit")]
    NothingToAmend(&'static str),

    /// A setting or flag holds an unknown value.
    #[error("invalid value '{value}' for {name}")]
    InvalidSetting { name: &'static str, value: String },

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Git operation error.
    #[error("git error: {0}")]
    Git(#[from] splice_git::Error),
}
