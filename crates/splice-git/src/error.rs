//! Error types for splice-git.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during git operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Not inside a git repository.
    #[error("not a git repository")]
    NotARepository,

    /// The repository has no working directory.
    #[error("bare repositories are not supported")]
    BareRepository,

    /// Reference or revision could not be resolved.
    #[error("reference not found: {0}")]
    RefNotFound(String),

    /// HEAD is detached (not on a branch).
    #[error("HEAD is detached - checkout a branch first")]
    DetachedHead,

    /// HEAD points at a branch with no commits yet.
    #[error("HEAD does not point at a commit yet")]
    UnbornHead,

    /// A git subprocess exited unsuccessfully.
    #[error("`git {command}` failed: {stderr}")]
    CommandFailed {
        /// The arguments passed to git.
        command: String,
        /// Captured standard error.
        stderr: String,
    },

    /// A git subprocess could not be spawned.
    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    /// Output of a git subprocess could not be understood.
    #[error("unexpected git output: {0}")]
    UnexpectedOutput(String),

    /// Malformed author date.
    #[error("invalid date '{0}'")]
    InvalidDate(String),

    /// IO error while touching the working tree or git dir.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Underlying git2 error.
    #[error("git error: {0}")]
    Git2(#[from] git2::Error),
}
