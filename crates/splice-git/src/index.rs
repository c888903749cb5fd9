//! Index entries and git subprocess output.

use git2::Oid;

use crate::error::{Error, Result};

/// Stage of an unmerged index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Stage 1: the common ancestor.
    Ancestor,
    /// Stage 2: our side (the commit being built on).
    Ours,
    /// Stage 3: their side (the commit being replayed or merged in).
    Theirs,
}

impl Stage {
    /// Map git's numeric stage to a [`Stage`].
    #[must_use]
    pub const fn from_number(stage: u8) -> Option<Self> {
        match stage {
            1 => Some(Self::Ancestor),
            2 => Some(Self::Ours),
            3 => Some(Self::Theirs),
            _ => None,
        }
    }

    /// Git's numeric stage.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Ancestor => 1,
            Self::Ours => 2,
            Self::Theirs => 3,
        }
    }
}

/// One stage of a conflicted path in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictEntry {
    pub path: String,
    pub stage: Stage,
    pub blob: Oid,
}

/// Parse `git ls-files -u -z` output.
///
/// Each record is `<mode> SP <object> SP <stage> TAB <path>` terminated by NUL.
///
/// # Errors
/// Returns `UnexpectedOutput` if a record is malformed.
pub fn parse_unmerged_entries(output: &str) -> Result<Vec<ConflictEntry>> {
    output
        .split('\0')
        .filter(|record| !record.trim().is_empty())
        .map(|record| {
            let record = record.trim_start_matches('\n');
            let malformed = || Error::UnexpectedOutput(format!("ls-files record: {record}"));

            let (meta, path) = record.split_once('\t').ok_or_else(malformed)?;
            let mut fields = meta.split_whitespace();
            let _mode = fields.next().ok_or_else(malformed)?;
            let blob = fields
                .next()
                .and_then(|oid| Oid::from_str(oid).ok())
                .ok_or_else(malformed)?;
            let stage = fields
                .next()
                .and_then(|stage| stage.parse::<u8>().ok())
                .and_then(Stage::from_number)
                .ok_or_else(malformed)?;

            Ok(ConflictEntry {
                path: path.to_string(),
                stage,
                blob,
            })
        })
        .collect()
}

/// Captured result of a git subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `-1` when the process was killed by a signal.
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the process exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.status == 0
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        let mut stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.ends_with('\n') {
            stdout.pop();
        }

        Self {
            status: output.status.code().unwrap_or(-1),
            stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}
