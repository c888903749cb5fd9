//! Rebase todo instructions.

use std::fmt;
use std::str::FromStr;

use splice_git::Oid;

use crate::error::{Error, Result};

/// What to do with one commit of a rebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    Pick,
    Reword,
    Edit,
    Squash,
    Fixup,
    Drop,
    Break,
}

impl InstructionKind {
    /// Long name as written in the todo file.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pick => "pick",
            Self::Reword => "reword",
            Self::Edit => "edit",
            Self::Squash => "squash",
            Self::Fixup => "fixup",
            Self::Drop => "drop",
            Self::Break => "break",
        }
    }

    /// Whether the instruction folds into the previous commit.
    #[must_use]
    pub const fn continues_chain(self) -> bool {
        matches!(self, Self::Squash | Self::Fixup)
    }

    /// Whether the instruction operates on a commit.
    #[must_use]
    pub const fn needs_target(self) -> bool {
        !matches!(self, Self::Break)
    }

    /// Whether the instruction leaves a commit behind that a later fixup can
    /// fold into.
    #[must_use]
    pub const fn produces_commit(self) -> bool {
        !matches!(self, Self::Drop | Self::Break)
    }
}

impl FromStr for InstructionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pick" | "p" => Ok(Self::Pick),
            "reword" | "r" => Ok(Self::Reword),
            "edit" | "e" => Ok(Self::Edit),
            "squash" | "s" => Ok(Self::Squash),
            "fixup" | "f" => Ok(Self::Fixup),
            "drop" | "d" => Ok(Self::Drop),
            "break" | "b" => Ok(Self::Break),
            _ => Err(Error::InvalidInstruction(s.to_string())),
        }
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One line of the todo list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub kind: InstructionKind,
    /// Commit to operate on; `None` only for `break`.
    pub target: Option<Oid>,
    /// Free text after the hash, usually the commit subject.
    pub annotation: String,
}

impl Instruction {
    /// Create an instruction for a commit.
    #[must_use]
    pub fn new(kind: InstructionKind, target: Oid, annotation: impl Into<String>) -> Self {
        Self {
            kind,
            target: Some(target),
            annotation: annotation.into(),
        }
    }

    /// A `break` instruction.
    #[must_use]
    pub const fn stop() -> Self {
        Self {
            kind: InstructionKind::Break,
            target: None,
            annotation: String::new(),
        }
    }

    /// The target commit, or `EmptyTodoTarget` for a target-less instruction.
    ///
    /// # Errors
    /// Returns `EmptyTodoTarget` if the instruction has no target.
    pub fn require_target(&self) -> Result<Oid> {
        self.target.ok_or(Error::EmptyTodoTarget(self.kind.name()))
    }

    /// Parse one todo line, resolving the commit with `resolve`.
    ///
    /// Returns `None` for blank lines and `#` comments.
    ///
    /// # Errors
    /// Returns `InvalidInstruction` for an unknown command or a missing
    /// commit, or whatever `resolve` fails with.
    pub fn parse_with<F>(line: &str, resolve: F) -> Result<Option<Self>>
    where
        F: FnOnce(&str) -> Result<Oid>,
    {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let kind: InstructionKind = command.parse()?;

        if !kind.needs_target() {
            return Ok(Some(Self::stop()));
        }

        let rest = rest.trim_start();
        let (hash, annotation) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        if hash.is_empty() {
            return Err(Error::InvalidInstruction(line.to_string()));
        }

        Ok(Some(Self::new(kind, resolve(hash)?, annotation.trim())))
    }

    /// Parse one todo line holding a full commit hash.
    ///
    /// # Errors
    /// Returns `InvalidInstruction` if the line is malformed.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        Self::parse_with(line, parse_full_hash)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            None => f.write_str(self.kind.name()),
            Some(target) if self.annotation.is_empty() => write!(f, "{} {target}", self.kind),
            Some(target) => write!(f, "{} {target} {}", self.kind, self.annotation),
        }
    }
}

fn parse_full_hash(hash: &str) -> Result<Oid> {
    if hash.len() != 40 {
        return Err(Error::InvalidInstruction(hash.to_string()));
    }
    Oid::from_str(hash).map_err(|_| Error::InvalidInstruction(hash.to_string()))
}

/// Parse a whole todo file written with full hashes.
///
/// # Errors
/// Returns `InvalidInstruction` for the first malformed line.
pub fn parse_todo(text: &str) -> Result<Vec<Instruction>> {
    parse_todo_with(text, parse_full_hash)
}

/// Parse a todo file whose hashes may be abbreviated or symbolic.
///
/// # Errors
/// Returns `InvalidInstruction` for the first malformed line, or whatever
/// `resolve` fails with.
pub fn parse_todo_with<F>(text: &str, mut resolve: F) -> Result<Vec<Instruction>>
where
    F: FnMut(&str) -> Result<Oid>,
{
    let mut todo = Vec::new();
    for line in text.lines() {
        todo.extend(Instruction::parse_with(line, &mut resolve)?);
    }
    Ok(todo)
}

/// Render instructions one per line.
#[must_use]
pub fn format_todo(todo: &[Instruction]) -> String {
    todo.iter().map(|i| format!("{i}\n")).collect()
}

/// Whether the first remaining instruction folds into the commit just made.
///
/// Drives fixup/squash chaining: while this holds, the amended commit is not
/// final yet.
#[must_use]
pub fn next_continues_chain(remaining: &[Instruction]) -> bool {
    remaining
        .first()
        .is_some_and(|next| next.kind.continues_chain())
}

/// Move `fixup! <subject>` and `squash! <subject>` commits right after the
/// commit whose subject they name, turning them into fixup/squash
/// instructions. Unmatched ones are left in place.
#[must_use]
pub fn autosquash(todo: Vec<Instruction>) -> Vec<Instruction> {
    let mut ordered: Vec<Instruction> = Vec::with_capacity(todo.len());

    for instruction in todo {
        let marker = [
            ("fixup! ", InstructionKind::Fixup),
            ("squash! ", InstructionKind::Squash),
        ]
        .into_iter()
        .find_map(|(prefix, kind)| {
            instruction
                .annotation
                .strip_prefix(prefix)
                .map(|subject| (subject.to_string(), kind))
        });

        let Some((subject, kind)) = marker else {
            ordered.push(instruction);
            continue;
        };

        let Some(anchor) = ordered
            .iter()
            .position(|i| !i.kind.continues_chain() && i.annotation == subject)
        else {
            ordered.push(instruction);
            continue;
        };

        // After the anchor and any fixups already attached to it.
        let insert_at = ordered[anchor + 1..]
            .iter()
            .position(|i| !i.kind.continues_chain())
            .map_or(ordered.len(), |offset| anchor + 1 + offset);
        ordered.insert(insert_at, Instruction { kind, ..instruction });
    }

    ordered
}
