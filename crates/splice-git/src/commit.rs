//! Commit metadata as seen by the sequencers.

use chrono::{DateTime, FixedOffset, Offset, TimeZone};
use git2::Oid;

use crate::error::{Error, Result};

/// An author or committer identity together with its timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub when: DateTime<FixedOffset>,
}

impl Signature {
    /// Create a signature from its parts.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>, when: DateTime<FixedOffset>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when,
        }
    }

    /// Convert from a git2 signature, keeping the original timezone.
    ///
    /// # Errors
    /// Returns error if the signature carries an out-of-range timestamp.
    pub fn from_git2(sig: &git2::Signature<'_>) -> Result<Self> {
        let time = sig.when();
        let offset = FixedOffset::east_opt(time.offset_minutes() * 60)
            .ok_or_else(|| Error::InvalidDate(format!("offset {}", time.offset_minutes())))?;
        let when = offset
            .timestamp_opt(time.seconds(), 0)
            .single()
            .ok_or_else(|| Error::InvalidDate(time.seconds().to_string()))?;

        Ok(Self {
            name: String::from_utf8_lossy(sig.name_bytes()).into_owned(),
            email: String::from_utf8_lossy(sig.email_bytes()).into_owned(),
            when,
        })
    }

    /// Build the equivalent git2 signature.
    ///
    /// # Errors
    /// Returns error if name or email contain characters git rejects.
    pub fn to_git2(&self) -> Result<git2::Signature<'static>> {
        let offset_minutes = self.when.offset().fix().local_minus_utc() / 60;
        let time = git2::Time::new(self.when.timestamp(), offset_minutes);
        Ok(git2::Signature::new(&self.name, &self.email, &time)?)
    }

    /// Date in git's raw `@<seconds> <+hhmm>` form, as accepted by
    /// `GIT_AUTHOR_DATE`.
    #[must_use]
    pub fn raw_date(&self) -> String {
        format!("@{} {}", self.when.timestamp(), self.when.format("%z"))
    }

    /// Parse a date written by [`Signature::raw_date`].
    ///
    /// # Errors
    /// Returns `InvalidDate` if the text is not `@<seconds> <+hhmm>`.
    pub fn parse_raw_date(raw: &str) -> Result<DateTime<FixedOffset>> {
        let invalid = || Error::InvalidDate(raw.to_string());

        let (seconds, zone) = raw
            .trim()
            .trim_start_matches('@')
            .split_once(' ')
            .ok_or_else(invalid)?;
        let seconds: i64 = seconds.parse().map_err(|_| invalid())?;

        let zone = zone.trim();
        if zone.len() != 5 || !zone.is_ascii() {
            return Err(invalid());
        }
        let sign = match &zone[..1] {
            "+" => 1,
            "-" => -1,
            _ => return Err(invalid()),
        };
        let hours: i32 = zone[1..3].parse().map_err(|_| invalid())?;
        let minutes: i32 = zone[3..5].parse().map_err(|_| invalid())?;

        let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)?;
        offset.timestamp_opt(seconds, 0).single().ok_or_else(invalid)
    }
}

/// Immutable view of a commit object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub id: Oid,
    pub parents: Vec<Oid>,
    pub author: Signature,
    pub committer: Signature,
    /// Subject: everything up to the first blank line.
    pub message: String,
    /// Body: everything after the first blank line.
    pub description: String,
    pub tree: Oid,
}

impl CommitRecord {
    /// Build a record from a git2 commit.
    ///
    /// # Errors
    /// Returns error if author or committer dates are out of range.
    pub fn from_git2(commit: &git2::Commit<'_>) -> Result<Self> {
        let raw = String::from_utf8_lossy(commit.message_bytes());
        let (message, description) = split_message(&raw);

        Ok(Self {
            id: commit.id(),
            parents: commit.parent_ids().collect(),
            author: Signature::from_git2(&commit.author())?,
            committer: Signature::from_git2(&commit.committer())?,
            message,
            description,
            tree: commit.tree_id(),
        })
    }

    /// First parent, if the commit is not a root commit.
    #[must_use]
    pub fn first_parent(&self) -> Option<Oid> {
        self.parents.first().copied()
    }

    /// Subject and body joined by a blank line.
    #[must_use]
    pub fn full_message(&self) -> String {
        join_message(&self.message, &self.description)
    }
}

/// Split a raw commit message into subject and body.
#[must_use]
pub fn split_message(raw: &str) -> (String, String) {
    let raw = raw.trim();
    match raw.split_once("\n\n") {
        Some((subject, body)) => (subject.trim().to_string(), body.trim().to_string()),
        None => (raw.to_string(), String::new()),
    }
}

/// Join subject and body with a blank line, dropping an empty body.
#[must_use]
pub fn join_message(message: &str, description: &str) -> String {
    if description.is_empty() {
        message.to_string()
    } else {
        format!("{message}\n\n{description}")
    }
}
