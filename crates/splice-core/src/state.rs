//! State of in-flight sequences.
//!
//! These are plain values; persistence lives in [`crate::store`].

use splice_git::{Oid, Signature};

/// Where a rebase started from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebaseSetup {
    /// Commit the todo is replayed onto.
    pub onto: Oid,
    /// Branch that was checked out, as a full ref name. `None` when the
    /// rebase started on a detached HEAD.
    pub head_name: Option<String>,
    /// Commit HEAD pointed at before the rebase.
    pub orig_head: Oid,
}

/// One entry of the current fixup/squash chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixupLink {
    Fixup(Oid),
    Squash(Oid),
}

impl FixupLink {
    /// The folded commit.
    #[must_use]
    pub const fn target(self) -> Oid {
        match self {
            Self::Fixup(oid) | Self::Squash(oid) => oid,
        }
    }

    /// Keyword written to the `current-fixups` file.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Fixup(_) => "fixup",
            Self::Squash(_) => "squash",
        }
    }
}

/// Mapping from original commits to their rewritten counterparts.
///
/// Commits whose final hash is not known yet, because a following fixup or
/// squash will still amend the result, wait in the pending buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewrittenMap {
    entries: Vec<(Oid, Oid)>,
    pending: Vec<Oid>,
}

impl RewrittenMap {
    /// Build a map from persisted parts.
    #[must_use]
    pub const fn from_parts(entries: Vec<(Oid, Oid)>, pending: Vec<Oid>) -> Self {
        Self { entries, pending }
    }

    /// Record that `original` became `rewritten`. A commit kept as is (a
    /// fast-forwarded pick) is not recorded.
    pub fn record(&mut self, original: Oid, rewritten: Oid) {
        if original != rewritten {
            self.entries.push((original, rewritten));
        }
    }

    /// Hold `original` until the chain it belongs to is finalized.
    pub fn defer(&mut self, original: Oid) {
        if !self.pending.contains(&original) {
            self.pending.push(original);
        }
    }

    /// Resolve every pending commit to `rewritten`.
    pub fn flush(&mut self, rewritten: Oid) {
        for original in std::mem::take(&mut self.pending) {
            self.record(original, rewritten);
        }
    }

    /// Either defer `original` (while a chain is still being built) or flush
    /// the pending buffer together with it.
    pub fn settle(&mut self, original: Oid, rewritten: Oid, chain_continues: bool) {
        if chain_continues {
            self.defer(original);
        } else {
            self.flush(rewritten);
            self.record(original, rewritten);
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[(Oid, Oid)] {
        &self.entries
    }

    #[must_use]
    pub fn pending(&self) -> &[Oid] {
        &self.pending
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.pending.is_empty()
    }
}

/// Everything a stopped rebase needs to resume, besides the todo lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceState {
    pub setup: RebaseSetup,
    /// Commit that `continue` must amend.
    pub amend: Option<Oid>,
    /// Author to use when `continue` creates a fresh commit.
    pub author: Option<Signature>,
    /// Message buffer for the pending commit.
    pub message: Option<String>,
    /// Fixups and squashes folded since the last pick.
    pub current_fixups: Vec<FixupLink>,
    pub rewritten: RewrittenMap,
    /// Target of the instruction being processed.
    pub rebase_head: Option<Oid>,
}

impl SequenceState {
    /// Fresh state for a rebase about to start.
    #[must_use]
    pub fn new(setup: RebaseSetup) -> Self {
        Self {
            setup,
            amend: None,
            author: None,
            message: None,
            current_fixups: Vec::new(),
            rewritten: RewrittenMap::default(),
            rebase_head: None,
        }
    }

    /// Whether the current chain folded in at least one squash, which means
    /// the combined message must be offered for editing.
    #[must_use]
    pub fn chain_has_squash(&self) -> bool {
        self.current_fixups
            .iter()
            .any(|link| matches!(link, FixupLink::Squash(_)))
    }

    /// Drop the markers of a finished step.
    pub fn clear_step(&mut self) {
        self.amend = None;
        self.author = None;
        self.rebase_head = None;
    }

    /// Drop the chain markers once a chain is final.
    pub fn clear_chain(&mut self) {
        self.message = None;
        self.current_fixups.clear();
    }
}

/// Markers of a merge stopped on conflicts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeState {
    /// Tip of the branch being merged in.
    pub head: Oid,
    /// Merge mode tag, `no-ff`.
    pub mode: String,
    /// Message for the merge commit.
    pub message: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn oid(n: u8) -> Oid {
        Oid::from_bytes(&[n; 20]).unwrap()
    }

    #[test]
    fn test_record_skips_identity() {
        let mut map = RewrittenMap::default();
        map.record(oid(1), oid(1));
        assert!(map.is_empty());

        map.record(oid(1), oid(2));
        assert_eq!(map.entries(), &[(oid(1), oid(2))]);
    }

    #[test]
    fn test_pending_resolves_to_chain_result() {
        let mut map = RewrittenMap::default();
        map.settle(oid(1), oid(1), true);
        map.settle(oid(2), oid(9), true);
        assert_eq!(map.pending(), &[oid(1), oid(2)]);
        assert!(map.entries().is_empty());

        map.settle(oid(3), oid(10), false);
        assert!(map.pending().is_empty());
        assert_eq!(
            map.entries(),
            &[(oid(1), oid(10)), (oid(2), oid(10)), (oid(3), oid(10))]
        );
    }

    #[test]
    fn test_chain_has_squash() {
        let setup = RebaseSetup {
            onto: oid(1),
            head_name: Some("refs/heads/main".into()),
            orig_head: oid(2),
        };
        let mut state = SequenceState::new(setup);
        assert!(!state.chain_has_squash());

        state.current_fixups.push(FixupLink::Fixup(oid(3)));
        assert!(!state.chain_has_squash());

        state.current_fixups.push(FixupLink::Squash(oid(4)));
        assert!(state.chain_has_squash());

        state.clear_chain();
        assert!(!state.chain_has_squash());
    }
}
