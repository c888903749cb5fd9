//! Rebase engine.
//!
//! Replays a todo list onto a detached HEAD. Every instruction boundary is a
//! save point: the state is written before the instruction moves to the done
//! list, so a stopped rebase can be continued or aborted by a later process.

use splice_git::{CommitRecord, GitOps, Oid, join_message};

use crate::apply::{ApplyOutcome, DiffApplier};
use crate::conflict::conflicted_paths;
use crate::error::{Error, Result};
use crate::instruction::{Instruction, InstructionKind, autosquash, next_continues_chain};
use crate::state::{FixupLink, RebaseSetup, RewrittenMap, SequenceState};
use crate::store::SequenceStore;

/// Where a rebase run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseOutcome {
    /// Every instruction ran; the branch points at the final commit.
    Completed(Oid),
    /// Replaying `commit` conflicted. Resolve, stage, then continue.
    Conflict { commit: Oid, paths: Vec<String> },
    /// Replaying `commit` changed nothing: its content is already there.
    EmptyDiff(Oid),
    /// A `break` instruction was reached.
    Break,
    /// The replayed commit waits for a new message.
    Reword(Oid),
    /// The replayed commit is checked out for amending.
    Edit(Oid),
    /// A squash chain finished; its combined message waits for editing.
    Squash(Oid),
}

impl RebaseOutcome {
    /// Whether the rebase is still in progress after this outcome.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        !matches!(self, Self::Completed(_))
    }
}

/// Drives rebases through a [`SequenceStore`].
pub struct RebaseSequencer<'a, G: GitOps, S: SequenceStore> {
    git: &'a G,
    store: &'a S,
    autosquash: bool,
}

impl<'a, G: GitOps, S: SequenceStore> RebaseSequencer<'a, G, S> {
    /// Create a new rebase sequencer.
    #[must_use]
    pub const fn new(git: &'a G, store: &'a S) -> Self {
        Self {
            git,
            store,
            autosquash: false,
        }
    }

    /// Reorder `fixup!`/`squash!` commits in the default todo.
    #[must_use]
    pub const fn with_autosquash(mut self, autosquash: bool) -> Self {
        self.autosquash = autosquash;
        self
    }

    /// Check if a rebase is in progress.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.store.rebase_in_progress()
    }

    /// One `pick` per commit between `upstream` and HEAD, oldest first.
    /// Merge commits are left out.
    ///
    /// # Errors
    /// Returns error if HEAD or the history can't be read.
    pub fn default_todo(&self, upstream: Oid) -> Result<Vec<Instruction>> {
        let head = self.git.head_commit()?;
        let todo: Vec<Instruction> = self
            .git
            .commits_between(upstream, head)?
            .into_iter()
            .filter(|commit| commit.parents.len() <= 1)
            .map(|commit| Instruction::new(InstructionKind::Pick, commit.id, commit.message))
            .collect();

        Ok(if self.autosquash { autosquash(todo) } else { todo })
    }

    /// Rebase the current branch onto `upstream` with the default todo.
    ///
    /// # Errors
    /// Returns error if `upstream` does not resolve or a git operation fails.
    pub fn rebase(&self, upstream: &str) -> Result<RebaseOutcome> {
        let onto = self.git.resolve(upstream)?;
        let todo = self.default_todo(onto)?;
        self.start(onto, &todo)
    }

    /// Rebase the current branch onto `upstream`, running `todo` instead of
    /// the default list.
    ///
    /// # Errors
    /// Returns error if `upstream` does not resolve or a git operation fails.
    pub fn interactive_rebase(&self, upstream: &str, todo: &[Instruction]) -> Result<RebaseOutcome> {
        let onto = self.git.resolve(upstream)?;
        self.start(onto, todo)
    }

    /// Finish the stopped step and resume the todo list.
    ///
    /// `message` replaces the pending commit message when given and not
    /// blank; `description` then becomes its body.
    ///
    /// # Errors
    /// Returns `NoSequenceInProgress` if no rebase is in progress.
    pub fn continue_rebase(
        &self,
        message: Option<&str>,
        description: Option<&str>,
    ) -> Result<RebaseOutcome> {
        if !self.store.rebase_in_progress() {
            return Err(Error::NoSequenceInProgress("rebase"));
        }

        let mut state = self.store.load_rebase_state()?;
        let done = self.store.done()?;
        let todo = self.store.todo()?;

        if let Some(last) = done.last().filter(|i| i.kind != InstructionKind::Break) {
            let entries = self.git.unmerged_entries()?;
            if !entries.is_empty() {
                let commit = state.rebase_head.or(last.target).unwrap_or(state.setup.onto);
                return Ok(RebaseOutcome::Conflict {
                    commit,
                    paths: conflicted_paths(&entries),
                });
            }

            let explicit = message
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(|m| join_message(m, description.map_or("", str::trim)));
            let finalized = self.finalize_pending(&state, explicit.as_deref())?;
            let chain_continues = next_continues_chain(&todo);

            if let (Some(new), Some(original)) = (finalized, last.target) {
                state.rewritten.settle(original, new, chain_continues);
            }

            // A resolved step never asks for the squash message again; only
            // the message carries over into a chain that goes on.
            let carried = explicit.or_else(|| state.message.take());
            state.clear_chain();
            if last.kind.continues_chain() && chain_continues {
                state.message = carried;
            }
        }

        state.clear_step();
        self.store.save_rebase_state(&state)?;
        tracing::debug!("continuing rebase");
        self.process_todo(state)
    }

    /// Restore the branch, index and working tree to where the rebase
    /// started.
    ///
    /// Does nothing when no rebase is in progress.
    ///
    /// # Errors
    /// Returns error if the persisted state is unreadable or the reset fails.
    pub fn abort_rebase(&self) -> Result<()> {
        if !self.store.rebase_in_progress() {
            return Ok(());
        }

        let state = self.store.load_rebase_state()?;
        let setup = &state.setup;

        self.git.reset_index_to_tree(setup.orig_head)?;
        self.git.checkout_index(true)?;
        match &setup.head_name {
            Some(name) => {
                self.git.update_ref(name, setup.orig_head)?;
                self.git.attach_head(name)?;
            }
            None => self.git.detach_head(setup.orig_head)?,
        }

        self.store.clear_rebase()?;
        tracing::info!(orig_head = %setup.orig_head, "rebase aborted");
        Ok(())
    }

    /// Message buffer of the stopped rebase, as shown to the user for
    /// editing.
    ///
    /// # Errors
    /// Returns error if the persisted state is unreadable.
    pub fn stopped_message(&self) -> Result<Option<String>> {
        if !self.store.rebase_in_progress() {
            return Ok(None);
        }
        Ok(self.store.load_rebase_state()?.message)
    }

    /// Commits rewritten so far.
    ///
    /// # Errors
    /// Returns `NoSequenceInProgress` if no rebase is in progress.
    pub fn rewritten(&self) -> Result<RewrittenMap> {
        Ok(self.store.load_rebase_state()?.rewritten)
    }

    /// Instructions not yet run.
    ///
    /// # Errors
    /// Returns `NoSequenceInProgress` if no rebase is in progress.
    pub fn todo(&self) -> Result<Vec<Instruction>> {
        self.store.todo()
    }

    /// Instructions already run.
    ///
    /// # Errors
    /// Returns error if the done list is unreadable.
    pub fn done(&self) -> Result<Vec<Instruction>> {
        self.store.done()
    }

    // === Engine ===

    fn start(&self, onto: Oid, todo: &[Instruction]) -> Result<RebaseOutcome> {
        let orig_head = self.git.head_commit()?;
        let head_name = match self.git.current_branch_ref() {
            Ok(name) => Some(name),
            Err(splice_git::Error::DetachedHead) => None,
            Err(e) => return Err(e.into()),
        };

        let state = SequenceState::new(RebaseSetup {
            onto,
            head_name,
            orig_head,
        });
        self.git.set_orig_head(orig_head)?;
        self.store.begin_rebase(&state, todo)?;

        self.git.reset_index_to_tree(onto)?;
        self.git.checkout_index(true)?;
        self.git.detach_head(onto)?;

        tracing::info!(%onto, instructions = todo.len(), "starting rebase");
        self.process_todo(state)
    }

    fn process_todo(&self, mut state: SequenceState) -> Result<RebaseOutcome> {
        loop {
            let todo = self.store.todo()?;
            let Some((instruction, remaining)) = todo.split_first() else {
                return self.finish(&state);
            };

            tracing::debug!(%instruction, "processing");
            state.rebase_head = instruction.target;
            self.store.save_rebase_state(&state)?;

            let stop = self.run(&mut state, instruction, remaining)?;
            if stop.is_none() {
                state.rebase_head = None;
            }
            self.store.save_rebase_state(&state)?;
            self.store.advance()?;

            if let Some(outcome) = stop {
                tracing::info!(?outcome, "rebase stopped");
                return Ok(outcome);
            }
        }
    }

    /// Run one instruction. `Some` is a stop.
    fn run(
        &self,
        state: &mut SequenceState,
        instruction: &Instruction,
        remaining: &[Instruction],
    ) -> Result<Option<RebaseOutcome>> {
        match instruction.kind {
            InstructionKind::Break => Ok(Some(RebaseOutcome::Break)),
            InstructionKind::Drop => Ok(None),
            InstructionKind::Pick | InstructionKind::Reword | InstructionKind::Edit => {
                self.replay(state, instruction.kind, instruction.require_target()?, remaining)
            }
            InstructionKind::Fixup | InstructionKind::Squash => {
                self.fold(state, instruction.kind, instruction.require_target()?, remaining)
            }
        }
    }

    /// Pick, reword and edit: replay the commit onto HEAD.
    fn replay(
        &self,
        state: &mut SequenceState,
        kind: InstructionKind,
        target: Oid,
        remaining: &[Instruction],
    ) -> Result<Option<RebaseOutcome>> {
        state.clear_chain();
        let commit = self.git.find_commit(target)?;
        let head = self.git.head_commit()?;
        let message = commit.full_message();

        let new = if commit.first_parent() == Some(head) {
            self.git.reset_index_to_tree(target)?;
            self.git.detach_head(target)?;
            tracing::debug!(%target, "fast-forwarded");
            target
        } else {
            match DiffApplier::new(self.git).apply(target)? {
                ApplyOutcome::Applied | ApplyOutcome::EmptyDiff => {
                    self.commit_on(head, &commit, &message)?
                }
                ApplyOutcome::NoChanges => return Ok(Some(RebaseOutcome::EmptyDiff(target))),
                ApplyOutcome::Conflict(files) => {
                    state.author = Some(commit.author);
                    state.message = Some(message);
                    return Ok(Some(RebaseOutcome::Conflict {
                        commit: target,
                        paths: files.into_iter().map(|file| file.path).collect(),
                    }));
                }
            }
        };

        match kind {
            InstructionKind::Reword | InstructionKind::Edit => {
                state.amend = Some(new);
                state.message = Some(message);
                Ok(Some(if kind == InstructionKind::Reword {
                    RebaseOutcome::Reword(new)
                } else {
                    RebaseOutcome::Edit(new)
                }))
            }
            _ => {
                state
                    .rewritten
                    .settle(target, new, next_continues_chain(remaining));
                Ok(None)
            }
        }
    }

    /// Fixup and squash: fold the commit's changes into HEAD.
    fn fold(
        &self,
        state: &mut SequenceState,
        kind: InstructionKind,
        target: Oid,
        remaining: &[Instruction],
    ) -> Result<Option<RebaseOutcome>> {
        if !self.store.done()?.iter().any(|i| i.kind.produces_commit()) {
            return Err(Error::NothingToAmend(kind.name()));
        }

        let commit = self.git.find_commit(target)?;
        let head = self.git.find_commit(self.git.head_commit()?)?;

        let base_message = state.message.clone().unwrap_or_else(|| head.full_message());
        let (message, link) = if kind == InstructionKind::Squash {
            (
                format!("{base_message}\n\n{}", commit.full_message()),
                FixupLink::Squash(target),
            )
        } else {
            (base_message, FixupLink::Fixup(target))
        };
        state.current_fixups.push(link);

        if let ApplyOutcome::Conflict(files) = DiffApplier::new(self.git).apply(target)? {
            state.amend = Some(head.id);
            state.message = Some(message);
            return Ok(Some(RebaseOutcome::Conflict {
                commit: target,
                paths: files.into_iter().map(|file| file.path).collect(),
            }));
        }

        let tree = self.git.write_tree()?;
        let new = self
            .git
            .create_commit(tree, &head.parents, &head.author, &message)?;
        self.git.detach_head(new)?;
        tracing::debug!(%target, amended = %new, "folded into previous commit");

        if next_continues_chain(remaining) {
            state.rewritten.defer(target);
            state.message = Some(message);
            Ok(None)
        } else if state.chain_has_squash() {
            state.amend = Some(new);
            state.message = Some(message);
            Ok(Some(RebaseOutcome::Squash(new)))
        } else {
            state.rewritten.settle(target, new, false);
            state.clear_chain();
            Ok(None)
        }
    }

    /// Commit the index on top of `head` as a replay of `original`.
    fn commit_on(&self, head: Oid, original: &CommitRecord, message: &str) -> Result<Oid> {
        let tree = self.git.write_tree()?;
        let new = self
            .git
            .create_commit(tree, &[head], &original.author, message)?;
        self.git.detach_head(new)?;
        tracing::debug!(original = %original.id, %new, "replayed commit");
        Ok(new)
    }

    /// Turn the index into the commit the stopped step was building.
    ///
    /// With an amend marker the current HEAD is amended, unless neither the
    /// tree nor the message changed. Commits made during the stop are kept:
    /// the persisted message only applies while HEAD is still the marked
    /// commit. With only a preserved author a new commit is made on HEAD.
    /// Otherwise there is nothing to finalize.
    fn finalize_pending(
        &self,
        state: &SequenceState,
        explicit: Option<&str>,
    ) -> Result<Option<Oid>> {
        if let Some(amend) = state.amend {
            let head = self.git.find_commit(self.git.head_commit()?)?;
            let tree = self.git.write_tree()?;
            let current = head.full_message();
            let message = explicit
                .or_else(|| state.message.as_deref().filter(|_| head.id == amend))
                .unwrap_or(&current);

            if tree == head.tree && message == current {
                tracing::debug!(head = %head.id, "kept commit unchanged");
                return Ok(Some(head.id));
            }

            let new = self
                .git
                .create_commit(tree, &head.parents, &head.author, message)?;
            self.git.detach_head(new)?;
            tracing::debug!(head = %head.id, %new, "amended commit");
            return Ok(Some(new));
        }

        if let Some(author) = &state.author {
            let head = self.git.head_commit()?;
            let tree = self.git.write_tree()?;
            let message = explicit.or(state.message.as_deref()).unwrap_or_default();
            let new = self.git.create_commit(tree, &[head], author, message)?;
            self.git.detach_head(new)?;
            tracing::debug!(%new, "committed resolved step");
            return Ok(Some(new));
        }

        Ok(None)
    }

    fn finish(&self, state: &SequenceState) -> Result<RebaseOutcome> {
        let head = self.git.head_commit()?;
        if let Some(name) = &state.setup.head_name {
            self.git.update_ref(name, head)?;
            self.git.attach_head(name)?;
        }
        self.store.clear_rebase()?;

        tracing::info!(%head, rewritten = state.rewritten.entries().len(), "rebase complete");
        Ok(RebaseOutcome::Completed(head))
    }
}
