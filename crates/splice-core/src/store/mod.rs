//! Persistence of sequence state.
//!
//! The [`SequenceStore`] trait is the only way the sequencers read or write
//! their state. [`FileStore`] keeps it in the git directory using git's own
//! file names; [`MemoryStore`] keeps it in memory for tests.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use splice_git::Oid;

use crate::Result;
use crate::instruction::Instruction;
use crate::state::{MergeState, SequenceState};

/// Load/save operations for the state of every sequencer.
#[allow(clippy::missing_errors_doc)]
pub trait SequenceStore {
    // === Rebase ===

    /// Check if a rebase is in progress.
    fn rebase_in_progress(&self) -> bool;

    /// Persist the initial state and todo list of a new rebase.
    fn begin_rebase(&self, state: &SequenceState, todo: &[Instruction]) -> Result<()>;

    /// Load the state of the rebase in progress.
    fn load_rebase_state(&self) -> Result<SequenceState>;

    /// Save the state of the rebase in progress.
    fn save_rebase_state(&self, state: &SequenceState) -> Result<()>;

    /// Instructions not yet processed.
    fn todo(&self) -> Result<Vec<Instruction>>;

    /// Instructions already processed, oldest first.
    fn done(&self) -> Result<Vec<Instruction>>;

    /// Record the front todo instruction as done and remove it from the
    /// todo list.
    ///
    /// The done entry is written first; [`SequenceStore::todo`] must never
    /// report an instruction that is already done.
    fn advance(&self) -> Result<()>;

    /// Remove every trace of the rebase.
    fn clear_rebase(&self) -> Result<()>;

    // === Cherry-pick ===

    /// Commit of a cherry-pick waiting to be committed.
    fn cherry_pick_head(&self) -> Result<Option<Oid>>;

    fn set_cherry_pick_head(&self, oid: Oid) -> Result<()>;

    fn clear_cherry_pick_head(&self) -> Result<()>;

    // === Merge ===

    /// Markers of a merge stopped on conflicts.
    fn merge_state(&self) -> Result<Option<MergeState>>;

    fn save_merge_state(&self, state: &MergeState) -> Result<()>;

    fn clear_merge_state(&self) -> Result<()>;
}

/// Drop todo entries that the done list already accounts for.
///
/// `advance` appends to `done` before rewriting the todo; if the process
/// dies in between, the todo still starts with the instruction that was
/// recorded as done. The original list length tells how many to skip.
pub(crate) fn reconcile_todo(
    mut todo: Vec<Instruction>,
    done_len: usize,
    original_len: Option<usize>,
) -> Vec<Instruction> {
    if let Some(original_len) = original_len {
        let excess = (done_len + todo.len()).saturating_sub(original_len);
        todo.drain(..excess.min(todo.len()));
    }
    todo
}
