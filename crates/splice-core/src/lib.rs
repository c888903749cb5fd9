//! # splice-core
//!
//! Resumable rebase, cherry-pick and merge sequencers.
//!
//! Each sequencer drives the git primitives of `splice-git` and keeps its
//! progress in a [`SequenceStore`], so a stopped operation can be continued
//! or aborted by a later process.

pub mod apply;
pub mod cherry_pick;
pub mod config;
pub mod conflict;
pub mod diff;
pub mod error;
pub mod instruction;
pub mod merge;
pub mod rebase;
pub mod state;
pub mod store;

pub use cherry_pick::{CherryPickOutcome, CherryPickSequencer, EmptyStrategy};
pub use config::Config;
pub use error::{Error, Result};
pub use instruction::{Instruction, InstructionKind};
pub use merge::{MergeOutcome, MergeSequencer};
pub use rebase::{RebaseOutcome, RebaseSequencer};
pub use state::{MergeState, RewrittenMap, SequenceState};
pub use store::{FileStore, MemoryStore, SequenceStore};
