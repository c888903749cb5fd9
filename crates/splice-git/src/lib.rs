//! # splice-git
//!
//! Git primitives for splice: object access, references, index and working
//! tree synchronization, and raw `git` invocation. Each primitive is a single
//! command without state; the sequencing logic lives in `splice-core`.

mod commit;
mod error;
mod index;
mod repository;
pub mod traits;

pub use commit::{CommitRecord, Signature, join_message, split_message};
pub use error::{Error, Result};
pub use git2::Oid;
pub use index::{CommandOutput, ConflictEntry, Stage, parse_unmerged_entries};
pub use repository::Repository;
pub use traits::{CommandRunner, GitOps, ObjectAccess, RefStore, WorktreeSync};
