//! In-memory state, for tests and dry runs.

use std::cell::RefCell;

use splice_git::Oid;

use super::SequenceStore;
use crate::error::{Error, Result};
use crate::instruction::Instruction;
use crate::state::{MergeState, SequenceState};

#[derive(Debug)]
struct RebaseSlot {
    state: SequenceState,
    todo: Vec<Instruction>,
    done: Vec<Instruction>,
}

/// A [`SequenceStore`] that never touches the disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rebase: RefCell<Option<RebaseSlot>>,
    cherry_pick_head: RefCell<Option<Oid>>,
    merge: RefCell<Option<MergeState>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SequenceStore for MemoryStore {
    fn rebase_in_progress(&self) -> bool {
        self.rebase.borrow().is_some()
    }

    fn begin_rebase(&self, state: &SequenceState, todo: &[Instruction]) -> Result<()> {
        *self.rebase.borrow_mut() = Some(RebaseSlot {
            state: state.clone(),
            todo: todo.to_vec(),
            done: Vec::new(),
        });
        Ok(())
    }

    fn load_rebase_state(&self) -> Result<SequenceState> {
        self.rebase
            .borrow()
            .as_ref()
            .map(|slot| slot.state.clone())
            .ok_or(Error::NoSequenceInProgress("rebase"))
    }

    fn save_rebase_state(&self, state: &SequenceState) -> Result<()> {
        let mut rebase = self.rebase.borrow_mut();
        let slot = rebase.as_mut().ok_or(Error::NoSequenceInProgress("rebase"))?;
        slot.state = state.clone();
        Ok(())
    }

    fn todo(&self) -> Result<Vec<Instruction>> {
        self.rebase
            .borrow()
            .as_ref()
            .map(|slot| slot.todo.clone())
            .ok_or(Error::NoSequenceInProgress("rebase"))
    }

    fn done(&self) -> Result<Vec<Instruction>> {
        Ok(self
            .rebase
            .borrow()
            .as_ref()
            .map(|slot| slot.done.clone())
            .unwrap_or_default())
    }

    fn advance(&self) -> Result<()> {
        let mut rebase = self.rebase.borrow_mut();
        let slot = rebase.as_mut().ok_or(Error::NoSequenceInProgress("rebase"))?;
        if !slot.todo.is_empty() {
            let finished = slot.todo.remove(0);
            slot.done.push(finished);
        }
        Ok(())
    }

    fn clear_rebase(&self) -> Result<()> {
        *self.rebase.borrow_mut() = None;
        Ok(())
    }

    fn cherry_pick_head(&self) -> Result<Option<Oid>> {
        Ok(*self.cherry_pick_head.borrow())
    }

    fn set_cherry_pick_head(&self, oid: Oid) -> Result<()> {
        *self.cherry_pick_head.borrow_mut() = Some(oid);
        Ok(())
    }

    fn clear_cherry_pick_head(&self) -> Result<()> {
        *self.cherry_pick_head.borrow_mut() = None;
        Ok(())
    }

    fn merge_state(&self) -> Result<Option<MergeState>> {
        Ok(self.merge.borrow().clone())
    }

    fn save_merge_state(&self, state: &MergeState) -> Result<()> {
        *self.merge.borrow_mut() = Some(state.clone());
        Ok(())
    }

    fn clear_merge_state(&self) -> Result<()> {
        *self.merge.borrow_mut() = None;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::instruction::InstructionKind;
    use crate::state::RebaseSetup;

    fn oid(n: u8) -> Oid {
        Oid::from_bytes(&[n; 20]).unwrap()
    }

    #[test]
    fn test_rebase_contract() {
        let store = MemoryStore::new();
        assert!(!store.rebase_in_progress());
        assert!(store.load_rebase_state().is_err());
        assert!(store.done().unwrap().is_empty());

        let mut state = SequenceState::new(RebaseSetup {
            onto: oid(1),
            head_name: None,
            orig_head: oid(2),
        });
        let todo = vec![
            Instruction::new(InstructionKind::Pick, oid(3), "a"),
            Instruction::new(InstructionKind::Squash, oid(4), "b"),
        ];
        store.begin_rebase(&state, &todo).unwrap();
        assert!(store.rebase_in_progress());

        state.message = Some("a\n".into());
        store.save_rebase_state(&state).unwrap();
        assert_eq!(store.load_rebase_state().unwrap(), state);

        store.advance().unwrap();
        store.advance().unwrap();
        store.advance().unwrap();
        assert!(store.todo().unwrap().is_empty());
        assert_eq!(store.done().unwrap(), todo);

        store.clear_rebase().unwrap();
        assert!(!store.rebase_in_progress());
    }

    #[test]
    fn test_markers() {
        let store = MemoryStore::new();
        store.set_cherry_pick_head(oid(5)).unwrap();
        assert_eq!(store.cherry_pick_head().unwrap(), Some(oid(5)));
        store.clear_cherry_pick_head().unwrap();
        assert_eq!(store.cherry_pick_head().unwrap(), None);

        let merge = MergeState {
            head: oid(6),
            mode: "no-ff".into(),
            message: "Merge".into(),
        };
        store.save_merge_state(&merge).unwrap();
        assert_eq!(store.merge_state().unwrap(), Some(merge));
        store.clear_merge_state().unwrap();
        assert_eq!(store.merge_state().unwrap(), None);
    }
}
