//! On-disk state in the git directory.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use splice_git::{Oid, Signature};

use super::{SequenceStore, reconcile_todo};
use crate::error::{Error, Result};
use crate::instruction::{Instruction, format_todo, parse_todo};
use crate::state::{FixupLink, MergeState, RebaseSetup, RewrittenMap, SequenceState};

/// Value of `head-name` for a rebase started on a detached HEAD.
const DETACHED: &str = "detached HEAD";

/// Sequence state stored next to git's own, under `.git/`.
#[derive(Debug)]
pub struct FileStore {
    git_dir: PathBuf,
}

impl FileStore {
    const REBASE_DIR: &'static str = "rebase-merge";
    const ONTO: &'static str = "onto";
    const HEAD_NAME: &'static str = "head-name";
    const ORIG_HEAD: &'static str = "orig-head";
    const AUTHOR_SCRIPT: &'static str = "author-script";
    const AMEND: &'static str = "amend";
    const MESSAGE: &'static str = "message";
    const CURRENT_FIXUPS: &'static str = "current-fixups";
    const REWRITTEN_LIST: &'static str = "rewritten-list";
    const REWRITTEN_PENDING: &'static str = "rewritten-pending";
    const TODO: &'static str = "git-rebase-todo";
    const TODO_BACKUP: &'static str = "git-rebase-todo.backup";
    const DONE: &'static str = "done";

    const REBASE_HEAD: &'static str = "REBASE_HEAD";
    const CHERRY_PICK_HEAD: &'static str = "CHERRY_PICK_HEAD";
    const MERGE_HEAD: &'static str = "MERGE_HEAD";
    const MERGE_MODE: &'static str = "MERGE_MODE";
    const MERGE_MSG: &'static str = "MERGE_MSG";

    /// Create a store over a git directory (`.git`).
    #[must_use]
    pub fn new(git_dir: impl Into<PathBuf>) -> Self {
        Self {
            git_dir: git_dir.into(),
        }
    }

    /// Path to the git directory.
    #[must_use]
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn rebase_dir(&self) -> PathBuf {
        self.git_dir.join(Self::REBASE_DIR)
    }

    fn rebase_file(&self, name: &str) -> PathBuf {
        self.rebase_dir().join(name)
    }

    // === Rebase files ===

    fn load_setup(&self) -> Result<RebaseSetup> {
        let onto = read_oid(&self.rebase_file(Self::ONTO))?;
        let orig_head = read_oid(&self.rebase_file(Self::ORIG_HEAD))?;
        let head_name = read_optional(&self.rebase_file(Self::HEAD_NAME))?
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty() && name != DETACHED);

        Ok(RebaseSetup {
            onto,
            head_name,
            orig_head,
        })
    }

    fn save_setup(&self, setup: &RebaseSetup) -> Result<()> {
        write_atomic(&self.rebase_file(Self::ONTO), &format!("{}\n", setup.onto))?;
        write_atomic(
            &self.rebase_file(Self::HEAD_NAME),
            &format!("{}\n", setup.head_name.as_deref().unwrap_or(DETACHED)),
        )?;
        write_atomic(
            &self.rebase_file(Self::ORIG_HEAD),
            &format!("{}\n", setup.orig_head),
        )
    }

    fn load_rewritten(&self) -> Result<RewrittenMap> {
        let list_path = self.rebase_file(Self::REWRITTEN_LIST);
        let entries = read_optional(&list_path)?
            .unwrap_or_default()
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let (old, new) = line
                    .split_once(' ')
                    .ok_or_else(|| parse_error(&list_path, line))?;
                Ok((parse_oid(&list_path, old)?, parse_oid(&list_path, new)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let pending_path = self.rebase_file(Self::REWRITTEN_PENDING);
        let pending = read_optional(&pending_path)?
            .unwrap_or_default()
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| parse_oid(&pending_path, line))
            .collect::<Result<Vec<_>>>()?;

        Ok(RewrittenMap::from_parts(entries, pending))
    }

    fn save_rewritten(&self, rewritten: &RewrittenMap) -> Result<()> {
        let list: String = rewritten
            .entries()
            .iter()
            .map(|(old, new)| format!("{old} {new}\n"))
            .collect();
        let pending: String = rewritten.pending().iter().map(|oid| format!("{oid}\n")).collect();

        write_or_remove(&self.rebase_file(Self::REWRITTEN_LIST), Some(list).filter(|s| !s.is_empty()))?;
        write_or_remove(
            &self.rebase_file(Self::REWRITTEN_PENDING),
            Some(pending).filter(|s| !s.is_empty()),
        )
    }

    fn load_fixups(&self) -> Result<Vec<FixupLink>> {
        let path = self.rebase_file(Self::CURRENT_FIXUPS);
        read_optional(&path)?
            .unwrap_or_default()
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let (keyword, hash) = line
                    .split_once(' ')
                    .ok_or_else(|| parse_error(&path, line))?;
                let oid = parse_oid(&path, hash)?;
                match keyword {
                    "fixup" => Ok(FixupLink::Fixup(oid)),
                    "squash" => Ok(FixupLink::Squash(oid)),
                    _ => Err(parse_error(&path, line)),
                }
            })
            .collect()
    }

    fn read_todo_file(&self, name: &str) -> Result<Option<Vec<Instruction>>> {
        read_optional(&self.rebase_file(name))?
            .map(|text| parse_todo(&text))
            .transpose()
    }
}

impl SequenceStore for FileStore {
    fn rebase_in_progress(&self) -> bool {
        self.rebase_file(Self::TODO).exists()
    }

    fn begin_rebase(&self, state: &SequenceState, todo: &[Instruction]) -> Result<()> {
        fs::create_dir_all(self.rebase_dir())?;

        self.save_rebase_state(state)?;
        let text = format_todo(todo);
        write_atomic(&self.rebase_file(Self::TODO_BACKUP), &text)?;
        write_atomic(&self.rebase_file(Self::DONE), "")?;
        // Written last: its presence marks the rebase as started.
        write_atomic(&self.rebase_file(Self::TODO), &text)
    }

    fn load_rebase_state(&self) -> Result<SequenceState> {
        if !self.rebase_dir().exists() {
            return Err(Error::NoSequenceInProgress("rebase"));
        }

        let amend_path = self.rebase_file(Self::AMEND);
        let amend = read_optional(&amend_path)?
            .filter(|text| !text.trim().is_empty())
            .map(|text| parse_oid(&amend_path, &text))
            .transpose()?;

        let author_path = self.rebase_file(Self::AUTHOR_SCRIPT);
        let author = read_optional(&author_path)?
            .map(|text| parse_author_script(&author_path, &text))
            .transpose()?;

        let head_path = self.git_dir.join(Self::REBASE_HEAD);
        let rebase_head = read_optional(&head_path)?
            .filter(|text| !text.trim().is_empty())
            .map(|text| parse_oid(&head_path, &text))
            .transpose()?;

        Ok(SequenceState {
            setup: self.load_setup()?,
            amend,
            author,
            message: read_optional(&self.rebase_file(Self::MESSAGE))?,
            current_fixups: self.load_fixups()?,
            rewritten: self.load_rewritten()?,
            rebase_head,
        })
    }

    fn save_rebase_state(&self, state: &SequenceState) -> Result<()> {
        fs::create_dir_all(self.rebase_dir())?;

        self.save_setup(&state.setup)?;
        write_or_remove(
            &self.rebase_file(Self::AMEND),
            state.amend.map(|oid| format!("{oid}\n")),
        )?;
        write_or_remove(
            &self.rebase_file(Self::AUTHOR_SCRIPT),
            state.author.as_ref().map(format_author_script),
        )?;
        write_or_remove(&self.rebase_file(Self::MESSAGE), state.message.clone())?;

        let fixups: String = state
            .current_fixups
            .iter()
            .map(|link| format!("{} {}\n", link.keyword(), link.target()))
            .collect();
        write_or_remove(
            &self.rebase_file(Self::CURRENT_FIXUPS),
            Some(fixups).filter(|s| !s.is_empty()),
        )?;

        self.save_rewritten(&state.rewritten)?;
        write_or_remove(
            &self.git_dir.join(Self::REBASE_HEAD),
            state.rebase_head.map(|oid| format!("{oid}\n")),
        )
    }

    fn todo(&self) -> Result<Vec<Instruction>> {
        let todo = self
            .read_todo_file(Self::TODO)?
            .ok_or(Error::NoSequenceInProgress("rebase"))?;
        let original_len = self.read_todo_file(Self::TODO_BACKUP)?.map(|t| t.len());
        let done_len = self.done()?.len();

        Ok(reconcile_todo(todo, done_len, original_len))
    }

    fn done(&self) -> Result<Vec<Instruction>> {
        Ok(self.read_todo_file(Self::DONE)?.unwrap_or_default())
    }

    fn advance(&self) -> Result<()> {
        let mut todo = self.todo()?;
        if todo.is_empty() {
            return Ok(());
        }
        let finished = todo.remove(0);

        let mut done = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.rebase_file(Self::DONE))?;
        writeln!(done, "{finished}")?;
        done.sync_all()?;

        write_atomic(&self.rebase_file(Self::TODO), &format_todo(&todo))
    }

    fn clear_rebase(&self) -> Result<()> {
        let dir = self.rebase_dir();
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        remove_if_exists(&self.git_dir.join(Self::REBASE_HEAD))
    }

    fn cherry_pick_head(&self) -> Result<Option<Oid>> {
        let path = self.git_dir.join(Self::CHERRY_PICK_HEAD);
        read_optional(&path)?
            .filter(|text| !text.trim().is_empty())
            .map(|text| parse_oid(&path, &text))
            .transpose()
    }

    fn set_cherry_pick_head(&self, oid: Oid) -> Result<()> {
        write_atomic(&self.git_dir.join(Self::CHERRY_PICK_HEAD), &format!("{oid}\n"))
    }

    fn clear_cherry_pick_head(&self) -> Result<()> {
        remove_if_exists(&self.git_dir.join(Self::CHERRY_PICK_HEAD))
    }

    fn merge_state(&self) -> Result<Option<MergeState>> {
        let head_path = self.git_dir.join(Self::MERGE_HEAD);
        let Some(head) = read_optional(&head_path)?.filter(|text| !text.trim().is_empty()) else {
            return Ok(None);
        };

        Ok(Some(MergeState {
            head: parse_oid(&head_path, &head)?,
            mode: read_optional(&self.git_dir.join(Self::MERGE_MODE))?
                .map(|mode| mode.trim().to_string())
                .unwrap_or_default(),
            message: read_optional(&self.git_dir.join(Self::MERGE_MSG))?.unwrap_or_default(),
        }))
    }

    fn save_merge_state(&self, state: &MergeState) -> Result<()> {
        write_atomic(&self.git_dir.join(Self::MERGE_MSG), &state.message)?;
        write_atomic(&self.git_dir.join(Self::MERGE_MODE), &state.mode)?;
        // Written last: its presence marks the merge as in progress.
        write_atomic(&self.git_dir.join(Self::MERGE_HEAD), &format!("{}\n", state.head))
    }

    fn clear_merge_state(&self) -> Result<()> {
        remove_if_exists(&self.git_dir.join(Self::MERGE_HEAD))?;
        remove_if_exists(&self.git_dir.join(Self::MERGE_MODE))?;
        remove_if_exists(&self.git_dir.join(Self::MERGE_MSG))
    }
}

// === File helpers ===

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write through a temporary file in the same directory so readers never
/// see a half-written file.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(content.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn write_or_remove(path: &Path, content: Option<String>) -> Result<()> {
    match content {
        Some(content) => write_atomic(path, &content),
        None => remove_if_exists(path),
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn parse_error(path: &Path, message: &str) -> Error {
    Error::StateParseError {
        file: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn parse_oid(path: &Path, text: &str) -> Result<Oid> {
    Oid::from_str(text.trim()).map_err(|_| parse_error(path, &format!("invalid object id '{}'", text.trim())))
}

fn read_oid(path: &Path) -> Result<Oid> {
    let text = read_optional(path)?.ok_or_else(|| parse_error(path, "file is missing"))?;
    parse_oid(path, &text)
}

// === author-script ===

fn format_author_script(author: &Signature) -> String {
    format!(
        "GIT_AUTHOR_NAME={}\nGIT_AUTHOR_EMAIL={}\nGIT_AUTHOR_DATE={}\n",
        shell_quote(&author.name),
        shell_quote(&author.email),
        shell_quote(&author.raw_date()),
    )
}

fn parse_author_script(path: &Path, text: &str) -> Result<Signature> {
    let mut name = None;
    let mut email = None;
    let mut date = None;

    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        let (key, value) = line.split_once('=').ok_or_else(|| parse_error(path, line))?;
        let value = shell_unquote(value).ok_or_else(|| parse_error(path, line))?;
        match key {
            "GIT_AUTHOR_NAME" => name = Some(value),
            "GIT_AUTHOR_EMAIL" => email = Some(value),
            "GIT_AUTHOR_DATE" => date = Some(value),
            _ => return Err(parse_error(path, line)),
        }
    }

    let missing = |field: &str| parse_error(path, &format!("missing {field}"));
    let date = date.ok_or_else(|| missing("GIT_AUTHOR_DATE"))?;
    let when = Signature::parse_raw_date(&date).map_err(|e| parse_error(path, &e.to_string()))?;

    Ok(Signature::new(
        name.ok_or_else(|| missing("GIT_AUTHOR_NAME"))?,
        email.ok_or_else(|| missing("GIT_AUTHOR_EMAIL"))?,
        when,
    ))
}

/// Quote for a POSIX shell: `it's` becomes `'it'\''s'`.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn shell_unquote(value: &str) -> Option<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    let mut quoted = false;

    while let Some(c) = chars.next() {
        match (quoted, c) {
            (true, '\'') => quoted = false,
            (true, c) => out.push(c),
            (false, '\'') => quoted = true,
            (false, '\\') => out.push(chars.next()?),
            (false, c) => out.push(c),
        }
    }

    (!quoted).then_some(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::instruction::InstructionKind;
    use chrono::{FixedOffset, TimeZone};
    use tempfile::TempDir;

    fn oid(n: u8) -> Oid {
        Oid::from_bytes(&[n; 20]).unwrap()
    }

    fn setup_store() -> (TempDir, FileStore) {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path());
        (temp, store)
    }

    fn sample_state() -> SequenceState {
        SequenceState::new(RebaseSetup {
            onto: oid(1),
            head_name: Some("refs/heads/feature".into()),
            orig_head: oid(2),
        })
    }

    fn sample_todo() -> Vec<Instruction> {
        vec![
            Instruction::new(InstructionKind::Pick, oid(3), "First"),
            Instruction::new(InstructionKind::Fixup, oid(4), "fixup! First"),
            Instruction::stop(),
        ]
    }

    #[test]
    fn test_rebase_lifecycle() {
        let (temp, store) = setup_store();
        assert!(!store.rebase_in_progress());

        store.begin_rebase(&sample_state(), &sample_todo()).unwrap();
        assert!(store.rebase_in_progress());
        assert!(temp.path().join("rebase-merge/git-rebase-todo.backup").exists());
        assert_eq!(
            fs::read_to_string(temp.path().join("rebase-merge/head-name")).unwrap(),
            "refs/heads/feature\n"
        );

        assert_eq!(store.todo().unwrap(), sample_todo());
        assert!(store.done().unwrap().is_empty());

        store.advance().unwrap();
        assert_eq!(store.todo().unwrap(), sample_todo()[1..]);
        assert_eq!(store.done().unwrap(), sample_todo()[..1]);

        store.clear_rebase().unwrap();
        assert!(!store.rebase_in_progress());
        assert!(!temp.path().join("rebase-merge").exists());
        assert!(matches!(
            store.load_rebase_state(),
            Err(Error::NoSequenceInProgress("rebase"))
        ));
    }

    #[test]
    fn test_todo_never_repeats_done_instruction() {
        let (temp, store) = setup_store();
        store.begin_rebase(&sample_state(), &sample_todo()).unwrap();

        // Simulate a crash after the done entry was written but before the
        // todo was rewritten.
        fs::write(
            temp.path().join("rebase-merge/done"),
            format_todo(&sample_todo()[..1]),
        )
        .unwrap();

        assert_eq!(store.todo().unwrap(), sample_todo()[1..]);
        store.advance().unwrap();
        assert_eq!(store.todo().unwrap(), sample_todo()[2..]);
        assert_eq!(store.done().unwrap(), sample_todo()[..2]);
    }

    #[test]
    fn test_state_roundtrip() {
        let (temp, store) = setup_store();
        let when = FixedOffset::east_opt(3600)
            .unwrap()
            .timestamp_opt(1_700_000_000, 0)
            .unwrap();

        let mut state = sample_state();
        state.amend = Some(oid(5));
        state.author = Some(Signature::new("O'Brien", "ob@example.com", when));
        state.message = Some("Subject\n\nBody\n".into());
        state.current_fixups = vec![FixupLink::Fixup(oid(6)), FixupLink::Squash(oid(7))];
        state.rewritten.record(oid(3), oid(8));
        state.rewritten.defer(oid(9));
        state.rebase_head = Some(oid(6));

        store.begin_rebase(&state, &sample_todo()).unwrap();
        let loaded = store.load_rebase_state().unwrap();
        assert_eq!(loaded, state);

        let script = fs::read_to_string(temp.path().join("rebase-merge/author-script")).unwrap();
        assert!(script.contains(r"GIT_AUTHOR_NAME='O'\''Brien'"));
        assert!(script.contains("GIT_AUTHOR_DATE='@1700000000 +0100'"));
        assert!(temp.path().join("REBASE_HEAD").exists());

        // Clearing optional markers removes their files.
        state.clear_step();
        state.clear_chain();
        store.save_rebase_state(&state).unwrap();
        assert!(!temp.path().join("rebase-merge/amend").exists());
        assert!(!temp.path().join("rebase-merge/message").exists());
        assert!(!temp.path().join("rebase-merge/current-fixups").exists());
        assert!(!temp.path().join("REBASE_HEAD").exists());
        assert_eq!(store.load_rebase_state().unwrap(), state);
    }

    #[test]
    fn test_detached_head_name() {
        let (_temp, store) = setup_store();
        let mut state = sample_state();
        state.setup.head_name = None;

        store.begin_rebase(&state, &[]).unwrap();
        assert_eq!(store.load_rebase_state().unwrap().setup.head_name, None);
    }

    #[test]
    fn test_corrupt_state_is_reported() {
        let (temp, store) = setup_store();
        store.begin_rebase(&sample_state(), &sample_todo()).unwrap();
        fs::write(temp.path().join("rebase-merge/onto"), "not-a-hash\n").unwrap();

        assert!(matches!(
            store.load_rebase_state(),
            Err(Error::StateParseError { .. })
        ));
    }

    #[test]
    fn test_cherry_pick_head() {
        let (temp, store) = setup_store();
        assert_eq!(store.cherry_pick_head().unwrap(), None);

        store.set_cherry_pick_head(oid(4)).unwrap();
        assert_eq!(store.cherry_pick_head().unwrap(), Some(oid(4)));

        // An empty marker counts as absent.
        fs::write(temp.path().join("CHERRY_PICK_HEAD"), "").unwrap();
        assert_eq!(store.cherry_pick_head().unwrap(), None);

        store.clear_cherry_pick_head().unwrap();
        store.clear_cherry_pick_head().unwrap();
        assert!(!temp.path().join("CHERRY_PICK_HEAD").exists());
    }

    #[test]
    fn test_merge_state() {
        let (temp, store) = setup_store();
        assert_eq!(store.merge_state().unwrap(), None);

        let state = MergeState {
            head: oid(7),
            mode: "no-ff".into(),
            message: "Merge branch 'topic'".into(),
        };
        store.save_merge_state(&state).unwrap();
        assert_eq!(
            fs::read_to_string(temp.path().join("MERGE_MODE")).unwrap(),
            "no-ff"
        );
        assert_eq!(store.merge_state().unwrap(), Some(state));

        store.clear_merge_state().unwrap();
        assert_eq!(store.merge_state().unwrap(), None);
        assert!(!temp.path().join("MERGE_MSG").exists());
    }

    #[test]
    fn test_shell_quoting() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_unquote(&shell_quote("it's")).unwrap(), "it's");
        assert_eq!(shell_unquote("'unterminated"), None);
    }
}
