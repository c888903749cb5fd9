use anyhow::{Context, Result, bail};
use splice_core::{Config, FileStore, SequenceStore};
use splice_git::{Oid, RefStore, Repository};

use crate::output;

/// Helper to open the repository, its sequence store and configuration.
pub fn open_repo() -> Result<(Repository, FileStore, Config)> {
    let repo = Repository::open_current().context("Not inside a git repository")?;
    let store = FileStore::new(repo.git_dir());
    let config = Config::load(Config::path_in(repo.git_dir()))
        .context("Failed to load splice configuration")?;
    Ok((repo, store, config))
}

/// Refuse to start a new operation while another one is stopped.
pub fn ensure_idle(store: &FileStore) -> Result<()> {
    if store.rebase_in_progress() {
        bail!("A rebase is in progress - use `splice rebase --continue` or `--abort`");
    }
    if store.cherry_pick_head()?.is_some() {
        bail!("A cherry-pick is in progress - use `splice cherry-pick --continue` or `--abort`");
    }
    if store.merge_state()?.is_some() {
        bail!("A merge is in progress - use `splice merge --continue` or `--abort`");
    }
    Ok(())
}

/// Split repeated `-m` values into a subject and an optional body, the
/// way git joins them: one paragraph per value.
pub fn split_messages(messages: &[String]) -> Option<(String, Option<String>)> {
    let (subject, rest) = messages.split_first()?;
    let body: Vec<&str> = rest
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .collect();
    let description = (!body.is_empty()).then(|| body.join("\n\n"));
    Some((subject.clone(), description))
}

/// Abbreviated commit hash for display.
pub fn short(oid: Oid) -> String {
    let hash = oid.to_string();
    hash[..8.min(hash.len())].to_string()
}

/// Print the conflicted paths and how to resume, then fail with an empty
/// error so the process exits non-zero.
pub fn stop_on_conflict(operation: &str, paths: &[String]) -> Result<()> {
    output::warn(&format!("Conflicts in {} file(s):", paths.len()));
    output::path_list(paths);
    output::detail("");
    output::detail(&format!(
        "Resolve the conflicts, stage them with `git add`, then run `splice {operation} --continue`."
    ));
    output::detail(&format!("To give up, run `splice {operation} --abort`."));
    bail!("")
}
