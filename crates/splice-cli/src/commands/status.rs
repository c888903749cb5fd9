//! `splice status` command - Show the operation in progress.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use splice_core::{FileStore, SequenceStore};
use splice_git::{RefStore, Repository, WorktreeSync};

use super::utils;
use crate::output;

#[derive(Debug, Serialize)]
struct StatusReport {
    head: Option<String>,
    branch: Option<String>,
    operation: Option<Operation>,
    conflicts: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum Operation {
    Rebase {
        onto: String,
        branch: Option<String>,
        done: usize,
        remaining: usize,
        next: Option<String>,
        message: Option<String>,
    },
    CherryPick {
        commit: String,
    },
    Merge {
        source: String,
        mode: String,
    },
}

/// Run the status command.
pub fn run(json: bool) -> Result<()> {
    let (repo, store, _config) = utils::open_repo()?;
    let report = collect(&repo, &store)?;

    if json {
        output::essential(&serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn collect(repo: &Repository, store: &FileStore) -> Result<StatusReport> {
    let operation = if store.rebase_in_progress() {
        let state = store.load_rebase_state()?;
        let todo = store.todo()?;
        Some(Operation::Rebase {
            onto: state.setup.onto.to_string(),
            branch: state.setup.head_name.map(|name| branch_name(&name)),
            done: store.done()?.len(),
            remaining: todo.len(),
            next: todo.first().map(ToString::to_string),
            message: state.message,
        })
    } else if let Some(commit) = store.cherry_pick_head()? {
        Some(Operation::CherryPick {
            commit: commit.to_string(),
        })
    } else {
        store.merge_state()?.map(|merge| Operation::Merge {
            source: merge.head.to_string(),
            mode: merge.mode,
        })
    };

    let mut conflicts: Vec<String> = repo
        .unmerged_entries()?
        .into_iter()
        .map(|entry| entry.path)
        .collect();
    conflicts.dedup();

    Ok(StatusReport {
        head: repo.head_commit().ok().map(|oid| oid.to_string()),
        branch: repo.current_branch_ref().ok().map(|name| branch_name(&name)),
        operation,
        conflicts,
    })
}

fn branch_name(reference: &str) -> String {
    reference
        .strip_prefix("refs/heads/")
        .unwrap_or(reference)
        .to_string()
}

fn abbrev(hash: &str) -> &str {
    &hash[..8.min(hash.len())]
}

fn print_report(report: &StatusReport) {
    let head = report
        .head
        .as_deref()
        .map_or_else(|| "(no commits)".to_string(), |h| abbrev(h).to_string());
    match &report.branch {
        Some(branch) => output::info(&format!("On {} at {head}", branch.cyan().bold())),
        None => output::info(&format!("HEAD detached at {head}")),
    }

    match &report.operation {
        None => output::success("No operation in progress"),
        Some(Operation::Rebase {
            onto,
            branch,
            done,
            remaining,
            next,
            message,
        }) => {
            let target = branch.as_deref().unwrap_or("detached HEAD");
            output::warn(&format!(
                "Rebasing {target} onto {} ({done} done, {remaining} remaining)",
                abbrev(onto)
            ));
            if let Some(next) = next {
                output::detail(&format!("  next: {next}"));
            }
            if let Some(message) = message {
                output::detail(&format!("  pending message: {}", message.lines().next().unwrap_or("")));
            }
        }
        Some(Operation::CherryPick { commit }) => {
            output::warn(&format!("Cherry-picking {}", abbrev(commit)));
        }
        Some(Operation::Merge { source, mode }) => {
            output::warn(&format!("Merging {} ({mode})", abbrev(source)));
        }
    }

    if !report.conflicts.is_empty() {
        output::warn(&format!("Unmerged paths ({}):", report.conflicts.len()));
        output::path_list(&report.conflicts);
    }
}
