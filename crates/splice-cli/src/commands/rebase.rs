//! `splice rebase` command - Replay the current branch onto an upstream.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use splice_core::instruction::{format_todo, parse_todo_with};
use splice_core::{FileStore, Instruction, RebaseOutcome, RebaseSequencer};
use splice_git::{RefStore, Repository};

use super::utils::{self, short};
use crate::output;

#[derive(Debug, Args)]
pub struct RebaseArgs {
    /// Branch or commit to replay onto.
    pub upstream: Option<String>,

    /// Resume a stopped rebase.
    #[arg(long = "continue")]
    pub continue_: bool,

    /// Abort the rebase and restore the original branch.
    #[arg(long)]
    pub abort: bool,

    /// Message for the pending commit when continuing. Repeat to add body
    /// paragraphs.
    #[arg(short, long)]
    pub message: Vec<String>,

    /// Run the instructions in FILE instead of the default todo list.
    #[arg(long, value_name = "FILE")]
    pub todo: Option<PathBuf>,

    /// Print the default todo list and exit.
    #[arg(long)]
    pub todo_only: bool,

    /// Move `fixup!`/`squash!` commits after the commit they name.
    #[arg(long)]
    pub autosquash: bool,
}

/// Run the rebase command.
pub fn run(args: &RebaseArgs) -> Result<()> {
    let (repo, store, config) = utils::open_repo()?;
    let sequencer = RebaseSequencer::new(&repo, &store)
        .with_autosquash(args.autosquash || config.rebase.autosquash);

    if args.continue_ && args.abort {
        bail!("Cannot use --continue and --abort together");
    }

    if args.abort {
        if !sequencer.is_in_progress() {
            bail!("No rebase in progress to abort");
        }
        sequencer.abort_rebase()?;
        output::success("Rebase aborted - original branch restored");
        return Ok(());
    }

    if args.continue_ {
        if !sequencer.is_in_progress() {
            bail!("No rebase in progress to continue");
        }
        output::info("Continuing rebase...");
        let (message, description) = utils::split_messages(&args.message).unzip();
        let outcome =
            sequencer.continue_rebase(message.as_deref(), description.flatten().as_deref())?;
        return handle_outcome(&sequencer, outcome);
    }

    if !args.message.is_empty() {
        bail!("--message can only be used with --continue");
    }

    let Some(upstream) = args.upstream.as_deref() else {
        bail!("Missing upstream - usage: splice rebase <UPSTREAM>");
    };

    if args.todo_only {
        let onto = repo
            .resolve(upstream)
            .with_context(|| format!("Unknown upstream '{upstream}'"))?;
        output::essential(format_todo(&sequencer.default_todo(onto)?).trim_end());
        return Ok(());
    }

    utils::ensure_idle(&store)?;

    let outcome = match &args.todo {
        Some(path) => {
            let todo = read_todo(&repo, path)?;
            output::info(&format!("Rebasing onto {upstream} ({} instructions)...", todo.len()));
            sequencer.interactive_rebase(upstream, &todo)?
        }
        None => {
            output::info(&format!("Rebasing onto {upstream}..."));
            sequencer.rebase(upstream)?
        }
    };

    handle_outcome(&sequencer, outcome)
}

/// Read a todo file, resolving abbreviated hashes and branch names.
fn read_todo(repo: &Repository, path: &Path) -> Result<Vec<Instruction>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read todo file {}", path.display()))?;
    let todo = parse_todo_with(&text, |hash| Ok(repo.resolve(hash)?))
        .with_context(|| format!("Invalid todo file {}", path.display()))?;
    Ok(todo)
}

fn handle_outcome(
    sequencer: &RebaseSequencer<'_, Repository, FileStore>,
    outcome: RebaseOutcome,
) -> Result<()> {
    match outcome {
        RebaseOutcome::Completed(head) => {
            output::success(&format!("Rebase complete - HEAD is now at {}", short(head)));
            Ok(())
        }
        RebaseOutcome::Conflict { commit, paths } => {
            output::warn(&format!("Could not apply {}", short(commit)));
            utils::stop_on_conflict("rebase", &paths)
        }
        RebaseOutcome::EmptyDiff(commit) => {
            output::warn(&format!(
                "{} brings no changes - its content is already present",
                short(commit)
            ));
            stopped("Run `splice rebase --continue` to skip it.")
        }
        RebaseOutcome::Break => {
            output::info("Stopped at break");
            stopped("Run `splice rebase --continue` when ready.")
        }
        RebaseOutcome::Edit(commit) => {
            output::info(&format!("Stopped at {} for editing", short(commit)));
            stopped("Stage your changes, then run `splice rebase --continue`.")
        }
        RebaseOutcome::Reword(commit) | RebaseOutcome::Squash(commit) => {
            output::info(&format!("Commit {} waits for its message:", short(commit)));
            if let Some(message) = sequencer.stopped_message()? {
                output::hr();
                output::detail(message.trim_end());
                output::hr();
            }
            stopped("Run `splice rebase --continue -m <MESSAGE>`, or without -m to keep it.")
        }
    }
}

fn stopped(hint: &str) -> Result<()> {
    output::detail(hint);
    output::detail("To give up, run `splice rebase --abort`.");
    bail!("")
}
