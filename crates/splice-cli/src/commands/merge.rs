//! `splice merge` command - Join another branch into the current one.

use anyhow::{Result, bail};
use clap::Args;
use splice_core::{MergeOutcome, MergeSequencer};

use super::utils::{self, short};
use crate::output;

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Branch or commit to merge.
    pub source: Option<String>,

    /// Refuse to merge unless a fast-forward is possible.
    #[arg(long, conflicts_with = "no_ff")]
    pub ff_only: bool,

    /// Always create a merge commit.
    #[arg(long)]
    pub no_ff: bool,

    /// Message for the merge commit. Repeat to add body paragraphs.
    #[arg(short, long)]
    pub message: Vec<String>,

    /// Create the merge commit after resolving conflicts.
    #[arg(long = "continue")]
    pub continue_: bool,

    /// Abort the merge and reset to HEAD.
    #[arg(long)]
    pub abort: bool,
}

/// Run the merge command.
pub fn run(args: &MergeArgs) -> Result<()> {
    let (repo, store, config) = utils::open_repo()?;
    let sequencer = MergeSequencer::new(&repo, &store);

    if args.continue_ && args.abort {
        bail!("Cannot use --continue and --abort together");
    }

    if args.abort {
        if !sequencer.is_in_progress()? {
            bail!("No merge in progress to abort");
        }
        sequencer.abort_merge()?;
        output::success("Merge aborted");
        return Ok(());
    }

    if args.continue_ {
        if !sequencer.is_in_progress()? {
            bail!("No merge in progress to continue");
        }
        return handle_outcome("the merge", sequencer.continue_merge()?);
    }

    let Some(source) = args.source.as_deref() else {
        bail!("Missing source - usage: splice merge <SOURCE>");
    };
    utils::ensure_idle(&store)?;

    let (message, description) = utils::split_messages(&args.message)
        .unwrap_or_else(|| (config.merge.message_for(source), None));
    let description = description.as_deref();

    let outcome = if args.no_ff {
        sequencer.merge_no_fast_forward(source, &message, description)?
    } else {
        match sequencer.merge_fast_forward(source, None)? {
            MergeOutcome::Diverged if args.ff_only => {
                bail!("Not possible to fast-forward - {source} has diverged");
            }
            MergeOutcome::Diverged => {
                sequencer.merge_no_fast_forward(source, &message, description)?
            }
            outcome => outcome,
        }
    };

    handle_outcome(source, outcome)
}

fn handle_outcome(source: &str, outcome: MergeOutcome) -> Result<()> {
    match outcome {
        MergeOutcome::NothingToMerge(_) => {
            output::success("Already up to date");
            Ok(())
        }
        MergeOutcome::FastForward(oid) => {
            output::success(&format!("Fast-forwarded to {}", short(oid)));
            Ok(())
        }
        MergeOutcome::Merged(oid) => {
            output::success(&format!("Merged {source} ({})", short(oid)));
            Ok(())
        }
        MergeOutcome::Diverged => bail!("Branches have diverged"),
        MergeOutcome::DirtyWorktree => {
            bail!("Your local changes would be overwritten - commit or stash them first")
        }
        MergeOutcome::Conflict { paths } => utils::stop_on_conflict("merge", &paths),
    }
}
