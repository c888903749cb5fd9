//! `splice cherry-pick` command - Apply an existing commit on top of HEAD.

use anyhow::{Context, Result, bail};
use clap::Args;
use splice_core::{CherryPickOutcome, CherryPickSequencer, EmptyStrategy};
use splice_git::RefStore;

use super::utils::{self, short};
use crate::output;

#[derive(Debug, Args)]
pub struct CherryPickArgs {
    /// Commit to pick.
    pub commit: Option<String>,

    /// What to do when the commit brings no changes (stop, drop, keep).
    #[arg(long, value_name = "STRATEGY")]
    pub empty: Option<EmptyStrategy>,

    /// Commit the resolved cherry-pick.
    #[arg(long = "continue")]
    pub continue_: bool,

    /// Abort the cherry-pick and reset to HEAD.
    #[arg(long)]
    pub abort: bool,

    /// Record a cherry-pick that stopped because it was empty.
    #[arg(long)]
    pub commit_empty: bool,
}

/// Run the cherry-pick command.
pub fn run(args: &CherryPickArgs) -> Result<()> {
    let (repo, store, config) = utils::open_repo()?;
    let sequencer = CherryPickSequencer::new(&repo, &store);

    let flags = [args.continue_, args.abort, args.commit_empty];
    if flags.iter().filter(|set| **set).count() > 1 {
        bail!("Use only one of --continue, --abort and --commit-empty");
    }

    if args.abort {
        if !sequencer.is_in_progress()? {
            bail!("No cherry-pick in progress to abort");
        }
        sequencer.abort_cherry_pick()?;
        output::success("Cherry-pick aborted");
        return Ok(());
    }

    if args.continue_ || args.commit_empty {
        if !sequencer.is_in_progress()? {
            bail!("No cherry-pick in progress");
        }
        let outcome = if args.commit_empty {
            sequencer.commit_empty()?
        } else {
            sequencer.continue_cherry_pick()?
        };
        return handle_outcome(outcome);
    }

    let Some(commit) = args.commit.as_deref() else {
        bail!("Missing commit - usage: splice cherry-pick <COMMIT>");
    };
    utils::ensure_idle(&store)?;

    let oid = repo
        .resolve(commit)
        .with_context(|| format!("Unknown commit '{commit}'"))?;
    let empty = args.empty.unwrap_or(config.cherry_pick.empty);
    handle_outcome(sequencer.cherry_pick(oid, empty)?)
}

fn handle_outcome(outcome: CherryPickOutcome) -> Result<()> {
    match outcome {
        CherryPickOutcome::Committed(oid) => {
            output::success(&format!("Committed {}", short(oid)));
            Ok(())
        }
        CherryPickOutcome::Dropped => {
            output::info("Commit brings no changes - dropped");
            Ok(())
        }
        CherryPickOutcome::Empty(oid) => {
            output::warn(&format!("Cherry-pick of {} is empty", short(oid)));
            output::detail("Run `splice cherry-pick --commit-empty` to record it anyway,");
            output::detail("or `splice cherry-pick --abort` to give up.");
            bail!("")
        }
        CherryPickOutcome::Conflict { commit, paths } => {
            output::warn(&format!("Could not apply {}", short(commit)));
            utils::stop_on_conflict("cherry-pick", &paths)
        }
    }
}
