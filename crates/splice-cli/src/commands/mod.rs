//! Command definitions and dispatch targets.

use clap::{Parser, Subcommand};
use clap_complete::Shell;

pub mod cherry_pick;
pub mod completions;
pub mod merge;
pub mod rebase;
pub mod status;
mod utils;

/// Resumable rebase, cherry-pick and merge on top of git.
#[derive(Debug, Parser)]
#[command(name = "splice", version, about, long_about = None)]
pub struct Cli {
    /// Only print errors and essential output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log git invocations and sequencer steps to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay the current branch onto another commit.
    Rebase(rebase::RebaseArgs),

    /// Apply the changes of an existing commit on top of HEAD.
    CherryPick(cherry_pick::CherryPickArgs),

    /// Join another branch into the current one.
    Merge(merge::MergeArgs),

    /// Show the operation in progress, if any.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
