//! Splice CLI - resumable rebase, cherry-pick and merge.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    output::set_quiet(cli.quiet);
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Rebase(args) => commands::rebase::run(&args),
        Commands::CherryPick(args) => commands::cherry_pick::run(&args),
        Commands::Merge(args) => commands::merge::run(&args),
        Commands::Status { json } => commands::status::run(json),
        Commands::Completions { shell } => commands::completions::run(shell),
    };

    if let Err(e) = result {
        // Stopped sequences print their own guidance and exit with an empty error.
        let message = format!("{e:#}");
        if !message.is_empty() {
            output::error(&message);
        }
        std::process::exit(1);
    }
}

/// Log to stderr, filtered by `SPLICE_LOG` (default `warn`); `-v` forces `debug`.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("SPLICE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
