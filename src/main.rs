//! CaptureDeck CLI entry point

use std::process::ExitCode;

use clap::Parser;

use capture_deck::cli::{
    init_logging, run_config, run_formats, run_record, run_screenshot, Cli, Commands,
};

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Record(args) => run_record(args).await,
        Commands::Screenshot(args) => run_screenshot(args).await,
        Commands::Formats(args) => run_formats(args).await,
        Commands::Config { action } => run_config(action).await,
    }
}
