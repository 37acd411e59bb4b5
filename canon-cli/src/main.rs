//! Canon CLI - command-line interface for the Canon registry.

use clap::Parser;

use canon_cli::cli::{Cli, Command};
use canon_cli::commands;
use canon_cli::error::CliResult;
use canon_cli::logging;
use canon_cli::output;

#[tokio::main]
async fn main() {
    logging::init();

    if let Err(e) = run().await {
        output::newline();
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Command::Check(args) => commands::check::run(args, config).await,
        Command::Migrate(args) => commands::migrate::run(args, config).await,
        Command::Validate(args) => commands::validate::run(args, config).await,
        Command::Current => commands::current::run(config).await,
        Command::Rollback(args) => commands::rollback::run(args, config).await,
        Command::Drift(args) => commands::drift::run(args, config).await,
        Command::Sync(args) => commands::sync::run(args, config).await,
        Command::Version => commands::version::run().await,
    }
}
