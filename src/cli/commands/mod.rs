//! CLI command implementations

mod evaluate;
mod stores;
mod stats;
mod train;
mod validate;

use crate::cli::LogLevel;
use crate::config::{Cli, Command};

/// Execute a CLI command based on the parsed arguments
pub fn run_command(cli: Cli) -> Result<(), String> {
    let log_level = LogLevel::from_flags(cli.verbose, cli.quiet);

    match cli.command {
        Command::Train(args) => train::run_train(args, log_level),
        Command::Evaluate(args) => evaluate::run_evaluate(args, log_level),
        Command::Validate(args) => validate::run_validate(args, log_level),
        Command::Stats(args) => stats::run_stats(args, log_level),
    }
}
