//! subloc CLI
//!
//! # Usage
//!
//! ```bash
//! # Train from config
//! subloc train config.yaml
//!
//! # Resume a run with a larger epoch budget
//! subloc train config.yaml --resume runs/ffn_default_01-02_03-04-05 --epochs 100
//!
//! # Bootstrap-evaluate trained runs
//! subloc evaluate config.yaml --checkpoint runs/a runs/b
//!
//! # Validate config
//! subloc validate config.yaml
//!
//! # Dataset statistics
//! subloc stats data/train.fasta
//! ```

use clap::Parser;
use std::process::ExitCode;
use subloc::cli::{init_logger, run_command, Cli, LogLevel};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(LogLevel::from_flags(cli.verbose, cli.quiet));

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
