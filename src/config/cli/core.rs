//! Core CLI types - Cli, Command, and argument structs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::RunConfig;
use crate::data::KeyFormat;

/// subloc: protein subcellular localization training and evaluation
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "subloc")]
#[command(version)]
#[command(about = "Train and evaluate localization and solubility classifiers over protein embeddings")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Train a model from YAML configuration
    Train(TrainArgs),

    /// Bootstrap-evaluate trained runs on the test set
    Evaluate(EvaluateArgs),

    /// Validate a configuration file without training
    Validate(ValidateArgs),

    /// Print label and length statistics of a fasta file
    Stats(StatsArgs),
}

/// Arguments for the train command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct TrainArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Resume training from a run directory
    #[arg(short, long)]
    pub resume: Option<PathBuf>,

    /// Override number of epochs
    #[arg(short, long)]
    pub epochs: Option<usize>,

    /// Override batch size
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Override learning rate
    #[arg(short, long)]
    pub lr: Option<f32>,

    /// Random seed for reproducibility
    #[arg(long)]
    pub seed: Option<u64>,

    /// Dry run (validate config and load data but don't train)
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the evaluate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct EvaluateArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Run directories to evaluate
    #[arg(short, long = "checkpoint", value_name = "DIR", required = true, num_args = 1..)]
    pub checkpoints: Vec<PathBuf>,

    /// Override number of bootstrap draws
    #[arg(short, long)]
    pub n_draws: Option<usize>,

    /// Override the annotation transfer accuracy threshold
    #[arg(short, long)]
    pub accuracy_threshold: Option<f64>,

    /// Override the report name (`evaluation_<name>.txt`)
    #[arg(short, long)]
    pub output_name: Option<String>,
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

/// Arguments for the stats command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct StatsArgs {
    /// Annotated fasta file
    #[arg(value_name = "FASTA")]
    pub fasta: PathBuf,

    /// Header layout (hash, fasta_descriptor, fasta_descriptor_old)
    #[arg(short, long, default_value = "hash")]
    pub key_format: KeyFormat,

    /// Length cutoff to report the share of longer sequences for
    #[arg(short, long, default_value_t = 6000)]
    pub max_length: usize,
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Apply command-line overrides to a RunConfig
pub fn apply_overrides(config: &mut RunConfig, args: &TrainArgs) {
    if let Some(epochs) = args.epochs {
        config.training.num_epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        config.training.batch_size = batch_size;
    }
    if let Some(lr) = args.lr {
        config.optimizer.lr = lr;
    }
    if let Some(seed) = args.seed {
        config.training.seed = seed;
    }
}

/// Apply evaluate-command overrides to a RunConfig
pub fn apply_evaluate_overrides(config: &mut RunConfig, args: &EvaluateArgs) {
    if let Some(n_draws) = args.n_draws {
        config.evaluation.n_draws = n_draws;
    }
    if let Some(threshold) = args.accuracy_threshold {
        config.evaluation.accuracy_threshold = threshold;
    }
    if let Some(name) = &args.output_name {
        config.evaluation.output_name = name.clone();
    }
}
