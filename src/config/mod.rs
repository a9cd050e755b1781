//! Declarative run configuration
//!
//! A run is described by one YAML file (see [`RunConfig`]). Loading merges
//! serde defaults, the file and, when resuming, the stored
//! `train_arguments.yaml`; CLI flags are applied last.

pub mod cli;
mod loader;
mod schema;

pub use cli::{apply_evaluate_overrides, apply_overrides, parse_args, Cli, Command};
pub use loader::{load_and_validate, load_config, load_evaluation_config, merge_values};
pub use schema::{
    DataConfig, EvaluationConfig, ModelConfig, OptimizerConfig, RunConfig, Target,
    TrainingConfig, KNOWN_OPTIMIZERS,
};
