//! CLI argument parsing
//!
//! # Usage
//!
//! ```bash
//! subloc train config.yaml
//! subloc train config.yaml --resume runs/ffn_default_01-02_03-04-05 --epochs 10
//! subloc evaluate config.yaml --checkpoint runs/ffn_default_01-02_03-04-05
//! subloc validate config.yaml
//! subloc stats data/train.fasta --max-length 6000
//! ```

mod core;

pub use core::{
    apply_evaluate_overrides, apply_overrides, parse_args, Cli, Command, EvaluateArgs, StatsArgs,
    TrainArgs, ValidateArgs,
};
