//! Evaluate command implementation

use std::path::Path;

use super::stores::{open_lookup, open_test};
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{apply_evaluate_overrides, cli::EvaluateArgs, load_evaluation_config, RunConfig};
use crate::eval::{BootstrapResampler, EvaluationResult, Evaluator, EvaluatorOptions};
use crate::model::ModelRegistry;
use crate::train::RunDirectory;
use crate::{Error, Result};

/// Config for one run: its stored arguments under the evaluation file and CLI flags
fn resolve_config(args: &EvaluateArgs, dir: &Path) -> Result<RunConfig> {
    let mut config = load_evaluation_config(&args.config, dir)?;
    apply_evaluate_overrides(&mut config, args);
    config.validate()?;
    Ok(config)
}

/// Rebuild the run's model from its checkpoint and evaluate it on its own test split
fn evaluate_run(dir: &Path, config: &RunConfig) -> Result<EvaluationResult> {
    let run = RunDirectory::open(dir)?;
    let test = open_test(config)?
        .ok_or_else(|| Error::ConfigError("data.test_remapping is required for evaluation".into()))?;
    let lookup = open_lookup(config)?;

    let checkpoint = run.load_checkpoint()?;
    let arch = &checkpoint.architecture;
    let mut model = ModelRegistry::with_builtins().create(
        &arch.name,
        &arch.params,
        arch.embedding_dim,
        config.training.seed,
    )?;
    model.load_state_dict(&checkpoint.model_state())?;

    let evaluator = Evaluator::new(EvaluatorOptions::from_config(config));
    let mut resampler = BootstrapResampler::new(config.training.seed);
    let result = evaluator.evaluate(model.as_mut(), &test, lookup.as_ref(), &mut resampler)?;
    result.write_reports(run.path())?;
    Ok(result)
}

pub fn run_evaluate(args: EvaluateArgs, level: LogLevel) -> std::result::Result<(), String> {
    let mut summary = Vec::with_capacity(args.checkpoints.len());
    for dir in &args.checkpoints {
        let config =
            resolve_config(&args, dir).map_err(|e| format!("Config error ({}): {e}", dir.display()))?;
        log(
            level,
            LogLevel::Normal,
            &format!("Evaluating {} (target {})", dir.display(), config.training.target),
        );
        let result = evaluate_run(dir, &config)
            .map_err(|e| format!("Evaluation error ({}): {e}", dir.display()))?;
        log(level, LogLevel::Normal, &result.to_string());
        summary.push((dir.clone(), result));
    }

    if summary.len() > 1 {
        log(level, LogLevel::Normal, "Summary:");
        for (dir, result) in &summary {
            log(
                level,
                LogLevel::Normal,
                &format!(
                    "  {} [{}]: accuracy {:.2}% ± {:.2}, MCC {:.4} ± {:.4}",
                    dir.display(),
                    result.target,
                    result.accuracy,
                    result.accuracy_stderr,
                    result.mcc,
                    result.mcc_stderr
                ),
            );
        }
    }
    Ok(())
}
