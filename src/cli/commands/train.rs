//! Train command implementation

use super::stores::{open_lookup, open_test, open_train, open_val};
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{apply_overrides, cli::TrainArgs, load_config, RunConfig};
use crate::model::ModelRegistry;
use crate::train::{EvaluationData, RunDirectory, Trainer};

fn log_summary(config: &RunConfig, level: LogLevel) {
    log(level, LogLevel::Verbose, &format!("  Model: {}", config.model.model_type));
    log(
        level,
        LogLevel::Verbose,
        &format!("  Optimizer: {} (lr={})", config.optimizer.name, config.optimizer.lr),
    );
    log(level, LogLevel::Verbose, &format!("  Epochs: {}", config.training.num_epochs));
    log(level, LogLevel::Verbose, &format!("  Batch size: {}", config.training.batch_size));
    log(level, LogLevel::Verbose, &format!("  Target: {}", config.training.target));
}

pub fn run_train(args: TrainArgs, level: LogLevel) -> Result<(), String> {
    log(level, LogLevel::Normal, &format!("subloc: Training from {}", args.config.display()));

    let mut config =
        load_config(&args.config, args.resume.as_deref()).map_err(|e| format!("Config error: {e}"))?;
    apply_overrides(&mut config, &args);
    config.validate().map_err(|e| format!("Validation failed: {e}"))?;

    let train = open_train(&config).map_err(|e| format!("Data error: {e}"))?;
    let val = open_val(&config).map_err(|e| format!("Data error: {e}"))?;
    let test = open_test(&config).map_err(|e| format!("Data error: {e}"))?;
    let lookup = open_lookup(&config).map_err(|e| format!("Data error: {e}"))?;
    let (embedding_dim, per_residue) = train.input_shape().map_err(|e| format!("Data error: {e}"))?;
    log(
        level,
        LogLevel::Normal,
        &format!(
            "  {} train / {} val samples, embedding dim {embedding_dim}{}",
            train.len(),
            val.len(),
            if per_residue { " (per residue)" } else { "" }
        ),
    );

    if args.dry_run {
        log(level, LogLevel::Normal, "Dry run - config and data validated successfully");
        log_summary(&config, level);
        return Ok(());
    }

    let model = ModelRegistry::with_builtins()
        .create(&config.model.model_type, &config.model.parameters, embedding_dim, config.training.seed)
        .map_err(|e| format!("Model error: {e}"))?;

    let mut trainer = match &args.resume {
        Some(dir) => {
            let run = RunDirectory::open(dir).map_err(|e| format!("Resume error: {e}"))?;
            Trainer::resume(config, model, run).map_err(|e| format!("Resume error: {e}"))?
        }
        None => {
            let run =
                RunDirectory::create(&config.runs_dir, &config.model.model_type, &config.experiment_name)
                    .map_err(|e| format!("Run directory error: {e}"))?;
            run.copy_config(&args.config).map_err(|e| format!("Run directory error: {e}"))?;
            let class_weights = *train.class_weights();
            Trainer::new(config, model, run, class_weights).map_err(|e| format!("Setup error: {e}"))?
        }
    };
    log_summary(trainer.config(), level);

    let eval = test.as_ref().map(|store| EvaluationData { store, lookup: lookup.as_ref() });
    let result = trainer.train(&train, &val, eval).map_err(|e| format!("Training error: {e}"))?;

    log(
        level,
        LogLevel::Normal,
        &format!(
            "Training complete ({:?}): best val acc {:.2}% at epoch {}",
            result.stop_reason,
            result.best_val_acc,
            result.best_epoch.map_or_else(|| "-".to_string(), |e| e.to_string())
        ),
    );
    log(
        level,
        LogLevel::Normal,
        &format!("  Run directory: {}", trainer.run_directory().path().display()),
    );
    Ok(())
}
