//! Validate command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{cli::ValidateArgs, load_and_validate, RunConfig};
use crate::model::ModelRegistry;

/// Format data configuration as a string
pub fn format_data_info(config: &RunConfig) -> String {
    let data = &config.data;
    let mut lines = vec![
        format!("  Training data: {}", data.train_remapping.display()),
        format!("  Validation data: {}", data.val_remapping.display()),
    ];
    if let Some(test) = &data.test_remapping {
        lines.push(format!("  Test data: {}", test.display()));
    }
    lines.push(format!("  Key format: {:?}", data.key_format));
    lines.push(format!("  Embedding mode: {:?}", data.embedding_mode));
    if let Some(max) = data.max_length {
        lines.push(format!("  Max length: {max}"));
    }
    lines.join("\n")
}

/// Format training configuration as a string
pub fn format_training_info(config: &RunConfig) -> String {
    let t = &config.training;
    [
        format!("  Model: {} (hidden {})", config.model.model_type, config.model.parameters.hidden_dim),
        format!("  Optimizer: {} (lr={})", config.optimizer.name, config.optimizer.lr),
        format!("  Epochs: {}, batch size {}, patience {}", t.num_epochs, t.batch_size, t.patience),
        format!("  Target: {}", t.target),
    ]
    .join("\n")
}

pub fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    log(level, LogLevel::Normal, &format!("Validating config: {}", args.config.display()));

    let config = load_and_validate(&args.config, None).map_err(|e| format!("Validation failed: {e}"))?;
    let registry = ModelRegistry::with_builtins();
    if !registry.names().contains(&config.model.model_type.as_str()) {
        return Err(format!(
            "Validation failed: unknown model type '{}' (available: {})",
            config.model.model_type,
            registry.names().join(", ")
        ));
    }

    log(level, LogLevel::Normal, "Configuration is valid");
    log(level, LogLevel::Verbose, &format_data_info(&config));
    log(level, LogLevel::Verbose, &format_training_info(&config));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RunConfig {
        serde_yaml::from_str(
            r#"
model:
  type: pooled_ffn
data:
  train_embeddings: t.safetensors
  train_remapping: t.fasta
  val_embeddings: v.safetensors
  val_remapping: v.fasta
  test_remapping: x.fasta
  max_length: 6000
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_format_data_info() {
        let info = format_data_info(&config());
        assert!(info.contains("Training data: t.fasta"));
        assert!(info.contains("Test data: x.fasta"));
        assert!(info.contains("Max length: 6000"));
    }

    #[test]
    fn test_format_training_info() {
        let info = format_training_info(&config());
        assert!(info.contains("Model: pooled_ffn"));
        assert!(info.contains("Target: loc"));
    }
}
