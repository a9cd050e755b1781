//! YAML schema for run configuration
//!
//! Every section carries serde defaults so a config file only needs the
//! data paths and the model type.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::{EmbeddingMode, KeyFormat, StoreOptions};
use crate::eval::DistanceMetric;
use crate::model::ModelParams;
use crate::{Error, Result};

/// Optimizers `build_optimizer` knows about
pub const KNOWN_OPTIMIZERS: &[&str] = &["adam", "adamw", "sgd"];

/// Complete run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_experiment_name")]
    pub experiment_name: String,

    /// Parent directory of the run directories
    #[serde(default = "default_runs_dir")]
    pub runs_dir: PathBuf,

    pub model: ModelConfig,

    pub data: DataConfig,

    #[serde(default)]
    pub optimizer: OptimizerConfig,

    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

fn default_experiment_name() -> String {
    "default".to_string()
}

fn default_runs_dir() -> PathBuf {
    PathBuf::from("runs")
}

/// Model selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Registry name, e.g. `ffn` or `pooled_ffn`
    #[serde(rename = "type")]
    pub model_type: String,

    #[serde(default)]
    pub parameters: ModelParams,
}

/// Dataset locations and filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub train_embeddings: PathBuf,
    pub train_remapping: PathBuf,
    pub val_embeddings: PathBuf,
    pub val_remapping: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_embeddings: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_remapping: Option<PathBuf>,

    #[serde(default)]
    pub key_format: KeyFormat,

    #[serde(default)]
    pub embedding_mode: EmbeddingMode,

    /// Sequences longer than this are left out of the usable range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Keep samples whose solubility is unknown
    #[serde(default = "default_true")]
    pub unknown_solubility: bool,
}

fn default_true() -> bool {
    true
}

impl DataConfig {
    /// Store filters for every split
    pub fn store_options(&self) -> StoreOptions {
        let options = StoreOptions::new()
            .with_unknown_solubility(self.unknown_solubility)
            .with_embedding_mode(self.embedding_mode);
        match self.max_length {
            Some(max) => options.with_max_length(max),
            None => options,
        }
    }
}

/// Optimizer hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default = "default_optimizer_name")]
    pub name: String,
    #[serde(default = "default_lr")]
    pub lr: f32,
    #[serde(default = "default_beta1")]
    pub beta1: f32,
    #[serde(default = "default_beta2")]
    pub beta2: f32,
    #[serde(default)]
    pub weight_decay: f32,
    #[serde(default)]
    pub momentum: f32,
}

fn default_optimizer_name() -> String {
    "adam".to_string()
}

fn default_lr() -> f32 {
    1e-3
}

fn default_beta1() -> f32 {
    0.9
}

fn default_beta2() -> f32 {
    0.999
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            name: default_optimizer_name(),
            lr: default_lr(),
            beta1: default_beta1(),
            beta2: default_beta2(),
            weight_decay: 0.0,
            momentum: 0.0,
        }
    }
}

/// Metric that drives checkpointing and early stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Localization accuracy
    #[default]
    Loc,
    /// Solubility accuracy over known rows
    Sol,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Loc => write!(f, "loc"),
            Target::Sol => write!(f, "sol"),
        }
    }
}

/// Epoch loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_num_epochs")]
    pub num_epochs: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_patience")]
    pub patience: usize,
    /// Early stopping waits until training accuracy reaches this percentage
    #[serde(default)]
    pub min_train_acc: f64,
    /// Log every n batches; 0 disables batch lines
    #[serde(default = "default_log_iterations")]
    pub log_iterations: usize,
    #[serde(default)]
    pub target: Target,
    #[serde(default)]
    pub balanced_loss: bool,
    /// Weight of the solubility term in the joint loss
    #[serde(default)]
    pub solubility_loss: f32,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_num_epochs() -> usize {
    50
}

fn default_batch_size() -> usize {
    16
}

fn default_patience() -> usize {
    50
}

fn default_log_iterations() -> usize {
    100
}

fn default_seed() -> u64 {
    123
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            num_epochs: default_num_epochs(),
            batch_size: default_batch_size(),
            patience: default_patience(),
            min_train_acc: 0.0,
            log_iterations: default_log_iterations(),
            target: Target::default(),
            balanced_loss: false,
            solubility_loss: 0.0,
            seed: default_seed(),
        }
    }
}

/// Bootstrap evaluation and annotation transfer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_n_draws")]
    pub n_draws: usize,
    /// Minimum cumulative accuracy of transferred labels
    #[serde(default = "default_accuracy_threshold")]
    pub accuracy_threshold: f64,
    #[serde(default)]
    pub distance: DistanceMetric,
    /// Lookup samples used to calibrate the transfer cutoff
    #[serde(default = "default_calibration_size")]
    pub calibration_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_embeddings: Option<PathBuf>,
    /// Annotation transfer runs only when a lookup set is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_remapping: Option<PathBuf>,
    #[serde(default = "default_output_name")]
    pub output_name: String,
}

fn default_n_draws() -> usize {
    100
}

fn default_accuracy_threshold() -> f64 {
    0.81
}

fn default_calibration_size() -> usize {
    1000
}

fn default_output_name() -> String {
    "test".to_string()
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            n_draws: default_n_draws(),
            accuracy_threshold: default_accuracy_threshold(),
            distance: DistanceMetric::default(),
            calibration_size: default_calibration_size(),
            lookup_embeddings: None,
            lookup_remapping: None,
            output_name: default_output_name(),
        }
    }
}

impl RunConfig {
    /// Check ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let t = &self.training;
        if t.batch_size == 0 {
            return Err(Error::ConfigError("training.batch_size must be > 0".into()));
        }
        if t.num_epochs == 0 {
            return Err(Error::ConfigError("training.num_epochs must be > 0".into()));
        }
        if !(t.solubility_loss >= 0.0) {
            return Err(Error::ConfigError(format!(
                "training.solubility_loss must be >= 0, got {}",
                t.solubility_loss
            )));
        }
        if !(self.optimizer.lr > 0.0) {
            return Err(Error::ConfigError(format!(
                "optimizer.lr must be > 0, got {}",
                self.optimizer.lr
            )));
        }
        if !KNOWN_OPTIMIZERS.contains(&self.optimizer.name.as_str()) {
            return Err(Error::ConfigError(format!(
                "unknown optimizer '{}' (expected one of: {})",
                self.optimizer.name,
                KNOWN_OPTIMIZERS.join(", ")
            )));
        }
        if self.model.model_type.trim().is_empty() {
            return Err(Error::ConfigError("model.type must not be empty".into()));
        }
        let e = &self.evaluation;
        if e.n_draws == 0 {
            return Err(Error::ConfigError("evaluation.n_draws must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&e.accuracy_threshold) {
            return Err(Error::ConfigError(format!(
                "evaluation.accuracy_threshold must be in [0, 1], got {}",
                e.accuracy_threshold
            )));
        }
        if self.data.test_embeddings.is_some() && self.data.test_remapping.is_none() {
            return Err(Error::ConfigError(
                "data.test_embeddings requires data.test_remapping".into(),
            ));
        }
        if self.data.embedding_mode == EmbeddingMode::Profiles {
            return Err(Error::ConfigError("embedding mode 'profiles' is not supported".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
model:
  type: ffn
data:
  train_embeddings: train.safetensors
  train_remapping: train.fasta
  val_embeddings: val.safetensors
  val_remapping: val.fasta
"#;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config: RunConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.model.model_type, "ffn");
        assert_eq!(config.training.batch_size, 16);
        assert_eq!(config.evaluation.n_draws, 100);
        assert_eq!(config.evaluation.accuracy_threshold, 0.81);
        assert!(config.data.unknown_solubility);
        assert_eq!(config.data.key_format, KeyFormat::Hash);
        assert_eq!(config.training.target, Target::Loc);
        config.validate().unwrap();
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config: RunConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.training.batch_size = 0;
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config: RunConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.evaluation.accuracy_threshold = 1.5;
        assert!(config.validate().is_err());
        config.evaluation.accuracy_threshold = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_lr_and_optimizer_rejected() {
        let mut config: RunConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.optimizer.lr = 0.0;
        assert!(config.validate().is_err());
        config.optimizer.lr = 1e-3;
        config.optimizer.name = "lamb".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_target_parses_lowercase() {
        let t: TrainingConfig = serde_yaml::from_str("target: sol").unwrap();
        assert_eq!(t.target, Target::Sol);
    }

    #[test]
    fn test_missing_model_section_fails() {
        let text = "data:\n  train_embeddings: a\n";
        assert!(serde_yaml::from_str::<RunConfig>(text).is_err());
    }
}
