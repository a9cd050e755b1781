//! Error types with actionable diagnostics.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for subloc operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading data, training, or evaluating.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration is missing a field, has an invalid value, or names an unsupported mode.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The model registry has no factory under this name.
    #[error("Unknown model type: {0}\n  → Registered types: ffn, pooled_ffn")]
    UnknownModelType(String),

    /// Nothing was left to evaluate after transfer partitioning and filtering.
    #[error("Evaluation set is empty\n  → Check the fasta filters (max_length, unknown_solubility)")]
    EmptyEvaluationSet,

    /// Resume or evaluation was requested from a run directory without a checkpoint.
    #[error("Checkpoint not found: {}\n  → Point --resume/--checkpoint at a run directory", .0.display())]
    CheckpointNotFound(PathBuf),

    /// A checkpoint file exists but cannot be decoded.
    #[error("Checkpoint is corrupt: {0}")]
    CheckpointCorrupt(String),

    /// An embedding key from the fasta file is absent from the embedding store.
    #[error("Embedding key not found: {0}\n  → Check that key_format matches the embedding file")]
    KeyNotFound(String),

    /// Malformed fasta metadata.
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Tensor or batch dimensions disagree.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch { expected: Vec<usize>, actual: Vec<usize> },

    /// Training produced a NaN or infinite loss.
    #[error("Non-finite loss in epoch {epoch}\n  → Lower the learning rate or inspect the embeddings")]
    NonFiniteLoss { epoch: usize },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::ConfigError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_model_lists_builtins() {
        let msg = Error::UnknownModelType("lstm".into()).to_string();
        assert!(msg.contains("lstm"));
        assert!(msg.contains("ffn"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_checkpoint_not_found_shows_path() {
        let err = Error::CheckpointNotFound(PathBuf::from("runs/x"));
        assert!(err.to_string().contains("runs/x"));
    }
}
