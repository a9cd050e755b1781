//! Training: joint loss, metrics, checkpoints and the epoch loop
//!
//! - [`JointCrossEntropy`]: localization plus masked solubility cross-entropy
//! - [`ConfusionMatrix`] / [`ResultsTable`]: accuracy and MCC over predictions
//! - [`RunDirectory`]: checkpoint, `epoch.txt` and run metadata on disk
//! - [`Trainer`]: the epoch state machine with resume and early stopping
//!
//! # Example
//!
//! ```no_run
//! use subloc::train::{JointCrossEntropy, ResultsTable};
//!
//! let loss = JointCrossEntropy::new(1.0);
//! let table = ResultsTable::new();
//! assert!(table.is_empty());
//! # let _ = loss;
//! ```

mod checkpoint;
mod early_stopping;
mod loss;
mod metrics;
mod sink;
mod trainer;

pub use checkpoint::{
    sha256_hex, write_atomic, Checkpoint, RunDirectory, ARCHITECTURE_FILE, CHECKPOINT_FILE,
    EPOCH_FILE, METRICS_FILE, TRAIN_ARGUMENTS_FILE,
};
pub use early_stopping::{Decision, EarlyStopping};
pub use loss::{JointCrossEntropy, LossOutput};
pub use metrics::{accuracy, ConfusionMatrix, PredictionRow, ResultsTable};
pub use sink::{EpochMetrics, JsonlSink, MetricsSink, NullSink, PassMetrics};
pub use trainer::{
    predict, EvaluationData, StopReason, TrainResult, Trainer, TrainerState,
};
