//! Training result types

use serde::Serialize;
use std::fmt;

use crate::eval::EvaluationResult;
use crate::train::EpochMetrics;

/// Where the trainer is in its epoch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrainerState {
    Initializing,
    Training,
    Validating,
    CheckpointDecision,
    EarlyStopped,
    Completed,
}

impl fmt::Display for TrainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrainerState::Initializing => "initializing",
            TrainerState::Training => "training",
            TrainerState::Validating => "validating",
            TrainerState::CheckpointDecision => "checkpoint-decision",
            TrainerState::EarlyStopped => "early-stopped",
            TrainerState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Why the epoch loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    EpochBudget,
    EarlyStopped,
    Interrupted,
}

/// Result of a training run
#[derive(Debug, Clone)]
pub struct TrainResult {
    /// First epoch of this invocation (non-zero when resumed)
    pub start_epoch: usize,
    /// Last completed epoch; `None` when no epoch ran
    pub last_epoch: Option<usize>,
    /// Best target-metric value on the validation set, in percent
    pub best_val_acc: f64,
    /// Epoch of the best checkpoint, if one was written
    pub best_epoch: Option<usize>,
    pub stop_reason: StopReason,
    /// Metrics of the epochs run by this invocation
    pub epoch_metrics: Vec<EpochMetrics>,
    /// Bootstrap evaluation of the best checkpoint, when evaluation data was given
    pub evaluation: Option<EvaluationResult>,
}

impl TrainResult {
    pub fn stopped_early(&self) -> bool {
        self.stop_reason == StopReason::EarlyStopped
    }
}
