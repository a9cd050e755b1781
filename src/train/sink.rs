//! Per-epoch metrics and where they are recorded

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::metrics::{ConfusionMatrix, ResultsTable};
use crate::data::NUM_LOCALIZATIONS;
use crate::Result;

/// Metrics of one pass (training or validation) over a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassMetrics {
    pub loc_loss: f64,
    pub sol_loss: f64,
    /// Localization accuracy in percent
    pub loc_accuracy: f64,
    pub loc_mcc: f64,
    /// Solubility accuracy in percent over rows with known solubility
    pub sol_accuracy: f64,
    pub sol_mcc: f64,
    pub per_class_accuracy: Vec<f64>,
    pub loc_confusion: ConfusionMatrix,
    pub sol_confusion: ConfusionMatrix,
}

impl PassMetrics {
    /// Summarize a results table with mean batch losses
    pub fn from_results(results: &ResultsTable, loc_loss: f64, sol_loss: f64) -> Self {
        let loc_confusion = results.localization_confusion(NUM_LOCALIZATIONS);
        let sol_confusion = results.solubility_confusion();
        Self {
            loc_loss,
            sol_loss,
            loc_accuracy: loc_confusion.accuracy(),
            loc_mcc: loc_confusion.mcc(),
            sol_accuracy: results.solubility_accuracy(),
            sol_mcc: sol_confusion.mcc(),
            per_class_accuracy: loc_confusion.per_class_accuracy(),
            loc_confusion,
            sol_confusion,
        }
    }
}

/// Metrics for a single epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Epoch number (0-indexed)
    pub epoch: usize,
    pub train: PassMetrics,
    pub val: PassMetrics,
    pub learning_rate: f32,
    /// Target metric reached a new best and a checkpoint was written
    pub improved: bool,
    pub epoch_time_ms: u64,
}

/// Receives one record per completed epoch
pub trait MetricsSink {
    fn record(&mut self, metrics: &EpochMetrics) -> Result<()>;
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn record(&mut self, _metrics: &EpochMetrics) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct TimestampedMetrics<'a> {
    timestamp: String,
    #[serde(flatten)]
    metrics: &'a EpochMetrics,
}

/// Appends one JSON object per line
#[derive(Debug, Clone)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricsSink for JsonlSink {
    fn record(&mut self, metrics: &EpochMetrics) -> Result<()> {
        let line = serde_json::to_string(&TimestampedMetrics {
            timestamp: Utc::now().to_rfc3339(),
            metrics,
        })?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}
