//! Evaluation results and their text/JSON reports

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::Target;
use crate::train::{write_atomic, ConfusionMatrix};
use crate::Result;

/// Accuracy split between transferred and model-predicted rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferSummary {
    pub cutoff: f64,
    pub transferred: usize,
    pub predicted: usize,
    /// Accuracy of transferred labels, in percent
    pub unsupervised_accuracy: f64,
    pub unsupervised_accuracy_stderr: f64,
    /// Accuracy of model predictions, in percent
    pub supervised_accuracy: f64,
    pub supervised_accuracy_stderr: f64,
}

/// Bootstrap estimates for one evaluation set
///
/// NaN values (e.g. per-class accuracy of a class absent from every draw)
/// serialize as JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub name: String,
    pub target: Target,
    pub n_draws: usize,
    pub n_samples: usize,
    pub accuracy: f64,
    pub accuracy_stderr: f64,
    pub mcc: f64,
    pub mcc_stderr: f64,
    pub class_names: Vec<String>,
    pub per_class_accuracy: Vec<f64>,
    pub per_class_accuracy_stderr: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer: Option<TransferSummary>,
    /// Confusion matrix of the full, unresampled set
    pub confusion: ConfusionMatrix,
}

impl EvaluationResult {
    pub fn text_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("evaluation_{name}.txt"))
    }

    pub fn json_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("evaluation_{name}.json"))
    }

    /// Write `evaluation_<name>.txt` and `evaluation_<name>.json` into `dir`
    pub fn write_reports(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        let text_path = Self::text_path(dir, &self.name);
        let json_path = Self::json_path(dir, &self.name);
        write_atomic(&text_path, self.to_string().as_bytes())?;
        write_atomic(&json_path, serde_json::to_string_pretty(self)?.as_bytes())?;
        log::info!("Wrote {}", text_path.display());
        Ok((text_path, json_path))
    }
}

impl fmt::Display for EvaluationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of draws: {}", self.n_draws)?;
        writeln!(f, "Accuracy: {:.2}%", self.accuracy)?;
        writeln!(f, "Accuracy stderr: {:.2}%", self.accuracy_stderr)?;
        writeln!(f, "MCC: {:.4}", self.mcc)?;
        writeln!(f, "MCC stderr: {:.4}", self.mcc_stderr)?;
        if let Some(t) = &self.transfer {
            writeln!(f, "Distance cutoff: {:.4}", t.cutoff)?;
            writeln!(f, "Transferred: {} Predicted: {}", t.transferred, t.predicted)?;
            writeln!(f, "unsupervised accuracy: {:.4}", t.unsupervised_accuracy)?;
            writeln!(f, "unsupervised accuracy stderr: {:.4}", t.unsupervised_accuracy_stderr)?;
            writeln!(f, "supervised accuracy: {:.4}", t.supervised_accuracy)?;
            writeln!(f, "supervised accuracy stderr: {:.4}", t.supervised_accuracy_stderr)?;
        }
        writeln!(f, "Per-class accuracy:")?;
        for ((name, acc), std) in self
            .class_names
            .iter()
            .zip(&self.per_class_accuracy)
            .zip(&self.per_class_accuracy_stderr)
        {
            writeln!(f, "  {name:<24} {acc:.4} ± {std:.4}")?;
        }
        Ok(())
    }
}
