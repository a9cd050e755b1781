//! Classification metrics over prediction tables

use serde::{Deserialize, Serialize};
use std::fmt;

/// Confusion matrix for multi-class classification
///
/// Element [i][j] represents count of samples with true label i predicted as j
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// The matrix data: matrix[true_label][predicted_label] = count
    matrix: Vec<Vec<usize>>,
    n_classes: usize,
}

impl ConfusionMatrix {
    /// Create an empty confusion matrix
    pub fn new(n_classes: usize) -> Self {
        Self { matrix: vec![vec![0; n_classes]; n_classes], n_classes }
    }

    /// Create from predictions and ground truth; out-of-range labels are ignored
    pub fn from_predictions(y_pred: &[usize], y_true: &[usize], n_classes: usize) -> Self {
        let mut cm = Self::new(n_classes);
        for (&pred, &truth) in y_pred.iter().zip(y_true) {
            if pred < n_classes && truth < n_classes {
                cm.matrix[truth][pred] += 1;
            }
        }
        cm
    }

    pub fn matrix(&self) -> &Vec<Vec<usize>> {
        &self.matrix
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    /// Number of true samples per class (row sums)
    pub fn support(&self) -> Vec<usize> {
        self.matrix.iter().map(|row| row.iter().sum()).collect()
    }

    /// Number of predictions per class (column sums)
    pub fn predicted(&self) -> Vec<usize> {
        (0..self.n_classes).map(|j| self.matrix.iter().map(|row| row[j]).sum()).collect()
    }

    /// Accuracy in percent; NaN when empty
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return f64::NAN;
        }
        let correct: usize = (0..self.n_classes).map(|i| self.matrix[i][i]).sum();
        100.0 * correct as f64 / total as f64
    }

    /// Per-class recall (diagonal over row sums); NaN for classes with no true samples
    pub fn per_class_accuracy(&self) -> Vec<f64> {
        self.support()
            .iter()
            .enumerate()
            .map(|(i, &s)| if s == 0 { f64::NAN } else { self.matrix[i][i] as f64 / s as f64 })
            .collect()
    }

    /// Multi-class Matthews correlation coefficient (Gorodkin's R_K)
    ///
    /// Returns 0 when either marginal is constant.
    pub fn mcc(&self) -> f64 {
        let s = self.total() as f64;
        let c: f64 = (0..self.n_classes).map(|i| self.matrix[i][i] as f64).sum();
        let t: Vec<f64> = self.support().into_iter().map(|v| v as f64).collect();
        let p: Vec<f64> = self.predicted().into_iter().map(|v| v as f64).collect();

        let cov_ytyp = c * s - t.iter().zip(&p).map(|(a, b)| a * b).sum::<f64>();
        let cov_ypyp = s * s - p.iter().map(|v| v * v).sum::<f64>();
        let cov_ytyt = s * s - t.iter().map(|v| v * v).sum::<f64>();

        let denom = cov_ytyt * cov_ypyp;
        if denom == 0.0 {
            0.0
        } else {
            cov_ytyp / denom.sqrt()
        }
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>6}", "")?;
        for j in 0..self.n_classes {
            write!(f, "{j:>6}")?;
        }
        writeln!(f)?;
        for (i, row) in self.matrix.iter().enumerate() {
            write!(f, "{i:>6}")?;
            for count in row {
                write!(f, "{count:>6}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// One prediction row: `[loc_pred, loc_true, sol_pred, sol_true, sol_known]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub loc_pred: usize,
    pub loc_true: usize,
    pub sol_pred: usize,
    pub sol_true: usize,
    pub sol_known: bool,
}

/// Accumulated predictions of one pass over a store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsTable {
    rows: Vec<PredictionRow>,
}

impl ResultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: PredictionRow) {
        self.rows.push(row);
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = PredictionRow>) {
        self.rows.extend(rows);
    }

    pub fn rows(&self) -> &[PredictionRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn localization_confusion(&self, n_classes: usize) -> ConfusionMatrix {
        let (pred, truth): (Vec<usize>, Vec<usize>) =
            self.rows.iter().map(|r| (r.loc_pred, r.loc_true)).unzip();
        ConfusionMatrix::from_predictions(&pred, &truth, n_classes)
    }

    /// Confusion matrix over rows with known solubility
    pub fn solubility_confusion(&self) -> ConfusionMatrix {
        let (pred, truth): (Vec<usize>, Vec<usize>) =
            self.rows.iter().filter(|r| r.sol_known).map(|r| (r.sol_pred, r.sol_true)).unzip();
        ConfusionMatrix::from_predictions(&pred, &truth, 2)
    }

    /// Solubility accuracy in percent over known rows; 0 when no row is known
    pub fn solubility_accuracy(&self) -> f64 {
        let known = self.rows.iter().filter(|r| r.sol_known).count();
        if known == 0 {
            return 0.0;
        }
        let correct = self.rows.iter().filter(|r| r.sol_known && r.sol_pred == r.sol_true).count();
        100.0 * correct as f64 / known as f64
    }
}

/// Accuracy in percent of `pred` against `truth`; NaN when empty
pub fn accuracy(pred: &[usize], truth: &[usize]) -> f64 {
    if pred.is_empty() {
        return f64::NAN;
    }
    let correct = pred.iter().zip(truth).filter(|(p, t)| p == t).count();
    100.0 * correct as f64 / pred.len() as f64
}
