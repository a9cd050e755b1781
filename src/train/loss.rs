//! Joint localization/solubility cross-entropy

use ndarray::{s, Array1, Array2, ArrayView1};

use crate::data::{Batch, NUM_LOCALIZATIONS, NUM_OUTPUTS};
use crate::{Error, Result};

/// Loss values and the gradient w.r.t. the logits
#[derive(Debug, Clone)]
pub struct LossOutput {
    pub total: f32,
    pub localization: f32,
    pub solubility: f32,
    pub grad: Array2<f32>,
}

/// Cross-entropy over the ten localization logits plus a masked
/// cross-entropy over the two solubility logits:
///
/// `total = loc + solubility_weight · sol`
///
/// The localization term is a class-weighted mean,
/// `Σ w[y_i]·nll_i / Σ w[y_i]`; the solubility term averages only rows
/// whose solubility is known and is 0 when none are.
#[derive(Debug, Clone)]
pub struct JointCrossEntropy {
    solubility_weight: f32,
    class_weights: Option<[f32; NUM_LOCALIZATIONS]>,
}

impl JointCrossEntropy {
    pub fn new(solubility_weight: f32) -> Self {
        Self { solubility_weight, class_weights: None }
    }

    /// Weight classes by inverse frequency, `w_c = 1 / (C · f_c)`; unseen classes get 1
    pub fn balanced(solubility_weight: f32, frequencies: &[f32; NUM_LOCALIZATIONS]) -> Self {
        let mut weights = [1.0f32; NUM_LOCALIZATIONS];
        for (w, &f) in weights.iter_mut().zip(frequencies) {
            if f > 0.0 {
                *w = 1.0 / (NUM_LOCALIZATIONS as f32 * f);
            }
        }
        Self { solubility_weight, class_weights: Some(weights) }
    }

    pub fn class_weights(&self) -> Option<&[f32; NUM_LOCALIZATIONS]> {
        self.class_weights.as_ref()
    }

    pub fn forward(&self, logits: &Array2<f32>, batch: &Batch) -> Result<LossOutput> {
        let n = batch.size();
        if logits.dim() != (n, NUM_OUTPUTS) {
            return Err(Error::ShapeMismatch {
                expected: vec![n, NUM_OUTPUTS],
                actual: vec![logits.nrows(), logits.ncols()],
            });
        }

        let mut grad = Array2::<f32>::zeros(logits.raw_dim());

        // Localization
        let weight_of = |y: usize| self.class_weights.map_or(1.0, |w| w[y]);
        let weight_sum: f32 = batch.localization.iter().map(|&y| weight_of(y)).sum();
        let mut loc_loss = 0.0;
        if weight_sum > 0.0 {
            for (i, &y) in batch.localization.iter().enumerate() {
                let w = weight_of(y) / weight_sum;
                let (nll, probs) = nll_and_softmax(logits.slice(s![i, ..NUM_LOCALIZATIONS]), y);
                loc_loss += w * nll;
                let mut row = grad.slice_mut(s![i, ..NUM_LOCALIZATIONS]);
                row.assign(&(probs * w));
                row[y] -= w;
            }
        }

        // Solubility, known rows only
        let known = batch.solubility_known.iter().filter(|&&k| k).count();
        let mut sol_loss = 0.0;
        if known > 0 {
            let scale = 1.0 / known as f32;
            let grad_scale = scale * self.solubility_weight;
            for (i, (&y, _)) in batch
                .solubility
                .iter()
                .zip(&batch.solubility_known)
                .enumerate()
                .filter(|(_, (_, &k))| k)
            {
                let (nll, probs) = nll_and_softmax(logits.slice(s![i, NUM_LOCALIZATIONS..]), y);
                sol_loss += scale * nll;
                let mut row = grad.slice_mut(s![i, NUM_LOCALIZATIONS..]);
                row.assign(&(probs * grad_scale));
                row[y] -= grad_scale;
            }
        }

        Ok(LossOutput {
            total: loc_loss + self.solubility_weight * sol_loss,
            localization: loc_loss,
            solubility: sol_loss,
            grad,
        })
    }
}

/// Negative log-likelihood of `target` and the softmax of `logits`
fn nll_and_softmax(logits: ArrayView1<'_, f32>, target: usize) -> (f32, Array1<f32>) {
    let max = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp = logits.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    let log_sum = sum.ln() + max;
    (log_sum - logits[target], exp / sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BatchInput;
    use approx::assert_relative_eq;

    fn batch(loc: Vec<usize>, sol: Vec<usize>, known: Vec<bool>) -> Batch {
        let n = loc.len();
        Batch {
            inputs: BatchInput::Reduced(Array2::zeros((n, 1))),
            mask: None,
            localization: loc,
            solubility: sol,
            solubility_known: known,
            lengths: vec![1; n],
        }
    }

    #[test]
    fn test_uniform_logits_give_log_classes() {
        let b = batch(vec![0, 3], vec![1, 0], vec![true, true]);
        let out = JointCrossEntropy::new(1.0).forward(&Array2::zeros((2, NUM_OUTPUTS)), &b).unwrap();
        assert_relative_eq!(out.localization, (10f32).ln(), epsilon = 1e-5);
        assert_relative_eq!(out.solubility, (2f32).ln(), epsilon = 1e-5);
        assert_relative_eq!(out.total, (10f32).ln() + (2f32).ln(), epsilon = 1e-5);
    }

    #[test]
    fn test_all_unknown_solubility_is_zero() {
        let b = batch(vec![1, 2], vec![0, 0], vec![false, false]);
        let mut logits = Array2::zeros((2, NUM_OUTPUTS));
        logits[[0, 11]] = 5.0;
        let out = JointCrossEntropy::new(1.0).forward(&logits, &b).unwrap();
        assert_eq!(out.solubility, 0.0);
        assert!(out.total.is_finite());
        assert_relative_eq!(out.total, out.localization);
        assert!(out.grad.slice(s![.., NUM_LOCALIZATIONS..]).iter().all(|&g| g == 0.0));
    }

    #[test]
    fn test_solubility_weight_scales_term() {
        let b = batch(vec![0], vec![1], vec![true]);
        let logits = Array2::zeros((1, NUM_OUTPUTS));
        let out = JointCrossEntropy::new(0.5).forward(&logits, &b).unwrap();
        assert_relative_eq!(out.total, out.localization + 0.5 * out.solubility, epsilon = 1e-6);
    }

    #[test]
    fn test_balanced_weights_from_frequencies() {
        let mut freq = [0.0; NUM_LOCALIZATIONS];
        freq[0] = 0.5;
        freq[1] = 0.25;
        freq[2] = 0.25;
        let loss = JointCrossEntropy::balanced(1.0, &freq);
        let w = loss.class_weights().unwrap();
        assert_relative_eq!(w[0], 0.2);
        assert_relative_eq!(w[1], 0.4);
        assert_relative_eq!(w[9], 1.0);
    }

    #[test]
    fn test_weighted_mean_normalizes_by_weight_sum() {
        let mut freq = [0.1; NUM_LOCALIZATIONS];
        freq[0] = 0.5;
        let loss = JointCrossEntropy::balanced(0.0, &freq);
        let b = batch(vec![0, 0], vec![0, 0], vec![false, false]);
        let out = loss.forward(&Array2::zeros((2, NUM_OUTPUTS)), &b).unwrap();
        // Identical rows: weighting must not change the mean
        assert_relative_eq!(out.localization, (10f32).ln(), epsilon = 1e-5);
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let b = batch(vec![2, 5], vec![1, 0], vec![true, false]);
        let mut logits = Array2::from_shape_fn((2, NUM_OUTPUTS), |(i, j)| ((i * 7 + j) % 5) as f32 * 0.3);
        let loss = JointCrossEntropy::new(0.7);
        let out = loss.forward(&logits, &b).unwrap();

        let eps = 1e-2;
        for &(i, j) in &[(0, 2), (1, 4), (0, 11)] {
            logits[[i, j]] += eps;
            let bumped = loss.forward(&logits, &b).unwrap().total;
            logits[[i, j]] -= eps;
            assert_relative_eq!(out.grad[[i, j]], (bumped - out.total) / eps, epsilon = 1e-2);
        }
    }

    #[test]
    fn test_shape_mismatch() {
        let b = batch(vec![0], vec![0], vec![true]);
        let err = JointCrossEntropy::new(1.0).forward(&Array2::zeros((1, 10)), &b).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }
}
