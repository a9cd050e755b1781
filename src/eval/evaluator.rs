//! Bootstrap evaluation of a trained model

use super::bootstrap::{nan_mean, nan_std, nan_mean_std_columns, Resampler};
use super::report::{EvaluationResult, TransferSummary};
use super::transfer::{DistanceMetric, LookupIndex, TransferPartition};
use crate::config::{RunConfig, Target};
use crate::data::{Localization, SampleStore, NUM_LOCALIZATIONS, NUM_SOLUBILITY};
use crate::model::Model;
use crate::train::{accuracy, predict, ConfusionMatrix};
use crate::{Error, Result};

/// Evaluation settings
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorOptions {
    pub n_draws: usize,
    pub batch_size: usize,
    pub accuracy_threshold: f64,
    pub distance: DistanceMetric,
    pub calibration_size: usize,
    pub target: Target,
    pub seed: u64,
    pub output_name: String,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            n_draws: 100,
            batch_size: 16,
            accuracy_threshold: 0.81,
            distance: DistanceMetric::default(),
            calibration_size: 1000,
            target: Target::Loc,
            seed: 123,
            output_name: "test".to_string(),
        }
    }
}

impl EvaluatorOptions {
    pub fn from_config(config: &RunConfig) -> Self {
        let e = &config.evaluation;
        Self {
            n_draws: e.n_draws,
            batch_size: config.training.batch_size,
            accuracy_threshold: e.accuracy_threshold,
            distance: e.distance,
            calibration_size: e.calibration_size,
            target: config.training.target,
            seed: config.training.seed,
            output_name: e.output_name.clone(),
        }
    }
}

/// One evaluated sample
#[derive(Debug, Clone, Copy)]
struct Row {
    pred: usize,
    truth: usize,
    transferred: bool,
}

/// Bootstrap evaluator with optional annotation transfer
#[derive(Debug, Clone)]
pub struct Evaluator {
    options: EvaluatorOptions,
}

impl Evaluator {
    pub fn new(options: EvaluatorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EvaluatorOptions {
        &self.options
    }

    /// Evaluate `model` on `store`
    ///
    /// With a lookup store and the localization target, samples close to a
    /// lookup entry take its label and only the rest go through the model.
    /// The combined rows are then resampled `n_draws` times.
    pub fn evaluate(
        &self,
        model: &mut dyn Model,
        store: &SampleStore,
        lookup: Option<&SampleStore>,
        resampler: &mut dyn Resampler,
    ) -> Result<EvaluationResult> {
        if store.is_empty() {
            return Err(Error::EmptyEvaluationSet);
        }
        let opts = &self.options;

        let partition = match (lookup, opts.target) {
            (Some(lookup), Target::Loc) if !lookup.is_empty() => {
                let index = LookupIndex::build(lookup, opts.distance)?;
                let cutoff = index.calibrate_cutoff(
                    opts.accuracy_threshold,
                    opts.calibration_size,
                    opts.seed,
                );
                if cutoff.is_none() {
                    log::warn!(
                        "No distance cutoff reaches {:.2} accuracy; transferring nothing",
                        opts.accuracy_threshold
                    );
                }
                index.partition(store, cutoff)?
            }
            _ => TransferPartition::model_only(store.len()),
        };

        let rows = self.collect_rows(model, store, &partition)?;
        if rows.is_empty() {
            return Err(Error::EmptyEvaluationSet);
        }
        let n_classes = match opts.target {
            Target::Loc => NUM_LOCALIZATIONS,
            Target::Sol => NUM_SOLUBILITY,
        };
        let with_transfer = partition.cutoff.is_some();

        let mut accuracies = Vec::with_capacity(opts.n_draws);
        let mut mccs = Vec::with_capacity(opts.n_draws);
        let mut per_class = Vec::with_capacity(opts.n_draws);
        let mut unsupervised = Vec::new();
        let mut supervised = Vec::new();
        for _ in 0..opts.n_draws {
            let drawn: Vec<Row> = resampler.draw(rows.len()).into_iter().map(|i| rows[i]).collect();
            let (pred, truth): (Vec<usize>, Vec<usize>) = drawn.iter().map(|r| (r.pred, r.truth)).unzip();
            let cm = ConfusionMatrix::from_predictions(&pred, &truth, n_classes);
            accuracies.push(cm.accuracy());
            mccs.push(cm.mcc());
            per_class.push(cm.per_class_accuracy());
            if with_transfer {
                unsupervised.push(subset_accuracy(&drawn, true));
                supervised.push(subset_accuracy(&drawn, false));
            }
        }

        let (per_class_accuracy, per_class_accuracy_stderr) = nan_mean_std_columns(&per_class);
        let (pred, truth): (Vec<usize>, Vec<usize>) = rows.iter().map(|r| (r.pred, r.truth)).unzip();
        let transfer = partition.cutoff.map(|cutoff| TransferSummary {
            cutoff,
            transferred: partition.low.len(),
            predicted: partition.high.len(),
            unsupervised_accuracy: nan_mean(&unsupervised),
            unsupervised_accuracy_stderr: nan_std(&unsupervised),
            supervised_accuracy: nan_mean(&supervised),
            supervised_accuracy_stderr: nan_std(&supervised),
        });

        let result = EvaluationResult {
            name: opts.output_name.clone(),
            target: opts.target,
            n_draws: opts.n_draws,
            n_samples: rows.len(),
            accuracy: nan_mean(&accuracies),
            accuracy_stderr: nan_std(&accuracies),
            mcc: nan_mean(&mccs),
            mcc_stderr: nan_std(&mccs),
            class_names: class_names(opts.target),
            per_class_accuracy,
            per_class_accuracy_stderr,
            transfer,
            confusion: ConfusionMatrix::from_predictions(&pred, &truth, n_classes),
        };
        log::info!(
            "Evaluation '{}': accuracy {:.2}% ± {:.2}, MCC {:.4} ± {:.4} over {} draws",
            result.name,
            result.accuracy,
            result.accuracy_stderr,
            result.mcc,
            result.mcc_stderr,
            result.n_draws
        );
        Ok(result)
    }

    /// Transferred rows followed by model rows; the solubility target keeps known rows only
    fn collect_rows(
        &self,
        model: &mut dyn Model,
        store: &SampleStore,
        partition: &TransferPartition,
    ) -> Result<Vec<Row>> {
        let mut rows: Vec<Row> = partition
            .low
            .iter()
            .filter_map(|t| {
                store.sample(t.index).map(|s| Row {
                    pred: t.label.index(),
                    truth: s.localization.index(),
                    transferred: true,
                })
            })
            .collect();

        let predictions = predict(model, store, partition.high.clone(), self.options.batch_size)?;
        rows.extend(predictions.rows().iter().filter_map(|r| match self.options.target {
            Target::Loc => Some(Row { pred: r.loc_pred, truth: r.loc_true, transferred: false }),
            Target::Sol if r.sol_known => {
                Some(Row { pred: r.sol_pred, truth: r.sol_true, transferred: false })
            }
            Target::Sol => None,
        }));
        Ok(rows)
    }
}

/// Accuracy over the drawn rows that were (or were not) transferred
fn subset_accuracy(rows: &[Row], transferred: bool) -> f64 {
    let (pred, truth): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .filter(|r| r.transferred == transferred)
        .map(|r| (r.pred, r.truth))
        .unzip();
    accuracy(&pred, &truth)
}

fn class_names(target: Target) -> Vec<String> {
    match target {
        Target::Loc => Localization::ALL.iter().map(|l| l.as_str().to_string()).collect(),
        Target::Sol => vec!["Insoluble".to_string(), "Soluble".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::store::tests::reduced_store;
    use crate::data::{BatchInput, Solubility};
    use crate::eval::{BootstrapResampler, IdentityResampler};
    use crate::model::{ArchitectureDescriptor, ModelParams, Param};
    use approx::assert_relative_eq;
    use ndarray::Array2;

    /// Predicts localization `argmax(x)` and solubility `x[0] > 0.5`
    struct Oracle;

    impl Model for Oracle {
        fn forward(&mut self, input: &BatchInput, _mask: Option<&Array2<bool>>) -> Result<Array2<f32>> {
            let BatchInput::Reduced(x) = input else {
                return Err(Error::ConfigError("reduced only".into()));
            };
            let mut logits = Array2::zeros((x.nrows(), 12));
            for (i, row) in x.outer_iter().enumerate() {
                for (j, &v) in row.iter().take(NUM_LOCALIZATIONS).enumerate() {
                    logits[[i, j]] = v;
                }
                logits[[i, if row[0] > 0.5 { 11 } else { 10 }]] = 1.0;
            }
            Ok(logits)
        }
        fn backward(&mut self, _grad: &Array2<f32>) -> Result<()> {
            Ok(())
        }
        fn parameters(&self) -> Vec<&Param> {
            Vec::new()
        }
        fn parameters_mut(&mut self) -> Vec<&mut Param> {
            Vec::new()
        }
        fn set_training(&mut self, _training: bool) {}
        fn descriptor(&self) -> ArchitectureDescriptor {
            ArchitectureDescriptor {
                name: "oracle".into(),
                embedding_dim: 3,
                per_residue: false,
                params: ModelParams::default(),
                num_outputs: 12,
                num_parameters: 0,
            }
        }
    }

    use crate::data::Localization::{CellMembrane as M, Cytoplasm as C, Nucleus as N};

    fn one_hot(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; NUM_LOCALIZATIONS];
        v[i] = 1.0;
        v
    }

    fn options(n_draws: usize) -> EvaluatorOptions {
        EvaluatorOptions { n_draws, ..Default::default() }
    }

    #[test]
    fn test_identity_draws_have_zero_stderr() {
        let store = reduced_store(&[
            ("a", M, Solubility::Soluble, one_hot(M.index())),
            ("b", C, Solubility::Soluble, one_hot(C.index())),
            ("c", N, Solubility::Soluble, one_hot(M.index())),
            ("d", C, Solubility::Soluble, one_hot(C.index())),
        ]);
        let result = Evaluator::new(options(10))
            .evaluate(&mut Oracle, &store, None, &mut IdentityResampler)
            .unwrap();
        assert_relative_eq!(result.accuracy, 75.0);
        assert_relative_eq!(result.accuracy_stderr, 0.0, epsilon = 1e-9);
        assert_relative_eq!(result.mcc_stderr, 0.0, epsilon = 1e-9);
        assert_eq!(result.n_samples, 4);
        assert!(result.transfer.is_none());
        assert_eq!(result.per_class_accuracy.len(), NUM_LOCALIZATIONS);
        assert!(result.per_class_accuracy[Localization::Plastid.index()].is_nan());
    }

    #[test]
    fn test_empty_store_fails() {
        let store = reduced_store(&[]);
        let err = Evaluator::new(options(5))
            .evaluate(&mut Oracle, &store, None, &mut IdentityResampler)
            .unwrap_err();
        assert!(matches!(err, Error::EmptyEvaluationSet));
    }

    #[test]
    fn test_bootstrap_stderr_positive_for_mixed_results() {
        let entries: Vec<(String, Localization, Vec<f32>)> = (0..40)
            .map(|i| {
                let truth = if i % 2 == 0 { C } else { N };
                let pred = if i % 3 == 0 { M } else { truth };
                (format!("s{i}"), truth, one_hot(pred.index()))
            })
            .collect();
        let refs: Vec<_> =
            entries.iter().map(|(k, l, v)| (k.as_str(), *l, Solubility::Soluble, v.clone())).collect();
        let store = reduced_store(&refs);
        let result = Evaluator::new(options(50))
            .evaluate(&mut Oracle, &store, None, &mut BootstrapResampler::new(3))
            .unwrap();
        assert!(result.accuracy_stderr > 0.0);
        assert!(result.accuracy > 40.0 && result.accuracy < 90.0);
    }

    #[test]
    fn test_bootstrap_converges_with_more_draws() {
        // 100 samples, 70 predicted correctly
        let entries: Vec<(String, Vec<f32>)> = (0..100)
            .map(|i| {
                let pred = if i < 70 { C } else { M };
                (format!("s{i}"), one_hot(pred.index()))
            })
            .collect();
        let refs: Vec<_> =
            entries.iter().map(|(k, v)| (k.as_str(), C, Solubility::Soluble, v.clone())).collect();
        let store = reduced_store(&refs);

        let run = |n_draws: usize| {
            Evaluator::new(options(n_draws))
                .evaluate(&mut Oracle, &store, None, &mut BootstrapResampler::new(7))
                .unwrap()
        };
        let (small, medium, large) = (run(10), run(100), run(1000));

        // Bootstrap std of a 70% accuracy over 100 samples is ~4.58 points
        let expected_stderr = (0.7f64 * 0.3 / 100.0).sqrt() * 100.0;
        assert!((small.accuracy - 70.0).abs() < 6.0, "{}", small.accuracy);
        assert!((medium.accuracy - 70.0).abs() < 2.5, "{}", medium.accuracy);
        assert!((large.accuracy - 70.0).abs() < 1.0, "{}", large.accuracy);
        assert!((large.accuracy_stderr - expected_stderr).abs() < 0.8, "{}", large.accuracy_stderr);
        assert!((medium.accuracy_stderr - large.accuracy_stderr).abs() < 1.5);
        assert_eq!(large.n_draws, 1000);
    }

    #[test]
    fn test_solubility_target_drops_unknown_rows() {
        let store = reduced_store(&[
            ("a", M, Solubility::Soluble, vec![1.0, 0.0, 0.0]),
            ("b", M, Solubility::Insoluble, vec![0.0, 1.0, 0.0]),
            ("c", M, Solubility::Unknown, vec![1.0, 0.0, 0.0]),
        ]);
        let opts = EvaluatorOptions { target: Target::Sol, ..options(3) };
        let result =
            Evaluator::new(opts).evaluate(&mut Oracle, &store, None, &mut IdentityResampler).unwrap();
        assert_eq!(result.n_samples, 2);
        assert_relative_eq!(result.accuracy, 100.0);
        assert_eq!(result.per_class_accuracy.len(), 2);
        assert_eq!(result.class_names.len(), 2);
    }

    #[test]
    fn test_transfer_splits_supervised_and_unsupervised() {
        // Lookup: two tight clusters with consistent labels
        let lookup = reduced_store(&[
            ("l0", N, Solubility::Soluble, vec![0.0, 0.0, 9.0]),
            ("l1", N, Solubility::Soluble, vec![0.0, 0.0, 9.1]),
            ("l2", C, Solubility::Soluble, vec![0.0, 9.0, 0.0]),
            ("l3", C, Solubility::Soluble, vec![0.0, 9.1, 0.0]),
        ]);
        // e0 sits on the nucleus cluster; e1 is far from everything and predicted by the model
        let store = reduced_store(&[
            ("e0", N, Solubility::Soluble, vec![0.0, 0.0, 9.05]),
            ("e1", M, Solubility::Soluble, vec![1.0, 0.0, 0.0]),
        ]);
        let opts = EvaluatorOptions { distance: DistanceMetric::Euclidean, ..options(4) };
        let result = Evaluator::new(opts)
            .evaluate(&mut Oracle, &store, Some(&lookup), &mut IdentityResampler)
            .unwrap();
        let transfer = result.transfer.unwrap();
        assert_eq!(transfer.transferred, 1);
        assert_eq!(transfer.predicted, 1);
        assert_relative_eq!(transfer.unsupervised_accuracy, 100.0);
        assert_relative_eq!(transfer.supervised_accuracy, 100.0);
        assert_relative_eq!(result.accuracy, 100.0);
    }
}
