//! Epoch-level training and validation passes

use ndarray::{s, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::core::Trainer;
use crate::data::{Batch, BatchLoader, SampleStore, NUM_LOCALIZATIONS};
use crate::model::Model;
use crate::train::{PassMetrics, PredictionRow, ResultsTable};
use crate::{Error, Result};

impl Trainer {
    /// Run one pass over `store`
    ///
    /// Training passes shuffle with `seed + epoch`, backpropagate and step
    /// the optimizer; validation passes are sequential and never update.
    pub(crate) fn run_pass(
        &mut self,
        store: &SampleStore,
        epoch: usize,
        training: bool,
    ) -> Result<PassMetrics> {
        let batch_size = self.config.training.batch_size;
        let log_iterations = self.config.training.log_iterations;
        self.model.set_training(training);

        let loader = if training {
            let mut rng = StdRng::seed_from_u64(self.config.training.seed.wrapping_add(epoch as u64));
            BatchLoader::shuffled(store, batch_size, &mut rng)
        } else {
            BatchLoader::sequential(store, batch_size)
        };
        let num_batches = loader.num_batches();

        let mut results = ResultsTable::new();
        let mut loc_loss = 0.0f64;
        let mut sol_loss = 0.0f64;
        for (i, batch) in loader.enumerate() {
            let batch = batch?;
            let logits = self.model.forward(&batch.inputs, batch.mask.as_ref())?;
            let loss = self.loss.forward(&logits, &batch)?;

            if training {
                if !loss.total.is_finite() {
                    return Err(Error::NonFiniteLoss { epoch });
                }
                self.model.backward(&loss.grad)?;
                let mut params = self.model.parameters_mut();
                self.optimizer.step(&mut params);
                self.optimizer.zero_grad(&mut params);
            }

            loc_loss += f64::from(loss.localization);
            sol_loss += f64::from(loss.solubility);
            results.extend(prediction_rows(&logits, &batch));

            if training && log_iterations > 0 && (i + 1) % log_iterations == 0 {
                log::info!(
                    "Epoch {epoch} [Iter {:5}/{num_batches:5}] loc loss: {:.7}, sol loss: {:.7}",
                    i + 1,
                    loss.localization,
                    loss.solubility
                );
            }
        }

        let denom = num_batches.max(1) as f64;
        Ok(PassMetrics::from_results(&results, loc_loss / denom, sol_loss / denom))
    }
}

fn argmax(values: ArrayView1<'_, f32>) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, max), (i, &v)| if v > max { (i, v) } else { (best, max) })
        .0
}

/// Turn `[batch, 12]` logits into prediction rows
pub(crate) fn prediction_rows(logits: &Array2<f32>, batch: &Batch) -> Vec<PredictionRow> {
    (0..batch.size())
        .map(|i| PredictionRow {
            loc_pred: argmax(logits.slice(s![i, ..NUM_LOCALIZATIONS])),
            loc_true: batch.localization[i],
            sol_pred: argmax(logits.slice(s![i, NUM_LOCALIZATIONS..])),
            sol_true: batch.solubility[i],
            sol_known: batch.solubility_known[i],
        })
        .collect()
}

/// Predict the samples at `indices`, in order, with the model in eval mode
pub fn predict(
    model: &mut dyn Model,
    store: &SampleStore,
    indices: Vec<usize>,
    batch_size: usize,
) -> Result<ResultsTable> {
    model.set_training(false);
    let mut results = ResultsTable::new();
    for batch in BatchLoader::with_indices(store, indices, batch_size) {
        let batch = batch?;
        let logits = model.forward(&batch.inputs, batch.mask.as_ref())?;
        results.extend(prediction_rows(&logits, &batch));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BatchInput;
    use ndarray::arr2;

    #[test]
    fn test_argmax_first_of_ties() {
        let a = ndarray::arr1(&[1.0f32, 3.0, 3.0]);
        assert_eq!(argmax(a.view()), 1);
    }

    #[test]
    fn test_prediction_rows_split_heads() {
        let mut logits = Array2::<f32>::zeros((2, 12));
        logits[[0, 4]] = 2.0;
        logits[[0, 11]] = 1.0;
        logits[[1, 9]] = 1.0;
        logits[[1, 10]] = 1.0;
        let batch = Batch {
            inputs: BatchInput::Reduced(arr2(&[[0.0f32], [0.0]])),
            mask: None,
            localization: vec![4, 2],
            solubility: vec![1, 0],
            solubility_known: vec![true, false],
            lengths: vec![1, 1],
        };
        let rows = prediction_rows(&logits, &batch);
        assert_eq!(rows[0], PredictionRow { loc_pred: 4, loc_true: 4, sol_pred: 1, sol_true: 1, sol_known: true });
        assert_eq!(rows[1].loc_pred, 9);
        assert_eq!(rows[1].sol_pred, 0);
        assert!(!rows[1].sol_known);
    }
}
