//! Multi-epoch loop with checkpointing, early stopping and final evaluation

use std::sync::atomic::Ordering;
use std::time::Instant;

use super::core::Trainer;
use super::result::{StopReason, TrainResult, TrainerState};
use crate::config::Target;
use crate::data::SampleStore;
use crate::eval::{BootstrapResampler, EvaluationResult, Evaluator, EvaluatorOptions};
use crate::train::{Decision, EpochMetrics, PassMetrics};
use crate::{Error, Result};

/// Test data for the evaluation that follows training
#[derive(Debug, Clone, Copy)]
pub struct EvaluationData<'a> {
    pub store: &'a SampleStore,
    /// Labeled set for annotation transfer
    pub lookup: Option<&'a SampleStore>,
}

fn target_accuracy(metrics: &PassMetrics, target: Target) -> f64 {
    match target {
        Target::Loc => metrics.loc_accuracy,
        Target::Sol => metrics.sol_accuracy,
    }
}

impl Trainer {
    /// Train until the epoch budget, early stopping or an interrupt
    ///
    /// Every epoch writes `epoch.txt` and one metrics record; epochs whose
    /// validation target accuracy ties or beats the best so far also write
    /// a checkpoint. With `eval`, the best checkpoint is reloaded and
    /// bootstrap-evaluated, and the reports land in the run directory.
    pub fn train(
        &mut self,
        train: &SampleStore,
        val: &SampleStore,
        eval: Option<EvaluationData<'_>>,
    ) -> Result<TrainResult> {
        if train.is_empty() {
            return Err(Error::ConfigError("training set is empty after filtering".into()));
        }
        if val.is_empty() {
            return Err(Error::ConfigError("validation set is empty after filtering".into()));
        }

        let target = self.config.training.target;
        let num_epochs = self.config.training.num_epochs;
        let mut epoch_metrics = Vec::new();
        let mut stop_reason = StopReason::EpochBudget;
        let mut last_epoch = None;

        for epoch in self.start_epoch..num_epochs {
            if self.interrupt.load(Ordering::SeqCst) {
                log::warn!("Interrupted before epoch {epoch}");
                stop_reason = StopReason::Interrupted;
                break;
            }
            let started = Instant::now();

            self.state = TrainerState::Training;
            let train_metrics = self.run_pass(train, epoch, true)?;

            self.state = TrainerState::Validating;
            let val_metrics = self.run_pass(val, epoch, false)?;

            self.state = TrainerState::CheckpointDecision;
            let decision = self.stopping.record(
                target_accuracy(&train_metrics, target),
                target_accuracy(&val_metrics, target),
            );
            let improved = decision == Decision::Improved;
            if improved {
                self.best_epoch = Some(epoch);
                self.save_checkpoint(epoch + 1)?;
            }
            self.run.write_epoch(epoch)?;

            log::info!(
                "[Epoch {epoch}] loc acc train {:.2}% val {:.2}% | sol acc train {:.2}% val {:.2}% | loss train {:.5} val {:.5}{}",
                train_metrics.loc_accuracy,
                val_metrics.loc_accuracy,
                train_metrics.sol_accuracy,
                val_metrics.sol_accuracy,
                train_metrics.loc_loss,
                val_metrics.loc_loss,
                if improved { " (checkpoint)" } else { "" }
            );

            let metrics = EpochMetrics {
                epoch,
                train: train_metrics,
                val: val_metrics,
                learning_rate: self.optimizer.lr(),
                improved,
                epoch_time_ms: started.elapsed().as_millis() as u64,
            };
            self.sink.record(&metrics)?;
            epoch_metrics.push(metrics);
            last_epoch = Some(epoch);

            if self.stopping.should_stop() {
                log::info!(
                    "Early stopping after epoch {epoch}: {} epochs without improvement (best train acc {:.2}%)",
                    self.stopping.epochs_without_improvement(),
                    self.stopping.best_train_acc()
                );
                self.state = TrainerState::EarlyStopped;
                stop_reason = StopReason::EarlyStopped;
                break;
            }
        }

        let evaluation = match eval {
            Some(data) => self.evaluate_best(data)?,
            None => None,
        };
        self.state = TrainerState::Completed;

        Ok(TrainResult {
            start_epoch: self.start_epoch,
            last_epoch,
            best_val_acc: self.stopping.best_val_acc(),
            best_epoch: self.best_epoch,
            stop_reason,
            epoch_metrics,
            evaluation,
        })
    }

    fn evaluate_best(&mut self, data: EvaluationData<'_>) -> Result<Option<EvaluationResult>> {
        if !self.run.has_checkpoint() {
            log::warn!("No checkpoint in {}; skipping evaluation", self.run.path().display());
            return Ok(None);
        }
        self.reload_best()?;
        let evaluator = Evaluator::new(EvaluatorOptions::from_config(&self.config));
        let mut resampler = BootstrapResampler::new(self.config.training.seed);
        let result = evaluator.evaluate(self.model.as_mut(), data.store, data.lookup, &mut resampler)?;
        result.write_reports(self.run.path())?;
        println!("{result}");
        Ok(Some(result))
    }
}
