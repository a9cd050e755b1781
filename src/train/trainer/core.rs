//! Core Trainer struct, construction and resume

use chrono::Utc;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::result::TrainerState;
use crate::config::RunConfig;
use crate::data::NUM_LOCALIZATIONS;
use crate::model::Model;
use crate::optim::{build_optimizer, Optimizer};
use crate::train::{
    Checkpoint, EarlyStopping, JointCrossEntropy, JsonlSink, MetricsSink, RunDirectory,
    METRICS_FILE,
};
use crate::Result;

/// Drives epochs of training and validation over sample stores
///
/// # Example
///
/// ```no_run
/// use subloc::config::load_and_validate;
/// use subloc::data::{SampleStore, StoreOptions};
/// use subloc::model::ModelRegistry;
/// use subloc::train::{RunDirectory, Trainer};
/// use std::path::Path;
///
/// let config = load_and_validate(Path::new("config.yaml"), None)?;
/// let data = &config.data;
/// let train = SampleStore::open(&data.train_remapping, &data.train_embeddings, data.key_format, StoreOptions::new())?;
/// let val = SampleStore::open(&data.val_remapping, &data.val_embeddings, data.key_format, StoreOptions::new())?;
/// let (dim, _) = train.input_shape()?;
/// let model = ModelRegistry::with_builtins().create(&config.model.model_type, &config.model.parameters, dim, config.training.seed)?;
/// let run = RunDirectory::create(&config.runs_dir, &config.model.model_type, &config.experiment_name)?;
/// let mut trainer = Trainer::new(config, model, run, *train.class_weights())?;
/// let result = trainer.train(&train, &val, None)?;
/// println!("best val acc {:.2}%", result.best_val_acc);
/// # Ok::<(), subloc::Error>(())
/// ```
pub struct Trainer {
    pub(crate) config: RunConfig,
    pub(crate) model: Box<dyn Model>,
    pub(crate) optimizer: Box<dyn Optimizer>,
    pub(crate) loss: JointCrossEntropy,
    pub(crate) run: RunDirectory,
    pub(crate) sink: Box<dyn MetricsSink>,
    pub(crate) state: TrainerState,
    pub(crate) start_epoch: usize,
    pub(crate) stopping: EarlyStopping,
    pub(crate) best_epoch: Option<usize>,
    /// Localization frequencies of the training store, persisted with checkpoints
    pub(crate) class_weights: [f32; NUM_LOCALIZATIONS],
    pub(crate) config_sha256: Option<String>,
    pub(crate) interrupt: Arc<AtomicBool>,
}

impl Trainer {
    /// Start a fresh run in `run`
    pub fn new(
        config: RunConfig,
        model: Box<dyn Model>,
        run: RunDirectory,
        class_weights: [f32; NUM_LOCALIZATIONS],
    ) -> Result<Self> {
        let optimizer = build_optimizer(&config.optimizer)?;
        let stopping = EarlyStopping::new(config.training.patience, config.training.min_train_acc);
        Self::assemble(config, model, optimizer, run, class_weights, stopping, 0, None)
    }

    /// Continue the run in `run` from its checkpoint and `epoch.txt`
    pub fn resume(config: RunConfig, mut model: Box<dyn Model>, run: RunDirectory) -> Result<Self> {
        let checkpoint = run.load_checkpoint()?;
        model.load_state_dict(&checkpoint.model_state())?;
        let mut optimizer = build_optimizer(&config.optimizer)?;
        optimizer.load_state(checkpoint.optimizer)?;
        let start_epoch = run.read_epoch()? + 1;
        let stopping = EarlyStopping::resume(
            config.training.patience,
            config.training.min_train_acc,
            checkpoint.max_val_acc,
        );
        log::info!(
            "Resuming {} at epoch {start_epoch} (best val acc {:.2}%)",
            run.path().display(),
            checkpoint.max_val_acc
        );
        let best_epoch = checkpoint.epoch.checked_sub(1);
        Self::assemble(
            config,
            model,
            optimizer,
            run,
            checkpoint.class_weights,
            stopping,
            start_epoch,
            best_epoch,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        config: RunConfig,
        model: Box<dyn Model>,
        optimizer: Box<dyn Optimizer>,
        run: RunDirectory,
        class_weights: [f32; NUM_LOCALIZATIONS],
        stopping: EarlyStopping,
        start_epoch: usize,
        best_epoch: Option<usize>,
    ) -> Result<Self> {
        let training = &config.training;
        let loss = if training.balanced_loss {
            JointCrossEntropy::balanced(training.solubility_loss, &class_weights)
        } else {
            JointCrossEntropy::new(training.solubility_loss)
        };
        let config_sha256 = Some(run.write_train_arguments(&config)?);
        run.write_architecture(&model.descriptor())?;
        log::info!(
            "Model '{}' with {} parameters, optimizer {}",
            config.model.model_type,
            model.num_parameters(),
            optimizer.name()
        );
        let sink = Box::new(JsonlSink::new(run.file(METRICS_FILE)));
        Ok(Self {
            config,
            model,
            optimizer,
            loss,
            run,
            sink,
            state: TrainerState::Initializing,
            start_epoch,
            stopping,
            best_epoch,
            class_weights,
            config_sha256,
            interrupt: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Replace the metrics sink
    pub fn with_sink(mut self, sink: Box<dyn MetricsSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Share an interrupt flag; the loop stops at the next epoch boundary once it is set
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn start_epoch(&self) -> usize {
        self.start_epoch
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    pub fn run_directory(&self) -> &RunDirectory {
        &self.run
    }

    /// Persist the current weights as the best checkpoint
    pub(crate) fn save_checkpoint(&self, completed_epochs: usize) -> Result<()> {
        let checkpoint = Checkpoint {
            epoch: completed_epochs,
            max_val_acc: self.stopping.best_val_acc(),
            class_weights: self.class_weights,
            model: self.model.state_dict(),
            optimizer: self.optimizer.state(),
            architecture: self.model.descriptor(),
            config_sha256: self.config_sha256.clone(),
            saved_at: Utc::now(),
        };
        self.run.save_checkpoint(&checkpoint)?;
        self.run.write_architecture(&checkpoint.architecture)?;
        log::debug!("Saved checkpoint after {completed_epochs} epochs");
        Ok(())
    }

    /// Restore the best checkpoint's weights into the model
    pub(crate) fn reload_best(&mut self) -> Result<()> {
        let checkpoint = self.run.load_checkpoint()?;
        self.model.load_state_dict(&checkpoint.model_state())
    }
}
