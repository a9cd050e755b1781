//! Trainer for localization/solubility classifiers
//!
//! The trainer walks through `Initializing → (Training → Validating →
//! CheckpointDecision)* → EarlyStopped? → Completed`:
//! - training passes shuffle, backpropagate the joint loss and step the optimizer
//! - validation passes only predict
//! - the checkpoint decision compares the target accuracy with the best so far
//!
//! Runs resume from the run directory's checkpoint and `epoch.txt`.

mod core;
mod epoch;
mod result;
mod train_loop;


pub use core::Trainer;
pub use epoch::predict;
pub use result::{StopReason, TrainResult, TrainerState};
pub use train_loop::EvaluationData;
