//! Classifier heads over protein embeddings
//!
//! Every model maps a batch to `[batch, 12]` logits: ten localization
//! classes followed by two solubility classes.

mod ffn;
mod layers;
mod pooled;
mod registry;

pub use ffn::FfnHead;
pub use layers::{Dropout, Linear, Param, Relu};
pub use pooled::PooledFfn;
pub use registry::{ModelFactory, ModelRegistry};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::data::BatchInput;
use crate::{Error, Result};

/// Hyperparameters shared by the built-in heads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default = "default_hidden_dim")]
    pub hidden_dim: usize,
    #[serde(default = "default_dropout")]
    pub dropout: f32,
}

fn default_hidden_dim() -> usize {
    32
}

fn default_dropout() -> f32 {
    0.25
}

impl Default for ModelParams {
    fn default() -> Self {
        Self { hidden_dim: default_hidden_dim(), dropout: default_dropout() }
    }
}

/// Serializable description of a model's architecture, stored next to checkpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureDescriptor {
    pub name: String,
    pub embedding_dim: usize,
    pub per_residue: bool,
    pub params: ModelParams,
    pub num_outputs: usize,
    pub num_parameters: usize,
}

/// A trainable classifier
pub trait Model {
    /// Compute `[batch, 12]` logits
    fn forward(&mut self, input: &BatchInput, mask: Option<&Array2<bool>>) -> Result<Array2<f32>>;

    /// Backpropagate the gradient w.r.t. the last forward's logits
    fn backward(&mut self, grad_logits: &Array2<f32>) -> Result<()>;

    fn parameters(&self) -> Vec<&Param>;

    fn parameters_mut(&mut self) -> Vec<&mut Param>;

    /// Toggle dropout
    fn set_training(&mut self, training: bool);

    fn descriptor(&self) -> ArchitectureDescriptor;

    fn zero_grad(&mut self) {
        for p in self.parameters_mut() {
            p.zero_grad();
        }
    }

    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.value.len()).sum()
    }

    /// Named copies of all parameters
    fn state_dict(&self) -> Vec<(String, Array2<f32>)> {
        self.parameters().into_iter().map(|p| (p.name.clone(), p.value.clone())).collect()
    }

    /// Restore parameters by name; every parameter must be present with its shape
    fn load_state_dict(&mut self, state: &HashMap<String, Array2<f32>>) -> Result<()> {
        for p in self.parameters_mut() {
            let value = state.get(&p.name).ok_or_else(|| {
                Error::CheckpointCorrupt(format!("missing parameter '{}'", p.name))
            })?;
            if value.dim() != p.value.dim() {
                return Err(Error::ShapeMismatch {
                    expected: p.shape().to_vec(),
                    actual: vec![value.nrows(), value.ncols()],
                });
            }
            p.value.assign(value);
        }
        Ok(())
    }
}
