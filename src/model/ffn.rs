//! Feed-forward head over reduced embeddings

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::layers::{Dropout, Linear, Param, Relu};
use super::{ArchitectureDescriptor, Model, ModelParams};
use crate::data::{BatchInput, NUM_OUTPUTS};
use crate::{Error, Result};

/// `Linear -> Dropout -> ReLU -> Linear`
#[derive(Debug, Clone)]
pub struct FfnHead {
    embedding_dim: usize,
    params: ModelParams,
    hidden: Linear,
    dropout: Dropout,
    relu: Relu,
    output: Linear,
}

impl FfnHead {
    pub fn new(embedding_dim: usize, params: &ModelParams, seed: u64) -> Self {
        Self::with_prefix("ffn", embedding_dim, params, seed)
    }

    pub(crate) fn with_prefix(prefix: &str, embedding_dim: usize, params: &ModelParams, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            embedding_dim,
            params: params.clone(),
            hidden: Linear::new(&format!("{prefix}.hidden"), embedding_dim, params.hidden_dim, &mut rng),
            dropout: Dropout::new(params.dropout, seed.wrapping_add(1)),
            relu: Relu::default(),
            output: Linear::new(&format!("{prefix}.output"), params.hidden_dim, NUM_OUTPUTS, &mut rng),
        }
    }

    /// Forward over already-pooled features `[batch, embedding_dim]`
    pub(crate) fn forward_features(&mut self, x: &Array2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.embedding_dim {
            return Err(Error::ShapeMismatch {
                expected: vec![x.nrows(), self.embedding_dim],
                actual: vec![x.nrows(), x.ncols()],
            });
        }
        let h = self.hidden.forward(x);
        let h = self.dropout.forward(&h);
        let h = self.relu.forward(&h);
        Ok(self.output.forward(&h))
    }

    /// Backward to the features; returns their gradient
    pub(crate) fn backward_features(&mut self, grad_logits: &Array2<f32>) -> Array2<f32> {
        let g = self.output.backward(grad_logits);
        let g = self.relu.backward(&g);
        let g = self.dropout.backward(&g);
        self.hidden.backward(&g)
    }
}

impl Model for FfnHead {
    fn forward(&mut self, input: &BatchInput, _mask: Option<&Array2<bool>>) -> Result<Array2<f32>> {
        match input {
            BatchInput::Reduced(x) => self.forward_features(x),
            BatchInput::PerResidue(_) => Err(Error::ConfigError(
                "model 'ffn' expects reduced embeddings; use 'pooled_ffn' for per-residue input".into(),
            )),
        }
    }

    fn backward(&mut self, grad_logits: &Array2<f32>) -> Result<()> {
        self.backward_features(grad_logits);
        Ok(())
    }

    fn parameters(&self) -> Vec<&Param> {
        self.hidden.params().into_iter().chain(self.output.params()).collect()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Param> {
        self.hidden.params_mut().into_iter().chain(self.output.params_mut()).collect()
    }

    fn set_training(&mut self, training: bool) {
        self.dropout.set_training(training);
    }

    fn descriptor(&self) -> ArchitectureDescriptor {
        ArchitectureDescriptor {
            name: "ffn".into(),
            embedding_dim: self.embedding_dim,
            per_residue: false,
            params: self.params.clone(),
            num_outputs: NUM_OUTPUTS,
            num_parameters: self.num_parameters(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn params() -> ModelParams {
        ModelParams { hidden_dim: 4, dropout: 0.0 }
    }

    #[test]
    fn test_output_shape() {
        let mut model = FfnHead::new(6, &params(), 0);
        let logits = model.forward(&BatchInput::Reduced(Array2::ones((3, 6))), None).unwrap();
        assert_eq!(logits.dim(), (3, NUM_OUTPUTS));
    }

    #[test]
    fn test_rejects_per_residue_input() {
        let mut model = FfnHead::new(6, &params(), 0);
        let input = BatchInput::PerResidue(Array3::zeros((1, 6, 2)));
        assert!(matches!(model.forward(&input, None), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_wrong_width_is_shape_mismatch() {
        let mut model = FfnHead::new(6, &params(), 0);
        let input = BatchInput::Reduced(Array2::ones((1, 5)));
        assert!(matches!(model.forward(&input, None), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_state_dict_roundtrip() {
        let source = FfnHead::new(6, &params(), 1);
        let mut target = FfnHead::new(6, &params(), 2);
        let state = source.state_dict().into_iter().collect();
        target.load_state_dict(&state).unwrap();
        assert_eq!(source.state_dict(), target.state_dict());
        assert_eq!(target.parameters().len(), 4);
    }

    #[test]
    fn test_backward_fills_all_gradients() {
        let mut model = FfnHead::new(3, &params(), 5);
        let x = BatchInput::Reduced(ndarray::arr2(&[[1.0, -1.0, 0.5], [0.2, 0.3, -0.9]]));
        let logits = model.forward(&x, None).unwrap();
        model.backward(&Array2::ones(logits.raw_dim())).unwrap();
        let out_bias = model.parameters().into_iter().find(|p| p.name == "ffn.output.bias").unwrap();
        assert!(out_bias.grad.iter().all(|&g| (g - 2.0).abs() < 1e-6));
        model.zero_grad();
        assert!(model.parameters().iter().all(|p| p.grad.iter().all(|&g| g == 0.0)));
    }
}
