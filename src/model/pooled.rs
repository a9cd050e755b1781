//! Per-residue projection with masked mean/max pooling

use ndarray::{s, Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::ffn::FfnHead;
use super::layers::{Linear, Param, Relu};
use super::{ArchitectureDescriptor, Model, ModelParams};
use crate::data::{BatchInput, NUM_OUTPUTS};
use crate::{Error, Result};

/// Pooling bookkeeping from the last forward pass
#[derive(Debug, Clone, Default)]
struct PoolCache {
    /// Row range of each sample inside the flattened residue matrix
    segments: Vec<(usize, usize)>,
    /// Row index of the max for each (sample, channel)
    argmax: Vec<Vec<usize>>,
    total_rows: usize,
}

/// Projects every residue (a width-1 convolution), pools the valid
/// positions by mean and max, and feeds the concatenation to an FFN head.
#[derive(Debug, Clone)]
pub struct PooledFfn {
    embedding_dim: usize,
    params: ModelParams,
    projection: Linear,
    relu: Relu,
    head: FfnHead,
    cache: PoolCache,
}

impl PooledFfn {
    pub fn new(embedding_dim: usize, params: &ModelParams, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let hidden = params.hidden_dim;
        Self {
            embedding_dim,
            params: params.clone(),
            projection: Linear::new("pooled.projection", embedding_dim, hidden, &mut rng),
            relu: Relu::default(),
            head: FfnHead::with_prefix("pooled.ffn", 2 * hidden, params, seed.wrapping_add(17)),
            cache: PoolCache::default(),
        }
    }

    /// Valid residues of all samples stacked as `[rows, dim]`
    fn flatten(&self, x: &Array3<f32>, mask: &Array2<bool>) -> (Array2<f32>, Vec<(usize, usize)>) {
        let (batch, dim, _) = x.dim();
        let lengths: Vec<usize> = mask.outer_iter().map(|m| m.iter().filter(|&&v| v).count()).collect();
        let total: usize = lengths.iter().sum();

        let mut rows = Array2::<f32>::zeros((total, dim));
        let mut segments = Vec::with_capacity(batch);
        let mut start = 0;
        for (n, &len) in lengths.iter().enumerate() {
            rows.slice_mut(s![start..start + len, ..]).assign(&x.slice(s![n, .., ..len]).t());
            segments.push((start, start + len));
            start += len;
        }
        (rows, segments)
    }

    fn pool(&mut self, h: &Array2<f32>, segments: Vec<(usize, usize)>) -> Array2<f32> {
        let hidden = h.ncols();
        let mut pooled = Array2::<f32>::zeros((segments.len(), 2 * hidden));
        let mut argmax = Vec::with_capacity(segments.len());

        for (n, &(start, end)) in segments.iter().enumerate() {
            let mut best = vec![start; hidden];
            if end > start {
                let seg = h.slice(s![start..end, ..]);
                let mean = seg.mean_axis(Axis(0)).unwrap_or_else(|| ndarray::Array1::zeros(hidden));
                pooled.slice_mut(s![n, ..hidden]).assign(&mean);
                for c in 0..hidden {
                    let mut max_row = start;
                    for r in start..end {
                        if h[[r, c]] > h[[max_row, c]] {
                            max_row = r;
                        }
                    }
                    best[c] = max_row;
                    pooled[[n, hidden + c]] = h[[max_row, c]];
                }
            }
            argmax.push(best);
        }

        self.cache = PoolCache { segments, argmax, total_rows: h.nrows() };
        pooled
    }

    fn unpool(&self, grad_pooled: &Array2<f32>, hidden: usize) -> Array2<f32> {
        let mut grad = Array2::<f32>::zeros((self.cache.total_rows, hidden));
        for (n, &(start, end)) in self.cache.segments.iter().enumerate() {
            if end == start {
                continue;
            }
            let len = (end - start) as f32;
            for c in 0..hidden {
                let g_mean = grad_pooled[[n, c]] / len;
                for r in start..end {
                    grad[[r, c]] += g_mean;
                }
                grad[[self.cache.argmax[n][c], c]] += grad_pooled[[n, hidden + c]];
            }
        }
        grad
    }
}

impl Model for PooledFfn {
    fn forward(&mut self, input: &BatchInput, mask: Option<&Array2<bool>>) -> Result<Array2<f32>> {
        let BatchInput::PerResidue(x) = input else {
            return Err(Error::ConfigError(
                "model 'pooled_ffn' expects per-residue embeddings; use 'ffn' for reduced input".into(),
            ));
        };
        let (batch, dim, time) = x.dim();
        if dim != self.embedding_dim {
            return Err(Error::ShapeMismatch {
                expected: vec![batch, self.embedding_dim, time],
                actual: vec![batch, dim, time],
            });
        }
        let full;
        let mask = match mask {
            Some(m) => m,
            None => {
                full = Array2::from_elem((batch, time), true);
                &full
            }
        };

        let (rows, segments) = self.flatten(x, mask);
        let h = self.projection.forward(&rows);
        let h = self.relu.forward(&h);
        let pooled = self.pool(&h, segments);
        self.head.forward_features(&pooled)
    }

    fn backward(&mut self, grad_logits: &Array2<f32>) -> Result<()> {
        let grad_pooled = self.head.backward_features(grad_logits);
        let grad_h = self.unpool(&grad_pooled, self.params.hidden_dim);
        let grad_h = self.relu.backward(&grad_h);
        self.projection.backward(&grad_h);
        Ok(())
    }

    fn parameters(&self) -> Vec<&Param> {
        let mut params: Vec<&Param> = self.projection.params().into_iter().collect();
        params.extend(self.head.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Param> {
        let mut params: Vec<&mut Param> = self.projection.params_mut().into_iter().collect();
        params.extend(self.head.parameters_mut());
        params
    }

    fn set_training(&mut self, training: bool) {
        self.head.set_training(training);
    }

    fn descriptor(&self) -> ArchitectureDescriptor {
        ArchitectureDescriptor {
            name: "pooled_ffn".into(),
            embedding_dim: self.embedding_dim,
            per_residue: true,
            params: self.params.clone(),
            num_outputs: NUM_OUTPUTS,
            num_parameters: self.num_parameters(),
        }
    }
}
