//! Dense building blocks with explicit backward passes
//!
//! Each layer caches what its backward pass needs during `forward` and
//! accumulates parameter gradients in `backward`.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A trainable matrix and its accumulated gradient
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub value: Array2<f32>,
    pub grad: Array2<f32>,
}

impl Param {
    pub fn new(name: impl Into<String>, value: Array2<f32>) -> Self {
        let grad = Array2::zeros(value.raw_dim());
        Self { name: name.into(), value, grad }
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.value.nrows(), self.value.ncols()]
    }
}

/// Fully connected layer: `y = x W + b`
#[derive(Debug, Clone)]
pub struct Linear {
    pub weight: Param,
    pub bias: Param,
    input: Option<Array2<f32>>,
}

impl Linear {
    /// Xavier-uniform initialized layer
    pub fn new(name: &str, fan_in: usize, fan_out: usize, rng: &mut StdRng) -> Self {
        let bound = (6.0 / (fan_in + fan_out) as f32).sqrt();
        let weight = Array2::from_shape_fn((fan_in, fan_out), |_| rng.random_range(-bound..bound));
        Self {
            weight: Param::new(format!("{name}.weight"), weight),
            bias: Param::new(format!("{name}.bias"), Array2::zeros((1, fan_out))),
            input: None,
        }
    }

    pub fn forward(&mut self, x: &Array2<f32>) -> Array2<f32> {
        self.input = Some(x.clone());
        x.dot(&self.weight.value) + &self.bias.value
    }

    /// Accumulate parameter gradients and return the gradient w.r.t. the input
    pub fn backward(&mut self, grad_out: &Array2<f32>) -> Array2<f32> {
        if let Some(x) = &self.input {
            self.weight.grad += &x.t().dot(grad_out);
            self.bias.grad += &grad_out.sum_axis(ndarray::Axis(0)).insert_axis(ndarray::Axis(0));
        }
        grad_out.dot(&self.weight.value.t())
    }

    pub fn params_mut(&mut self) -> [&mut Param; 2] {
        [&mut self.weight, &mut self.bias]
    }

    pub fn params(&self) -> [&Param; 2] {
        [&self.weight, &self.bias]
    }
}

/// Rectified linear unit
#[derive(Debug, Clone, Default)]
pub struct Relu {
    active: Option<Array2<bool>>,
}

impl Relu {
    pub fn forward(&mut self, x: &Array2<f32>) -> Array2<f32> {
        self.active = Some(x.mapv(|v| v > 0.0));
        x.mapv(|v| v.max(0.0))
    }

    pub fn backward(&self, grad_out: &Array2<f32>) -> Array2<f32> {
        match &self.active {
            Some(active) => {
                let mut grad = grad_out.clone();
                grad.zip_mut_with(active, |g, &a| {
                    if !a {
                        *g = 0.0;
                    }
                });
                grad
            }
            None => grad_out.clone(),
        }
    }
}

/// Inverted dropout; identity outside training
#[derive(Debug, Clone)]
pub struct Dropout {
    p: f32,
    training: bool,
    rng: StdRng,
    scale: Option<Array2<f32>>,
}

impl Dropout {
    pub fn new(p: f32, seed: u64) -> Self {
        Self { p: p.clamp(0.0, 0.99), training: true, rng: StdRng::seed_from_u64(seed), scale: None }
    }

    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    pub fn forward(&mut self, x: &Array2<f32>) -> Array2<f32> {
        if !self.training || self.p == 0.0 {
            self.scale = None;
            return x.clone();
        }
        let keep = 1.0 - self.p;
        let rng = &mut self.rng;
        let scale =
            Array2::from_shape_fn(x.raw_dim(), |_| if rng.random::<f32>() < keep { 1.0 / keep } else { 0.0 });
        let out = x * &scale;
        self.scale = Some(scale);
        out
    }

    pub fn backward(&self, grad_out: &Array2<f32>) -> Array2<f32> {
        match &self.scale {
            Some(scale) => grad_out * scale,
            None => grad_out.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    #[test]
    fn test_linear_forward_adds_bias() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut layer = Linear::new("l", 2, 1, &mut rng);
        layer.weight.value = arr2(&[[1.0], [2.0]]);
        layer.bias.value = arr2(&[[0.5]]);
        let y = layer.forward(&arr2(&[[1.0, 1.0], [0.0, 2.0]]));
        assert_eq!(y, arr2(&[[3.5], [4.5]]));
    }

    #[test]
    fn test_linear_gradient_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut layer = Linear::new("l", 3, 2, &mut rng);
        let x = arr2(&[[0.2, -0.4, 1.0], [0.7, 0.1, -0.3]]);

        // loss = sum(y)
        let y = layer.forward(&x);
        layer.backward(&Array2::ones(y.raw_dim()));
        let analytic = layer.weight.grad[[1, 0]];

        let eps = 1e-3;
        let base: f32 = y.sum();
        layer.weight.value[[1, 0]] += eps;
        let bumped: f32 = layer.forward(&x).sum();
        assert_relative_eq!(analytic, (bumped - base) / eps, epsilon = 1e-2);
    }

    #[test]
    fn test_relu_masks_gradient() {
        let mut relu = Relu::default();
        let y = relu.forward(&arr2(&[[-1.0, 2.0]]));
        assert_eq!(y, arr2(&[[0.0, 2.0]]));
        assert_eq!(relu.backward(&arr2(&[[5.0, 5.0]])), arr2(&[[0.0, 5.0]]));
    }

    #[test]
    fn test_dropout_identity_in_eval() {
        let mut dropout = Dropout::new(0.5, 3);
        dropout.set_training(false);
        let x = arr2(&[[1.0, 2.0, 3.0]]);
        assert_eq!(dropout.forward(&x), x);
    }

    #[test]
    fn test_dropout_scales_kept_units() {
        let mut dropout = Dropout::new(0.5, 3);
        let y = dropout.forward(&Array2::ones((1, 64)));
        assert!(y.iter().all(|&v| v == 0.0 || (v - 2.0).abs() < 1e-6));
    }
}
