//! Adam and AdamW

use ndarray::Array2;
use std::collections::BTreeMap;

use super::{Optimizer, OptimizerState};
use crate::model::Param;
use crate::{Error, Result};

/// Adam optimizer
///
/// With `decoupled = false` weight decay is added to the gradient (L2);
/// with `decoupled = true` it shrinks the parameters directly (AdamW):
/// `θ_t = (1 - lr·λ)·θ_{t-1} - lr·m̂_t / (√v̂_t + ε)`.
#[derive(Debug, Clone)]
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    weight_decay: f32,
    decoupled: bool,
    t: u64,
    m: BTreeMap<String, Array2<f32>>,
    v: BTreeMap<String, Array2<f32>>,
}

impl Adam {
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32, weight_decay: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            weight_decay,
            decoupled: false,
            t: 0,
            m: BTreeMap::new(),
            v: BTreeMap::new(),
        }
    }

    /// Adam with PyTorch defaults
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8, 0.0)
    }

    /// Switch to decoupled weight decay
    pub fn decoupled(mut self) -> Self {
        self.decoupled = true;
        self
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [&mut Param]) {
        self.t += 1;
        let bias1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias2 = 1.0 - self.beta2.powi(self.t as i32);
        let (beta1, beta2, lr, eps) = (self.beta1, self.beta2, self.lr, self.epsilon);

        for param in params.iter_mut() {
            let mut grad = param.grad.clone();
            if self.weight_decay != 0.0 && !self.decoupled {
                grad.scaled_add(self.weight_decay, &param.value);
            }

            let m = self.m.entry(param.name.clone()).or_insert_with(|| Array2::zeros(grad.raw_dim()));
            let v = self.v.entry(param.name.clone()).or_insert_with(|| Array2::zeros(grad.raw_dim()));
            m.zip_mut_with(&grad, |m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
            v.zip_mut_with(&grad, |v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);

            if self.weight_decay != 0.0 && self.decoupled {
                param.value *= 1.0 - lr * self.weight_decay;
            }

            ndarray::Zip::from(&mut param.value).and(&*m).and(&*v).for_each(|w, &m, &v| {
                let m_hat = m / bias1;
                let v_hat = v / bias2;
                *w -= lr * m_hat / (v_hat.sqrt() + eps);
            });
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn name(&self) -> &'static str {
        if self.decoupled {
            "adamw"
        } else {
            "adam"
        }
    }

    fn state(&self) -> OptimizerState {
        let mut buffers = BTreeMap::new();
        for (name, m) in &self.m {
            buffers.insert(format!("m.{name}"), m.clone());
        }
        for (name, v) in &self.v {
            buffers.insert(format!("v.{name}"), v.clone());
        }
        OptimizerState { name: self.name().to_string(), step: self.t, buffers }
    }

    fn load_state(&mut self, state: OptimizerState) -> Result<()> {
        if state.name != self.name() {
            return Err(Error::CheckpointCorrupt(format!(
                "optimizer state is for '{}', current optimizer is '{}'",
                state.name,
                self.name()
            )));
        }
        self.t = state.step;
        self.m.clear();
        self.v.clear();
        for (key, buffer) in state.buffers {
            match key.split_once('.') {
                Some(("m", name)) => {
                    self.m.insert(name.to_string(), buffer);
                }
                Some(("v", name)) => {
                    self.v.insert(name.to_string(), buffer);
                }
                _ => {
                    return Err(Error::CheckpointCorrupt(format!("unexpected Adam buffer '{key}'")))
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    #[test]
    fn test_first_step_moves_by_lr() {
        // With bias correction the first update is lr * sign(g)
        let mut p = Param::new("w", arr2(&[[1.0, -1.0]]));
        p.grad = arr2(&[[0.3, -2.0]]);
        let mut adam = Adam::default_params(0.1);
        adam.step(&mut [&mut p]);
        assert_relative_eq!(p.value[[0, 0]], 0.9, epsilon = 1e-5);
        assert_relative_eq!(p.value[[0, 1]], -0.9, epsilon = 1e-5);
        assert_eq!(adam.t, 1);
    }

    #[test]
    fn test_converges_on_quadratic() {
        let mut p = Param::new("w", arr2(&[[5.0]]));
        let mut adam = Adam::default_params(0.1);
        for _ in 0..500 {
            p.grad = &p.value * 2.0;
            adam.step(&mut [&mut p]);
        }
        assert!(p.value[[0, 0]].abs() < 0.1);
    }

    #[test]
    fn test_decoupled_decay_shrinks_without_gradient() {
        let mut p = Param::new("w", arr2(&[[2.0]]));
        let mut adamw = Adam::new(0.1, 0.9, 0.999, 1e-8, 0.5).decoupled();
        adamw.step(&mut [&mut p]);
        assert_relative_eq!(p.value[[0, 0]], 2.0 * (1.0 - 0.05), epsilon = 1e-6);
        assert_eq!(adamw.name(), "adamw");
    }

    #[test]
    fn test_state_roundtrip_continues_identically() {
        let mut a = Param::new("w", arr2(&[[1.0, 2.0]]));
        let mut opt = Adam::default_params(0.01);
        a.grad = arr2(&[[0.1, 0.2]]);
        opt.step(&mut [&mut a]);

        let mut restored = Adam::default_params(0.01);
        restored.load_state(opt.state()).unwrap();
        let mut b = a.clone();

        opt.step(&mut [&mut a]);
        restored.step(&mut [&mut b]);
        assert_eq!(a.value, b.value);
    }

    #[test]
    fn test_state_from_other_optimizer_rejected() {
        let mut adam = Adam::default_params(0.01);
        let state = OptimizerState { name: "sgd".into(), ..Default::default() };
        assert!(matches!(adam.load_state(state), Err(Error::CheckpointCorrupt(_))));
    }
}
