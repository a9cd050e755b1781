//! Stochastic Gradient Descent optimizer

use ndarray::Array2;
use std::collections::BTreeMap;

use super::{Optimizer, OptimizerState};
use crate::model::Param;
use crate::{Error, Result};

/// SGD optimizer with optional momentum and L2 weight decay
#[derive(Debug, Clone)]
pub struct Sgd {
    lr: f32,
    momentum: f32,
    weight_decay: f32,
    t: u64,
    velocities: BTreeMap<String, Array2<f32>>,
}

impl Sgd {
    pub fn new(lr: f32, momentum: f32, weight_decay: f32) -> Self {
        Self { lr, momentum, weight_decay, t: 0, velocities: BTreeMap::new() }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: &mut [&mut Param]) {
        self.t += 1;
        for param in params.iter_mut() {
            let mut grad = param.grad.clone();
            if self.weight_decay != 0.0 {
                grad.scaled_add(self.weight_decay, &param.value);
            }

            if self.momentum > 0.0 {
                // v = momentum * v - lr * grad
                let velocity = match self.velocities.get(&param.name) {
                    Some(v) => v * self.momentum - &grad * self.lr,
                    None => &grad * (-self.lr),
                };
                param.value += &velocity;
                self.velocities.insert(param.name.clone(), velocity);
            } else {
                param.value.scaled_add(-self.lr, &grad);
            }
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn name(&self) -> &'static str {
        "sgd"
    }

    fn state(&self) -> OptimizerState {
        let buffers =
            self.velocities.iter().map(|(name, v)| (format!("velocity.{name}"), v.clone())).collect();
        OptimizerState { name: "sgd".into(), step: self.t, buffers }
    }

    fn load_state(&mut self, state: OptimizerState) -> Result<()> {
        if state.name != "sgd" {
            return Err(Error::CheckpointCorrupt(format!(
                "optimizer state is for '{}', current optimizer is 'sgd'",
                state.name
            )));
        }
        self.t = state.step;
        self.velocities.clear();
        for (key, buffer) in state.buffers {
            let name = key.strip_prefix("velocity.").ok_or_else(|| {
                Error::CheckpointCorrupt(format!("unexpected SGD buffer '{key}'"))
            })?;
            self.velocities.insert(name.to_string(), buffer);
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
    fn test_plain_step() {
        let mut p = Param::new("w", arr2(&[[1.0, 2.0]]));
        p.grad = arr2(&[[1.0, -1.0]]);
        let mut sgd = Sgd::new(0.1, 0.0, 0.0);
        sgd.step(&mut [&mut p]);
        assert_relative_eq!(p.value[[0, 0]], 0.9);
        assert_relative_eq!(p.value[[0, 1]], 2.1);
        assert!(sgd.state().buffers.is_empty());
    }

    #[test]
    fn test_momentum_accumulates() {
        let mut p = Param::new("w", arr2(&[[0.0]]));
        p.grad = arr2(&[[1.0]]);
        let mut sgd = Sgd::new(0.1, 0.9, 0.0);
        sgd.step(&mut [&mut p]);
        sgd.step(&mut [&mut p]);
        // -0.1 then -(0.09 + 0.1)
        assert_relative_eq!(p.value[[0, 0]], -0.29, epsilon = 1e-6);
    }

    #[test]
    fn test_state_roundtrip() {
        let mut p = Param::new("w", arr2(&[[0.0]]));
        p.grad = arr2(&[[1.0]]);
        let mut sgd = Sgd::new(0.1, 0.9, 0.0);
        sgd.step(&mut [&mut p]);

        let mut restored = Sgd::new(0.1, 0.9, 0.0);
        restored.load_state(sgd.state()).unwrap();
        let mut q = p.clone();
        sgd.step(&mut [&mut p]);
        restored.step(&mut [&mut q]);
        assert_eq!(p.value, q.value);
    }
}
