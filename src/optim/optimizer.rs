//! Optimizer trait and serializable state

use ndarray::Array2;
use std::collections::BTreeMap;

use crate::model::Param;
use crate::Result;

/// Internal buffers of an optimizer, keyed by buffer kind and parameter name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimizerState {
    pub name: String,
    pub step: u64,
    /// `"{kind}.{param_name}"` to buffer, e.g. `m.ffn.hidden.weight`
    pub buffers: BTreeMap<String, Array2<f32>>,
}

/// Trait for optimization algorithms
pub trait Optimizer {
    /// Apply one update from the accumulated gradients
    fn step(&mut self, params: &mut [&mut Param]);

    /// Zero gradients on referenced parameters
    fn zero_grad(&mut self, params: &mut [&mut Param]) {
        for param in params.iter_mut() {
            param.zero_grad();
        }
    }

    fn lr(&self) -> f32;

    fn set_lr(&mut self, lr: f32);

    /// Registry name (`adam`, `adamw`, `sgd`)
    fn name(&self) -> &'static str;

    /// Snapshot for checkpointing
    fn state(&self) -> OptimizerState;

    /// Restore a snapshot taken by [`Optimizer::state`]
    fn load_state(&mut self, state: OptimizerState) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    struct Plain {
        lr: f32,
    }

    impl Optimizer for Plain {
        fn step(&mut self, params: &mut [&mut Param]) {
            for p in params.iter_mut() {
                let update = &p.grad * self.lr;
                p.value -= &update;
            }
        }
        fn lr(&self) -> f32 {
            self.lr
        }
        fn set_lr(&mut self, lr: f32) {
            self.lr = lr;
        }
        fn name(&self) -> &'static str {
            "plain"
        }
        fn state(&self) -> OptimizerState {
            OptimizerState::default()
        }
        fn load_state(&mut self, _state: OptimizerState) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_default_zero_grad() {
        let mut p = Param::new("w", arr2(&[[1.0, 2.0]]));
        p.grad = arr2(&[[0.5, 0.5]]);
        let mut opt = Plain { lr: 1.0 };
        opt.step(&mut [&mut p]);
        assert_eq!(p.value, arr2(&[[0.5, 1.5]]));
        opt.zero_grad(&mut [&mut p]);
        assert!(p.grad.iter().all(|&g| g == 0.0));
    }
}
