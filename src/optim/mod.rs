//! Optimizers over model parameters

mod adam;
mod optimizer;
mod sgd;

pub use adam::Adam;
pub use optimizer::{Optimizer, OptimizerState};
pub use sgd::Sgd;

use crate::config::OptimizerConfig;
use crate::{Error, Result};

/// Build the optimizer named in the configuration
pub fn build_optimizer(config: &OptimizerConfig) -> Result<Box<dyn Optimizer>> {
    match config.name.as_str() {
        "adam" => Ok(Box::new(Adam::new(config.lr, config.beta1, config.beta2, 1e-8, config.weight_decay))),
        "adamw" => Ok(Box::new(
            Adam::new(config.lr, config.beta1, config.beta2, 1e-8, config.weight_decay).decoupled(),
        )),
        "sgd" => Ok(Box::new(Sgd::new(config.lr, config.momentum, config.weight_decay))),
        other => Err(Error::ConfigError(format!(
            "unknown optimizer '{other}' (expected adam, adamw, sgd)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_by_name() {
        let mut config = OptimizerConfig::default();
        for name in ["adam", "adamw", "sgd"] {
            config.name = name.into();
            let opt = build_optimizer(&config).unwrap();
            assert_eq!(opt.name(), name);
            assert_eq!(opt.lr(), config.lr);
        }
        config.name = "lamb".into();
        assert!(matches!(build_optimizer(&config), Err(Error::ConfigError(_))));
    }
}
