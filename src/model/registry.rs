//! Name-to-constructor mapping for classifier heads

use std::collections::BTreeMap;

use super::{FfnHead, Model, ModelParams, PooledFfn};
use crate::{Error, Result};

/// Builds a model from hyperparameters, input width and init seed
pub type ModelFactory = fn(&ModelParams, usize, u64) -> Box<dyn Model>;

/// Explicit registry of model constructors
#[derive(Clone, Default)]
pub struct ModelRegistry {
    factories: BTreeMap<String, ModelFactory>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry").field("models", &self.names()).finish()
    }
}

fn build_ffn(params: &ModelParams, embedding_dim: usize, seed: u64) -> Box<dyn Model> {
    Box::new(FfnHead::new(embedding_dim, params, seed))
}

fn build_pooled_ffn(params: &ModelParams, embedding_dim: usize, seed: u64) -> Box<dyn Model> {
    Box::new(PooledFfn::new(embedding_dim, params, seed))
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `ffn` and `pooled_ffn`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("ffn", build_ffn);
        registry.register("pooled_ffn", build_pooled_ffn);
        registry
    }

    pub fn register(&mut self, name: &str, factory: ModelFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn create(
        &self,
        name: &str,
        params: &ModelParams,
        embedding_dim: usize,
        seed: u64,
    ) -> Result<Box<dyn Model>> {
        let factory =
            self.factories.get(name).ok_or_else(|| Error::UnknownModelType(name.to_string()))?;
        Ok(factory(params, embedding_dim, seed))
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}
