//! Opening the sample stores a config points at

use std::path::Path;

use crate::config::RunConfig;
use crate::data::{EmbeddingMode, SampleStore};
use crate::{Error, Result};

/// Open one split; the embedding path is ignored in onehot mode
fn open_split(config: &RunConfig, fasta: &Path, embeddings: Option<&Path>, split: &str) -> Result<SampleStore> {
    let data = &config.data;
    let embeddings = match (embeddings, data.embedding_mode) {
        (Some(path), _) => path,
        (None, EmbeddingMode::Onehot) => Path::new(""),
        (None, _) => {
            return Err(Error::ConfigError(format!("{split} embeddings are required in lm mode")))
        }
    };
    SampleStore::open(fasta, embeddings, data.key_format, data.store_options())
}

pub fn open_train(config: &RunConfig) -> Result<SampleStore> {
    let data = &config.data;
    open_split(config, &data.train_remapping, Some(&data.train_embeddings), "train")
}

pub fn open_val(config: &RunConfig) -> Result<SampleStore> {
    let data = &config.data;
    open_split(config, &data.val_remapping, Some(&data.val_embeddings), "val")
}

/// Test split, when configured
pub fn open_test(config: &RunConfig) -> Result<Option<SampleStore>> {
    let data = &config.data;
    data.test_remapping
        .as_deref()
        .map(|fasta| open_split(config, fasta, data.test_embeddings.as_deref(), "test"))
        .transpose()
}

/// Annotation transfer lookup set, when configured
pub fn open_lookup(config: &RunConfig) -> Result<Option<SampleStore>> {
    let e = &config.evaluation;
    e.lookup_remapping
        .as_deref()
        .map(|fasta| open_split(config, fasta, e.lookup_embeddings.as_deref(), "lookup"))
        .transpose()
}
