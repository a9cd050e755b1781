//! Indexed sample store over fasta metadata and embeddings

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::embeddings::{one_hot, EmbeddingSource, SafeTensorsEmbeddings};
use super::fasta::{read_annotated, AnnotatedRecord, KeyFormat};
use super::labels::{Localization, Solubility, NUM_LOCALIZATIONS};
use super::Embedding;
use crate::{Error, Result};

/// What each sample's input tensor is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMode {
    /// Language-model embeddings read from the embedding source
    #[default]
    Lm,
    /// One-hot residue encoding computed from the sequence
    Onehot,
    /// Evolutionary profiles (not available)
    Profiles,
}

/// Filters applied while building a store
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoreOptions {
    /// Sequences longer than this are excluded
    pub max_length: Option<usize>,
    /// Keep samples whose solubility is unknown
    pub unknown_solubility: bool,
    pub embedding_mode: EmbeddingMode,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreOptions {
    pub fn new() -> Self {
        Self { max_length: None, unknown_solubility: true, embedding_mode: EmbeddingMode::Lm }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_unknown_solubility(mut self, keep: bool) -> Self {
        self.unknown_solubility = keep;
        self
    }

    pub fn with_embedding_mode(mut self, mode: EmbeddingMode) -> Self {
        self.embedding_mode = mode;
        self
    }
}

/// One annotated protein
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub id: String,
    pub sequence: String,
    pub length: usize,
    pub localization: Localization,
    pub solubility: Solubility,
    pub embedding_key: String,
}

impl Sample {
    pub fn solubility_known(&self) -> bool {
        self.solubility.is_known()
    }
}

/// A sample with its embedding resolved
#[derive(Debug, Clone)]
pub struct SampleItem<'a> {
    pub embedding: Embedding,
    pub sample: &'a Sample,
}

/// Ordered, immutable collection of samples
pub struct SampleStore {
    samples: Vec<Sample>,
    class_weights: [f32; NUM_LOCALIZATIONS],
    mode: EmbeddingMode,
    source: Box<dyn EmbeddingSource>,
}

impl std::fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleStore")
            .field("len", &self.samples.len())
            .field("class_weights", &self.class_weights)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl SampleStore {
    /// Build a store from a fasta file and a safetensors embedding file
    pub fn open(
        fasta: &Path,
        embeddings: &Path,
        key_format: KeyFormat,
        options: StoreOptions,
    ) -> Result<Self> {
        let records = read_annotated(fasta, key_format)?;
        let source: Box<dyn EmbeddingSource> = match options.embedding_mode {
            EmbeddingMode::Lm => Box::new(SafeTensorsEmbeddings::open(embeddings)?),
            _ => Box::new(super::InMemoryEmbeddings::new()),
        };
        let store = Self::from_records(records, source, options)?;
        log::info!("Loaded {} samples from {}", store.len(), fasta.display());
        Ok(store)
    }

    /// Build a store from annotated records
    ///
    /// Class weights count every record, including those the filters drop.
    pub fn from_records(
        records: Vec<AnnotatedRecord>,
        source: Box<dyn EmbeddingSource>,
        options: StoreOptions,
    ) -> Result<Self> {
        if options.embedding_mode == EmbeddingMode::Profiles {
            return Err(Error::ConfigError(
                "embedding_mode 'profiles' is not supported; use 'lm' or 'onehot'".into(),
            ));
        }

        let mut counts = [0f32; NUM_LOCALIZATIONS];
        let mut samples = Vec::with_capacity(records.len());
        for record in records {
            counts[record.localization.index()] += 1.0;

            let length = record.sequence.chars().count();
            if options.max_length.is_some_and(|max| length > max) {
                continue;
            }
            if !options.unknown_solubility && !record.solubility.is_known() {
                continue;
            }
            if options.embedding_mode == EmbeddingMode::Lm && !source.contains(&record.key) {
                return Err(Error::KeyNotFound(record.key));
            }
            samples.push(Sample {
                id: record.key.clone(),
                sequence: record.sequence,
                length,
                localization: record.localization,
                solubility: record.solubility,
                embedding_key: record.key,
            });
        }

        let total: f32 = counts.iter().sum();
        if total > 0.0 {
            counts.iter_mut().for_each(|c| *c /= total);
        }

        Ok(Self { samples, class_weights: counts, mode: options.embedding_mode, source })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Metadata of sample `index`
    pub fn sample(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Sample `index` with its embedding
    pub fn get(&self, index: usize) -> Result<SampleItem<'_>> {
        let sample = self.samples.get(index).ok_or_else(|| {
            Error::ShapeMismatch { expected: vec![self.samples.len()], actual: vec![index] }
        })?;
        Ok(SampleItem { embedding: self.embedding_for(sample)?, sample })
    }

    /// Resolve the embedding of a sample according to the store's mode
    pub fn embedding_for(&self, sample: &Sample) -> Result<Embedding> {
        match self.mode {
            EmbeddingMode::Onehot => Ok(one_hot(&sample.sequence)),
            _ => self.source.get(&sample.embedding_key),
        }
    }

    /// Empirical localization frequencies over every parsed record
    pub fn class_weights(&self) -> &[f32; NUM_LOCALIZATIONS] {
        &self.class_weights
    }

    /// Feature dimension and whether inputs are per-residue, read from the first sample
    pub fn input_shape(&self) -> Result<(usize, bool)> {
        if self.is_empty() {
            return Err(Error::ConfigError("sample store is empty after filtering".into()));
        }
        let first = self.get(0)?;
        Ok((first.embedding.dim(), first.embedding.is_per_residue()))
    }
}
