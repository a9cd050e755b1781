//! Embedding sources
//!
//! Embeddings are produced upstream and stored as F32 tensors keyed by
//! sequence identifier, either one vector per protein (reduced) or one row
//! per residue.

use ndarray::{Array1, Array2, Axis};
use safetensors::tensor::{Dtype, TensorView};
use std::collections::HashMap;
use std::path::Path;

use crate::{Error, Result};

/// A single protein embedding
#[derive(Debug, Clone, PartialEq)]
pub enum Embedding {
    /// Fixed-length vector `[dim]`
    Reduced(Array1<f32>),
    /// Per-residue matrix `[length, dim]`
    PerResidue(Array2<f32>),
}

impl Embedding {
    /// Feature dimension
    pub fn dim(&self) -> usize {
        match self {
            Embedding::Reduced(v) => v.len(),
            Embedding::PerResidue(m) => m.ncols(),
        }
    }

    pub fn is_per_residue(&self) -> bool {
        matches!(self, Embedding::PerResidue(_))
    }

    /// Collapse to a single vector, averaging residues
    pub fn pooled(&self) -> Array1<f32> {
        match self {
            Embedding::Reduced(v) => v.clone(),
            Embedding::PerResidue(m) => {
                m.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(m.ncols()))
            }
        }
    }
}

/// Key/value access to precomputed embeddings
pub trait EmbeddingSource {
    /// Fetch the embedding stored under `key`
    fn get(&self, key: &str) -> Result<Embedding>;

    /// Whether `key` is present
    fn contains(&self, key: &str) -> bool;

    /// Number of stored embeddings
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Embeddings held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryEmbeddings {
    entries: HashMap<String, Embedding>,
}

impl InMemoryEmbeddings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, embedding: Embedding) {
        self.entries.insert(key.into(), embedding);
    }

    /// Write all entries to a safetensors file
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut keys: Vec<&String> = self.entries.keys().collect();
        keys.sort();

        let tensor_data: Vec<(&str, Vec<u8>, Vec<usize>)> = keys
            .iter()
            .map(|key| {
                let (data, shape) = match &self.entries[*key] {
                    Embedding::Reduced(v) => (v.iter().copied().collect::<Vec<f32>>(), vec![v.len()]),
                    Embedding::PerResidue(m) => {
                        (m.iter().copied().collect::<Vec<f32>>(), vec![m.nrows(), m.ncols()])
                    }
                };
                (key.as_str(), bytemuck::cast_slice(&data).to_vec(), shape)
            })
            .collect();

        let views = tensor_data
            .iter()
            .map(|(name, bytes, shape)| {
                TensorView::new(Dtype::F32, shape.clone(), bytes)
                    .map(|view| (*name, view))
                    .map_err(|e| Error::Serialization(format!("Invalid embedding tensor {name}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let bytes = safetensors::serialize(views, None)
            .map_err(|e| Error::Serialization(format!("Failed to serialize embeddings: {e}")))?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

impl EmbeddingSource for InMemoryEmbeddings {
    fn get(&self, key: &str) -> Result<Embedding> {
        self.entries.get(key).cloned().ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Embeddings decoded from a `.safetensors` file
///
/// Rank-1 tensors load as reduced embeddings, rank-2 tensors as per-residue.
#[derive(Debug, Clone)]
pub struct SafeTensorsEmbeddings {
    inner: InMemoryEmbeddings,
}

impl SafeTensorsEmbeddings {
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let tensors = safetensors::SafeTensors::deserialize(&data).map_err(|e| {
            Error::Serialization(format!("SafeTensors parsing failed for {}: {e}", path.display()))
        })?;

        let mut inner = InMemoryEmbeddings::new();
        for (name, view) in tensors.tensors() {
            if view.dtype() != Dtype::F32 {
                return Err(Error::Serialization(format!(
                    "embedding {name} has dtype {:?}, expected F32",
                    view.dtype()
                )));
            }
            let values = decode_f32(view.data());
            let embedding = match view.shape() {
                [dim] => Embedding::Reduced(Array1::from_shape_vec(*dim, values).map_err(shape_err)?),
                [len, dim] => Embedding::PerResidue(
                    Array2::from_shape_vec((*len, *dim), values).map_err(shape_err)?,
                ),
                other => {
                    return Err(Error::ShapeMismatch { expected: vec![0, 0], actual: other.to_vec() })
                }
            };
            inner.insert(name, embedding);
        }
        log::debug!("Loaded {} embeddings from {}", inner.len(), path.display());
        Ok(Self { inner })
    }
}

impl EmbeddingSource for SafeTensorsEmbeddings {
    fn get(&self, key: &str) -> Result<Embedding> {
        self.inner.get(key)
    }

    fn contains(&self, key: &str) -> bool {
        self.inner.contains(key)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

fn decode_f32(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
}

fn shape_err(e: ndarray::ShapeError) -> Error {
    Error::Serialization(format!("embedding shape: {e}"))
}

/// Residue alphabet for one-hot encoding; anything else maps to the last channel
pub const AMINO_ACIDS: &[u8; 20] = b"ACDEFGHIKLMNPQRSTVWY";

/// Number of one-hot channels
pub const ONEHOT_DIM: usize = AMINO_ACIDS.len() + 1;

/// One-hot encode a sequence as a `[length, 21]` per-residue embedding
pub fn one_hot(sequence: &str) -> Embedding {
    let bytes = sequence.as_bytes();
    let mut matrix = Array2::<f32>::zeros((bytes.len(), ONEHOT_DIM));
    for (row, residue) in bytes.iter().enumerate() {
        let upper = residue.to_ascii_uppercase();
        let channel =
            AMINO_ACIDS.iter().position(|&aa| aa == upper).unwrap_or(ONEHOT_DIM - 1);
        matrix[[row, channel]] = 1.0;
    }
    Embedding::PerResidue(matrix)
}
