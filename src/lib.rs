//! Subcellular localization classifiers on precomputed protein embeddings.
//!
//! The crate trains small classifier heads over per-protein or per-residue
//! embeddings and estimates their accuracy with bootstrap resampling,
//! optionally routing close hits through nearest-neighbour annotation transfer.
//!
//! # Layout
//!
//! - [`data`]: fasta metadata, embedding sources, the sample store and batch collation
//! - [`model`]: classifier heads and the model registry
//! - [`optim`]: Adam and SGD
//! - [`train`]: joint loss, metrics, checkpoints and the training engine
//! - [`eval`]: bootstrap evaluation and annotation transfer
//! - [`config`]: YAML run configuration and CLI arguments
//! - [`cli`]: command handlers behind the `subloc` binary

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod eval;
pub mod model;
pub mod optim;
pub mod train;

pub use error::{Error, Result};
