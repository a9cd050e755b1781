//! Sample loading: fasta metadata, embeddings, store and batching

pub mod collate;
pub mod embeddings;
pub mod fasta;
pub mod labels;
pub mod loader;
pub mod stats;
pub mod store;

pub use collate::{collate, Batch, BatchInput};
pub use embeddings::{Embedding, EmbeddingSource, InMemoryEmbeddings, SafeTensorsEmbeddings};
pub use fasta::{read_annotated, AnnotatedRecord, KeyFormat};
pub use labels::{Localization, Solubility, NUM_LOCALIZATIONS, NUM_OUTPUTS, NUM_SOLUBILITY};
pub use loader::BatchLoader;
pub use stats::DatasetStats;
pub use store::{EmbeddingMode, Sample, SampleItem, SampleStore, StoreOptions};
