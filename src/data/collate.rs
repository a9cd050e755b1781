//! Batch assembly with variable-length padding

use ndarray::{s, Array2, Array3};

use super::store::SampleItem;
use super::Embedding;
use crate::{Error, Result};

/// Stacked model input
#[derive(Debug, Clone, PartialEq)]
pub enum BatchInput {
    /// `[batch, dim]`
    Reduced(Array2<f32>),
    /// Zero-padded, channel-first `[batch, dim, max_len]`
    PerResidue(Array3<f32>),
}

impl BatchInput {
    pub fn batch_size(&self) -> usize {
        match self {
            BatchInput::Reduced(x) => x.nrows(),
            BatchInput::PerResidue(x) => x.dim().0,
        }
    }
}

/// A training or evaluation batch
#[derive(Debug, Clone)]
pub struct Batch {
    pub inputs: BatchInput,
    /// `mask[n, t]` is true for real residues; absent for reduced inputs
    pub mask: Option<Array2<bool>>,
    pub localization: Vec<usize>,
    pub solubility: Vec<usize>,
    pub solubility_known: Vec<bool>,
    pub lengths: Vec<usize>,
}

impl Batch {
    pub fn size(&self) -> usize {
        self.localization.len()
    }
}

/// Assemble samples into one batch, preserving their order
pub fn collate(items: &[SampleItem<'_>]) -> Result<Batch> {
    let first = items.first().ok_or_else(|| Error::ConfigError("cannot collate an empty batch".into()))?;
    let dim = first.embedding.dim();
    let per_residue = first.embedding.is_per_residue();

    for item in items {
        if item.embedding.is_per_residue() != per_residue || item.embedding.dim() != dim {
            return Err(Error::ShapeMismatch {
                expected: vec![dim],
                actual: vec![item.embedding.dim()],
            });
        }
    }

    let localization = items.iter().map(|i| i.sample.localization.index()).collect();
    let solubility = items.iter().map(|i| i.sample.solubility.index()).collect();
    let solubility_known = items.iter().map(|i| i.sample.solubility_known()).collect();
    let lengths: Vec<usize> = items.iter().map(|i| i.sample.length).collect();

    let (inputs, mask) = if per_residue {
        let (padded, mask) = pad_per_residue(items, dim, &lengths)?;
        (BatchInput::PerResidue(padded), Some(mask))
    } else {
        let mut stacked = Array2::<f32>::zeros((items.len(), dim));
        for (row, item) in items.iter().enumerate() {
            if let Embedding::Reduced(v) = &item.embedding {
                stacked.row_mut(row).assign(v);
            }
        }
        (BatchInput::Reduced(stacked), None)
    };

    Ok(Batch { inputs, mask, localization, solubility, solubility_known, lengths })
}

fn pad_per_residue(
    items: &[SampleItem<'_>],
    dim: usize,
    lengths: &[usize],
) -> Result<(Array3<f32>, Array2<bool>)> {
    let max_len = lengths.iter().copied().max().unwrap_or(0);
    let mut padded = Array3::<f32>::zeros((items.len(), dim, max_len));
    let mut mask = Array2::from_elem((items.len(), max_len), false);

    for (n, (item, &len)) in items.iter().zip(lengths).enumerate() {
        let Embedding::PerResidue(matrix) = &item.embedding else { continue };
        if matrix.nrows() != len {
            return Err(Error::ShapeMismatch {
                expected: vec![len, dim],
                actual: vec![matrix.nrows(), matrix.ncols()],
            });
        }
        // [len, dim] -> [dim, len]
        padded.slice_mut(s![n, .., ..len]).assign(&matrix.t());
        mask.slice_mut(s![n, ..len]).fill(true);
    }
    Ok((padded, mask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::labels::{Localization, Solubility};
    use crate::data::Sample;
    use ndarray::{arr1, arr2};

    fn sample(id: &str, length: usize, sol: Solubility) -> Sample {
        Sample {
            id: id.into(),
            sequence: "A".repeat(length),
            length,
            localization: Localization::Nucleus,
            solubility: sol,
            embedding_key: id.into(),
        }
    }

    #[test]
    fn test_reduced_batch_has_no_mask() {
        let a = sample("a", 5, Solubility::Soluble);
        let b = sample("b", 7, Solubility::Unknown);
        let items = vec![
            SampleItem { embedding: Embedding::Reduced(arr1(&[1.0, 2.0])), sample: &a },
            SampleItem { embedding: Embedding::Reduced(arr1(&[3.0, 4.0])), sample: &b },
        ];
        let batch = collate(&items).unwrap();
        assert!(batch.mask.is_none());
        assert_eq!(batch.inputs, BatchInput::Reduced(arr2(&[[1.0, 2.0], [3.0, 4.0]])));
        assert_eq!(batch.solubility_known, vec![true, false]);
    }

    #[test]
    fn test_per_residue_padding_and_mask() {
        let a = sample("a", 3, Solubility::Soluble);
        let b = sample("b", 1, Solubility::Soluble);
        let items = vec![
            SampleItem {
                embedding: Embedding::PerResidue(arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]])),
                sample: &a,
            },
            SampleItem { embedding: Embedding::PerResidue(arr2(&[[7.0, 8.0]])), sample: &b },
        ];
        let batch = collate(&items).unwrap();
        let BatchInput::PerResidue(x) = &batch.inputs else { panic!("expected per-residue") };
        assert_eq!(x.dim(), (2, 2, 3));
        assert_eq!(x[[0, 1, 2]], 6.0);
        assert_eq!(x[[1, 0, 0]], 7.0);
        assert_eq!(x[[1, 0, 1]], 0.0);

        let mask = batch.mask.unwrap();
        assert_eq!(mask.row(0).iter().filter(|&&m| m).count(), 3);
        assert_eq!(mask.row(1).iter().filter(|&&m| m).count(), 1);
    }

    #[test]
    fn test_single_item_pads_to_itself() {
        let a = sample("a", 2, Solubility::Soluble);
        let items =
            vec![SampleItem { embedding: Embedding::PerResidue(arr2(&[[1.0], [2.0]])), sample: &a }];
        let batch = collate(&items).unwrap();
        let BatchInput::PerResidue(x) = &batch.inputs else { panic!("expected per-residue") };
        assert_eq!(x.dim(), (1, 1, 2));
        assert!(batch.mask.unwrap().iter().all(|&m| m));
    }

    #[test]
    fn test_mixed_kinds_rejected() {
        let a = sample("a", 1, Solubility::Soluble);
        let items = vec![
            SampleItem { embedding: Embedding::Reduced(arr1(&[1.0])), sample: &a },
            SampleItem { embedding: Embedding::PerResidue(arr2(&[[1.0]])), sample: &a },
        ];
        assert!(matches!(collate(&items), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_length_disagreement_rejected() {
        let a = sample("a", 4, Solubility::Soluble);
        let items =
            vec![SampleItem { embedding: Embedding::PerResidue(arr2(&[[1.0], [2.0]])), sample: &a }];
        assert!(matches!(collate(&items), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(collate(&[]).is_err());
    }
}
