//! Embedding-similarity annotation transfer
//!
//! Evaluation samples whose nearest lookup neighbor lies within a calibrated
//! distance cutoff take the neighbor's localization; the rest are left to
//! the model.

use ndarray::{Array1, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::data::{Localization, SampleStore};
use crate::{Error, Result};

/// Distance between pooled embeddings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`; 1 when either vector is zero
    #[default]
    Cosine,
    Euclidean,
}

impl DistanceMetric {
    /// Distance between two vectors of equal width
    pub fn distance(&self, a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> Result<f64> {
        if a.len() != b.len() {
            return Err(Error::ShapeMismatch { expected: vec![a.len()], actual: vec![b.len()] });
        }
        Ok(self.measure(a, b))
    }

    fn measure(&self, a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f64 {
        match self {
            DistanceMetric::Cosine => {
                let dot: f64 = a.iter().zip(b.iter()).map(|(&x, &y)| x as f64 * y as f64).sum();
                let na: f64 = a.iter().map(|&x| (x as f64).powi(2)).sum::<f64>().sqrt();
                let nb: f64 = b.iter().map(|&y| (y as f64).powi(2)).sum::<f64>().sqrt();
                if na == 0.0 || nb == 0.0 {
                    1.0
                } else {
                    1.0 - dot / (na * nb)
                }
            }
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(&x, &y)| (x as f64 - y as f64).powi(2))
                .sum::<f64>()
                .sqrt(),
        }
    }
}

/// Nearest lookup entry of a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f64,
}

/// An evaluation sample labeled from its neighbor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transferred {
    /// Index into the evaluation store
    pub index: usize,
    pub label: Localization,
    pub distance: f64,
}

/// Split of an evaluation store into transferred and model-predicted samples
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransferPartition {
    /// Samples within the cutoff
    pub low: Vec<Transferred>,
    /// Samples the model has to predict
    pub high: Vec<usize>,
    pub cutoff: Option<f64>,
}

impl TransferPartition {
    /// Everything goes to the model
    pub fn model_only(n: usize) -> Self {
        Self { low: Vec::new(), high: (0..n).collect(), cutoff: None }
    }
}

/// Pooled lookup embeddings with their labels
#[derive(Debug, Clone)]
pub struct LookupIndex {
    ids: Vec<String>,
    labels: Vec<Localization>,
    embeddings: Vec<Array1<f32>>,
    /// Width shared by every pooled lookup embedding
    dim: usize,
    metric: DistanceMetric,
}

impl LookupIndex {
    /// Pool every lookup sample's embedding; all of them must share one width
    pub fn build(lookup: &SampleStore, metric: DistanceMetric) -> Result<Self> {
        let mut ids = Vec::with_capacity(lookup.len());
        let mut labels = Vec::with_capacity(lookup.len());
        let mut embeddings: Vec<Array1<f32>> = Vec::with_capacity(lookup.len());
        for sample in lookup.samples() {
            let pooled = lookup.embedding_for(sample)?.pooled();
            if let Some(first) = embeddings.first() {
                if pooled.len() != first.len() {
                    return Err(Error::ShapeMismatch {
                        expected: vec![first.len()],
                        actual: vec![pooled.len()],
                    });
                }
            }
            ids.push(sample.id.clone());
            labels.push(sample.localization);
            embeddings.push(pooled);
        }
        let dim = embeddings.first().map_or(0, |e| e.len());
        Ok(Self { ids, labels, embeddings, dim, metric })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn label(&self, index: usize) -> Localization {
        self.labels[index]
    }

    /// Width of the pooled lookup embeddings; 0 for an empty index
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Nearest entry whose id differs from `id`
    pub fn nearest(&self, id: &str, query: ArrayView1<'_, f32>) -> Result<Option<Neighbor>> {
        if !self.is_empty() && query.len() != self.dim {
            return Err(Error::ShapeMismatch { expected: vec![self.dim], actual: vec![query.len()] });
        }
        Ok(self.scan(id, query))
    }

    fn scan(&self, id: &str, query: ArrayView1<'_, f32>) -> Option<Neighbor> {
        self.ids
            .iter()
            .zip(&self.embeddings)
            .enumerate()
            .filter(|(_, (other, _))| other.as_str() != id)
            .map(|(index, (_, emb))| Neighbor { index, distance: self.metric.measure(query, emb.view()) })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Largest distance at which the cumulative transfer accuracy is still `>= threshold`
    ///
    /// Up to `calibration_size` seeded lookup entries are matched against
    /// the rest of the lookup set. Pairs are swept in ascending distance and
    /// only tie-group boundaries are cutoff candidates. `None` means no
    /// cutoff qualifies and nothing should be transferred.
    pub fn calibrate_cutoff(&self, threshold: f64, calibration_size: usize, seed: u64) -> Option<f64> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        order.truncate(calibration_size);

        let mut pairs: Vec<(f64, bool)> = order
            .iter()
            .filter_map(|&i| {
                self.scan(&self.ids[i], self.embeddings[i].view())
                    .map(|n| (n.distance, self.labels[n.index] == self.labels[i]))
            })
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut cutoff = None;
        let mut correct = 0usize;
        for (i, &(distance, hit)) in pairs.iter().enumerate() {
            correct += usize::from(hit);
            let group_end = pairs.get(i + 1).map_or(true, |next| next.0 > distance);
            if group_end && correct as f64 / (i + 1) as f64 >= threshold {
                cutoff = Some(distance);
            }
        }
        cutoff
    }

    /// Assign each evaluation sample to the transferred or the model set
    pub fn partition(&self, store: &SampleStore, cutoff: Option<f64>) -> Result<TransferPartition> {
        let Some(cutoff) = cutoff else {
            return Ok(TransferPartition::model_only(store.len()));
        };
        let mut partition = TransferPartition { cutoff: Some(cutoff), ..Default::default() };
        for (index, sample) in store.samples().iter().enumerate() {
            let pooled = store.embedding_for(sample)?.pooled();
            match self.nearest(&sample.id, pooled.view())? {
                Some(n) if n.distance <= cutoff => partition.low.push(Transferred {
                    index,
                    label: self.labels[n.index],
                    distance: n.distance,
                }),
                _ => partition.high.push(index),
            }
        }
        log::info!(
            "Annotation transfer: cutoff {cutoff:.4}, {} transferred, {} to the model",
            partition.low.len(),
            partition.high.len()
        );
        Ok(partition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::store::tests::reduced_store;
    use crate::data::Solubility;
    use approx::assert_relative_eq;
    use ndarray::arr1;

    use crate::data::Localization::{Cytoplasm as C, Nucleus as N};

    #[test]
    fn test_cosine_and_euclidean() {
        let a = arr1(&[1.0f32, 0.0]);
        let b = arr1(&[0.0f32, 2.0]);
        assert_relative_eq!(DistanceMetric::Cosine.distance(a.view(), b.view()).unwrap(), 1.0);
        assert_relative_eq!(DistanceMetric::Cosine.distance(a.view(), a.view()).unwrap(), 0.0);
        assert_relative_eq!(DistanceMetric::Euclidean.distance(a.view(), b.view()).unwrap(), 5f64.sqrt());
        let zero = arr1(&[0.0f32, 0.0]);
        assert_relative_eq!(DistanceMetric::Cosine.distance(zero.view(), a.view()).unwrap(), 1.0);
    }

    #[test]
    fn test_distance_rejects_unequal_widths() {
        let a = arr1(&[1.0f32, 0.0]);
        let b = arr1(&[1.0f32, 0.0, 99.0]);
        for metric in [DistanceMetric::Cosine, DistanceMetric::Euclidean] {
            assert!(matches!(metric.distance(a.view(), b.view()), Err(Error::ShapeMismatch { .. })));
        }
    }

    #[test]
    fn test_mixed_width_lookup_rejected() {
        let store = reduced_store(&[
            ("a", N, Solubility::Soluble, vec![0.0, 1.0]),
            ("b", C, Solubility::Soluble, vec![1.0, 0.0, 0.0]),
        ]);
        let err = LookupIndex::build(&store, DistanceMetric::Cosine).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { expected, actual } if expected == vec![2] && actual == vec![3]));
    }

    #[test]
    fn test_partition_rejects_query_of_other_width() {
        let lookup = reduced_store(&[
            ("l0", N, Solubility::Soluble, vec![1.0, 0.0]),
            ("l1", N, Solubility::Soluble, vec![0.9, 0.1]),
        ]);
        let index = LookupIndex::build(&lookup, DistanceMetric::Euclidean).unwrap();
        assert_eq!(index.dim(), 2);
        let eval = reduced_store(&[("e0", C, Solubility::Soluble, vec![1.0, 0.0, 99.0, 0.0])]);
        let err = index.partition(&eval, Some(0.5)).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { expected, actual } if expected == vec![2] && actual == vec![4]));
        assert!(matches!(index.nearest("e0", arr1(&[1.0f32]).view()), Err(Error::ShapeMismatch { .. })));
    }

    fn lookup() -> SampleStore {
        reduced_store(&[
            ("l0", N, Solubility::Soluble, vec![0.0]),
            ("l1", N, Solubility::Soluble, vec![0.1]),
            ("l2", C, Solubility::Soluble, vec![5.0]),
            ("l3", C, Solubility::Soluble, vec![5.2]),
            ("l4", N, Solubility::Soluble, vec![5.5]),
        ])
    }

    #[test]
    fn test_nearest_skips_same_id() {
        let index = LookupIndex::build(&lookup(), DistanceMetric::Euclidean).unwrap();
        let n = index.nearest("l0", arr1(&[0.0f32]).view()).unwrap().unwrap();
        assert_eq!(n.index, 1);
        assert_relative_eq!(n.distance, 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_calibration_picks_largest_qualifying_distance() {
        let index = LookupIndex::build(&lookup(), DistanceMetric::Euclidean).unwrap();
        // Pairs: l0->l1 0.1 ok, l1->l0 0.1 ok, l2->l3 0.2 ok, l3->l2 0.2 ok, l4->l3 0.3 miss
        let cutoff = index.calibrate_cutoff(0.8, 100, 0).unwrap();
        assert_relative_eq!(cutoff, 0.3, epsilon = 1e-5);
        let strict = index.calibrate_cutoff(1.0, 100, 0).unwrap();
        assert_relative_eq!(strict, 0.2, epsilon = 1e-5);
    }

    #[test]
    fn test_calibration_none_when_unreachable() {
        let store = reduced_store(&[
            ("a", N, Solubility::Soluble, vec![0.0]),
            ("b", C, Solubility::Soluble, vec![1.0]),
        ]);
        let index = LookupIndex::build(&store, DistanceMetric::Euclidean).unwrap();
        assert_eq!(index.calibrate_cutoff(0.5, 10, 0), None);
    }

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let index = LookupIndex::build(&lookup(), DistanceMetric::Euclidean).unwrap();
        let eval = reduced_store(&[
            ("e0", C, Solubility::Soluble, vec![0.05]),
            ("e1", C, Solubility::Soluble, vec![20.0]),
            ("e2", C, Solubility::Soluble, vec![5.1]),
        ]);
        let partition = index.partition(&eval, Some(0.2)).unwrap();
        let mut all: Vec<usize> = partition.low.iter().map(|t| t.index).collect();
        all.extend(&partition.high);
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2]);
        assert_eq!(partition.high, vec![1]);
        assert_eq!(partition.low[0].label, N);
        assert_eq!(partition.low[1].label, C);
    }

    #[test]
    fn test_no_cutoff_sends_everything_to_model() {
        let index = LookupIndex::build(&lookup(), DistanceMetric::Cosine).unwrap();
        let partition = index.partition(&lookup(), None).unwrap();
        assert!(partition.low.is_empty());
        assert_eq!(partition.high.len(), 5);
    }
}
