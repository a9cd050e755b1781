//! Label and length statistics for a fasta file

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::fasta::AnnotatedRecord;
use super::labels::{Localization, Solubility};

/// Summary of a metadata file
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DatasetStats {
    pub total: usize,
    pub localization_counts: BTreeMap<Localization, usize>,
    pub soluble: usize,
    pub insoluble: usize,
    pub unknown_solubility: usize,
    pub min_length: usize,
    pub max_length: usize,
    pub mean_length: f64,
    pub length_cutoff: usize,
    /// Percentage of sequences strictly longer than `length_cutoff`
    pub percent_above_cutoff: f64,
}

impl DatasetStats {
    pub fn from_records(records: &[AnnotatedRecord], length_cutoff: usize) -> Self {
        let mut localization_counts = BTreeMap::new();
        let (mut soluble, mut insoluble, mut unknown) = (0, 0, 0);
        let mut lengths = Vec::with_capacity(records.len());

        for r in records {
            *localization_counts.entry(r.localization).or_insert(0) += 1;
            match r.solubility {
                Solubility::Soluble => soluble += 1,
                Solubility::Insoluble => insoluble += 1,
                Solubility::Unknown => unknown += 1,
            }
            lengths.push(r.sequence.chars().count());
        }

        let total = records.len();
        let above = lengths.iter().filter(|&&l| l > length_cutoff).count();
        let pct = |n: usize| if total == 0 { 0.0 } else { 100.0 * n as f64 / total as f64 };

        Self {
            total,
            localization_counts,
            soluble,
            insoluble,
            unknown_solubility: unknown,
            min_length: lengths.iter().copied().min().unwrap_or(0),
            max_length: lengths.iter().copied().max().unwrap_or(0),
            mean_length: if total == 0 {
                0.0
            } else {
                lengths.iter().sum::<usize>() as f64 / total as f64
            },
            length_cutoff,
            percent_above_cutoff: pct(above),
        }
    }
}

impl fmt::Display for DatasetStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sequences: {}", self.total)?;
        writeln!(f, "Localization counts:")?;
        let mut by_count: Vec<_> = self.localization_counts.iter().collect();
        by_count.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (loc, count) in by_count {
            writeln!(f, "  {:<24}{count}", loc.as_str())?;
        }
        writeln!(
            f,
            "Solubility: {} soluble, {} insoluble, {} unknown",
            self.soluble, self.insoluble, self.unknown_solubility
        )?;
        writeln!(
            f,
            "Length: min {}, max {}, mean {:.1}",
            self.min_length, self.max_length, self.mean_length
        )?;
        write!(
            f,
            "Percentage of sequences longer than {} residues: {:.2}%",
            self.length_cutoff, self.percent_above_cutoff
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::store::tests::record;
    use approx::assert_relative_eq;

    #[test]
    fn test_counts_and_lengths() {
        let records = vec![
            record("a", Localization::Nucleus, Solubility::Soluble, 10),
            record("b", Localization::Nucleus, Solubility::Unknown, 30),
            record("c", Localization::Plastid, Solubility::Insoluble, 20),
            record("d", Localization::Cytoplasm, Solubility::Soluble, 40),
        ];
        let stats = DatasetStats::from_records(&records, 20);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.localization_counts[&Localization::Nucleus], 2);
        assert_eq!((stats.soluble, stats.insoluble, stats.unknown_solubility), (2, 1, 1));
        assert_eq!((stats.min_length, stats.max_length), (10, 40));
        assert_relative_eq!(stats.mean_length, 25.0);
        assert_relative_eq!(stats.percent_above_cutoff, 50.0);
        assert!(stats.to_string().contains("Nucleus"));
    }

    #[test]
    fn test_empty_records() {
        let stats = DatasetStats::from_records(&[], 1000);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.percent_above_cutoff, 0.0);
    }
}
