//! Localization and solubility label sets

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Number of localization classes
pub const NUM_LOCALIZATIONS: usize = 10;

/// Number of solubility classes (insoluble, soluble)
pub const NUM_SOLUBILITY: usize = 2;

/// Width of the joint output: localization logits followed by solubility logits
pub const NUM_OUTPUTS: usize = NUM_LOCALIZATIONS + NUM_SOLUBILITY;

/// Subcellular compartment a protein is annotated with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Localization {
    CellMembrane,
    Cytoplasm,
    EndoplasmicReticulum,
    GolgiApparatus,
    LysosomeVacuole,
    Mitochondrion,
    Nucleus,
    Peroxisome,
    Plastid,
    Extracellular,
}

impl Localization {
    /// All classes in index order
    pub const ALL: [Localization; NUM_LOCALIZATIONS] = [
        Localization::CellMembrane,
        Localization::Cytoplasm,
        Localization::EndoplasmicReticulum,
        Localization::GolgiApparatus,
        Localization::LysosomeVacuole,
        Localization::Mitochondrion,
        Localization::Nucleus,
        Localization::Peroxisome,
        Localization::Plastid,
        Localization::Extracellular,
    ];

    /// Class index used for logits and confusion matrices
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Name as written in fasta descriptions
    pub fn as_str(self) -> &'static str {
        match self {
            Localization::CellMembrane => "Cell.membrane",
            Localization::Cytoplasm => "Cytoplasm",
            Localization::EndoplasmicReticulum => "Endoplasmic.reticulum",
            Localization::GolgiApparatus => "Golgi.apparatus",
            Localization::LysosomeVacuole => "Lysosome/Vacuole",
            Localization::Mitochondrion => "Mitochondrion",
            Localization::Nucleus => "Nucleus",
            Localization::Peroxisome => "Peroxisome",
            Localization::Plastid => "Plastid",
            Localization::Extracellular => "Extracellular",
        }
    }
}

impl fmt::Display for Localization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Localization {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|loc| loc.as_str() == s)
            .ok_or_else(|| Error::Parse { line: 0, message: format!("unknown localization '{s}'") })
    }
}

/// Solubility annotation
///
/// Unknown samples carry the insoluble class index but are masked out of the
/// solubility loss and accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Solubility {
    Soluble,
    Insoluble,
    Unknown,
}

impl Solubility {
    /// Class index in the solubility head
    pub fn index(self) -> usize {
        match self {
            Solubility::Soluble => 1,
            Solubility::Insoluble | Solubility::Unknown => 0,
        }
    }

    pub fn is_known(self) -> bool {
        self != Solubility::Unknown
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Solubility::Soluble => "S",
            Solubility::Insoluble => "M",
            Solubility::Unknown => "U",
        }
    }
}

impl fmt::Display for Solubility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Solubility {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "S" => Ok(Solubility::Soluble),
            "M" | "I" => Ok(Solubility::Insoluble),
            "U" => Ok(Solubility::Unknown),
            other => {
                Err(Error::Parse { line: 0, message: format!("unknown solubility '{other}'") })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localization_indices_follow_declaration_order() {
        for (i, loc) in Localization::ALL.iter().enumerate() {
            assert_eq!(loc.index(), i);
            assert_eq!(Localization::from_index(i), Some(*loc));
        }
        assert_eq!(Localization::from_index(NUM_LOCALIZATIONS), None);
    }

    #[test]
    fn test_localization_parse_names() {
        assert_eq!("Lysosome/Vacuole".parse::<Localization>().unwrap(), Localization::LysosomeVacuole);
        assert_eq!("Nucleus".parse::<Localization>().unwrap(), Localization::Nucleus);
        assert!("Vacuole".parse::<Localization>().is_err());
    }

    #[test]
    fn test_solubility_tokens() {
        assert_eq!("S".parse::<Solubility>().unwrap().index(), 1);
        assert_eq!("M".parse::<Solubility>().unwrap().index(), 0);
        let unknown = "U".parse::<Solubility>().unwrap();
        assert!(!unknown.is_known());
        assert_eq!(unknown.index(), 0);
        assert!("X".parse::<Solubility>().is_err());
    }
}
