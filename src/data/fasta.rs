//! Fasta metadata parsing
//!
//! Each record header carries the annotation token `Localization-Solubility`
//! in a whitespace-separated field whose position depends on [`KeyFormat`].

use bio::io::fasta;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use super::labels::{Localization, Solubility};
use crate::{Error, Result};

/// How embedding keys and annotation tokens are laid out in fasta headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyFormat {
    /// `>HASH ORIGINAL_ID Loc-Sol`: key is the record id, token in field 2
    #[default]
    Hash,
    /// `>ID Loc-Sol`: key is the full description, token in field 1
    FastaDescriptor,
    /// `>ID Loc-Sol`: key is the record id, token in field 1
    FastaDescriptorOld,
}

impl KeyFormat {
    fn token_field(self) -> usize {
        match self {
            KeyFormat::Hash => 2,
            KeyFormat::FastaDescriptor | KeyFormat::FastaDescriptorOld => 1,
        }
    }

    fn key_from(self, record: &FastaRecord) -> String {
        match self {
            KeyFormat::Hash | KeyFormat::FastaDescriptorOld => record.id.clone(),
            KeyFormat::FastaDescriptor => record.description.clone(),
        }
    }
}

impl FromStr for KeyFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hash" => Ok(KeyFormat::Hash),
            "fasta_descriptor" => Ok(KeyFormat::FastaDescriptor),
            "fasta_descriptor_old" => Ok(KeyFormat::FastaDescriptorOld),
            other => Err(Error::ConfigError(format!(
                "unknown key format '{other}' (expected hash, fasta_descriptor, fasta_descriptor_old)"
            ))),
        }
    }
}

/// Raw fasta record
#[derive(Debug, Clone, PartialEq)]
pub struct FastaRecord {
    /// First whitespace-delimited word of the header
    pub id: String,
    /// Full header without the leading `>`
    pub description: String,
    pub sequence: String,
    /// 1-based line number of the header
    pub line: usize,
}

/// Annotated record ready for the sample store
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedRecord {
    pub key: String,
    pub sequence: String,
    pub localization: Localization,
    pub solubility: Solubility,
}

/// Parse fasta text into raw records
///
/// Record splitting is delegated to `bio`; header line numbers are kept so
/// annotation errors can point back into the file.
pub fn parse_fasta(text: &str) -> Result<Vec<FastaRecord>> {
    let header_lines: Vec<usize> = text
        .lines()
        .enumerate()
        .filter(|(_, l)| l.starts_with('>'))
        .map(|(idx, _)| idx + 1)
        .collect();

    let mut records = Vec::with_capacity(header_lines.len());
    for (n, parsed) in fasta::Reader::new(text.as_bytes()).records().enumerate() {
        let line = header_lines.get(n).copied().unwrap_or(1);
        let record = parsed.map_err(|e| Error::Parse {
            line: if n == 0 { 1 } else { line },
            message: e.to_string(),
        })?;
        if record.id().is_empty() {
            return Err(Error::Parse { line, message: "empty fasta header".into() });
        }
        let description = match record.desc() {
            Some(desc) => format!("{} {desc}", record.id()),
            None => record.id().to_string(),
        };
        records.push(FastaRecord {
            id: record.id().to_string(),
            description,
            sequence: String::from_utf8_lossy(record.seq()).into_owned(),
            line,
        });
    }
    Ok(records)
}

/// Extract key and labels from a raw record
pub fn annotate(record: &FastaRecord, format: KeyFormat) -> Result<AnnotatedRecord> {
    let field = format.token_field();
    let token = record.description.split(' ').nth(field).ok_or_else(|| Error::Parse {
        line: record.line,
        message: format!("header has no annotation field {field}: '{}'", record.description),
    })?;

    let loc = token.split('-').next().unwrap_or_default();
    let sol = token.rsplit('-').next().unwrap_or_default();
    let with_line = |e: Error| match e {
        Error::Parse { message, .. } => Error::Parse { line: record.line, message },
        other => other,
    };

    Ok(AnnotatedRecord {
        key: format.key_from(record),
        sequence: record.sequence.clone(),
        localization: loc.parse().map_err(with_line)?,
        solubility: sol.parse().map_err(with_line)?,
    })
}

/// Read and annotate every record of a fasta file
pub fn read_annotated(path: &Path, format: KeyFormat) -> Result<Vec<AnnotatedRecord>> {
    let text = std::fs::read_to_string(path)?;
    parse_fasta(&text)?.iter().map(|r| annotate(r, format)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASHED: &str = ">md5abc Q9XYZ1 Nucleus-S\nMKT\nLLV\n>md5def P12345 Cytoplasm-U\nMAA\n";

    #[test]
    fn test_parse_multiline_sequences() {
        let records = parse_fasta(HASHED).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "md5abc");
        assert_eq!(records[0].sequence, "MKTLLV");
        assert_eq!(records[1].line, 4);
    }

    #[test]
    fn test_annotate_hash_format() {
        let records = parse_fasta(HASHED).unwrap();
        let rec = annotate(&records[0], KeyFormat::Hash).unwrap();
        assert_eq!(rec.key, "md5abc");
        assert_eq!(rec.localization, Localization::Nucleus);
        assert_eq!(rec.solubility, Solubility::Soluble);
    }

    #[test]
    fn test_annotate_descriptor_formats() {
        let records = parse_fasta(">Q9XYZ1 Mitochondrion-M\nMKV\n").unwrap();
        let full = annotate(&records[0], KeyFormat::FastaDescriptor).unwrap();
        assert_eq!(full.key, "Q9XYZ1 Mitochondrion-M");
        let old = annotate(&records[0], KeyFormat::FastaDescriptorOld).unwrap();
        assert_eq!(old.key, "Q9XYZ1");
        assert_eq!(old.solubility, Solubility::Insoluble);
    }

    #[test]
    fn test_slash_in_localization_name() {
        let records = parse_fasta(">h id Lysosome/Vacuole-U\nMK\n").unwrap();
        let rec = annotate(&records[0], KeyFormat::Hash).unwrap();
        assert_eq!(rec.localization, Localization::LysosomeVacuole);
    }

    #[test]
    fn test_missing_field_reports_line() {
        let records = parse_fasta(">a Nucleus-S\nMK\n>b\nMK\n").unwrap();
        match annotate(&records[1], KeyFormat::FastaDescriptorOld) {
            Err(Error::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_label_reports_line() {
        let records = parse_fasta(">a Vacuole-S\nMK\n").unwrap();
        assert!(matches!(
            annotate(&records[0], KeyFormat::FastaDescriptorOld),
            Err(Error::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_sequence_before_header_rejected() {
        assert!(matches!(parse_fasta("MKT\n>a b\n"), Err(Error::Parse { line: 1, .. })));
    }

    #[test]
    fn test_blank_lines_inside_sequence() {
        let records = parse_fasta(">h id Nucleus-S\nMK\n\nLV\n>g id2 Plastid-U\nAA\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence, "MKLV");
        assert_eq!(records[0].description, "h id Nucleus-S");
        assert_eq!(records[1].line, 5);
        let rec = annotate(&records[1], KeyFormat::Hash).unwrap();
        assert_eq!(rec.localization, Localization::Plastid);
    }

    #[test]
    fn test_empty_text_has_no_records() {
        assert!(parse_fasta("").unwrap().is_empty());
    }

    #[test]
    fn test_key_format_from_str() {
        assert_eq!("fasta_descriptor".parse::<KeyFormat>().unwrap(), KeyFormat::FastaDescriptor);
        assert!(matches!("md5".parse::<KeyFormat>(), Err(Error::ConfigError(_))));
    }
}
