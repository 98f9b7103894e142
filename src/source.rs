//! Record sources feeding the importer.
//!
//! A source is a finite, read-only sequence of [`ProteinRecord`] rows that can
//! be reopened from the start any number of times. Malformed rows surface as
//! per-row errors so the importer can count them and carry on.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use crate::error::AppError;
use crate::models::ProteinRecord;

/// Iterator over one pass of a record source.
pub type RecordIter<'a> = Box<dyn Iterator<Item = Result<ProteinRecord, AppError>> + Send + 'a>;

/// A restartable pull cursor over protein import rows.
pub trait RecordSource: Send + Sync {
    /// Human-readable origin, for logging.
    fn describe(&self) -> String;

    /// Starts a new pass over the rows.
    fn open(&self) -> Result<RecordIter<'_>, AppError>;
}

/// Reads one JSON document per line.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    path: PathBuf,
}

impl JsonLinesSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for JsonLinesSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn open(&self) -> Result<RecordIter<'_>, AppError> {
        let reader = BufReader::new(File::open(&self.path)?);
        let rows = reader
            .lines()
            .enumerate()
            .filter_map(|(n, line)| parse_line(n + 1, line));
        Ok(Box::new(rows))
    }
}

fn parse_line(
    line_no: usize,
    line: std::io::Result<String>,
) -> Option<Result<ProteinRecord, AppError>> {
    let line = match line {
        Ok(line) => line,
        Err(e) => return Some(Err(AppError::Io(e))),
    };
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parsed = serde_json::from_str::<ProteinRecord>(trimmed)
        .map_err(|e| AppError::Source {
            line: line_no,
            message: e.to_string(),
        })
        .and_then(|record| {
            record.validate().map_err(|e| AppError::Source {
                line: line_no,
                message: e.to_string(),
            })?;
            Ok(record)
        });
    Some(parsed)
}

/// In-memory rows, mostly useful for embedding the importer in other tools.
impl RecordSource for Vec<ProteinRecord> {
    fn describe(&self) -> String {
        format!("{} in-memory records", self.len())
    }

    fn open(&self) -> Result<RecordIter<'_>, AppError> {
        Ok(Box::new(self.iter().cloned().map(Ok)))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_lines(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_reads_rows_and_skips_blank_lines() {
        let file = write_lines(&[
            r#"{"uniprot_id": "P12345", "organism": "Homo sapiens", "interpro_ids": ["IPR1"]}"#,
            "",
            r#"{"_id": "Q99999", "category_ids": ["IPR1", "IPR2"], "ec_numbers": ["1.1.1.1"]}"#,
        ]);

        let source = JsonLinesSource::new(file.path());
        let rows: Vec<_> = source.open().unwrap().collect::<Result<_, _>>().unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].organism.as_deref(), Some("Homo sapiens"));
        assert_eq!(rows[1].uniprot_id, "Q99999");
        assert!(rows[1].labelled());
    }

    #[test]
    fn test_malformed_lines_are_per_row_errors() {
        let file = write_lines(&[
            r#"{"uniprot_id": "P1"}"#,
            "not json",
            r#"{"uniprot_id": ""}"#,
            r#"{"uniprot_id": "P2"}"#,
        ]);

        let results: Vec<_> = JsonLinesSource::new(file.path()).open().unwrap().collect();

        assert_eq!(results.len(), 4);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(AppError::Source { line: 2, .. })));
        assert!(matches!(results[2], Err(AppError::Source { line: 3, .. })));
        assert!(results[3].is_ok());
    }

    #[test]
    fn test_reads_document_store_export() {
        let file = write_lines(&[
            r#"{"_id": "P12345", "uniprot_id": "P12345", "entry_name": "KPCA_HUMAN", "organism": "Homo sapiens", "protein_names": ["Protein kinase C alpha type"], "sequence": {"length": 120, "aa": "MK"}, "interpro_ids": ["IPR000719", "IPR011009"], "ec_numbers": ["2.7.11.13"], "is_labelled": true, "last_updated": {"$date": "2024-03-01T10:00:00Z"}}"#,
            r#"{"_id": "Q8N1N2", "uniprot_id": "Q8N1N2", "sequence": {"length": 88, "aa": "MA"}, "interpro_ids": [], "ec_numbers": [], "is_labelled": false}"#,
        ]);

        let rows: Vec<_> = JsonLinesSource::new(file.path())
            .open()
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].uniprot_id, "P12345");
        assert_eq!(rows[0].length, Some(120));
        assert_eq!(rows[0].domain_ids(), vec!["IPR000719", "IPR011009"]);
        assert!(rows[0].labelled());
        assert_eq!(rows[1].length, Some(88));
        assert!(!rows[1].labelled());
    }

    #[test]
    fn test_source_is_restartable() {
        let file = write_lines(&[r#"{"uniprot_id": "P1"}"#, r#"{"uniprot_id": "P2"}"#]);
        let source = JsonLinesSource::new(file.path());

        assert_eq!(source.open().unwrap().count(), 2);
        assert_eq!(source.open().unwrap().count(), 2);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let source = JsonLinesSource::new("/nonexistent/proteins.jsonl");
        assert!(matches!(source.open(), Err(AppError::Io(_))));
    }
}
