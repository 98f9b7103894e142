//! Protein models: the import row and the stored node.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::AppError;

/// A protein import row as produced by the record source.
///
/// Deserialization accepts both the flat shape and the document shape of the
/// protein document store (`_id` next to `uniprot_id`, `sequence.length`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord")]
pub struct ProteinRecord {
    /// UniProt accession, the merge key.
    pub uniprot_id: String,
    pub entry_name: Option<String>,
    pub organism: Option<String>,
    /// Sequence length in residues.
    pub length: Option<i64>,
    /// InterPro domain accessions carried by this protein.
    pub interpro_ids: Vec<String>,
    pub ec_numbers: Vec<String>,
    /// Explicit label flag. When absent the protein counts as labelled if it
    /// has at least one EC number.
    pub is_labelled: Option<bool>,
}

/// Every field name a record may arrive under. Each name is its own field so
/// documents carrying several of them (`_id` and `uniprot_id`) still parse.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRecord {
    uniprot_id: Option<String>,
    id: Option<String>,
    /// Document-store key; not always a string.
    #[serde(rename = "_id")]
    document_id: Option<JsonValue>,
    entry_name: Option<String>,
    organism: Option<String>,
    length: Option<i64>,
    sequence_length: Option<i64>,
    sequence: Option<RawSequence>,
    interpro_ids: Option<Vec<String>>,
    category_ids: Option<Vec<String>>,
    ec_numbers: Option<Vec<String>>,
    is_labelled: Option<bool>,
    labelled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSequence {
    length: Option<i64>,
}

impl TryFrom<RawRecord> for ProteinRecord {
    type Error = String;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let uniprot_id = raw
            .uniprot_id
            .or(raw.id)
            .or_else(|| match raw.document_id {
                Some(JsonValue::String(id)) => Some(id),
                _ => None,
            })
            .ok_or_else(|| "record has no uniprot_id".to_string())?;

        Ok(Self {
            uniprot_id,
            entry_name: raw.entry_name,
            organism: raw.organism,
            length: raw
                .length
                .or(raw.sequence_length)
                .or(raw.sequence.and_then(|s| s.length)),
            interpro_ids: raw.interpro_ids.or(raw.category_ids).unwrap_or_default(),
            ec_numbers: raw.ec_numbers.unwrap_or_default(),
            is_labelled: raw.is_labelled.or(raw.labelled),
        })
    }
}

impl ProteinRecord {
    /// Creates a record with only an id and its domains.
    pub fn new<I, S>(uniprot_id: impl Into<String>, interpro_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            uniprot_id: uniprot_id.into(),
            entry_name: None,
            organism: None,
            length: None,
            interpro_ids: interpro_ids.into_iter().map(Into::into).collect(),
            ec_numbers: Vec::new(),
            is_labelled: None,
        }
    }

    /// Resolved label flag.
    pub fn labelled(&self) -> bool {
        self.is_labelled.unwrap_or(!self.ec_numbers.is_empty())
    }

    /// Domain ids trimmed, with blanks and duplicates removed, in sorted order.
    pub fn domain_ids(&self) -> Vec<String> {
        self.interpro_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Checks the row can be merged.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.uniprot_id.trim().is_empty() {
            return Err(AppError::Validation("record has an empty uniprot_id".into()));
        }
        if let Some(length) = self.length {
            if length < 0 {
                return Err(AppError::Validation(format!(
                    "record {} has negative length {}",
                    self.uniprot_id, length
                )));
            }
        }
        Ok(())
    }
}

/// A protein node as stored in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protein {
    pub uniprot_id: String,
    #[serde(default)]
    pub entry_name: Option<String>,
    #[serde(default)]
    pub organism: Option<String>,
    #[serde(default)]
    pub length: Option<i64>,
    #[serde(default)]
    pub ec_numbers: Vec<String>,
    #[serde(default)]
    pub is_labelled: bool,
    /// Cached number of distinct domains; absent until the first rebuild.
    #[serde(default)]
    pub domain_count: Option<i64>,
}

impl Protein {
    /// A protein known only by its id.
    pub fn bare(uniprot_id: impl Into<String>) -> Self {
        Self {
            uniprot_id: uniprot_id.into(),
            entry_name: None,
            organism: None,
            length: None,
            ec_numbers: Vec::new(),
            is_labelled: false,
            domain_count: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accepts_aliases() {
        let record: ProteinRecord = serde_json::from_str(
            r#"{"id": "P12345", "sequence_length": 120, "category_ids": ["IPR1"], "labelled": true}"#,
        )
        .unwrap();

        assert_eq!(record.uniprot_id, "P12345");
        assert_eq!(record.length, Some(120));
        assert_eq!(record.interpro_ids, vec!["IPR1"]);
        assert!(record.labelled());
    }

    #[test]
    fn test_record_accepts_document_shape() {
        let record: ProteinRecord = serde_json::from_str(
            r#"{"_id": "P12345", "uniprot_id": "P12345", "entry_name": "KPCA_HUMAN",
                "organism": "Homo sapiens", "protein_names": ["Protein kinase C alpha"],
                "sequence": {"length": 120, "aa": "MK"}, "interpro_ids": ["IPR1", "IPR2"],
                "ec_numbers": ["2.7.11.13"], "is_labelled": true,
                "last_updated": {"$date": "2024-01-01T00:00:00Z"}}"#,
        )
        .unwrap();

        assert_eq!(record.uniprot_id, "P12345");
        assert_eq!(record.length, Some(120));
        assert_eq!(record.entry_name.as_deref(), Some("KPCA_HUMAN"));
        assert_eq!(record.interpro_ids, vec!["IPR1", "IPR2"]);
        assert!(record.labelled());
    }

    #[test]
    fn test_uniprot_id_preferred_over_document_key() {
        let record: ProteinRecord =
            serde_json::from_str(r#"{"_id": {"$oid": "65a1"}, "uniprot_id": "Q99999"}"#).unwrap();
        assert_eq!(record.uniprot_id, "Q99999");

        let missing = serde_json::from_str::<ProteinRecord>(r#"{"_id": {"$oid": "65a1"}}"#);
        assert!(missing.unwrap_err().to_string().contains("no uniprot_id"));
    }

    #[test]
    fn test_labelled_derived_from_ec_numbers() {
        let mut record = ProteinRecord::new("P1", ["IPR1"]);
        assert!(!record.labelled());

        record.ec_numbers = vec!["2.7.11.1".into()];
        assert!(record.labelled());

        record.is_labelled = Some(false);
        assert!(!record.labelled());
    }

    #[test]
    fn test_domain_ids_normalized() {
        let record = ProteinRecord::new("P1", [" IPR2", "IPR1", "", "IPR2 ", "  "]);
        assert_eq!(record.domain_ids(), vec!["IPR1", "IPR2"]);
    }

    #[test]
    fn test_validate_rejects_blank_id() {
        let record = ProteinRecord::new("  ", ["IPR1"]);
        assert!(matches!(record.validate(), Err(AppError::Validation(_))));
        assert!(ProteinRecord::new("P1", ["IPR1"]).validate().is_ok());
    }
}
