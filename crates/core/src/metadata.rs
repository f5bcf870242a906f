//! Case index loading and lookup.
//!
//! The case index is a CSV table with the columns `idnum, Diagnosis, Presentation, Age,
//! Gender`. Rows are keyed by the normalised `idnum` (see [`orbit_types::normalise_identifier`])
//! so a numeric key such as `19.0` matches the case folder `19`.

use crate::constants::UNKNOWN_DIAGNOSIS;
use crate::{BenchError, BenchResult};
use orbit_types::{normalise_identifier, CaseId};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const REQUIRED_COLUMNS: [&str; 5] = ["idnum", "Diagnosis", "Presentation", "Age", "Gender"];

/// Placeholder for a blank field in an otherwise matching row.
const BLANK_FIELD: &str = "Unknown";

#[derive(Debug, Deserialize)]
struct IndexRow {
    idnum: Option<String>,
    #[serde(rename = "Diagnosis")]
    diagnosis: Option<String>,
    #[serde(rename = "Presentation")]
    presentation: Option<String>,
    #[serde(rename = "Age")]
    age: Option<String>,
    #[serde(rename = "Gender")]
    gender: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Maps the raw code. `M` or `MALE` in any case is male; every other code, blank
    /// included, is female.
    pub fn from_code(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "M" | "MALE" => Gender::Male,
            _ => Gender::Female,
        }
    }

    pub fn as_word(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

/// One row of the case index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseMetadata {
    pub diagnosis: String,
    pub presentation: String,
    pub age: String,
    pub gender: Gender,
}

impl CaseMetadata {
    /// `"<age> year old <male|female>. <presentation>"`
    pub fn clinical_info(&self) -> String {
        format!(
            "{} year old {}. {}",
            self.age,
            self.gender.as_word(),
            self.presentation
        )
    }
}

impl From<IndexRow> for CaseMetadata {
    fn from(row: IndexRow) -> Self {
        let or_blank = |v: Option<String>| v.unwrap_or_else(|| BLANK_FIELD.to_string());

        CaseMetadata {
            diagnosis: row
                .diagnosis
                .unwrap_or_else(|| UNKNOWN_DIAGNOSIS.to_string()),
            presentation: or_blank(row.presentation),
            age: row
                .age
                .map(|a| normalise_identifier(&a))
                .unwrap_or_else(|| BLANK_FIELD.to_string()),
            gender: Gender::from_code(row.gender.as_deref().unwrap_or_default()),
        }
    }
}

/// In-memory case index, keyed by normalised identifier.
#[derive(Clone, Debug, Default)]
pub struct MetadataIndex {
    rows: HashMap<String, CaseMetadata>,
}

impl MetadataIndex {
    /// Loads the case index from a CSV file.
    ///
    /// # Errors
    ///
    /// - [`BenchError::CaseIndexRead`] if the file cannot be opened or a row is malformed.
    /// - [`BenchError::InvalidInput`] if a required column is missing.
    pub fn load(path: &Path) -> BenchResult<Self> {
        let read_error = |source: csv::Error| BenchError::CaseIndexRead {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(read_error)?;

        let headers = reader.headers().map_err(read_error)?.clone();
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(BenchError::InvalidInput(format!(
                    "case index {} is missing column '{}'",
                    path.display(),
                    column
                )));
            }
        }

        let mut rows = HashMap::new();
        for (line, record) in reader.deserialize::<IndexRow>().enumerate() {
            let mut row = record.map_err(read_error)?;

            let Some(raw_id) = row.idnum.take() else {
                tracing::warn!("case index row {} has no idnum; skipping", line + 1);
                continue;
            };
            let key = normalise_identifier(&raw_id);

            if rows.contains_key(&key) {
                tracing::warn!(
                    "case index lists idnum {} more than once; keeping the first row",
                    key
                );
                continue;
            }
            rows.insert(key, CaseMetadata::from(row));
        }

        tracing::info!("loaded {} case index rows from {}", rows.len(), path.display());
        Ok(Self { rows })
    }

    /// Finds the row for a case folder, if any.
    pub fn lookup(&self, case_id: &CaseId) -> Option<&CaseMetadata> {
        self.rows.get(&case_id.join_key())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
