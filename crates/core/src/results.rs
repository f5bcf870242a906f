//! Result tables.
//!
//! One CSV file per configuration, columns `case_id, diagnosis, answers`, named
//! `"<configuration name>.csv"` under the results root. Files are written to a sibling
//! `.partial` path and renamed into place, so an interrupted write never leaves a truncated
//! table behind; any earlier table of the same name is replaced.

use crate::constants::{FAILED_ANSWER_PREFIX, RESULT_COLUMNS};
use crate::matrix::EvaluationResult;
use crate::{BenchError, BenchResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One row of a result table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub case_id: String,
    pub diagnosis: String,
    pub answers: String,
}

impl ResultRow {
    /// Whether the row holds a failure marker rather than a model answer.
    pub fn is_failure(&self) -> bool {
        self.answers.starts_with(FAILED_ANSWER_PREFIX)
    }
}

impl From<&EvaluationResult> for ResultRow {
    fn from(result: &EvaluationResult) -> Self {
        ResultRow {
            case_id: result.case_id.to_string(),
            diagnosis: result.diagnosis.clone(),
            answers: result.answer.to_cell(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ResultSink {
    root: PathBuf,
}

impl ResultSink {
    /// Creates the results root if needed.
    pub fn new(root: impl Into<PathBuf>) -> BenchResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(BenchError::ResultsDirCreation)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the table for `configuration_name`.
    pub fn path_for(&self, configuration_name: &str) -> PathBuf {
        self.root.join(output_file_name(configuration_name))
    }

    /// Writes the table for one configuration and returns its path.
    ///
    /// The header row is always written, even for an empty result list.
    pub fn persist(
        &self,
        configuration_name: &str,
        results: &[EvaluationResult],
    ) -> BenchResult<PathBuf> {
        let target = self.path_for(configuration_name);
        let partial = target.with_extension("csv.partial");

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&partial)
            .map_err(BenchError::ResultsWrite)?;

        writer
            .write_record(RESULT_COLUMNS)
            .map_err(BenchError::ResultsWrite)?;
        for result in results {
            writer
                .serialize(ResultRow::from(result))
                .map_err(BenchError::ResultsWrite)?;
        }
        writer.flush().map_err(BenchError::ResultsFinalise)?;
        drop(writer);

        fs::rename(&partial, &target).map_err(BenchError::ResultsFinalise)?;

        tracing::info!("wrote {} row(s) to {}", results.len(), target.display());
        Ok(target)
    }
}

/// File name for a configuration's table. Path separators and `:` become `_`.
pub fn output_file_name(configuration_name: &str) -> String {
    let safe: String = configuration_name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            other => other,
        })
        .collect();
    format!("{}.csv", safe)
}

/// Reads a table written by [`ResultSink::persist`].
///
/// # Errors
///
/// - [`BenchError::ResultsRead`] if the file cannot be read or a row is malformed.
/// - [`BenchError::InvalidInput`] if the header is not `case_id, diagnosis, answers`.
pub fn read_results(path: &Path) -> BenchResult<Vec<ResultRow>> {
    let mut reader = csv::Reader::from_path(path).map_err(BenchError::ResultsRead)?;

    let headers = reader.headers().map_err(BenchError::ResultsRead)?;
    if headers.iter().ne(RESULT_COLUMNS) {
        return Err(BenchError::InvalidInput(format!(
            "{} does not have the columns {}",
            path.display(),
            RESULT_COLUMNS.join(", ")
        )));
    }

    reader
        .deserialize()
        .collect::<Result<Vec<ResultRow>, _>>()
        .map_err(BenchError::ResultsRead)
}
