//! Run manifest.
//!
//! A `manifest.json` next to the result tables records what a run evaluated and how each
//! configuration ended, so a partial run can be told apart from a complete one.

use crate::constants::MANIFEST_FILENAME;
use crate::matrix::{ConfigurationOutcome, MatrixReport};
use crate::{BenchError, BenchResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationStatus {
    Persisted,
    Unpersisted,
    Skipped,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub model: String,
    pub prompt: String,
    pub file_search: bool,
    pub status: ConfigurationStatus,
    pub rows: usize,
    pub failures: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub cases: usize,
    pub models: Vec<String>,
    pub prompts: Vec<String>,
    #[serde(default)]
    pub configurations: Vec<ManifestEntry>,
}

impl RunManifest {
    pub fn start(cases: usize, models: Vec<String>, prompts: Vec<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            cases,
            models,
            prompts,
            configurations: Vec::new(),
        }
    }

    /// Records the outcome of every configuration and stamps the finish time.
    pub fn finish(&mut self, report: &MatrixReport) {
        self.configurations = report
            .configurations
            .iter()
            .map(|c| {
                let (status, output, error) = match &c.outcome {
                    ConfigurationOutcome::Persisted { output, .. } => {
                        (ConfigurationStatus::Persisted, Some(output.clone()), None)
                    }
                    ConfigurationOutcome::Unpersisted { reason, .. } => {
                        (ConfigurationStatus::Unpersisted, None, Some(reason.clone()))
                    }
                    ConfigurationOutcome::Skipped { reason } => {
                        (ConfigurationStatus::Skipped, None, Some(reason.clone()))
                    }
                };

                ManifestEntry {
                    name: c.name(),
                    model: c.configuration.model.to_string(),
                    prompt: c.configuration.prompt.name.to_string(),
                    file_search: c.configuration.uses_retrieval(),
                    status,
                    rows: c.results().map(|r| r.len()).unwrap_or(0),
                    failures: c.failures(),
                    output,
                    error,
                }
            })
            .collect();
        self.finished_at = Some(Utc::now());
    }

    /// Writes `manifest.json` into `dir` and returns its path.
    pub fn write(&self, dir: &Path) -> BenchResult<PathBuf> {
        let path = dir.join(MANIFEST_FILENAME);
        let json = serde_json::to_string_pretty(self).map_err(BenchError::ManifestSerialization)?;
        std::fs::write(&path, json).map_err(BenchError::ManifestWrite)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{ConfigurationReport, EvaluationConfiguration, EvaluationResult, Answer};
    use crate::prompts::PromptVariant;
    use orbit_bench_inference::ToolChoice;
    use orbit_types::{CaseId, NonEmptyText};
    use tempfile::TempDir;

    fn configuration(retrieval: Option<ToolChoice>) -> EvaluationConfiguration {
        EvaluationConfiguration {
            prompt: PromptVariant {
                name: NonEmptyText::new("simple").unwrap(),
                instruction_text: NonEmptyText::new("x").unwrap(),
            },
            model: NonEmptyText::new("gpt-5").unwrap(),
            retrieval,
        }
    }

    #[test]
    fn finish_summarises_each_configuration() {
        let temp = TempDir::new().unwrap();
        let report = MatrixReport {
            configurations: vec![
                ConfigurationReport {
                    configuration: configuration(None),
                    outcome: ConfigurationOutcome::Persisted {
                        results: vec![
                            EvaluationResult {
                                case_id: CaseId::new("1").unwrap(),
                                diagnosis: "a".into(),
                                answer: Answer::Text("ok".into()),
                            },
                            EvaluationResult {
                                case_id: CaseId::new("2").unwrap(),
                                diagnosis: "b".into(),
                                answer: Answer::Failed {
                                    attempts: 2,
                                    reason: "x".into(),
                                },
                            },
                        ],
                        output: temp.path().join("gpt-5 simple.csv"),
                    },
                },
                ConfigurationReport {
                    configuration: configuration(Some(ToolChoice::Required)),
                    outcome: ConfigurationOutcome::Skipped {
                        reason: "upload failed".into(),
                    },
                },
            ],
        };

        let mut manifest = RunManifest::start(2, vec!["gpt-5".into()], vec!["simple".into()]);
        manifest.finish(&report);

        assert!(manifest.finished_at.is_some());
        let first = &manifest.configurations[0];
        assert_eq!(first.status, ConfigurationStatus::Persisted);
        assert_eq!((first.rows, first.failures), (2, 1));
        let second = &manifest.configurations[1];
        assert_eq!(second.name, "gpt-5 file search");
        assert_eq!(second.status, ConfigurationStatus::Skipped);
        assert_eq!(second.error.as_deref(), Some("upload failed"));

        let path = manifest.write(temp.path()).unwrap();
        let parsed: RunManifest =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed, manifest);
    }
}
