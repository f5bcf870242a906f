//! Benchmark runtime configuration.
//!
//! Everything the run needs (paths, model list, retry and timeout settings) is resolved once
//! at process startup into a [`BenchConfig`] and then passed by reference into the corpus
//! builder and the matrix runner. Nothing in this crate reads environment variables; the
//! `*_from_env_value` helpers take the raw `Option<String>` so binaries can feed them from
//! `std::env::var(..).ok()` and tests can feed them directly.

use crate::constants::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MODELS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_RETRY_BASE_MS, DEFAULT_RETRY_MAX_MS,
};
use crate::retry::RetryPolicy;
use crate::{BenchError, BenchResult};
use orbit_types::NonEmptyText;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for the retrieval-augmented configuration.
#[derive(Clone, Debug)]
pub struct RetrievalSettings {
    /// Reference document uploaded to the retrieval file store.
    pub reference_document: PathBuf,
    /// Model evaluated with file search attached.
    pub model: NonEmptyText,
    /// Prompt variant used for the retrieval configuration.
    pub prompt: NonEmptyText,
    /// Name given to the vector store.
    pub vector_store_name: NonEmptyText,
}

/// Benchmark configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct BenchConfig {
    cases_dir: PathBuf,
    case_index: PathBuf,
    results_dir: PathBuf,
    models: Vec<NonEmptyText>,
    prompts_file: Option<PathBuf>,
    retrieval: Option<RetrievalSettings>,
    retry: RetryPolicy,
    request_timeout: Duration,
    concurrency: usize,
}

impl BenchConfig {
    /// Create a new `BenchConfig` with default retry, timeout and concurrency settings.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::InvalidConfig`] if the case root is not a directory, the case
    /// index is not a file, or the model list is empty or contains duplicates.
    pub fn new(
        cases_dir: PathBuf,
        case_index: PathBuf,
        results_dir: PathBuf,
        models: Vec<NonEmptyText>,
    ) -> BenchResult<Self> {
        if !cases_dir.is_dir() {
            return Err(BenchError::InvalidConfig(format!(
                "case root is not a directory: {}",
                cases_dir.display()
            )));
        }

        if !case_index.is_file() {
            return Err(BenchError::InvalidConfig(format!(
                "case index is not a file: {}",
                case_index.display()
            )));
        }

        validate_models(&models)?;

        Ok(Self {
            cases_dir,
            case_index,
            results_dir,
            models,
            prompts_file: None,
            retrieval: None,
            retry: RetryPolicy::new(
                DEFAULT_MAX_ATTEMPTS,
                Duration::from_millis(DEFAULT_RETRY_BASE_MS),
                Duration::from_millis(DEFAULT_RETRY_MAX_MS),
            )?,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
        })
    }

    pub fn with_prompts_file(mut self, prompts_file: Option<PathBuf>) -> Self {
        self.prompts_file = prompts_file;
        self
    }

    pub fn with_retrieval(mut self, retrieval: Option<RetrievalSettings>) -> Self {
        self.retrieval = retrieval;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> BenchResult<Self> {
        if timeout.is_zero() {
            return Err(BenchError::InvalidConfig(
                "request timeout must be greater than zero".into(),
            ));
        }
        self.request_timeout = timeout;
        Ok(self)
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> BenchResult<Self> {
        if concurrency == 0 {
            return Err(BenchError::InvalidConfig(
                "concurrency must be at least 1".into(),
            ));
        }
        self.concurrency = concurrency;
        Ok(self)
    }

    pub fn cases_dir(&self) -> &Path {
        &self.cases_dir
    }

    pub fn case_index(&self) -> &Path {
        &self.case_index
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn models(&self) -> &[NonEmptyText] {
        &self.models
    }

    pub fn prompts_file(&self) -> Option<&Path> {
        self.prompts_file.as_deref()
    }

    pub fn retrieval(&self) -> Option<&RetrievalSettings> {
        self.retrieval.as_ref()
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}

fn validate_models(models: &[NonEmptyText]) -> BenchResult<()> {
    if models.is_empty() {
        return Err(BenchError::InvalidConfig(
            "at least one model is required".into(),
        ));
    }

    for (i, model) in models.iter().enumerate() {
        if models[..i].contains(model) {
            return Err(BenchError::InvalidConfig(format!(
                "model '{}' is listed more than once",
                model
            )));
        }
    }

    Ok(())
}

/// Parse the comma-separated model list.
///
/// If `value` is `None` or blank, returns [`DEFAULT_MODELS`]. Blank entries between commas
/// are ignored.
pub fn models_from_env_value(value: Option<String>) -> BenchResult<Vec<NonEmptyText>> {
    let value = value.filter(|v| !v.trim().is_empty());

    let models: Vec<NonEmptyText> = match value {
        Some(list) => list
            .split(',')
            .filter_map(|m| NonEmptyText::new(m).ok())
            .collect(),
        None => DEFAULT_MODELS
            .iter()
            .filter_map(|m| NonEmptyText::new(m).ok())
            .collect(),
    };

    validate_models(&models)?;
    Ok(models)
}

/// Resolve the model used for the retrieval configuration.
///
/// Defaults to the second configured model, or the only one if a single model is configured.
pub fn retrieval_model_from_env_value(
    value: Option<String>,
    models: &[NonEmptyText],
) -> BenchResult<NonEmptyText> {
    if let Some(explicit) = value.and_then(|v| NonEmptyText::new(v).ok()) {
        return Ok(explicit);
    }

    models
        .get(1)
        .or_else(|| models.last())
        .cloned()
        .ok_or_else(|| BenchError::InvalidConfig("no model available for retrieval".into()))
}

/// Parse a non-negative integer setting, falling back to `default` when unset or blank.
pub fn u64_from_env_value(name: &str, value: Option<String>, default: u64) -> BenchResult<u64> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        Some(v) => v.parse::<u64>().map_err(|_| {
            BenchError::InvalidConfig(format!("{} must be a non-negative integer, got '{}'", name, v))
        }),
        None => Ok(default),
    }
}

/// Resolve a path setting; `None` as default makes the setting required.
pub fn path_from_env_value(
    name: &str,
    value: Option<String>,
    default: Option<&str>,
) -> BenchResult<PathBuf> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match (value, default) {
        (Some(v), _) => Ok(PathBuf::from(v)),
        (None, Some(d)) => Ok(PathBuf::from(d)),
        (None, None) => Err(BenchError::InvalidConfig(format!("{} is required", name))),
    }
}
