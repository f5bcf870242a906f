//! Evaluation matrix: every configuration (prompt × model, plus the file-search run) against
//! every case of the corpus.
//!
//! Each request carries the configuration's prompt as the system message and one user message
//! whose blocks are, in order:
//!
//! 1. `Presentation: <clinical info>`
//! 2. for each image: its label as text, immediately followed by the image as a base64 data URL
//!
//! A configuration's table is persisted as soon as its cases are done, so a failure later in the
//! matrix never loses earlier tables.

use crate::constants::{FAILED_ANSWER_PREFIX, FILE_SEARCH_SUFFIX, PRESENTATION_PREFIX};
use crate::corpus::CaseRecord;
use crate::prompts::{PromptCatalog, PromptVariant};
use crate::results::ResultSink;
use crate::retry::RetryPolicy;
use crate::{BenchError, BenchResult};
use orbit_bench_files::EncodedImage;
use orbit_bench_inference::{
    ContentBlock, InferenceBoundary, InputMessage, ResponseRequest, Tool, ToolChoice,
    VectorStoreId,
};
use orbit_types::{CaseId, NonEmptyText};
use rayon::prelude::*;
use std::path::PathBuf;

/// One (prompt, model, optional file search) triple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvaluationConfiguration {
    pub prompt: PromptVariant,
    pub model: NonEmptyText,
    /// Tool choice for the file-search tool; `None` runs without retrieval.
    pub retrieval: Option<ToolChoice>,
}

impl EvaluationConfiguration {
    /// `"<model> <prompt>"`, or `"<model> file search"` for the retrieval configuration.
    pub fn name(&self) -> String {
        match self.retrieval {
            Some(_) => format!("{} {}", self.model, FILE_SEARCH_SUFFIX),
            None => format!("{} {}", self.model, self.prompt.name),
        }
    }

    pub fn uses_retrieval(&self) -> bool {
        self.retrieval.is_some()
    }
}

/// Which prompt and model the file-search configuration uses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrievalSelection {
    pub prompt: NonEmptyText,
    pub model: NonEmptyText,
}

/// Ordered list of configurations to run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatrixPlan {
    configurations: Vec<EvaluationConfiguration>,
}

impl MatrixPlan {
    /// # Errors
    ///
    /// Returns [`BenchError::InvalidInput`] if two configurations share an output name.
    pub fn new(configurations: Vec<EvaluationConfiguration>) -> BenchResult<Self> {
        for (i, config) in configurations.iter().enumerate() {
            let name = config.name();
            if configurations[..i].iter().any(|c| c.name() == name) {
                return Err(BenchError::InvalidInput(format!(
                    "configuration '{}' appears more than once",
                    name
                )));
            }
        }
        Ok(Self { configurations })
    }

    /// Every prompt with every model (prompt-major), then the file-search run if selected.
    ///
    /// The file-search run is last so a registration failure cannot hold up the others.
    pub fn standard(
        catalog: &PromptCatalog,
        models: &[NonEmptyText],
        retrieval: Option<&RetrievalSelection>,
    ) -> BenchResult<Self> {
        let mut configurations: Vec<EvaluationConfiguration> = catalog
            .iter()
            .flat_map(|prompt| {
                models.iter().map(move |model| EvaluationConfiguration {
                    prompt: prompt.clone(),
                    model: model.clone(),
                    retrieval: None,
                })
            })
            .collect();

        if let Some(selection) = retrieval {
            let prompt = catalog.get(selection.prompt.as_str()).ok_or_else(|| {
                BenchError::InvalidConfig(format!(
                    "retrieval prompt '{}' is not in the catalog (have: {})",
                    selection.prompt,
                    catalog.names().join(", ")
                ))
            })?;
            configurations.push(EvaluationConfiguration {
                prompt: prompt.clone(),
                model: selection.model.clone(),
                retrieval: Some(ToolChoice::Required),
            });
        }

        Self::new(configurations)
    }

    pub fn configurations(&self) -> &[EvaluationConfiguration] {
        &self.configurations
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }
}

/// What the model said about one case, or why there is no answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Answer {
    Text(String),
    Failed { attempts: u32, reason: String },
}

impl Answer {
    /// Value written to the `answers` column.
    pub fn to_cell(&self) -> String {
        match self {
            Answer::Text(text) => text.clone(),
            Answer::Failed { attempts, reason } => {
                format!(
                    "{} after {} attempt(s)] {}",
                    FAILED_ANSWER_PREFIX, attempts, reason
                )
            }
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Answer::Failed { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvaluationResult {
    pub case_id: CaseId,
    pub diagnosis: String,
    pub answer: Answer,
}

/// Builds the request for one case under one configuration.
///
/// # Errors
///
/// - [`BenchError::FileLoad`] if an image cannot be read.
/// - [`BenchError::RetrievalUnavailable`] if the configuration needs file search and no
///   vector store is given.
pub fn build_request(
    config: &EvaluationConfiguration,
    case: &CaseRecord,
    store: Option<&VectorStoreId>,
) -> BenchResult<ResponseRequest> {
    let mut blocks = Vec::with_capacity(1 + case.images.len() * 2);
    blocks.push(ContentBlock::text(format!(
        "{}{}",
        PRESENTATION_PREFIX, case.clinical_info
    )));

    for image in &case.images {
        let encoded = EncodedImage::from_path(&image.path)?;
        blocks.push(ContentBlock::text(image.label.clone()));
        blocks.push(ContentBlock::image(encoded.data_url()));
    }

    let (tools, tool_choice) = match config.retrieval {
        Some(choice) => {
            let store = store.ok_or_else(|| {
                BenchError::RetrievalUnavailable(format!(
                    "configuration '{}' needs a vector store",
                    config.name()
                ))
            })?;
            (
                vec![Tool::FileSearch {
                    vector_store_ids: vec![store.to_string()],
                }],
                Some(choice),
            )
        }
        None => (Vec::new(), None),
    };

    Ok(ResponseRequest {
        model: config.model.to_string(),
        input: vec![
            InputMessage::system(config.prompt.instruction_text.as_str()),
            InputMessage::user(blocks),
        ],
        tools,
        tool_choice,
    })
}

/// Where the file-search configuration gets its vector store from.
///
/// A deferred source runs its registration the first time a configuration needs it; the
/// outcome (handle or failure) is kept for the rest of the run.
pub enum RetrievalSource<'r> {
    Unavailable(String),
    Ready(VectorStoreId),
    Deferred(Box<dyn FnOnce() -> BenchResult<VectorStoreId> + 'r>),
}

impl<'r> RetrievalSource<'r> {
    pub fn deferred(register: impl FnOnce() -> BenchResult<VectorStoreId> + 'r) -> Self {
        RetrievalSource::Deferred(Box::new(register))
    }

    fn resolve(&mut self) -> BenchResult<VectorStoreId> {
        let current = std::mem::replace(
            self,
            RetrievalSource::Unavailable("registration did not complete".into()),
        );

        match current {
            RetrievalSource::Ready(store) => {
                *self = RetrievalSource::Ready(store.clone());
                Ok(store)
            }
            RetrievalSource::Unavailable(reason) => {
                *self = RetrievalSource::Unavailable(reason.clone());
                Err(BenchError::RetrievalUnavailable(reason))
            }
            RetrievalSource::Deferred(register) => match register() {
                Ok(store) => {
                    *self = RetrievalSource::Ready(store.clone());
                    Ok(store)
                }
                Err(e) => {
                    *self = RetrievalSource::Unavailable(e.to_string());
                    Err(e)
                }
            },
        }
    }
}

impl std::fmt::Debug for RetrievalSource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetrievalSource::Unavailable(reason) => {
                f.debug_tuple("Unavailable").field(reason).finish()
            }
            RetrievalSource::Ready(store) => f.debug_tuple("Ready").field(store).finish(),
            RetrievalSource::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

/// How one configuration ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigurationOutcome {
    Persisted {
        results: Vec<EvaluationResult>,
        output: PathBuf,
    },
    /// Ran, but the table could not be written.
    Unpersisted {
        results: Vec<EvaluationResult>,
        reason: String,
    },
    /// Did not run.
    Skipped { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigurationReport {
    pub configuration: EvaluationConfiguration,
    pub outcome: ConfigurationOutcome,
}

impl ConfigurationReport {
    pub fn name(&self) -> String {
        self.configuration.name()
    }

    pub fn results(&self) -> Option<&[EvaluationResult]> {
        match &self.outcome {
            ConfigurationOutcome::Persisted { results, .. }
            | ConfigurationOutcome::Unpersisted { results, .. } => Some(results),
            ConfigurationOutcome::Skipped { .. } => None,
        }
    }

    pub fn failures(&self) -> usize {
        self.results()
            .map(|r| r.iter().filter(|e| e.answer.is_failure()).count())
            .unwrap_or(0)
    }
}

/// Outcome of a whole matrix run, in plan order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatrixReport {
    pub configurations: Vec<ConfigurationReport>,
}

impl MatrixReport {
    /// Results of the named configuration, in corpus order.
    pub fn results(&self, configuration_name: &str) -> Option<&[EvaluationResult]> {
        self.configurations
            .iter()
            .find(|c| c.name() == configuration_name)
            .and_then(|c| c.results())
    }

    /// Whether every configuration ran and was written.
    pub fn is_complete(&self) -> bool {
        self.configurations
            .iter()
            .all(|c| matches!(c.outcome, ConfigurationOutcome::Persisted { .. }))
    }
}

/// Drives the inference boundary over the matrix.
pub struct MatrixRunner<'a> {
    boundary: &'a dyn InferenceBoundary,
    retry: RetryPolicy,
    concurrency: usize,
}

impl<'a> MatrixRunner<'a> {
    pub fn new(boundary: &'a dyn InferenceBoundary, retry: RetryPolicy) -> Self {
        Self {
            boundary,
            retry,
            concurrency: 1,
        }
    }

    /// Number of cases of one configuration evaluated at the same time.
    pub fn with_concurrency(mut self, concurrency: usize) -> BenchResult<Self> {
        if concurrency == 0 {
            return Err(BenchError::InvalidConfig(
                "concurrency must be at least 1".into(),
            ));
        }
        self.concurrency = concurrency;
        Ok(self)
    }

    /// Runs every configuration of `plan`, persisting each table as it completes.
    ///
    /// Failures are contained to the configuration they belong to and reported in the
    /// returned [`MatrixReport`].
    pub fn run(
        &self,
        cases: &[CaseRecord],
        plan: &MatrixPlan,
        retrieval: &mut RetrievalSource<'_>,
        sink: &ResultSink,
    ) -> MatrixReport {
        let total = plan.len();
        let mut report = MatrixReport::default();

        for (position, config) in plan.configurations().iter().enumerate() {
            let name = config.name();
            tracing::info!(
                "configuration {}/{}: {} prompt with {}{}",
                position + 1,
                total,
                config.prompt.name,
                config.model,
                if config.uses_retrieval() {
                    " and file search"
                } else {
                    ""
                }
            );

            let store = if config.uses_retrieval() {
                match retrieval.resolve() {
                    Ok(store) => Some(store),
                    Err(e) => {
                        tracing::error!("skipping {}: {}", name, e);
                        report.configurations.push(ConfigurationReport {
                            configuration: config.clone(),
                            outcome: ConfigurationOutcome::Skipped {
                                reason: e.to_string(),
                            },
                        });
                        continue;
                    }
                }
            } else {
                None
            };

            let outcome = match self.run_configuration(config, cases, store.as_ref()) {
                Ok(results) => {
                    let failed = results.iter().filter(|r| r.answer.is_failure()).count();
                    tracing::info!(
                        "{} finished: {} answered, {} failed",
                        name,
                        results.len() - failed,
                        failed
                    );
                    match sink.persist(&name, &results) {
                        Ok(output) => ConfigurationOutcome::Persisted { results, output },
                        Err(e) => {
                            tracing::error!("could not write results for {}: {}", name, e);
                            ConfigurationOutcome::Unpersisted {
                                results,
                                reason: e.to_string(),
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("skipping {}: {}", name, e);
                    ConfigurationOutcome::Skipped {
                        reason: e.to_string(),
                    }
                }
            };

            report.configurations.push(ConfigurationReport {
                configuration: config.clone(),
                outcome,
            });
        }

        report
    }

    /// Evaluates every case under one configuration. Results keep corpus order.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::WorkerPool`] if the worker pool cannot be started. Per-case
    /// failures are recorded as [`Answer::Failed`] instead.
    pub fn run_configuration(
        &self,
        config: &EvaluationConfiguration,
        cases: &[CaseRecord],
        store: Option<&VectorStoreId>,
    ) -> BenchResult<Vec<EvaluationResult>> {
        let total = cases.len();

        if self.concurrency <= 1 {
            return Ok(cases
                .iter()
                .enumerate()
                .map(|(i, case)| self.evaluate_case(config, case, store, i + 1, total))
                .collect());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .build()
            .map_err(|e| BenchError::WorkerPool(e.to_string()))?;

        Ok(pool.install(|| {
            cases
                .par_iter()
                .enumerate()
                .map(|(i, case)| self.evaluate_case(config, case, store, i + 1, total))
                .collect()
        }))
    }

    fn evaluate_case(
        &self,
        config: &EvaluationConfiguration,
        case: &CaseRecord,
        store: Option<&VectorStoreId>,
        position: usize,
        total: usize,
    ) -> EvaluationResult {
        tracing::info!(
            "[{}] processing case {} ({}/{})",
            config.name(),
            case.case_id,
            position,
            total
        );

        let answer = match build_request(config, case, store) {
            Ok(request) => {
                let what = format!("{} case {}", config.name(), case.case_id);
                match self
                    .retry
                    .run(&what, |_| self.boundary.create_response(&request))
                {
                    Ok(text) => Answer::Text(text),
                    Err(exhausted) => {
                        tracing::warn!("{}: {}", what, exhausted);
                        Answer::Failed {
                            attempts: exhausted.attempts,
                            reason: exhausted.error.to_string(),
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!("case {}: could not build request: {}", case.case_id, e);
                Answer::Failed {
                    attempts: 0,
                    reason: e.to_string(),
                }
            }
        };

        EvaluationResult {
            case_id: case.case_id.clone(),
            diagnosis: case.diagnosis.clone(),
            answer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::ImageRef;
    use crate::results::read_results;
    use orbit_bench_inference::{InferenceError, InferenceResult};
    use std::cell::Cell;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Answers `"<model>: <first text block>"`, failing for presentations containing "FAIL".
    #[derive(Default)]
    struct RecordingBoundary {
        requests: Mutex<Vec<ResponseRequest>>,
    }

    impl InferenceBoundary for RecordingBoundary {
        fn create_response(&self, request: &ResponseRequest) -> InferenceResult<String> {
            self.requests.lock().unwrap().push(request.clone());
            let first = match request.user_blocks().first() {
                Some(ContentBlock::InputText { text }) => text.clone(),
                _ => String::new(),
            };
            if first.contains("FAIL") {
                return Err(InferenceError::Status {
                    status: 503,
                    message: "overloaded".into(),
                });
            }
            Ok(format!("{}: {}", request.model, first))
        }
    }

    fn text(s: &str) -> NonEmptyText {
        NonEmptyText::new(s).unwrap()
    }

    fn prompt(name: &str) -> PromptVariant {
        PromptVariant {
            name: text(name),
            instruction_text: text(&format!("{} instruction", name)),
        }
    }

    fn config(prompt_name: &str, model: &str, retrieval: Option<ToolChoice>) -> EvaluationConfiguration {
        EvaluationConfiguration {
            prompt: prompt(prompt_name),
            model: text(model),
            retrieval,
        }
    }

    fn case(dir: &TempDir, id: &str, clinical_info: &str, labels: &[&str]) -> CaseRecord {
        let images = labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let path = dir.path().join(format!("{}_{}.jpg", id, i));
                std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0, i as u8]).unwrap();
                ImageRef {
                    path,
                    label: label.to_string(),
                }
            })
            .collect();

        CaseRecord {
            case_id: CaseId::new(id).unwrap(),
            diagnosis: format!("diagnosis {}", id),
            clinical_info: clinical_info.to_string(),
            images,
        }
    }

    fn fast_retry(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::ZERO, Duration::ZERO).unwrap()
    }

    #[test]
    fn request_blocks_are_ordered() {
        let dir = TempDir::new().unwrap();
        let case = case(&dir, "19", "45 year old male. proptosis", &["CT_Axial", "MRI_T1"]);

        let request = build_request(&config("simple", "m1", None), &case, None).unwrap();

        assert_eq!(request.system_text(), Some("simple instruction"));
        let blocks = request.user_blocks();
        assert_eq!(blocks.len(), 5);
        assert_eq!(
            blocks[0],
            ContentBlock::text("Presentation: 45 year old male. proptosis")
        );
        assert_eq!(blocks[1], ContentBlock::text("CT_Axial"));
        assert!(blocks[2].is_image());
        assert_eq!(blocks[3], ContentBlock::text("MRI_T1"));
        assert!(blocks[4].is_image());
        match &blocks[2] {
            ContentBlock::InputImage { image_url } => {
                assert!(image_url.starts_with("data:image/jpeg;base64,"))
            }
            other => panic!("expected image block, got {other:?}"),
        }
        assert!(request.tools.is_empty());
        assert_eq!(request.tool_choice, None);
    }

    #[test]
    fn retrieval_request_forces_file_search() {
        let dir = TempDir::new().unwrap();
        let case = case(&dir, "1", "Unknown", &["root"]);
        let store = VectorStoreId::new("vs_42").unwrap();

        for prompt_name in ["simple", "complex"] {
            let cfg = config(prompt_name, "m2", Some(ToolChoice::Required));
            let request = build_request(&cfg, &case, Some(&store)).unwrap();
            assert_eq!(
                request.tools,
                vec![Tool::FileSearch {
                    vector_store_ids: vec!["vs_42".into()]
                }]
            );
            assert_eq!(request.tool_choice, Some(ToolChoice::Required));
        }

        let cfg = config("simple", "m2", Some(ToolChoice::Required));
        assert!(matches!(
            build_request(&cfg, &case, None),
            Err(BenchError::RetrievalUnavailable(_))
        ));
    }

    #[test]
    fn standard_plan_order_and_names() {
        let catalog = PromptCatalog::builtin();
        let models = vec![text("o3"), text("gpt-5")];
        let selection = RetrievalSelection {
            prompt: text("simple"),
            model: text("gpt-5"),
        };

        let plan = MatrixPlan::standard(&catalog, &models, Some(&selection)).unwrap();
        let names: Vec<String> = plan.configurations().iter().map(|c| c.name()).collect();

        assert_eq!(
            names,
            [
                "o3 simple",
                "gpt-5 simple",
                "o3 complex",
                "gpt-5 complex",
                "gpt-5 file search"
            ]
        );
        assert_eq!(
            plan.configurations()[4].retrieval,
            Some(ToolChoice::Required)
        );
    }

    #[test]
    fn standard_plan_rejects_unknown_retrieval_prompt() {
        let selection = RetrievalSelection {
            prompt: text("missing"),
            model: text("m"),
        };
        let result = MatrixPlan::standard(&PromptCatalog::builtin(), &[text("m")], Some(&selection));
        assert!(matches!(result, Err(BenchError::InvalidConfig(_))));
    }

    #[test]
    fn one_prompt_two_models_writes_two_tables() {
        let dir = TempDir::new().unwrap();
        let cases = vec![
            case(&dir, "1", "a", &["CT"]),
            case(&dir, "2", "b", &["MRI", "MRI"]),
            case(&dir, "3", "c", &["root"]),
        ];
        let catalog = PromptCatalog::new(vec![prompt("simple")]).unwrap();
        let plan = MatrixPlan::standard(&catalog, &[text("m1"), text("m2")], None).unwrap();
        let sink = ResultSink::new(dir.path().join("results")).unwrap();
        let boundary = RecordingBoundary::default();

        let report = MatrixRunner::new(&boundary, fast_retry(1)).run(
            &cases,
            &plan,
            &mut RetrievalSource::Unavailable("none".into()),
            &sink,
        );

        assert!(report.is_complete());
        assert_eq!(report.configurations.len(), 2);
        for name in ["m1 simple", "m2 simple"] {
            let rows = read_results(&sink.path_for(name)).unwrap();
            assert_eq!(rows.len(), cases.len());
            assert_eq!(rows[1].case_id, "2");
            assert_eq!(rows[1].diagnosis, "diagnosis 2");
        }
        assert_eq!(
            report.results("m2 simple").unwrap()[0].answer,
            Answer::Text("m2: Presentation: a".into())
        );
        assert_eq!(boundary.requests.lock().unwrap().len(), 6);
    }

    #[test]
    fn exhausted_retries_record_a_failure_marker() {
        let dir = TempDir::new().unwrap();
        let cases = vec![case(&dir, "1", "FAIL", &["CT"]), case(&dir, "2", "ok", &["CT"])];
        let boundary = RecordingBoundary::default();
        let runner = MatrixRunner::new(&boundary, fast_retry(3));

        let results = runner
            .run_configuration(&config("simple", "m", None), &cases, None)
            .unwrap();

        assert_eq!(
            results[0].answer,
            Answer::Failed {
                attempts: 3,
                reason: "service returned HTTP 503: overloaded".into()
            }
        );
        assert!(results[0]
            .answer
            .to_cell()
            .starts_with("[inference failed after 3 attempt(s)]"));
        assert_eq!(results[1].answer, Answer::Text("m: Presentation: ok".into()));
        assert_eq!(boundary.requests.lock().unwrap().len(), 4);
    }

    #[test]
    fn unreadable_image_fails_only_that_case() {
        let dir = TempDir::new().unwrap();
        let mut broken = case(&dir, "1", "a", &["CT"]);
        broken.images[0].path = dir.path().join("gone.jpg");
        let cases = vec![broken, case(&dir, "2", "b", &["CT"])];
        let boundary = RecordingBoundary::default();

        let results = MatrixRunner::new(&boundary, fast_retry(1))
            .run_configuration(&config("simple", "m", None), &cases, None)
            .unwrap();

        assert!(matches!(results[0].answer, Answer::Failed { attempts: 0, .. }));
        assert!(!results[1].answer.is_failure());
        assert_eq!(boundary.requests.lock().unwrap().len(), 1);
    }

    #[test]
    fn failed_registration_skips_only_the_retrieval_configuration() {
        let dir = TempDir::new().unwrap();
        let cases = vec![case(&dir, "1", "a", &["CT"])];
        let plan = MatrixPlan::new(vec![
            config("simple", "m1", None),
            config("simple", "m1", Some(ToolChoice::Required)),
        ])
        .unwrap();
        let sink = ResultSink::new(dir.path().join("results")).unwrap();
        let boundary = RecordingBoundary::default();
        let mut source = RetrievalSource::deferred(|| {
            Err(BenchError::RetrievalUnavailable("upload rejected".into()))
        });

        let report = MatrixRunner::new(&boundary, fast_retry(1)).run(&cases, &plan, &mut source, &sink);

        assert!(matches!(
            report.configurations[0].outcome,
            ConfigurationOutcome::Persisted { .. }
        ));
        assert!(matches!(
            report.configurations[1].outcome,
            ConfigurationOutcome::Skipped { .. }
        ));
        assert!(!report.is_complete());
        assert!(sink.path_for("m1 simple").exists());
        assert!(!sink.path_for("m1 file search").exists());
    }

    #[test]
    fn deferred_registration_runs_once_and_only_when_needed() {
        let dir = TempDir::new().unwrap();
        let cases = vec![case(&dir, "1", "a", &["CT"])];
        let sink = ResultSink::new(dir.path().join("results")).unwrap();
        let boundary = RecordingBoundary::default();
        let runner = MatrixRunner::new(&boundary, fast_retry(1));
        let calls = Cell::new(0);

        let mut source = RetrievalSource::deferred(|| {
            calls.set(calls.get() + 1);
            Ok(VectorStoreId::new("vs_1").unwrap())
        });
        let plain = MatrixPlan::new(vec![config("simple", "m1", None)]).unwrap();
        runner.run(&cases, &plain, &mut source, &sink);
        assert_eq!(calls.get(), 0);

        let with_search = MatrixPlan::new(vec![config("simple", "m1", Some(ToolChoice::Required))]).unwrap();
        runner.run(&cases, &with_search, &mut source, &sink);
        runner.run(&cases, &with_search, &mut source, &sink);
        assert_eq!(calls.get(), 1);

        let requests = boundary.requests.lock().unwrap();
        assert!(requests[1..]
            .iter()
            .all(|r| r.tool_choice == Some(ToolChoice::Required) && !r.tools.is_empty()));
    }

    #[test]
    fn concurrent_runs_keep_corpus_order() {
        let dir = TempDir::new().unwrap();
        let cases: Vec<CaseRecord> = (1..=12)
            .map(|i| case(&dir, &i.to_string(), &format!("case {}", i), &["CT"]))
            .collect();
        let boundary = RecordingBoundary::default();

        let results = MatrixRunner::new(&boundary, fast_retry(1))
            .with_concurrency(4)
            .unwrap()
            .run_configuration(&config("simple", "m", None), &cases, None)
            .unwrap();

        let ids: Vec<&str> = results.iter().map(|r| r.case_id.as_str()).collect();
        let expected: Vec<String> = (1..=12).map(|i| i.to_string()).collect();
        assert_eq!(ids, expected);
        assert_eq!(boundary.requests.lock().unwrap().len(), 12);
    }

    #[test]
    fn duplicate_configurations_are_rejected() {
        let result = MatrixPlan::new(vec![config("a", "m", None), config("a", "m", None)]);
        assert!(matches!(result, Err(BenchError::InvalidInput(_))));
    }
}
