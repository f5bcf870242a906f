//! End-to-end study run.

use crate::config::BenchConfig;
use crate::corpus::build_corpus;
use crate::manifest::RunManifest;
use crate::matrix::{MatrixPlan, MatrixReport, MatrixRunner, RetrievalSelection, RetrievalSource};
use crate::metadata::MetadataIndex;
use crate::prompts::PromptCatalog;
use crate::results::ResultSink;
use crate::retrieval::{register_reference_document, IngestionPolling};
use crate::BenchResult;
use orbit_bench_inference::{InferenceBoundary, RetrievalRegistrar};

#[derive(Debug)]
pub struct StudyOutcome {
    pub report: MatrixReport,
    pub manifest: RunManifest,
}

/// Loads the prompt catalog named by the configuration, or the built-in one.
pub fn load_catalog(config: &BenchConfig) -> BenchResult<PromptCatalog> {
    match config.prompts_file() {
        Some(path) => PromptCatalog::load(path),
        None => Ok(PromptCatalog::builtin()),
    }
}

/// Builds the configuration list for a run.
pub fn plan_for(config: &BenchConfig, catalog: &PromptCatalog) -> BenchResult<MatrixPlan> {
    let selection = config.retrieval().map(|r| RetrievalSelection {
        prompt: r.prompt.clone(),
        model: r.model.clone(),
    });
    MatrixPlan::standard(catalog, config.models(), selection.as_ref())
}

/// Runs the whole study.
///
/// Everything that can be checked locally (case index, corpus, prompt catalog, plan, results
/// directory) is checked before the first remote call; those failures abort the run. From
/// then on failures are contained per configuration and show up in the report.
pub fn run_study(
    config: &BenchConfig,
    boundary: &dyn InferenceBoundary,
    registrar: &dyn RetrievalRegistrar,
) -> BenchResult<StudyOutcome> {
    let index = MetadataIndex::load(config.case_index())?;
    let cases = build_corpus(config.cases_dir(), &index)?;
    if cases.is_empty() {
        tracing::warn!(
            "no cases with images under {}; tables will be empty",
            config.cases_dir().display()
        );
    }

    let catalog = load_catalog(config)?;
    let plan = plan_for(config, &catalog)?;
    let sink = ResultSink::new(config.results_dir())?;

    let mut retrieval = match config.retrieval() {
        Some(settings) => RetrievalSource::deferred(move || {
            register_reference_document(
                registrar,
                &settings.reference_document,
                settings.vector_store_name.as_str(),
                config.retry(),
                IngestionPolling::default(),
            )
        }),
        None => {
            tracing::info!("no reference document configured; skipping file search");
            RetrievalSource::Unavailable("no reference document configured".into())
        }
    };

    let mut manifest = RunManifest::start(
        cases.len(),
        config.models().iter().map(|m| m.to_string()).collect(),
        catalog.names().into_iter().map(String::from).collect(),
    );

    tracing::info!(
        "running {} configuration(s) over {} case(s)",
        plan.len(),
        cases.len()
    );
    let runner =
        MatrixRunner::new(boundary, *config.retry()).with_concurrency(config.concurrency())?;
    let report = runner.run(&cases, &plan, &mut retrieval, &sink);

    manifest.finish(&report);
    Ok(StudyOutcome { report, manifest })
}
