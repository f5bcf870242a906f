use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orbit_bench_core::config::{
    models_from_env_value, path_from_env_value, retrieval_model_from_env_value,
    u64_from_env_value,
};
use orbit_bench_core::constants::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_RESULTS_DIR, DEFAULT_RETRIEVAL_PROMPT, DEFAULT_RETRY_BASE_MS, DEFAULT_RETRY_MAX_MS,
    DEFAULT_VECTOR_STORE_NAME,
};
use orbit_bench_core::{
    run_study, BenchConfig, ConfigurationOutcome, RetrievalSettings, RetryPolicy,
};
use orbit_bench_inference::{ClientConfig, OpenAiClient, DEFAULT_BASE_URL};
use orbit_types::NonEmptyText;

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn text_or_default(name: &str, default: &str) -> anyhow::Result<NonEmptyText> {
    let value = env(name).filter(|v| !v.trim().is_empty());
    Ok(NonEmptyText::new(value.as_deref().unwrap_or(default))?)
}

/// Resolves the benchmark configuration from the environment.
///
/// # Environment Variables
/// - `ORBIT_CASES_DIR`: root folder of case sub-folders (required)
/// - `ORBIT_CASE_INDEX`: case index CSV (required)
/// - `ORBIT_RESULTS_DIR`: where result tables go (default: "results")
/// - `ORBIT_MODELS`: comma-separated model ids
/// - `ORBIT_PROMPTS_FILE`: YAML prompt catalog replacing the built-in prompts
/// - `ORBIT_REFERENCE_DOCUMENT`: document for the file-search run; unset skips that run
/// - `ORBIT_RETRIEVAL_MODEL`, `ORBIT_RETRIEVAL_PROMPT`, `ORBIT_VECTOR_STORE_NAME`
/// - `ORBIT_MAX_ATTEMPTS`, `ORBIT_RETRY_BASE_MS`, `ORBIT_REQUEST_TIMEOUT_SECS`, `ORBIT_CONCURRENCY`
fn config_from_env() -> anyhow::Result<BenchConfig> {
    let cases_dir = path_from_env_value("ORBIT_CASES_DIR", env("ORBIT_CASES_DIR"), None)?;
    let case_index = path_from_env_value("ORBIT_CASE_INDEX", env("ORBIT_CASE_INDEX"), None)?;
    let results_dir = path_from_env_value(
        "ORBIT_RESULTS_DIR",
        env("ORBIT_RESULTS_DIR"),
        Some(DEFAULT_RESULTS_DIR),
    )?;
    let models = models_from_env_value(env("ORBIT_MODELS"))?;

    let retrieval = match env("ORBIT_REFERENCE_DOCUMENT").filter(|v| !v.trim().is_empty()) {
        Some(document) => Some(RetrievalSettings {
            reference_document: PathBuf::from(document.trim()),
            model: retrieval_model_from_env_value(env("ORBIT_RETRIEVAL_MODEL"), &models)?,
            prompt: text_or_default("ORBIT_RETRIEVAL_PROMPT", DEFAULT_RETRIEVAL_PROMPT)?,
            vector_store_name: text_or_default(
                "ORBIT_VECTOR_STORE_NAME",
                DEFAULT_VECTOR_STORE_NAME,
            )?,
        }),
        None => None,
    };

    let max_attempts = u64_from_env_value(
        "ORBIT_MAX_ATTEMPTS",
        env("ORBIT_MAX_ATTEMPTS"),
        DEFAULT_MAX_ATTEMPTS.into(),
    )?;
    let base_ms = u64_from_env_value(
        "ORBIT_RETRY_BASE_MS",
        env("ORBIT_RETRY_BASE_MS"),
        DEFAULT_RETRY_BASE_MS,
    )?;
    let retry = RetryPolicy::new(
        u32::try_from(max_attempts)?,
        Duration::from_millis(base_ms),
        Duration::from_millis(DEFAULT_RETRY_MAX_MS.max(base_ms)),
    )?;

    let timeout_secs = u64_from_env_value(
        "ORBIT_REQUEST_TIMEOUT_SECS",
        env("ORBIT_REQUEST_TIMEOUT_SECS"),
        DEFAULT_REQUEST_TIMEOUT_SECS,
    )?;
    let concurrency = u64_from_env_value(
        "ORBIT_CONCURRENCY",
        env("ORBIT_CONCURRENCY"),
        DEFAULT_CONCURRENCY as u64,
    )?;

    let config = BenchConfig::new(cases_dir, case_index, results_dir, models)?
        .with_prompts_file(
            env("ORBIT_PROMPTS_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        )
        .with_retrieval(retrieval)
        .with_retry(retry)
        .with_request_timeout(Duration::from_secs(timeout_secs))?
        .with_concurrency(usize::try_from(concurrency)?)?;

    Ok(config)
}

/// Main entry point for the Orbit Bench study run
///
/// Runs every prompt against every model over the case corpus, plus the file-search run when
/// a reference document is configured, writing one CSV per configuration and a
/// `manifest.json` into the results directory.
///
/// Credentials come from `OPENAI_API_KEY` (and optionally `OPENAI_BASE_URL`); a `.env` file
/// in the working directory is honoured.
///
/// # Returns
/// * `Ok(())` - If every configuration ran and was written
/// * `Err(anyhow::Error)` - If setup failed or any configuration was skipped or unwritten
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("orbit_bench=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config_from_env()?;

    let client = OpenAiClient::new(ClientConfig {
        api_key: env("OPENAI_API_KEY").unwrap_or_default(),
        base_url: env("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
        timeout: config.request_timeout(),
    })?;

    tracing::info!("++ Starting Orbit Bench run");
    tracing::info!("++ Cases: {}", config.cases_dir().display());
    tracing::info!("++ Results: {}", config.results_dir().display());

    let outcome = run_study(&config, &client, &client)?;
    let manifest_path = outcome.manifest.write(config.results_dir())?;
    tracing::info!(
        "run {} finished; manifest at {}",
        outcome.manifest.run_id,
        manifest_path.display()
    );

    let incomplete: Vec<String> = outcome
        .report
        .configurations
        .iter()
        .filter(|c| !matches!(c.outcome, ConfigurationOutcome::Persisted { .. }))
        .map(|c| c.name())
        .collect();
    if !incomplete.is_empty() {
        anyhow::bail!("configurations not written: {}", incomplete.join(", "));
    }

    Ok(())
}
