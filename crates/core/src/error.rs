use orbit_bench_inference::{InferenceError, IngestionStatus};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to read case root {path}: {source}", path = path.display())]
    CaseRootRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read case folder {path}: {source}", path = path.display())]
    CaseFolderRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read case index {path}: {source}", path = path.display())]
    CaseIndexRead {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to read prompt file: {0}")]
    PromptFileRead(std::io::Error),
    #[error("prompt file schema mismatch: {0}")]
    PromptFileSchema(String),

    #[error("failed to create results directory: {0}")]
    ResultsDirCreation(std::io::Error),
    #[error("failed to write results file: {0}")]
    ResultsWrite(csv::Error),
    #[error("failed to finalise results file: {0}")]
    ResultsFinalise(std::io::Error),
    #[error("failed to read results file: {0}")]
    ResultsRead(csv::Error),

    #[error("failed to load file: {0}")]
    FileLoad(#[from] orbit_bench_files::FilesError),
    #[error("retrieval registration failed: {0}")]
    RetrievalRegistration(InferenceError),
    #[error("reference document ingestion ended with status {0:?}")]
    RetrievalIngestion(IngestionStatus),
    #[error("reference document ingestion still running after {0} checks")]
    RetrievalIngestionTimeout(u32),
    #[error("retrieval handle unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),

    #[error("failed to serialize manifest: {0}")]
    ManifestSerialization(serde_json::Error),
    #[error("failed to write manifest: {0}")]
    ManifestWrite(std::io::Error),
}

pub type BenchResult<T> = std::result::Result<T, BenchError>;
