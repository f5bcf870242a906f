//! Inference boundary for Orbit Bench.
//!
//! This crate provides the **wire models** and the **transport** for the remote multimodal
//! inference service:
//! - the Responses API (system instruction + ordered text/image blocks → aggregated text)
//! - the Files and Vector Stores APIs (reference document registration for file search)
//!
//! The rest of the workspace only depends on the two traits defined here,
//! [`InferenceBoundary`] and [`RetrievalRegistrar`], so tests can substitute a fake service
//! and the HTTP client stays a thin translation layer.

pub mod client;
pub mod responses;
pub mod vector_stores;

pub use client::{ClientConfig, OpenAiClient, DEFAULT_BASE_URL};
pub use responses::{
    ContentBlock, InputMessage, MessageContent, ResponseBody, ResponseRequest, Role, Tool,
    ToolChoice,
};
pub use vector_stores::{FileId, IngestionStatus, VectorStoreId};

use orbit_bench_files::ReferenceDocument;

/// Errors returned by the inference boundary.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("response contained no text output (status: {0})")]
    EmptyOutput(String),
}

impl InferenceError {
    /// Whether retrying the same call may succeed.
    ///
    /// Network failures, timeouts, rate limiting and server-side errors are transient.
    /// Client errors (bad request, auth, not found) and malformed responses are not.
    pub fn is_transient(&self) -> bool {
        match self {
            InferenceError::Transport(e) => !e.is_builder(),
            InferenceError::Status { status, .. } => {
                matches!(*status, 408 | 409 | 429) || *status >= 500
            }
            InferenceError::InvalidInput(_)
            | InferenceError::Decode(_)
            | InferenceError::EmptyOutput(_) => false,
        }
    }
}

/// Type alias for Results that can fail with an [`InferenceError`].
pub type InferenceResult<T> = Result<T, InferenceError>;

/// The remote completion service, seen from the benchmark.
///
/// Implementations must be shareable across worker threads: the matrix runner may fan the
/// cases of one configuration out over a bounded pool.
pub trait InferenceBoundary: Send + Sync {
    /// Sends one request and returns the aggregated text output.
    fn create_response(&self, request: &ResponseRequest) -> InferenceResult<String>;
}

/// The remote retrieval subsystem (file store + vector stores).
pub trait RetrievalRegistrar {
    /// Uploads a document to the file store.
    fn upload_file(&self, document: &ReferenceDocument) -> InferenceResult<FileId>;

    /// Creates an empty, named vector store.
    fn create_vector_store(&self, name: &str) -> InferenceResult<VectorStoreId>;

    /// Attaches an uploaded file to a vector store, starting ingestion.
    fn attach_file(&self, store: &VectorStoreId, file: &FileId)
        -> InferenceResult<IngestionStatus>;

    /// Reports how far ingestion of an attached file has progressed.
    fn ingestion_status(
        &self,
        store: &VectorStoreId,
        file: &FileId,
    ) -> InferenceResult<IngestionStatus>;
}
