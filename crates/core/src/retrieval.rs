//! Reference document registration for file-search augmented runs.
//!
//! Registration uploads the document, creates a named vector store, attaches the file and
//! then waits for ingestion to finish. The vector store id it returns is the retrieval handle
//! attached to every file-search request.

use crate::retry::{RetryExhausted, RetryPolicy};
use crate::{BenchError, BenchResult};
use orbit_bench_files::ReferenceDocument;
use orbit_bench_inference::{IngestionStatus, RetrievalRegistrar, VectorStoreId};
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

/// How long to wait for the remote side to index the document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IngestionPolling {
    pub interval: Duration,
    pub max_checks: u32,
}

impl Default for IngestionPolling {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_checks: 150,
        }
    }
}

/// Registers `document_path` and returns the vector store handle once it is searchable.
///
/// # Errors
///
/// - [`BenchError::FileLoad`] if the file cannot be read.
/// - [`BenchError::RetrievalRegistration`] if a remote call fails after retries.
/// - [`BenchError::RetrievalIngestion`] if ingestion ends failed or cancelled.
/// - [`BenchError::RetrievalIngestionTimeout`] if ingestion does not finish in time.
pub fn register_reference_document(
    registrar: &dyn RetrievalRegistrar,
    document_path: &Path,
    store_name: &str,
    retry: &RetryPolicy,
    polling: IngestionPolling,
) -> BenchResult<VectorStoreId> {
    let document = ReferenceDocument::from_path(document_path)?;
    let registration = |e: RetryExhausted| BenchError::RetrievalRegistration(e.error);

    tracing::info!("uploading reference document {}", document.filename);
    let file = retry
        .run("reference document upload", |_| registrar.upload_file(&document))
        .map_err(registration)?;

    let store = retry
        .run("vector store creation", |_| registrar.create_vector_store(store_name))
        .map_err(registration)?;
    tracing::info!("created vector store {} ({})", store_name, store);

    let mut status = retry
        .run("vector store attach", |_| registrar.attach_file(&store, &file))
        .map_err(registration)?;

    let mut checks = 0u32;
    while !status.is_terminal() {
        if checks >= polling.max_checks {
            return Err(BenchError::RetrievalIngestionTimeout(checks));
        }
        sleep(polling.interval);
        checks += 1;
        status = retry
            .run("ingestion status check", |_| {
                registrar.ingestion_status(&store, &file)
            })
            .map_err(registration)?;
        tracing::debug!("ingestion of {} into {}: {:?}", file, store, status);
    }

    match status {
        IngestionStatus::Completed => {
            tracing::info!("reference document indexed into {}", store);
            Ok(store)
        }
        other => Err(BenchError::RetrievalIngestion(other)),
    }
}
