//! # Orbit Bench Core
//!
//! Benchmark logic for multimodal orbital imaging diagnosis.
//!
//! This crate contains everything between the files on disk and the result tables:
//! - Case index loading and the case corpus builder
//! - The prompt catalog and the evaluation matrix
//! - Reference document registration for file-search runs
//! - Result tables and the run manifest
//!
//! **No transport concerns**: HTTP and wire formats live in `orbit-bench-inference`; this crate
//! only talks to the [`InferenceBoundary`] and [`RetrievalRegistrar`] traits, so every
//! component can be exercised against fakes.

pub mod config;
pub mod constants;
pub mod corpus;
pub mod error;
pub mod manifest;
pub mod matrix;
pub mod metadata;
pub mod prompts;
pub mod results;
pub mod retrieval;
pub mod retry;
pub mod study;

pub use config::{BenchConfig, RetrievalSettings};
pub use corpus::{build_corpus, CaseRecord, ImageRef};
pub use error::{BenchError, BenchResult};
pub use manifest::RunManifest;
pub use matrix::{
    Answer, ConfigurationOutcome, EvaluationConfiguration, EvaluationResult, MatrixPlan,
    MatrixReport, MatrixRunner, RetrievalSelection, RetrievalSource,
};
pub use metadata::MetadataIndex;
pub use prompts::{PromptCatalog, PromptVariant};
pub use results::{read_results, ResultRow, ResultSink};
pub use retry::RetryPolicy;
pub use study::{run_study, StudyOutcome};

pub use orbit_bench_inference::{InferenceBoundary, RetrievalRegistrar};
